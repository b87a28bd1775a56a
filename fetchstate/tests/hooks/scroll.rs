use fetchstate::search::{InfiniteScrollOptions, SearchConfig, SearchManager};
use fetchstate::{FetchError, PaginationOptions, ResultSet};
use serde_json::json;
use test_helpers::{DirectoryBackend, Gates, Person, object, people, person};

fn seqs(manager: &SearchManager<Person>) -> Vec<u64> {
    manager.results().iter().map(|p| p.seq).collect()
}

#[tokio::test]
async fn load_more_appends_contiguous_blocks() -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(
        SearchConfig::new(backend.search_fn()).infinite_scroll(InfiniteScrollOptions::default()),
    );

    manager.run().await;
    assert_eq!(manager.results().len(), 10);
    assert!(manager.can_load_more());

    manager.load_more().await;
    assert_eq!(backend.seen(1).get("offset"), Some(&json!(10)));
    assert_eq!(manager.results().len(), 20);

    manager.load_more().await;
    assert_eq!(backend.seen(2).get("offset"), Some(&json!(20)));
    assert_eq!(manager.results().len(), 25);
    assert!(!manager.can_load_more());
    assert!(!manager.is_loading_more());
    assert_eq!(seqs(&manager), (0..25).collect::<Vec<u64>>());

    // everything is loaded, so another call never reaches the backend
    manager.load_more().await;
    assert_eq!(backend.calls.get(), 3);
    Ok(())
}

#[tokio::test]
async fn failed_block_fetch_leaves_accumulation_for_retry() -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(
        SearchConfig::new(backend.search_fn()).infinite_scroll(InfiniteScrollOptions::default()),
    );
    manager.run().await;

    backend.failures.fail_next(1);
    manager.load_more().await;

    assert_eq!(
        manager.error(),
        Some(FetchError::new("directory unavailable"))
    );
    assert_eq!(manager.results().len(), 10);
    assert!(!manager.is_loading_more());
    assert!(manager.can_load_more());

    // the frontier did not move; the retry asks for the same block
    manager.load_more().await;
    assert_eq!(backend.seen(1).get("offset"), Some(&json!(10)));
    assert_eq!(backend.seen(2).get("offset"), Some(&json!(10)));
    assert_eq!(manager.results().len(), 20);
    assert_eq!(manager.error(), None);
    Ok(())
}

#[tokio::test]
async fn bidirectional_scroll_prepends_earlier_blocks() -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(SearchConfig::new(backend.search_fn()).infinite_scroll(
        InfiniteScrollOptions {
            bidirectional: true,
            initial_offset: 10,
        },
    ));

    manager.run().await;
    assert_eq!(backend.seen(0).get("offset"), Some(&json!(10)));
    assert_eq!(seqs(&manager), (10..20).collect::<Vec<u64>>());
    assert!(manager.can_load_previous());

    manager.load_previous().await;
    assert_eq!(backend.seen(1).get("offset"), Some(&json!(0)));
    assert_eq!(seqs(&manager), (0..20).collect::<Vec<u64>>());
    assert!(!manager.can_load_previous());

    // already at the start, so another call never reaches the backend
    manager.load_previous().await;
    assert_eq!(backend.calls.get(), 2);

    manager.load_more().await;
    assert_eq!(seqs(&manager), (0..25).collect::<Vec<u64>>());
    Ok(())
}

#[tokio::test]
async fn load_previous_shortens_the_block_at_the_start() -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(
        SearchConfig::new(backend.search_fn())
            .pagination(PaginationOptions::with_limit(5))
            .infinite_scroll(InfiniteScrollOptions {
                bidirectional: true,
                initial_offset: 7,
            }),
    );

    manager.run().await;
    assert_eq!(seqs(&manager), (7..12).collect::<Vec<u64>>());

    manager.load_previous().await;
    assert_eq!(backend.seen(1).get("offset"), Some(&json!(2)));
    assert_eq!(backend.seen(1).get("limit"), Some(&json!(5)));
    assert_eq!(seqs(&manager), (2..12).collect::<Vec<u64>>());

    // only two items remain below; the block shrinks so it cannot
    // overlap what is already loaded
    manager.load_previous().await;
    assert_eq!(backend.seen(2).get("offset"), Some(&json!(0)));
    assert_eq!(backend.seen(2).get("limit"), Some(&json!(2)));
    assert_eq!(seqs(&manager), (0..12).collect::<Vec<u64>>());
    assert!(!manager.can_load_previous());

    // the stored page size is untouched by the shortened wire limit
    assert_eq!(manager.filters().limit(), 5);
    Ok(())
}

#[tokio::test]
async fn failed_previous_block_leaves_accumulation_for_retry() -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(SearchConfig::new(backend.search_fn()).infinite_scroll(
        InfiniteScrollOptions {
            bidirectional: true,
            initial_offset: 10,
        },
    ));
    manager.run().await;
    assert_eq!(seqs(&manager), (10..20).collect::<Vec<u64>>());

    backend.failures.fail_next(1);
    manager.load_previous().await;

    assert_eq!(
        manager.error(),
        Some(FetchError::new("directory unavailable"))
    );
    assert_eq!(seqs(&manager), (10..20).collect::<Vec<u64>>());
    assert!(!manager.is_loading_previous());
    assert!(manager.can_load_previous());

    // the frontier did not move; the retry asks for the same block
    manager.load_previous().await;
    assert_eq!(backend.seen(1).get("offset"), Some(&json!(0)));
    assert_eq!(backend.seen(2).get("offset"), Some(&json!(0)));
    assert_eq!(seqs(&manager), (0..20).collect::<Vec<u64>>());
    assert_eq!(manager.error(), None);
    assert!(!manager.can_load_previous());
    Ok(())
}

#[tokio::test]
async fn scroll_operations_require_their_mode() -> anyhow::Result<()> {
    // page mode: both scroll operations are no-ops
    let paged = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(SearchConfig::new(paged.search_fn()));
    manager.run().await;
    manager.load_more().await;
    manager.load_previous().await;
    assert_eq!(paged.calls.get(), 1);
    assert_eq!(manager.results().len(), 10);

    // forward-only scroll: backward loading stays off
    let forward = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(
        SearchConfig::new(forward.search_fn()).infinite_scroll(InfiniteScrollOptions {
            bidirectional: false,
            initial_offset: 10,
        }),
    );
    manager.run().await;
    assert!(!manager.can_load_previous());
    manager.load_previous().await;
    assert_eq!(forward.calls.get(), 1);

    // before any search there is nothing to extend
    let idle = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(
        SearchConfig::new(idle.search_fn()).infinite_scroll(InfiniteScrollOptions::default()),
    );
    manager.load_more().await;
    assert_eq!(idle.calls.get(), 0);
    Ok(())
}

#[tokio::test]
async fn load_previous_waits_for_the_first_search() -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(people(25));
    let manager = SearchManager::new(SearchConfig::new(backend.search_fn()).infinite_scroll(
        InfiniteScrollOptions {
            bidirectional: true,
            initial_offset: 10,
        },
    ));

    // the frontier starts mid-list, but there is no accumulation to
    // extend backwards until a search has applied
    assert!(!manager.can_load_previous());
    manager.load_previous().await;
    assert_eq!(backend.calls.get(), 0);

    manager.run().await;
    assert!(manager.can_load_previous());
    manager.load_previous().await;
    assert_eq!(backend.calls.get(), 2);
    assert_eq!(seqs(&manager), (0..20).collect::<Vec<u64>>());
    Ok(())
}

#[tokio::test]
async fn block_landing_after_a_new_search_is_discarded() -> anyhow::Result<()> {
    let gates = Gates::<ResultSet<Person>>::new();
    let manager = SearchManager::new(
        SearchConfig::new(gates.search_fn()).infinite_scroll(InfiniteScrollOptions::default()),
    );

    let initial = gates.expect();
    futures::join!(manager.run(), async {
        initial.send(Ok(ResultSet::new(25, people(10)))).unwrap();
    });
    assert_eq!(manager.results().len(), 10);

    let fresh = gates.expect();
    let block = gates.expect();
    futures::join!(
        manager.search(object(json!({"name": "maria"}))),
        manager.load_more(),
        async {
            // the search answers first; the in-flight block must not be
            // appended to results it no longer belongs to
            fresh
                .send(Ok(ResultSet::new(
                    2,
                    vec![
                        person(0, "Maria Silva", "Lisbon"),
                        person(3, "Maria Oliveira", "Braga"),
                    ],
                )))
                .unwrap();
            block
                .send(Ok(ResultSet::new(
                    25,
                    people(20).into_iter().skip(10).collect(),
                )))
                .unwrap();
        }
    );

    assert_eq!(manager.results().len(), 2);
    assert_eq!(manager.count(), 2);
    assert_eq!(manager.results()[0].name, "Maria Silva");
    assert!(!manager.is_loading_more());
    assert!(!manager.is_searching());
    assert!(!manager.can_load_more());
    assert_eq!(manager.error(), None);
    Ok(())
}

#[tokio::test]
async fn previous_block_landing_after_a_new_search_is_discarded() -> anyhow::Result<()> {
    let gates = Gates::<ResultSet<Person>>::new();
    let manager = SearchManager::new(SearchConfig::new(gates.search_fn()).infinite_scroll(
        InfiniteScrollOptions {
            bidirectional: true,
            initial_offset: 10,
        },
    ));

    let initial = gates.expect();
    futures::join!(manager.run(), async {
        initial
            .send(Ok(ResultSet::new(
                25,
                people(20).into_iter().skip(10).collect(),
            )))
            .unwrap();
    });
    assert_eq!(seqs(&manager), (10..20).collect::<Vec<u64>>());

    let fresh = gates.expect();
    let block = gates.expect();
    futures::join!(
        manager.search(object(json!({"name": "maria"}))),
        manager.load_previous(),
        async {
            // the search answers first; the in-flight block must not be
            // prepended to results it no longer belongs to
            fresh
                .send(Ok(ResultSet::new(
                    1,
                    vec![person(0, "Maria Silva", "Lisbon")],
                )))
                .unwrap();
            block.send(Ok(ResultSet::new(25, people(10)))).unwrap();
        }
    );

    assert_eq!(manager.results().len(), 1);
    assert_eq!(manager.count(), 1);
    assert_eq!(manager.results()[0].name, "Maria Silva");
    assert!(!manager.is_loading_previous());
    assert!(!manager.is_searching());
    assert!(!manager.can_load_previous());
    assert_eq!(manager.error(), None);
    Ok(())
}

#[tokio::test]
async fn a_new_search_resets_the_accumulation() -> anyhow::Result<()> {
    let backend = DirectoryBackend::new(people(40));
    let manager = SearchManager::new(
        SearchConfig::new(backend.search_fn()).infinite_scroll(InfiniteScrollOptions::default()),
    );

    manager.run().await;
    manager.load_more().await;
    assert_eq!(manager.results().len(), 20);

    manager.search(object(json!({"city": "Lisbon"}))).await;

    assert_eq!(backend.last_seen().get("offset"), Some(&json!(0)));
    assert_eq!(manager.results().len(), 10);
    assert_eq!(manager.count(), 14);
    assert!(manager.results().iter().all(|p| p.city == "Lisbon"));
    assert!(manager.can_load_more());

    manager.load_more().await;
    assert_eq!(manager.results().len(), 14);
    assert!(!manager.can_load_more());
    Ok(())
}
