use fetchstate::FetchError;
use fetchstate::resolve::{Resolver, ResolverConfig, ResolverSet};
use serde_json::{Value, json};
use test_helpers::{CallCount, CallbackLog, FailSwitch, Gates};

#[tokio::test]
async fn run_settles_every_producer_form() -> anyhow::Result<()> {
    let log = CallbackLog::new();
    let config = ResolverConfig::new()
        .resolver(
            "profile",
            Resolver::task(|| async { Ok(json!({"name": "Maria"})) }),
        )
        .resolver("languages", Resolver::from_fn(|| Ok(json!(["pt", "en"]))))
        .resolver("motd", Resolver::once(async { Ok(json!("welcome")) }))
        .on_started({
            let log = log.clone();
            move |values| log.push(format!("started:{}", values.len()))
        });
    let resolvers = ResolverSet::new(config);

    assert!(!resolvers.has_started());
    resolvers.run().await;

    assert!(resolvers.has_started());
    assert!(!resolvers.is_loading());
    assert_eq!(resolvers.error(), None);
    assert_eq!(resolvers.value("profile"), Some(json!({"name": "Maria"})));
    assert_eq!(resolvers.value("languages"), Some(json!(["pt", "en"])));
    assert_eq!(resolvers.value("motd"), Some(json!("welcome")));
    assert_eq!(resolvers.names(), vec!["profile", "languages", "motd"]);
    assert_eq!(log.entries(), vec!["started:3"]);
    Ok(())
}

#[tokio::test]
async fn an_empty_set_starts_immediately() -> anyhow::Result<()> {
    let log = CallbackLog::new();
    let config = ResolverConfig::new().on_started({
        let log = log.clone();
        move |values| log.push(format!("started:{}", values.len()))
    });
    let resolvers: ResolverSet<Value> = ResolverSet::new(config);

    assert!(!resolvers.has_started());
    resolvers.run().await;

    // a barrier with nothing to settle is an all-success run
    assert!(resolvers.has_started());
    assert!(!resolvers.is_loading());
    assert_eq!(resolvers.error(), None);
    assert_eq!(log.entries(), vec!["started:0"]);
    Ok(())
}

#[tokio::test]
async fn one_failure_leaves_other_outcomes_usable() -> anyhow::Result<()> {
    let failures = FailSwitch::new();
    failures.fail_next(1);
    let config = ResolverConfig::new()
        .resolver(
            "flaky",
            Resolver::task({
                let failures = failures.clone();
                move || {
                    let failed = failures.take();
                    async move {
                        if failed {
                            Err(FetchError::new("flaky down"))
                        } else {
                            Ok(json!("flaky ok"))
                        }
                    }
                }
            }),
        )
        .resolver("steady", Resolver::task(|| async { Ok(json!("steady ok")) }));
    let resolvers = ResolverSet::new(config);

    resolvers.run().await;

    assert_eq!(resolvers.value("steady"), Some(json!("steady ok")));
    assert_eq!(resolvers.value("flaky"), None);
    assert_eq!(
        resolvers.errors().get("flaky"),
        Some(&FetchError::new("flaky down"))
    );
    assert_eq!(resolvers.error(), Some(FetchError::new("flaky down")));
    assert!(!resolvers.has_started());

    // re-running just the failed task clears the aggregate error
    resolvers.execute("flaky").await;
    assert_eq!(resolvers.value("flaky"), Some(json!("flaky ok")));
    assert_eq!(resolvers.error(), None);
    assert!(resolvers.has_started());
    Ok(())
}

#[tokio::test]
async fn declaration_order_decides_the_aggregate_error() -> anyhow::Result<()> {
    let alpha = Gates::<Value>::new();
    let beta = Gates::<Value>::new();
    let log = CallbackLog::new();
    let config = ResolverConfig::new()
        .resolver("alpha", Resolver::task(alpha.producer()))
        .resolver("beta", Resolver::task(beta.producer()))
        .on_error({
            let log = log.clone();
            move |errors| {
                let mut names: Vec<_> = errors.keys().cloned().collect();
                names.sort();
                log.push(format!("error:{}", names.join(",")));
            }
        });
    let resolvers = ResolverSet::new(config);

    let release_alpha = alpha.expect();
    let release_beta = beta.expect();

    futures::join!(resolvers.run(), async {
        // beta answers first; alpha must still win the aggregate slot
        release_beta.send(Err(FetchError::new("beta failed"))).unwrap();
        release_alpha
            .send(Err(FetchError::new("alpha failed")))
            .unwrap();
    });

    assert_eq!(resolvers.error(), Some(FetchError::new("alpha failed")));
    assert_eq!(resolvers.errors().len(), 2);
    assert!(!resolvers.has_started());
    assert_eq!(log.entries(), vec!["error:alpha,beta"]);
    Ok(())
}

#[tokio::test]
async fn execute_unknown_name_is_a_no_op() -> anyhow::Result<()> {
    let calls = CallCount::new();
    let config = ResolverConfig::new().resolver(
        "known",
        Resolver::task({
            let calls = calls.clone();
            move || {
                calls.bump();
                async move { Ok(json!(1)) }
            }
        }),
    );
    let resolvers = ResolverSet::new(config);
    resolvers.run().await;
    assert_eq!(calls.get(), 1);

    resolvers.execute("unknown").await;

    assert_eq!(calls.get(), 1);
    assert_eq!(resolvers.error(), None);
    assert!(resolvers.has_started());
    Ok(())
}

#[tokio::test]
async fn reload_keeps_values_until_replaced() -> anyhow::Result<()> {
    let gates = Gates::<Value>::new();
    let config =
        ResolverConfig::new().resolver("data", Resolver::task(gates.producer()));
    let resolvers = ResolverSet::new(config);

    let first = gates.expect();
    first.send(Ok(json!("v1"))).unwrap();
    resolvers.run().await;
    assert_eq!(resolvers.value("data"), Some(json!("v1")));

    let second = gates.expect();
    futures::join!(resolvers.reload(false), async {
        // the old value stays visible while the refresh is in flight
        assert_eq!(resolvers.value("data"), Some(json!("v1")));
        assert!(resolvers.is_loading());
        second.send(Ok(json!("v2"))).unwrap();
    });

    assert_eq!(resolvers.value("data"), Some(json!("v2")));
    assert!(resolvers.has_started());
    assert!(!resolvers.is_loading());
    Ok(())
}

#[tokio::test]
async fn clearing_reload_drops_previous_outcomes() -> anyhow::Result<()> {
    let gates = Gates::<Value>::new();
    let config =
        ResolverConfig::new().resolver("data", Resolver::task(gates.producer()));
    let resolvers = ResolverSet::new(config);

    let first = gates.expect();
    first.send(Ok(json!("v1"))).unwrap();
    resolvers.run().await;
    assert!(resolvers.has_started());

    let second = gates.expect();
    futures::join!(resolvers.reload(true), async {
        assert_eq!(resolvers.value("data"), None);
        assert!(!resolvers.has_started());
        second.send(Ok(json!("v2"))).unwrap();
    });

    assert_eq!(resolvers.value("data"), Some(json!("v2")));
    assert!(resolvers.has_started());
    Ok(())
}

#[tokio::test]
async fn once_resolver_settles_a_single_time() -> anyhow::Result<()> {
    let runs = CallCount::new();
    let future = {
        let runs = runs.clone();
        async move {
            runs.bump();
            Ok(json!("cached"))
        }
    };
    let config = ResolverConfig::new().resolver("cached", Resolver::once(future));
    let resolvers = ResolverSet::new(config);

    resolvers.run().await;
    resolvers.reload(false).await;
    resolvers.run().await;

    assert_eq!(runs.get(), 1);
    assert_eq!(resolvers.value("cached"), Some(json!("cached")));
    Ok(())
}
