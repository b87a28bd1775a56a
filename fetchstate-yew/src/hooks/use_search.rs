use yew::prelude::*;

use fetchstate::search::{SearchConfig, SearchManager};
use fetchstate::{FetchError, Filters, Object, PaginationView};

/// Search state and actions returned by [`use_search`].
pub struct SearchHookReturn<T: Clone + 'static> {
    /// The current page (or the accumulated blocks, with infinite
    /// scroll).
    pub results: Vec<T>,
    /// Total matching items as last reported by the backend.
    pub count: u64,
    /// The stored filters, criteria and window alike.
    pub filters: Filters,
    /// Pagination summary derived from the stored window.
    pub pagination: PaginationView,
    pub has_started: bool,
    pub is_searching: bool,
    pub is_loading_more: bool,
    pub is_loading_previous: bool,
    pub can_load_more: bool,
    pub can_load_previous: bool,
    pub error: Option<FetchError>,
    /// Merges a criteria patch and searches from the first page.
    pub search: Callback<Object>,
    /// Re-runs the search with unchanged filters.
    pub reload: Callback<()>,
    /// Restores defaults plus initial filters and searches again.
    pub reset_filters: Callback<()>,
    pub next_page: Callback<()>,
    pub previous_page: Callback<()>,
    /// Jumps to a 1-based page.
    pub go_to_page: Callback<u64>,
    /// Changes the page size, staying over the same absolute position.
    pub change_limit: Callback<u64>,
    /// Appends the next contiguous block (infinite scroll).
    pub load_more: Callback<()>,
    /// Prepends the previous block (bidirectional infinite scroll).
    pub load_previous: Callback<()>,
}

impl<T: Clone> SearchHookReturn<T> {
    /// True during the first search, before any results and before any
    /// failure.
    pub fn is_initial_loading(&self) -> bool {
        self.is_searching && !self.has_started && self.error.is_none()
    }
}

/// Drives a backend search on mount and re-renders the component as
/// results, filters, and loading flags change.
///
/// The config closure runs once, on first render. All navigation is
/// exposed as callbacks; invalid navigation (out-of-range page, zero
/// limit) is a no-op, and a failed search keeps the previous results so
/// the component can offer a retry.
///
/// # Example
///
/// ```
/// use fetchstate::search::SearchConfig;
/// use fetchstate::{Filters, ResultSet};
/// use fetchstate_yew::hooks::use_search;
/// use yew::prelude::*;
///
/// #[function_component]
/// fn Directory() -> Html {
///     let search = use_search(|| {
///         SearchConfig::new(|_filters: &Filters| async {
///             Ok(ResultSet::new(1, vec!["Maria Silva".to_string()]))
///         })
///     });
///
///     let on_next = {
///         let next_page = search.next_page.clone();
///         Callback::from(move |_: MouseEvent| next_page.emit(()))
///     };
///
///     html! {
///         <div>
///             <ul>
///                 { for search.results.iter().map(|name| html! {
///                     <li>{ name.clone() }</li>
///                 }) }
///             </ul>
///             <button
///                 onclick={on_next}
///                 disabled={!search.pagination.has_next_page}
///             >
///                 {"Next"}
///             </button>
///         </div>
///     }
/// }
/// ```
#[hook]
pub fn use_search<T, F>(init: F) -> SearchHookReturn<T>
where
    T: Clone + 'static,
    F: FnOnce() -> SearchConfig<T>,
{
    let search = use_state(|| SearchManager::new(init()));
    let search = (*search).clone();
    let tick = use_state(|| ());

    // Subscribe for re-renders, then run the initial search on mount.
    {
        let search = search.clone();
        use_effect_with((), move |_| {
            search.set_on_change(move || tick.set(()));
            let on_mount = search.clone();
            yew::platform::spawn_local(async move {
                on_mount.run().await;
            });
            move || search.clear_on_change()
        });
    }

    let search_cb = {
        let search = search.clone();
        Callback::from(move |patch: Object| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.search(patch).await;
            });
        })
    };

    let reload = {
        let search = search.clone();
        Callback::from(move |_: ()| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.reload().await;
            });
        })
    };

    let reset_filters = {
        let search = search.clone();
        Callback::from(move |_: ()| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.reset_filters().await;
            });
        })
    };

    let next_page = {
        let search = search.clone();
        Callback::from(move |_: ()| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.next_page().await;
            });
        })
    };

    let previous_page = {
        let search = search.clone();
        Callback::from(move |_: ()| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.previous_page().await;
            });
        })
    };

    let go_to_page = {
        let search = search.clone();
        Callback::from(move |page: u64| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.go_to_page(page).await;
            });
        })
    };

    let change_limit = {
        let search = search.clone();
        Callback::from(move |limit: u64| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.change_limit(limit).await;
            });
        })
    };

    let load_more = {
        let search = search.clone();
        Callback::from(move |_: ()| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.load_more().await;
            });
        })
    };

    let load_previous = {
        let search = search.clone();
        Callback::from(move |_: ()| {
            let search = search.clone();
            yew::platform::spawn_local(async move {
                search.load_previous().await;
            });
        })
    };

    SearchHookReturn {
        results: search.results(),
        count: search.count(),
        filters: search.filters(),
        pagination: search.pagination(),
        has_started: search.has_started(),
        is_searching: search.is_searching(),
        is_loading_more: search.is_loading_more(),
        is_loading_previous: search.is_loading_previous(),
        can_load_more: search.can_load_more(),
        can_load_previous: search.can_load_previous(),
        error: search.error(),
        search: search_cb,
        reload,
        reset_filters,
        next_page,
        previous_page,
        go_to_page,
        change_limit,
        load_more,
        load_previous,
    }
}
