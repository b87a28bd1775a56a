use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;

use crate::error::FetchError;
use crate::filters::{Filters, PaginationOptions, PaginationView, ResultSet};
use crate::{Object, TaskFuture, Watcher};

/// The backend query: receives the full filters (criteria plus window)
/// and returns one page or block of results.
pub type SearchFn<T> = Box<dyn Fn(&Filters) -> TaskFuture<ResultSet<T>>>;

/// Runs before the search function; a failure aborts the search.
pub type BeforeSearchHook = Box<dyn Fn(&Filters) -> TaskFuture<()>>;

/// Runs after results were applied; a failure surfaces as the search
/// error but does not revert the results.
pub type AfterSearchHook<T> = Box<dyn Fn(&ResultSet<T>) -> TaskFuture<()>>;

/// Notified on success; its own failure is logged and swallowed.
pub type StartedHook<T> = Box<dyn Fn(&ResultSet<T>) -> Result<(), FetchError>>;

/// Notified with the error that failed a search or block fetch.
pub type ErrorHook = Box<dyn Fn(&FetchError)>;

/// Adjusts the outgoing filters right before they reach the search
/// function; the stored filters are not changed.
pub type TransformFilters = Box<dyn Fn(Filters) -> Result<Filters, FetchError>>;

/// Adjusts a fetched result set before it is applied.
pub type TransformResults<T> = Box<dyn Fn(ResultSet<T>) -> Result<ResultSet<T>, FetchError>>;

/// Enables result accumulation instead of page replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InfiniteScrollOptions {
    /// Also allow loading blocks before the initial offset.
    pub bidirectional: bool,
    /// Window start of the first fetch, so a list can open mid-way and
    /// grow in both directions.
    pub initial_offset: u64,
}

/// Configuration for a [`SearchManager`].
pub struct SearchConfig<T: 'static> {
    search: SearchFn<T>,
    default_filters: Object,
    initial_filters: Object,
    pagination: PaginationOptions,
    infinite_scroll: Option<InfiniteScrollOptions>,
    transform_filters: Option<TransformFilters>,
    transform_results: Option<TransformResults<T>>,
    on_before_search: Option<BeforeSearchHook>,
    on_after_search: Option<AfterSearchHook<T>>,
    on_started: Option<StartedHook<T>>,
    on_error: Option<ErrorHook>,
}

impl<T: 'static> SearchConfig<T> {
    pub fn new<F, Fut>(search: F) -> Self
    where
        F: Fn(&Filters) -> Fut + 'static,
        Fut: Future<Output = Result<ResultSet<T>, FetchError>> + 'static,
    {
        Self {
            search: Box::new(move |filters| search(filters).boxed_local()),
            default_filters: Object::new(),
            initial_filters: Object::new(),
            pagination: PaginationOptions::default(),
            infinite_scroll: None,
            transform_filters: None,
            transform_results: None,
            on_before_search: None,
            on_after_search: None,
            on_started: None,
            on_error: None,
        }
    }

    /// Criteria re-applied underneath every search, so they hold unless
    /// explicitly overridden.
    pub fn default_filters(mut self, filters: Object) -> Self {
        self.default_filters = filters;
        self
    }

    /// Criteria applied once on top of the defaults when the manager is
    /// created (and restored by a filter reset).
    pub fn initial_filters(mut self, filters: Object) -> Self {
        self.initial_filters = filters;
        self
    }

    pub fn pagination(mut self, options: PaginationOptions) -> Self {
        self.pagination = options;
        self
    }

    pub fn infinite_scroll(mut self, options: InfiniteScrollOptions) -> Self {
        self.infinite_scroll = Some(options);
        self
    }

    pub fn transform_filters<F>(mut self, transform: F) -> Self
    where
        F: Fn(Filters) -> Result<Filters, FetchError> + 'static,
    {
        self.transform_filters = Some(Box::new(transform));
        self
    }

    pub fn transform_results<F>(mut self, transform: F) -> Self
    where
        F: Fn(ResultSet<T>) -> Result<ResultSet<T>, FetchError> + 'static,
    {
        self.transform_results = Some(Box::new(transform));
        self
    }

    pub fn on_before_search<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(&Filters) -> Fut + 'static,
        Fut: Future<Output = Result<(), FetchError>> + 'static,
    {
        self.on_before_search = Some(Box::new(move |filters| hook(filters).boxed_local()));
        self
    }

    pub fn on_after_search<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(&ResultSet<T>) -> Fut + 'static,
        Fut: Future<Output = Result<(), FetchError>> + 'static,
    {
        self.on_after_search = Some(Box::new(move |set| hook(set).boxed_local()));
        self
    }

    pub fn on_started<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ResultSet<T>) -> Result<(), FetchError> + 'static,
    {
        self.on_started = Some(Box::new(hook));
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FetchError) + 'static,
    {
        self.on_error = Some(Box::new(hook));
        self
    }
}

struct SearchState<T> {
    filters: Filters,
    results: Vec<T>,
    count: u64,
    started: bool,
    error: Option<FetchError>,
    searching: u32,
    loading_more: bool,
    loading_previous: bool,
    // Bumped when a new primary search begins; a search that finds a
    // newer generation on completion discards its outcome.
    generation: u64,
    // Bumped when a primary search replaces the accumulation; a block
    // fetch from an older epoch discards its outcome.
    epoch: u64,
    // Scroll frontiers: results cover the half-open range low..high.
    low: u64,
    high: u64,
}

struct Shell<T: 'static> {
    search: SearchFn<T>,
    default_filters: Object,
    initial_filters: Object,
    pagination: PaginationOptions,
    scroll: Option<InfiniteScrollOptions>,
    transform_filters: Option<TransformFilters>,
    transform_results: Option<TransformResults<T>>,
    on_before_search: Option<BeforeSearchHook>,
    on_after_search: Option<AfterSearchHook<T>>,
    on_started: Option<StartedHook<T>>,
    on_error: Option<ErrorHook>,
    state: RefCell<SearchState<T>>,
    watcher: Watcher,
}

/// Drives a backend search with offset/limit pagination, page navigation
/// and optional infinite scroll.
///
/// The stored filters are the single source of pagination state; every
/// navigation operation rewrites the window inside them and re-runs the
/// search. Invalid navigation (out-of-range page, zero limit) is a logged
/// no-op. Failed searches keep the previous results so the UI can offer a
/// retry without flashing empty. Handles are cheap to clone and share
/// state.
///
/// # Example
///
/// ```
/// use fetchstate::search::{SearchConfig, SearchManager};
/// use fetchstate::{Filters, ResultSet};
///
/// let people = vec!["Ana", "Bruno", "Clara"];
/// let config = SearchConfig::new(move |filters: &Filters| {
///     let window: Vec<&str> = people
///         .iter()
///         .skip(filters.offset() as usize)
///         .take(filters.limit() as usize)
///         .copied()
///         .collect();
///     let set = ResultSet::new(3, window);
///     async move { Ok(set) }
/// });
/// let search = SearchManager::new(config);
///
/// futures::executor::block_on(search.run());
/// assert_eq!(search.results(), vec!["Ana", "Bruno", "Clara"]);
/// assert_eq!(search.pagination().total_pages, 1);
/// ```
pub struct SearchManager<T: Clone + 'static> {
    shell: Rc<Shell<T>>,
}

impl<T: Clone + 'static> Clone for SearchManager<T> {
    fn clone(&self) -> Self {
        Self {
            shell: Rc::clone(&self.shell),
        }
    }
}

impl<T: Clone + 'static> SearchManager<T> {
    pub fn new(config: SearchConfig<T>) -> Self {
        let mut filters = Filters::new(&config.pagination);
        filters.merge(&config.default_filters);
        filters.merge(&config.initial_filters);
        if let Some(scroll) = &config.infinite_scroll {
            filters.set_offset(scroll.initial_offset);
        }
        let offset = filters.offset();
        Self {
            shell: Rc::new(Shell {
                search: config.search,
                default_filters: config.default_filters,
                initial_filters: config.initial_filters,
                pagination: config.pagination,
                scroll: config.infinite_scroll,
                transform_filters: config.transform_filters,
                transform_results: config.transform_results,
                on_before_search: config.on_before_search,
                on_after_search: config.on_after_search,
                on_started: config.on_started,
                on_error: config.on_error,
                state: RefCell::new(SearchState {
                    filters,
                    results: Vec::new(),
                    count: 0,
                    started: false,
                    error: None,
                    searching: 0,
                    loading_more: false,
                    loading_previous: false,
                    generation: 0,
                    epoch: 0,
                    low: offset,
                    high: offset,
                }),
                watcher: Watcher::new(),
            }),
        }
    }

    /// Registers the re-render trigger invoked after every state change.
    pub fn set_on_change(&self, subscriber: impl Fn() + 'static) {
        self.shell.watcher.set(Rc::new(subscriber));
    }

    pub fn clear_on_change(&self) {
        self.shell.watcher.clear();
    }

    /// The current page (or, with infinite scroll, the accumulated
    /// blocks in offset order).
    pub fn results(&self) -> Vec<T> {
        self.shell.state.borrow().results.clone()
    }

    /// Total matching items as last reported by the backend.
    pub fn count(&self) -> u64 {
        self.shell.state.borrow().count
    }

    /// The stored filters, criteria and window alike.
    pub fn filters(&self) -> Filters {
        self.shell.state.borrow().filters.clone()
    }

    /// Pagination summary derived from the stored window and the last
    /// reported total.
    pub fn pagination(&self) -> PaginationView {
        let state = self.shell.state.borrow();
        PaginationView::compute(state.filters.offset(), state.filters.limit(), state.count)
    }

    /// True once any search has applied results successfully.
    pub fn has_started(&self) -> bool {
        self.shell.state.borrow().started
    }

    /// True while a primary search is in flight.
    pub fn is_searching(&self) -> bool {
        self.shell.state.borrow().searching > 0
    }

    pub fn is_loading_more(&self) -> bool {
        self.shell.state.borrow().loading_more
    }

    pub fn is_loading_previous(&self) -> bool {
        self.shell.state.borrow().loading_previous
    }

    pub fn error(&self) -> Option<FetchError> {
        self.shell.state.borrow().error.clone()
    }

    /// True when infinite scroll is enabled and items remain beyond the
    /// loaded range.
    pub fn can_load_more(&self) -> bool {
        let state = self.shell.state.borrow();
        self.shell.scroll.is_some() && state.high < state.count
    }

    /// True when backward loading is enabled, a search has applied, and
    /// items remain before the loaded range.
    pub fn can_load_previous(&self) -> bool {
        let state = self.shell.state.borrow();
        matches!(self.shell.scroll, Some(scroll) if scroll.bidirectional)
            && state.started
            && state.low > 0
    }

    /// Runs the search with the filters as currently stored. Used for the
    /// initial fetch.
    pub async fn run(&self) {
        self.run_search().await;
    }

    /// Re-runs the search with unchanged filters.
    pub async fn reload(&self) {
        self.run_search().await;
    }

    /// Merges a criteria patch and searches from the first page.
    ///
    /// Defaults are re-applied underneath the accumulated criteria, the
    /// patch lands on top, and the offset always resets to zero.
    pub async fn search(&self, patch: Object) {
        {
            let mut state = self.shell.state.borrow_mut();
            let mut filters = Filters::new(&self.shell.pagination);
            filters.merge(&self.shell.default_filters);
            filters.merge(state.filters.as_object());
            filters.merge(&patch);
            filters.set_offset(0);
            state.filters = filters;
        }
        self.run_search().await;
    }

    /// Drops ad-hoc criteria, restoring defaults plus initial filters,
    /// and searches from the first page.
    pub async fn reset_filters(&self) {
        {
            let mut state = self.shell.state.borrow_mut();
            let mut filters = Filters::new(&self.shell.pagination);
            filters.merge(&self.shell.default_filters);
            filters.merge(&self.shell.initial_filters);
            filters.set_offset(0);
            state.filters = filters;
        }
        self.run_search().await;
    }

    /// Moves to the next page; a logged no-op on the last page (or before
    /// any search reported a total).
    pub async fn next_page(&self) {
        let view = self.pagination();
        if !view.has_next_page {
            tracing::debug!("next_page ignored: already on the last page");
            return;
        }
        self.go_to_page(view.current_page + 1).await;
    }

    /// Moves to the previous page; a logged no-op on the first page.
    pub async fn previous_page(&self) {
        let view = self.pagination();
        if !view.has_previous_page {
            tracing::debug!("previous_page ignored: already on the first page");
            return;
        }
        self.go_to_page(view.current_page - 1).await;
    }

    /// Jumps to a 1-based page; out-of-range pages are logged no-ops.
    pub async fn go_to_page(&self, page: u64) {
        let view = self.pagination();
        if page < 1 || page > view.total_pages {
            tracing::debug!(
                "go_to_page ignored: page {} out of range 1..={}",
                page,
                view.total_pages
            );
            return;
        }
        {
            let mut state = self.shell.state.borrow_mut();
            let limit = state.filters.limit();
            state.filters.set_offset((page - 1) * limit);
        }
        self.run_search().await;
    }

    /// Changes the page size while staying over the same absolute
    /// position: the new page is the one containing the old offset. A
    /// zero limit is a logged no-op.
    pub async fn change_limit(&self, limit: u64) {
        if limit == 0 {
            tracing::debug!("change_limit ignored: limit must be positive");
            return;
        }
        {
            let mut state = self.shell.state.borrow_mut();
            let page = state.filters.offset() / limit + 1;
            state.filters.set_limit(limit);
            state.filters.set_offset((page - 1) * limit);
        }
        self.run_search().await;
    }

    /// Fetches the next contiguous block and appends it. Requires
    /// infinite scroll; a no-op while a forward fetch is already in
    /// flight or when everything is loaded. A failed fetch leaves the
    /// accumulation untouched, so calling again retries the same block.
    pub async fn load_more(&self) {
        if self.shell.scroll.is_none() {
            tracing::debug!("load_more ignored: infinite scroll is not enabled");
            return;
        }
        let wire;
        let epoch;
        {
            let mut state = self.shell.state.borrow_mut();
            if state.loading_more {
                return;
            }
            if state.high >= state.count {
                tracing::debug!("load_more ignored: all results loaded");
                return;
            }
            state.loading_more = true;
            epoch = state.epoch;
            let mut block_filters = state.filters.clone();
            block_filters.set_offset(state.high);
            wire = block_filters;
        }
        self.shell.watcher.notify();

        match self.fetch_block(wire).await {
            Ok(block) => {
                let stale;
                {
                    let mut state = self.shell.state.borrow_mut();
                    state.loading_more = false;
                    stale = state.epoch != epoch;
                    if !stale {
                        state.count = block.count;
                        state.high += block.results.len() as u64;
                        state.results.extend(block.results);
                        state.error = None;
                        state.started = true;
                    }
                }
                self.shell.watcher.notify();
                if stale {
                    tracing::debug!("discarding appended block: accumulation was reset");
                }
            }
            Err(error) => self.finish_block_error(epoch, true, error),
        }
    }

    /// Fetches the contiguous block before the loaded range and prepends
    /// it. Requires bidirectional infinite scroll and an applied search;
    /// a no-op at offset zero or while a backward fetch is in flight.
    /// The block below the page size boundary is shortened so blocks
    /// never overlap.
    pub async fn load_previous(&self) {
        let Some(scroll) = &self.shell.scroll else {
            tracing::debug!("load_previous ignored: infinite scroll is not enabled");
            return;
        };
        if !scroll.bidirectional {
            tracing::debug!("load_previous ignored: backward loading is not enabled");
            return;
        }
        let wire;
        let epoch;
        let new_low;
        {
            let mut state = self.shell.state.borrow_mut();
            if state.loading_previous {
                return;
            }
            if !state.started {
                tracing::debug!("load_previous ignored: no search has applied yet");
                return;
            }
            if state.low == 0 {
                tracing::debug!("load_previous ignored: already at the start");
                return;
            }
            state.loading_previous = true;
            epoch = state.epoch;
            new_low = state.low.saturating_sub(state.filters.limit());
            let mut block_filters = state.filters.clone();
            block_filters.set_offset(new_low);
            block_filters.set_limit(state.low - new_low);
            wire = block_filters;
        }
        self.shell.watcher.notify();

        match self.fetch_block(wire).await {
            Ok(block) => {
                let stale;
                {
                    let mut state = self.shell.state.borrow_mut();
                    state.loading_previous = false;
                    stale = state.epoch != epoch;
                    if !stale {
                        state.count = block.count;
                        state.low = new_low;
                        let mut merged = block.results;
                        merged.append(&mut state.results);
                        state.results = merged;
                        state.error = None;
                        state.started = true;
                    }
                }
                self.shell.watcher.notify();
                if stale {
                    tracing::debug!("discarding prepended block: accumulation was reset");
                }
            }
            Err(error) => self.finish_block_error(epoch, false, error),
        }
    }

    async fn run_search(&self) {
        let shell = &self.shell;
        let generation;
        {
            let mut state = shell.state.borrow_mut();
            state.searching += 1;
            state.generation += 1;
            generation = state.generation;
        }
        shell.watcher.notify();

        if let Some(before) = &shell.on_before_search {
            let filters = shell.state.borrow().filters.clone();
            if let Err(error) = before(&filters).await {
                self.finish_primary_error(generation, error);
                return;
            }
        }

        let mut wire = shell.state.borrow().filters.clone();
        if let Some(transform) = &shell.transform_filters {
            match transform(wire) {
                Ok(transformed) => wire = transformed,
                Err(error) => {
                    self.finish_primary_error(generation, error);
                    return;
                }
            }
        }

        let set = match (shell.search)(&wire).await {
            Ok(set) => set,
            Err(error) => {
                self.finish_primary_error(generation, error);
                return;
            }
        };
        let set = match &shell.transform_results {
            Some(transform) => match transform(set) {
                Ok(set) => set,
                Err(error) => {
                    self.finish_primary_error(generation, error);
                    return;
                }
            },
            None => set,
        };

        let stale;
        {
            let mut state = shell.state.borrow_mut();
            state.searching -= 1;
            stale = state.generation != generation;
            if !stale {
                state.results = set.results.clone();
                state.count = set.count;
                state.error = None;
                state.started = true;
                // Replacing the page resets any scroll accumulation.
                state.epoch += 1;
                let offset = state.filters.offset();
                state.low = offset;
                state.high = offset + set.results.len() as u64;
            }
        }
        shell.watcher.notify();
        if stale {
            tracing::debug!("discarding results of superseded search");
            return;
        }

        if let Some(after) = &shell.on_after_search {
            if let Err(error) = after(&set).await {
                let current;
                {
                    let mut state = shell.state.borrow_mut();
                    current = state.generation == generation;
                    if current {
                        state.error = Some(error.clone());
                    }
                }
                if current {
                    shell.watcher.notify();
                    if let Some(on_error) = &shell.on_error {
                        on_error(&error);
                    }
                }
                return;
            }
        }

        if let Some(on_started) = &shell.on_started {
            if let Err(error) = on_started(&set) {
                tracing::warn!("on_started callback failed: {}", error);
            }
        }
    }

    // Wire pipeline shared by primary searches and block fetches; the
    // main-search lifecycle hooks are not part of it.
    async fn fetch_block(&self, wire: Filters) -> Result<ResultSet<T>, FetchError> {
        let mut wire = wire;
        if let Some(transform) = &self.shell.transform_filters {
            wire = transform(wire)?;
        }
        let set = (self.shell.search)(&wire).await?;
        match &self.shell.transform_results {
            Some(transform) => transform(set),
            None => Ok(set),
        }
    }

    fn finish_primary_error(&self, generation: u64, error: FetchError) {
        let stale;
        {
            let mut state = self.shell.state.borrow_mut();
            state.searching -= 1;
            stale = state.generation != generation;
            if !stale {
                state.error = Some(error.clone());
            }
        }
        self.shell.watcher.notify();
        if stale {
            tracing::debug!("discarding error of superseded search: {}", error);
            return;
        }
        if let Some(on_error) = &self.shell.on_error {
            on_error(&error);
        }
    }

    fn finish_block_error(&self, epoch: u64, forward: bool, error: FetchError) {
        let stale;
        {
            let mut state = self.shell.state.borrow_mut();
            if forward {
                state.loading_more = false;
            } else {
                state.loading_previous = false;
            }
            stale = state.epoch != epoch;
            if !stale {
                state.error = Some(error.clone());
            }
        }
        self.shell.watcher.notify();
        if stale {
            tracing::debug!("discarding error of superseded block fetch: {}", error);
            return;
        }
        if let Some(on_error) = &self.shell.on_error {
            on_error(&error);
        }
    }
}
