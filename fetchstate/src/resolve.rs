use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{Shared, join_all};

use crate::error::FetchError;
use crate::{TaskFn, TaskFuture, TaskState, Watcher};

/// Successfully produced values, keyed by resolver name.
pub type ResolvedValues<V> = HashMap<String, V>;

/// Errors from failed resolvers, keyed by resolver name.
pub type ResolverErrors = HashMap<String, FetchError>;

/// A named producer of one asynchronous value.
///
/// Three forms are accepted: a re-invocable async task, a synchronous
/// function, and an already-running future. The first two are re-executed
/// on every run; the third settles once and replays its outcome on later
/// runs instead of restarting the work.
pub struct Resolver<V: Clone + 'static> {
    producer: Producer<V>,
}

enum Producer<V: Clone + 'static> {
    Task(TaskFn<V>),
    Sync(Box<dyn Fn() -> Result<V, FetchError>>),
    Once(Shared<TaskFuture<V>>),
}

impl<V: Clone + 'static> Resolver<V> {
    /// Resolver backed by a zero-argument async producer.
    pub fn task<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: Future<Output = Result<V, FetchError>> + 'static,
    {
        Self {
            producer: Producer::Task(Box::new(move || producer().boxed_local())),
        }
    }

    /// Resolver backed by a synchronous producer.
    pub fn from_fn<F>(producer: F) -> Self
    where
        F: Fn() -> Result<V, FetchError> + 'static,
    {
        Self {
            producer: Producer::Sync(Box::new(producer)),
        }
    }

    /// Resolver backed by a future that may already be in flight.
    /// Re-execution re-yields the settled outcome rather than restarting.
    pub fn once<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<V, FetchError>> + 'static,
    {
        Self {
            producer: Producer::Once(future.boxed_local().shared()),
        }
    }

    fn invoke(&self) -> TaskFuture<V> {
        match &self.producer {
            Producer::Task(producer) => producer(),
            Producer::Sync(producer) => {
                futures::future::ready(producer()).boxed_local()
            }
            Producer::Once(shared) => shared.clone().boxed_local(),
        }
    }
}

/// Named resolvers in declaration order, plus completion callbacks.
///
/// Declaration order matters: when several resolvers fail in one run, the
/// aggregate error is the first failure in declaration order, regardless
/// of which future settled first.
pub struct ResolverConfig<V: Clone + 'static> {
    resolvers: Vec<(String, Resolver<V>)>,
    on_started: Option<Box<dyn Fn(&ResolvedValues<V>)>>,
    on_error: Option<Box<dyn Fn(&ResolverErrors)>>,
}

impl<V: Clone + 'static> ResolverConfig<V> {
    pub fn new() -> Self {
        Self {
            resolvers: Vec::new(),
            on_started: None,
            on_error: None,
        }
    }

    /// Declares a named resolver. A duplicate name replaces the earlier
    /// declaration in place.
    pub fn resolver(mut self, name: impl Into<String>, resolver: Resolver<V>) -> Self {
        let name = name.into();
        match self.resolvers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => {
                tracing::warn!("duplicate resolver '{}' replaces earlier declaration", name);
                entry.1 = resolver;
            }
            None => self.resolvers.push((name, resolver)),
        }
        self
    }

    /// Called with all produced values once every resolver has settled
    /// successfully.
    pub fn on_started<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ResolvedValues<V>) + 'static,
    {
        self.on_started = Some(Box::new(callback));
        self
    }

    /// Called with the per-resolver errors when a run settles with at
    /// least one failure.
    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ResolverErrors) + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl<V: Clone + 'static> Default for ResolverConfig<V> {
    fn default() -> Self {
        Self::new()
    }
}

struct AggregateState<V> {
    outcomes: Vec<TaskState<V>>,
    in_flight: u32,
    started: bool,
    error: Option<FetchError>,
}

struct Shell<V: Clone + 'static> {
    tasks: Vec<(String, Resolver<V>)>,
    state: RefCell<AggregateState<V>>,
    on_started: Option<Box<dyn Fn(&ResolvedValues<V>)>>,
    on_error: Option<Box<dyn Fn(&ResolverErrors)>>,
    watcher: Watcher,
}

/// Runs a set of named resolvers concurrently and tracks each outcome.
///
/// A run has all-settled semantics: one failing resolver never cancels
/// the others, and every task records its own success or error. The
/// aggregate `error` is the first failure in declaration order; it is
/// cleared once a later run (or a single-task [`execute`](Self::execute))
/// settles everything successfully.
///
/// Handles are cheap to clone and share state.
///
/// # Example
///
/// ```
/// use fetchstate::resolve::{Resolver, ResolverConfig, ResolverSet};
///
/// let config = ResolverConfig::new()
///     .resolver("motd", Resolver::from_fn(|| Ok("hello".to_string())))
///     .resolver("answer", Resolver::task(|| async { Ok("42".to_string()) }));
/// let resolvers = ResolverSet::new(config);
///
/// futures::executor::block_on(resolvers.run());
/// assert_eq!(resolvers.value("motd").as_deref(), Some("hello"));
/// assert!(resolvers.has_started());
/// ```
pub struct ResolverSet<V: Clone + 'static> {
    shell: Rc<Shell<V>>,
}

impl<V: Clone + 'static> Clone for ResolverSet<V> {
    fn clone(&self) -> Self {
        Self {
            shell: Rc::clone(&self.shell),
        }
    }
}

impl<V: Clone + 'static> ResolverSet<V> {
    pub fn new(config: ResolverConfig<V>) -> Self {
        let outcomes = config.resolvers.iter().map(|_| TaskState::Pending).collect();
        Self {
            shell: Rc::new(Shell {
                tasks: config.resolvers,
                state: RefCell::new(AggregateState {
                    outcomes,
                    in_flight: 0,
                    started: false,
                    error: None,
                }),
                on_started: config.on_started,
                on_error: config.on_error,
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

    /// Resolver names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.shell.tasks.iter().map(|(name, _)| name.clone()).collect()
    }

    /// The settle state of one resolver, or `None` for an unknown name.
    pub fn state(&self, name: &str) -> Option<TaskState<V>> {
        let index = self.index_of(name)?;
        Some(self.shell.state.borrow().outcomes[index].clone())
    }

    /// The produced value of one resolver, if it settled successfully.
    pub fn value(&self, name: &str) -> Option<V> {
        let index = self.index_of(name)?;
        self.shell.state.borrow().outcomes[index].value().cloned()
    }

    /// All successfully produced values, keyed by name.
    pub fn values(&self) -> ResolvedValues<V> {
        let state = self.shell.state.borrow();
        self.collect_values(&state.outcomes)
    }

    /// All resolver errors, keyed by name.
    pub fn errors(&self) -> ResolverErrors {
        let state = self.shell.state.borrow();
        self.collect_errors(&state.outcomes)
    }

    /// True while any run or single-task execution is in flight.
    pub fn is_loading(&self) -> bool {
        self.shell.state.borrow().in_flight > 0
    }

    /// True once every resolver has settled successfully at least once.
    /// Stays true across later partial failures; a clearing reload resets
    /// it.
    pub fn has_started(&self) -> bool {
        self.shell.state.borrow().started
    }

    /// The first failure in declaration order, if any task is currently
    /// settled with an error.
    pub fn error(&self) -> Option<FetchError> {
        self.shell.state.borrow().error.clone()
    }

    /// Runs every resolver concurrently and waits for all to settle.
    /// With nothing declared the barrier completes immediately as a
    /// success.
    pub async fn run(&self) {
        let indices: Vec<usize> = (0..self.shell.tasks.len()).collect();
        self.execute_indices(indices).await;
    }

    /// Re-runs a single resolver by name, leaving the other outcomes in
    /// place. An unknown name logs and does nothing.
    pub async fn execute(&self, name: &str) {
        match self.index_of(name) {
            Some(index) => self.execute_indices(vec![index]).await,
            None => {
                tracing::warn!("execute called with unknown resolver '{}'", name);
            }
        }
    }

    /// Runs every resolver again. With `clear_previous`, prior outcomes
    /// are dropped first so the UI falls back to its initial-loading
    /// rendering; otherwise stale values stay visible until replaced.
    pub async fn reload(&self, clear_previous: bool) {
        if clear_previous {
            {
                let mut state = self.shell.state.borrow_mut();
                for outcome in &mut state.outcomes {
                    *outcome = TaskState::Pending;
                }
                state.error = None;
                state.started = false;
            }
            self.shell.watcher.notify();
        }
        self.run().await;
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.shell.tasks.iter().position(|(n, _)| n == name)
    }

    fn collect_values(&self, outcomes: &[TaskState<V>]) -> ResolvedValues<V> {
        self.shell
            .tasks
            .iter()
            .zip(outcomes)
            .filter_map(|((name, _), outcome)| {
                outcome.value().map(|value| (name.clone(), value.clone()))
            })
            .collect()
    }

    fn collect_errors(&self, outcomes: &[TaskState<V>]) -> ResolverErrors {
        self.shell
            .tasks
            .iter()
            .zip(outcomes)
            .filter_map(|((name, _), outcome)| {
                outcome.error().map(|error| (name.clone(), error.clone()))
            })
            .collect()
    }

    async fn execute_indices(&self, indices: Vec<usize>) {
        {
            let mut state = self.shell.state.borrow_mut();
            state.in_flight += 1;
        }
        self.shell.watcher.notify();

        // Producers live outside the state cell, so building the futures
        // holds no borrow.
        let tasks: Vec<TaskFuture<V>> = indices
            .iter()
            .map(|&index| self.shell.tasks[index].1.invoke())
            .collect();
        let settled = join_all(tasks).await;

        let values;
        let errors;
        let all_resolved;
        {
            let mut state = self.shell.state.borrow_mut();
            for (&index, outcome) in indices.iter().zip(settled) {
                state.outcomes[index] = TaskState::Settled(outcome);
            }
            state.in_flight -= 1;
            // The aggregate error is derived from the outcomes, so a
            // successful re-execution of the failed task clears it.
            state.error = state
                .outcomes
                .iter()
                .find_map(|outcome| outcome.error())
                .cloned();
            all_resolved = state
                .outcomes
                .iter()
                .all(|outcome| outcome.value().is_some());
            if all_resolved {
                state.started = true;
            }
            values = self.collect_values(&state.outcomes);
            errors = self.collect_errors(&state.outcomes);
        }
        self.shell.watcher.notify();

        if !errors.is_empty() {
            if let Some(on_error) = &self.shell.on_error {
                on_error(&errors);
            }
        } else if all_resolved {
            if let Some(on_started) = &self.shell.on_started {
                on_started(&values);
            }
        }
    }
}
