//! Framework-agnostic state managers for UI data fetching: a named-task
//! aggregator ([`ResolverSet`]), an edit/create form manager
//! ([`FormManager`]), and a search manager with offset/limit pagination
//! and infinite scroll ([`SearchManager`]).
//!
//! Managers are cheap-to-clone handles over shared state. They are
//! single-threaded by design (futures are not required to be `Send`);
//! UI adapters subscribe to changes through [`ResolverSet::set_on_change`]
//! and friends, and re-read the handle's accessors on each notification.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

pub mod error;
pub mod filters;
pub mod form;
pub mod resolve;
pub mod search;

pub use error::FetchError;
pub use filters::{Filters, PaginationOptions, PaginationView, ResultSet};
pub use form::{FormConfig, FormManager, FormResolvers};
pub use resolve::{Resolver, ResolverConfig, ResolverSet};
pub use search::{InfiniteScrollOptions, SearchConfig, SearchManager};

/// An open-shaped record: form data, filter criteria, merge patches.
pub type Object = serde_json::Map<String, serde_json::Value>;

/// Future produced by a caller-supplied task. Boxed and non-`Send`, since
/// UI-facing futures routinely capture `Rc` state.
pub type TaskFuture<T> = LocalBoxFuture<'static, Result<T, FetchError>>;

/// A re-invocable asynchronous producer.
pub type TaskFn<T> = Box<dyn Fn() -> TaskFuture<T>>;

/// Settle state of a single named task.
///
/// A task that has not run yet (or was cleared by a reload) is
/// [`Pending`](TaskState::Pending); once its future completes it becomes
/// [`Settled`](TaskState::Settled) with either the produced value or the
/// error. A failed task stays settled so the UI can render the per-task
/// error next to the tasks that succeeded.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TaskState<V> {
    #[default]
    Pending,
    Settled(Result<V, FetchError>),
}

impl<V> TaskState<V> {
    pub fn is_settled(&self) -> bool {
        matches!(self, TaskState::Settled(_))
    }

    /// The produced value, if the task settled successfully.
    pub fn value(&self) -> Option<&V> {
        match self {
            TaskState::Settled(Ok(value)) => Some(value),
            _ => None,
        }
    }

    /// The task's error, if it settled with one.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            TaskState::Settled(Err(error)) => Some(error),
            _ => None,
        }
    }
}

/// Single-subscriber change notification. The UI adapter registers a
/// re-render trigger; manager internals call [`Watcher::notify`] after
/// every state mutation, always with no interior borrows held.
pub(crate) struct Watcher {
    slot: RefCell<Option<Rc<dyn Fn()>>>,
}

impl Watcher {
    pub(crate) fn new() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }

    pub(crate) fn set(&self, f: Rc<dyn Fn()>) {
        *self.slot.borrow_mut() = Some(f);
    }

    pub(crate) fn clear(&self) {
        *self.slot.borrow_mut() = None;
    }

    pub(crate) fn notify(&self) {
        let subscriber = self.slot.borrow().clone();
        if let Some(subscriber) = subscriber {
            subscriber();
        }
    }
}
