use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use serde_json::Value;

use crate::error::FetchError;
use crate::{Object, TaskFuture, Watcher};

/// Loads the record being edited, given its id.
pub type GetResolver<I> = Box<dyn Fn(&I) -> TaskFuture<Object>>;

/// Persists the form. Receives the id (`None` when creating) and the
/// current data, and may return a server-produced snapshot that replaces
/// the local one.
pub type SaveResolver<I> = Box<dyn Fn(Option<&I>, &Object) -> TaskFuture<Option<Object>>>;

/// Post-load adjustment applied before data reaches the form.
pub type TransformData = Box<dyn Fn(Object) -> Result<Object, FetchError>>;

/// Caller-supplied persistence hooks for a form.
pub struct FormResolvers<I> {
    get: Option<GetResolver<I>>,
    save: Option<SaveResolver<I>>,
}

impl<I> FormResolvers<I> {
    pub fn new() -> Self {
        Self {
            get: None,
            save: None,
        }
    }

    pub fn with_get<F, Fut>(mut self, get: F) -> Self
    where
        F: Fn(&I) -> Fut + 'static,
        Fut: Future<Output = Result<Object, FetchError>> + 'static,
    {
        self.get = Some(Box::new(move |id| get(id).boxed_local()));
        self
    }

    pub fn with_save<F, Fut>(mut self, save: F) -> Self
    where
        F: Fn(Option<&I>, &Object) -> Fut + 'static,
        Fut: Future<Output = Result<Option<Object>, FetchError>> + 'static,
    {
        self.save = Some(Box::new(move |id, data| save(id, data).boxed_local()));
        self
    }
}

impl<I> Default for FormResolvers<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a [`FormManager`].
///
/// The presence of an id decides the mode: with one the form is *editing*
/// an existing record (loaded through the get resolver), without one it is
/// *creating* a new record seeded from `initial_data`.
pub struct FormConfig<I> {
    id: Option<I>,
    initial_data: Option<Object>,
    resolvers: FormResolvers<I>,
    transform_data: Option<TransformData>,
}

impl<I> FormConfig<I> {
    pub fn new() -> Self {
        Self {
            id: None,
            initial_data: None,
            resolvers: FormResolvers::new(),
            transform_data: None,
        }
    }

    pub fn id(mut self, id: I) -> Self {
        self.id = Some(id);
        self
    }

    /// Seed data for creating mode; also the reset target before any
    /// load or explicit snapshot.
    pub fn initial_data(mut self, data: Object) -> Self {
        self.initial_data = Some(data);
        self
    }

    pub fn resolvers(mut self, resolvers: FormResolvers<I>) -> Self {
        self.resolvers = resolvers;
        self
    }

    /// Adjusts loaded data before it becomes the form's snapshot, e.g.
    /// flattening nested records into form fields.
    pub fn transform_data<F>(mut self, transform: F) -> Self
    where
        F: Fn(Object) -> Result<Object, FetchError> + 'static,
    {
        self.transform_data = Some(Box::new(transform));
        self
    }
}

impl<I> Default for FormConfig<I> {
    fn default() -> Self {
        Self::new()
    }
}

struct FormState {
    current: Object,
    original: Option<Object>,
    touched: bool,
    loading: bool,
    saving: bool,
    error: Option<FetchError>,
}

struct Shell<I> {
    id: Option<I>,
    initial: Object,
    resolvers: FormResolvers<I>,
    transform: Option<TransformData>,
    state: RefCell<FormState>,
    watcher: Watcher,
}

/// Tracks a record being edited or created: the current (mutable) data,
/// the original snapshot it is compared against, and the load/save
/// lifecycle around both.
///
/// Dirty means the current data is structurally unequal to the snapshot;
/// touched means any change event fired since the snapshot, even one that
/// restored the previous value. Handles are cheap to clone and share
/// state.
///
/// # Example
///
/// ```
/// use fetchstate::form::{FormConfig, FormManager};
/// use serde_json::json;
///
/// let form: FormManager<u32> = FormManager::new(FormConfig::new());
/// assert!(form.is_creating());
///
/// form.set_field("name", json!("Ana"));
/// assert!(form.is_dirty());
/// assert!(form.is_touched());
///
/// form.reset_data();
/// assert!(!form.is_dirty());
/// ```
pub struct FormManager<I> {
    shell: Rc<Shell<I>>,
}

impl<I> Clone for FormManager<I> {
    fn clone(&self) -> Self {
        Self {
            shell: Rc::clone(&self.shell),
        }
    }
}

impl<I: 'static> FormManager<I> {
    pub fn new(config: FormConfig<I>) -> Self {
        let initial = config.initial_data.unwrap_or_default();
        Self {
            shell: Rc::new(Shell {
                id: config.id,
                initial: initial.clone(),
                resolvers: config.resolvers,
                transform: config.transform_data,
                state: RefCell::new(FormState {
                    current: initial,
                    original: None,
                    touched: false,
                    loading: false,
                    saving: false,
                    error: None,
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

    pub fn id(&self) -> Option<&I> {
        self.shell.id.as_ref()
    }

    /// True when an id was configured: the form edits an existing record.
    pub fn is_editing(&self) -> bool {
        self.shell.id.is_some()
    }

    /// True without an id: the form creates a new record.
    pub fn is_creating(&self) -> bool {
        self.shell.id.is_none()
    }

    /// The current working copy of the form data.
    pub fn data(&self) -> Object {
        self.shell.state.borrow().current.clone()
    }

    /// The last loaded or explicitly set snapshot, if any.
    pub fn original_data(&self) -> Option<Object> {
        self.shell.state.borrow().original.clone()
    }

    /// One field of the current data.
    pub fn field(&self, name: &str) -> Option<Value> {
        self.shell.state.borrow().current.get(name).cloned()
    }

    /// Structural inequality between the current data and its reference
    /// snapshot (the original if one exists, the initial data otherwise).
    pub fn is_dirty(&self) -> bool {
        let state = self.shell.state.borrow();
        match &state.original {
            Some(original) => state.current != *original,
            None => state.current != self.shell.initial,
        }
    }

    /// True once any change event fired since the last snapshot, even if
    /// the change restored the previous value.
    pub fn is_touched(&self) -> bool {
        self.shell.state.borrow().touched
    }

    pub fn is_loading(&self) -> bool {
        self.shell.state.borrow().loading
    }

    pub fn is_saving(&self) -> bool {
        self.shell.state.borrow().saving
    }

    pub fn error(&self) -> Option<FetchError> {
        self.shell.state.borrow().error.clone()
    }

    /// Shallow-merges a patch into the current data. Nested objects are
    /// replaced whole, not deep-merged.
    pub fn update_data(&self, patch: Object) {
        {
            let mut state = self.shell.state.borrow_mut();
            for (key, value) in patch {
                state.current.insert(key, value);
            }
            state.touched = true;
        }
        self.shell.watcher.notify();
    }

    /// Sets one field of the current data.
    pub fn set_field(&self, name: impl Into<String>, value: Value) {
        {
            let mut state = self.shell.state.borrow_mut();
            state.current.insert(name.into(), value);
            state.touched = true;
        }
        self.shell.watcher.notify();
    }

    /// Replaces both the current data and the original snapshot, making
    /// the form clean again.
    pub fn set_data(&self, data: Object) {
        {
            let mut state = self.shell.state.borrow_mut();
            state.original = Some(data.clone());
            state.current = data;
            state.touched = false;
        }
        self.shell.watcher.notify();
    }

    /// Discards edits, restoring the original snapshot (or the initial
    /// data when nothing was loaded yet).
    pub fn reset_data(&self) {
        {
            let mut state = self.shell.state.borrow_mut();
            state.current = match &state.original {
                Some(original) => original.clone(),
                None => self.shell.initial.clone(),
            };
            state.touched = false;
        }
        self.shell.watcher.notify();
    }

    /// Loads the record through the get resolver and installs it as both
    /// the current data and the original snapshot.
    ///
    /// Does nothing in creating mode or without a get resolver. A load
    /// (or transform) failure records the error and leaves the form data
    /// untouched; calling `load` again retries.
    pub async fn load(&self) {
        let Some(id) = &self.shell.id else {
            tracing::debug!("load skipped: form is in creating mode");
            return;
        };
        let Some(get) = &self.shell.resolvers.get else {
            tracing::debug!("load skipped: no get resolver configured");
            return;
        };

        {
            let mut state = self.shell.state.borrow_mut();
            state.loading = true;
            state.error = None;
        }
        self.shell.watcher.notify();

        // Transform runs outside the borrow; it is caller code.
        let outcome = get(id).await.and_then(|data| self.apply_transform(data));

        {
            let mut state = self.shell.state.borrow_mut();
            state.loading = false;
            match outcome {
                Ok(data) => {
                    state.current = data.clone();
                    state.original = Some(data);
                    state.touched = false;
                    state.error = None;
                }
                Err(error) => {
                    state.error = Some(error);
                }
            }
        }
        self.shell.watcher.notify();
    }

    /// Persists the current data through the save resolver.
    ///
    /// On success the form becomes clean: a server-returned snapshot
    /// replaces both copies, otherwise the current data is promoted to
    /// the new original. A failure records the error and keeps all edits.
    pub async fn submit(&self) {
        let Some(save) = &self.shell.resolvers.save else {
            tracing::debug!("submit skipped: no save resolver configured");
            return;
        };

        let data = {
            let mut state = self.shell.state.borrow_mut();
            state.saving = true;
            state.error = None;
            state.current.clone()
        };
        self.shell.watcher.notify();

        let outcome = save(self.shell.id.as_ref(), &data).await;

        {
            let mut state = self.shell.state.borrow_mut();
            state.saving = false;
            match outcome {
                Ok(Some(snapshot)) => {
                    state.current = snapshot.clone();
                    state.original = Some(snapshot);
                    state.touched = false;
                }
                Ok(None) => {
                    state.original = Some(state.current.clone());
                    state.touched = false;
                }
                Err(error) => {
                    state.error = Some(error);
                }
            }
        }
        self.shell.watcher.notify();
    }

    fn apply_transform(&self, data: Object) -> Result<Object, FetchError> {
        match &self.shell.transform {
            Some(transform) => transform(data),
            None => Ok(data),
        }
    }
}
