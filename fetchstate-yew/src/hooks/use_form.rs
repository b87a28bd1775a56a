use serde_json::Value;
use yew::prelude::*;

use fetchstate::form::{FormConfig, FormManager};
use fetchstate::{FetchError, Object};

/// Form state and actions returned by [`use_form`].
pub struct FormHookReturn<I: Clone + 'static> {
    pub id: Option<I>,
    /// The current working copy of the form data.
    pub data: Object,
    /// The last loaded or explicitly set snapshot, if any.
    pub original_data: Option<Object>,
    pub is_editing: bool,
    pub is_creating: bool,
    /// Structural inequality between the data and its snapshot.
    pub is_dirty: bool,
    /// True once any change event fired since the last snapshot.
    pub is_touched: bool,
    pub is_loading: bool,
    pub is_saving: bool,
    pub error: Option<FetchError>,
    /// Shallow-merges a patch into the current data.
    pub update_data: Callback<Object>,
    /// Sets one field of the current data.
    pub set_field: Callback<(String, Value)>,
    /// Replaces both the data and the snapshot.
    pub set_data: Callback<Object>,
    /// Discards edits, restoring the snapshot.
    pub reset_data: Callback<()>,
    /// Re-runs the load, e.g. after a failed initial fetch.
    pub reload: Callback<()>,
    /// Persists the current data through the save resolver.
    pub submit: Callback<()>,
}

impl<I: Clone> FormHookReturn<I> {
    /// True while the record is being loaded for the first time.
    pub fn is_initial_loading(&self) -> bool {
        self.is_loading && self.original_data.is_none() && self.error.is_none()
    }

    /// One field of the current data.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// Manages a record being edited or created and re-renders the component
/// as its state changes.
///
/// The config closure runs once, on first render. With an id the hook
/// loads the record on mount through the get resolver; without one the
/// form starts from the configured initial data.
///
/// # Example
///
/// ```
/// use fetchstate::form::FormConfig;
/// use fetchstate_yew::hooks::use_form;
/// use serde_json::json;
/// use yew::prelude::*;
///
/// #[function_component]
/// fn ProfileForm() -> Html {
///     let form = use_form(|| {
///         FormConfig::<u32>::new().initial_data(
///             json!({"name": "", "city": ""})
///                 .as_object()
///                 .cloned()
///                 .unwrap_or_default(),
///         )
///     });
///
///     let rename = {
///         let set_field = form.set_field.clone();
///         Callback::from(move |_: MouseEvent| {
///             set_field.emit(("name".to_string(), json!("Maria")));
///         })
///     };
///     let on_save = {
///         let submit = form.submit.clone();
///         Callback::from(move |_: MouseEvent| submit.emit(()))
///     };
///
///     html! {
///         <div>
///             <p>{ format!("{:?}", form.field("name")) }</p>
///             <button onclick={rename}>{"Rename"}</button>
///             <button onclick={on_save} disabled={!form.is_dirty}>
///                 {"Save"}
///             </button>
///         </div>
///     }
/// }
/// ```
#[hook]
pub fn use_form<I, F>(init: F) -> FormHookReturn<I>
where
    I: Clone + 'static,
    F: FnOnce() -> FormConfig<I>,
{
    let form = use_state(|| FormManager::new(init()));
    let form = (*form).clone();
    let tick = use_state(|| ());

    // Subscribe for re-renders, then load the record on mount (a no-op in
    // creating mode).
    {
        let form = form.clone();
        use_effect_with((), move |_| {
            form.set_on_change(move || tick.set(()));
            let on_mount = form.clone();
            yew::platform::spawn_local(async move {
                on_mount.load().await;
            });
            move || form.clear_on_change()
        });
    }

    let update_data = {
        let form = form.clone();
        Callback::from(move |patch: Object| form.update_data(patch))
    };

    let set_field = {
        let form = form.clone();
        Callback::from(move |(name, value): (String, Value)| {
            form.set_field(name, value);
        })
    };

    let set_data = {
        let form = form.clone();
        Callback::from(move |data: Object| form.set_data(data))
    };

    let reset_data = {
        let form = form.clone();
        Callback::from(move |_: ()| form.reset_data())
    };

    let reload = {
        let form = form.clone();
        Callback::from(move |_: ()| {
            let form = form.clone();
            yew::platform::spawn_local(async move {
                form.load().await;
            });
        })
    };

    let submit = {
        let form = form.clone();
        Callback::from(move |_: ()| {
            let form = form.clone();
            yew::platform::spawn_local(async move {
                form.submit().await;
            });
        })
    };

    FormHookReturn {
        id: form.id().cloned(),
        data: form.data(),
        original_data: form.original_data(),
        is_editing: form.is_editing(),
        is_creating: form.is_creating(),
        is_dirty: form.is_dirty(),
        is_touched: form.is_touched(),
        is_loading: form.is_loading(),
        is_saving: form.is_saving(),
        error: form.error(),
        update_data,
        set_field,
        set_data,
        reset_data,
        reload,
        submit,
    }
}
