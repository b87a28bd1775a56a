use yew::prelude::*;

use fetchstate::FetchError;
use fetchstate::resolve::{ResolvedValues, ResolverConfig, ResolverErrors, ResolverSet};

/// Resolver state and actions returned by [`use_resolvers`].
pub struct ResolversHookReturn<V: Clone + 'static> {
    /// Successfully produced values, keyed by resolver name.
    pub values: ResolvedValues<V>,
    /// Errors of failed resolvers, keyed by resolver name.
    pub errors: ResolverErrors,
    pub is_loading: bool,
    /// True once every resolver has settled successfully at least once.
    pub has_started: bool,
    /// The first failure in declaration order, if any.
    pub error: Option<FetchError>,
    /// Re-runs every resolver.
    pub refetch: Callback<()>,
    /// Re-runs a single resolver by name.
    pub execute: Callback<String>,
    /// Re-runs every resolver; `true` drops previous outcomes first.
    pub reload: Callback<bool>,
}

impl<V: Clone> ResolversHookReturn<V> {
    /// True during the first run, before anything resolved and before any
    /// failure.
    pub fn is_initial_loading(&self) -> bool {
        self.is_loading && !self.has_started && self.error.is_none()
    }

    /// The produced value of one resolver, if it settled successfully.
    pub fn value(&self, name: &str) -> Option<&V> {
        self.values.get(name)
    }
}

/// Runs a set of named resolvers on mount and re-renders as their
/// outcomes settle.
///
/// The config closure runs once, on first render. One failing resolver
/// never discards the values of the others; `execute` retries a single
/// resolver, and a successful retry also clears the aggregate error.
///
/// # Example
///
/// ```
/// use fetchstate::resolve::{Resolver, ResolverConfig};
/// use fetchstate_yew::hooks::use_resolvers;
/// use yew::prelude::*;
///
/// #[function_component]
/// fn Dashboard() -> Html {
///     let resolvers = use_resolvers(|| {
///         ResolverConfig::new()
///             .resolver("motd", Resolver::task(|| async {
///                 Ok("welcome back".to_string())
///             }))
///     });
///
///     if resolvers.is_initial_loading() {
///         return html! { <p>{"Loading..."}</p> };
///     }
///     html! {
///         <p>{ resolvers.value("motd").cloned().unwrap_or_default() }</p>
///     }
/// }
/// ```
#[hook]
pub fn use_resolvers<V, F>(init: F) -> ResolversHookReturn<V>
where
    V: Clone + 'static,
    F: FnOnce() -> ResolverConfig<V>,
{
    let resolvers = use_state(|| ResolverSet::new(init()));
    let resolvers = (*resolvers).clone();
    let tick = use_state(|| ());

    // Subscribe for re-renders, then run every resolver on mount.
    {
        let resolvers = resolvers.clone();
        use_effect_with((), move |_| {
            resolvers.set_on_change(move || tick.set(()));
            let on_mount = resolvers.clone();
            yew::platform::spawn_local(async move {
                on_mount.run().await;
            });
            move || resolvers.clear_on_change()
        });
    }

    let refetch = {
        let resolvers = resolvers.clone();
        Callback::from(move |_: ()| {
            let resolvers = resolvers.clone();
            yew::platform::spawn_local(async move {
                resolvers.run().await;
            });
        })
    };

    let execute = {
        let resolvers = resolvers.clone();
        Callback::from(move |name: String| {
            let resolvers = resolvers.clone();
            yew::platform::spawn_local(async move {
                resolvers.execute(&name).await;
            });
        })
    };

    let reload = {
        let resolvers = resolvers.clone();
        Callback::from(move |clear_previous: bool| {
            let resolvers = resolvers.clone();
            yew::platform::spawn_local(async move {
                resolvers.reload(clear_previous).await;
            });
        })
    };

    ResolversHookReturn {
        values: resolvers.values(),
        errors: resolvers.errors(),
        is_loading: resolvers.is_loading(),
        has_started: resolvers.has_started(),
        error: resolvers.error(),
        refetch,
        execute,
        reload,
    }
}
