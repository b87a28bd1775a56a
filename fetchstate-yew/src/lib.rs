//! Yew bindings for the `fetchstate` managers.
//!
//! Each hook builds its manager once, on first render, fetches on mount,
//! and re-renders the component whenever the manager's state changes. The
//! hook return value is a plain struct of state snapshots plus
//! `Callback` actions, so components stay free of async plumbing.

pub mod hooks;

pub use hooks::use_form::{FormHookReturn, use_form};
pub use hooks::use_resolvers::{ResolversHookReturn, use_resolvers};
pub use hooks::use_search::{SearchHookReturn, use_search};
