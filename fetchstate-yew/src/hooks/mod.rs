pub mod use_form;
pub mod use_resolvers;
pub mod use_search;

pub use use_form::use_form;
pub use use_resolvers::use_resolvers;
pub use use_search::use_search;
