pub mod policy;
pub mod synthetic;

pub use policy::{build_directives, RedactionDirective, RedactionMethod};
