//! Facet Loader & Template — persona/policy/knowledge/instruction/
//! report-format resolution and instruction-template substitution.

mod loader;
mod template;

pub use loader::{FacetError, FacetKind, FacetLoader};
pub use template::{TemplateContext, render};
