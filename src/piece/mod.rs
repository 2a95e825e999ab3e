//! Piece Loader — 4-layer lookup (package-local → project → user →
//! builtin), YAML parsing, facet inlining, graph validation.

mod error;
mod loader;
mod validate;

pub use error::{PieceResolutionError, PieceValidationError};
pub use loader::PieceLoader;
pub use validate::validate_piece;
