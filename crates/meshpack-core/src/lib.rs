//! meshpack Core Library
//!
//! This crate provides the in-memory scene model handed to the serializer,
//! the typed identifiers entities use to reference each other, and the
//! error type shared by the meshpack crates.

pub mod error;
pub mod scene;
pub mod types;

pub use error::{Error, Result, ResultExt};
pub use scene::*;
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result, ResultExt};
    pub use crate::scene::*;
    pub use crate::types::*;
}
