//! Shared types for featuremap

mod error;

pub use error::{MapError, Result};
