//! Mirror configuration model and validation rules.

mod error;
mod mirror;
mod source;

pub use error::{ConfigError, ValidationError};
pub use mirror::MirrorOptions;
pub use source::MirrorSource;
