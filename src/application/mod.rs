//! Application layer: services and use cases
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod digest;
pub mod error;
pub mod error_ext;
pub mod preview;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
pub use preview::{build_preview, PreviewOptions};
