//! Domain layer: schema, validation, expansion, naming and navigation
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod database;
pub mod enumerate;
pub mod error;
pub mod expansion;
pub mod legacy;
pub mod navigation;
pub mod path;
pub mod schema;
pub mod template;
pub mod tree;
pub mod validator;

pub use database::{load, Database, Diagnostic};
pub use enumerate::{Channel, Channels};
pub use error::{DocumentFormat, RenderContractViolation, SchemaError, Violation, ViolationKind};
pub use expansion::Expansion;
pub use navigation::{Choices, NavigationInvalid, Resolution};
pub use path::{PathStep, ResolvedPath, Selection};
pub use schema::{Level, LevelKind, Schema};
pub use template::NamingTemplate;
pub use tree::{Branch, Node};
pub use validator::{validate, ValidatedSchema};
