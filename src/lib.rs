//! Hierarchical channel naming engine.
//!
//! A channel database declares an ordered sequence of levels, a naming
//! template and a tree of choices. Loading it validates the whole document
//! once; afterwards every channel can be enumerated lazily, counted without
//! enumeration, and reached incrementally through navigation queries.
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let text = std::fs::read_to_string("channels.json")?;
//! let db = chnav::domain::Database::parse(&text)?;
//! for channel in db.enumerate_all().take(5) {
//!     println!("{}", channel.identifier);
//! }
//! # Ok(())
//! # }
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
