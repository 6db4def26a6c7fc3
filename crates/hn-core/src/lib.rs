//! hn-core/src/lib.rs
//!
//! Record model, legacy parser and query interface of the HyperNews archive.

pub mod address;
pub mod cache;
pub mod convert;
pub mod enums;
pub mod error;
pub mod fields;
pub mod layout;
pub mod models;
pub mod parser;
pub mod traits;

// Re-exporting for easier access in other crates
pub use address::*;
pub use cache::*;
pub use enums::*;
pub use error::*;
pub use layout::*;
pub use models::*;
pub use traits::*;
