//! modstate/crates/ms-core/src/lib.rs
//!
//! Domain models, ports, the moderation command grammar and the state
//! reconstructors. No I/O lives here; adapters implement the ports.

pub mod command;
pub mod error;
pub mod models;
pub mod reconstruct;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;
