//! # ms-freshness
//!
//! Keeps the freshness stamps consistent between the bot process (push) and
//! the log store (periodic pull).

pub mod clock;
pub mod reconcile;
pub mod registry;

pub use clock::{Clock, SystemClock};
pub use reconcile::{Channel, Reconciler};
pub use registry::{ExpiryPolicy, FreshnessRegistry, FreshnessSnapshot};
