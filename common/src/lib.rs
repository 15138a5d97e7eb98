//! fxquery Common Types
//!
//! This crate contains the value types shared by the rate engine and its frontends:
//! currency codes, calendar dates for historical lookups, cache keys and rate snapshots.

pub mod monetary;
pub mod snapshot;
pub mod error;
pub mod time;

pub use monetary::*;
pub use snapshot::*;
pub use error::*;
pub use time::*;
