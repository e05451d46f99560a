//! Shared value types for the worldspace engine.

mod types;

pub use types::{EntityId, Location, Owner, ParseLocationError, Ticks};
