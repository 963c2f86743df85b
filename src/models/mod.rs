//! Data models for envelopes, topics, and broadcast deliveries.

pub mod delivery;
pub mod envelope;
pub mod topic;

pub use delivery::*;
pub use envelope::*;
pub use topic::*;
