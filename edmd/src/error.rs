//! Error types, grouped by recovery policy.

use thiserror::Error;

/// Errors surfaced by the engine. Configuration and capacity problems
/// abort before the run starts; invariant violations abort mid-run
/// unless the simulation was built with `tolerate_invariants`.
#[derive(Debug, Error)]
pub enum Error {
    /// A problem in the configuration document: unknown element names,
    /// missing properties, incompatible units. Never recoverable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The requested geometry cannot be honoured, e.g. the primary image
    /// is too small to fit three cells per dimension at the largest
    /// interaction distance.
    #[error("capacity error: {0}")]
    Capacity(String),

    /// A runtime invariant failed: an overlap beyond tolerance, a capture
    /// map disagreeing with the geometry, a negative event time without a
    /// simultaneous partner.
    #[error("invariant violation at t={time}, event {event_count}: {message}")]
    Invariant {
        /// System time when the violation was detected.
        time: f64,
        /// Events executed so far.
        event_count: u64,
        /// Description with full context.
        message: String,
    },

    /// Serialization of a snapshot or output document failed.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// An I/O failure while reading or writing documents.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
