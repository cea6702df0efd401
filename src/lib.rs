//! # quakeswarm
//!
//! quakeswarm finds foreshock swarms in seismic event catalogs: bursts of
//! smaller shocks clustered in space and time that precede a large
//! earthquake. A catalog snapshot is clustered once into space-time connected
//! components, each component is matched against the mainshocks it may
//! anticipate, and the result is frozen into a materialized view that answers
//! swarm and membership queries without rescanning the catalog.
//!
//! ## Features
//!
//! - Grid spatial index with great-circle radius queries
//! - Causal sliding-window clustering over a union-find
//! - Deterministic mainshock association with single-claim semantics
//! - Atomically swapped, immutable views with busy rejection for rebuilds
//!
//! ## Example
//!
//! ```rust
//! use quakeswarm::catalog::CatalogStore;
//! use quakeswarm::config::SwarmConfig;
//! use quakeswarm::core::SeismicEvent;
//! use quakeswarm::view::rebuild;
//!
//! fn example() -> quakeswarm::Result<()> {
//!     let catalog = CatalogStore::from_events(vec![
//!         SeismicEvent::new("e1", 0, 40.0, 15.0, 8.0, 2.1),
//!         SeismicEvent::new("m1", 86_400_000, 40.0, 15.0, 10.0, 5.4),
//!     ]);
//!     let view = rebuild(&catalog, &SwarmConfig::default())?;
//!     println!("{} clusters", view.rebuild_summary().clusters_formed);
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::similar_names)]

/// Core data structures and geodesy helpers
pub mod core;

/// Time-sorted event catalog and ingestion of raw rows
pub mod catalog;

/// Build-time configuration
pub mod config;

/// Spatial grid index and trailing time-window scanning
pub mod indexing;

/// Space-time clustering
pub mod clustering;

/// Mainshock association
pub mod association;

/// Materialized swarm view and its persisted table
pub mod view;

/// Query engine and the live view holder
pub mod api;

/// HTTP read API
pub mod http;

/// Tracing subscriber setup shared by the binaries
pub mod logging;

pub mod error {
    //! Error types and result definitions

    use thiserror::Error;

    /// Result type alias for quakeswarm operations
    pub type Result<T> = std::result::Result<T, SwarmError>;

    /// Main error type for quakeswarm
    #[derive(Error, Debug)]
    pub enum SwarmError {
        /// Malformed or out-of-range input record
        #[error("Validation error for record '{record}': {reason}")]
        Validation { record: String, reason: String },

        /// Query references an id absent from the current view
        #[error("Not found: {0}")]
        NotFound(String),

        /// Malformed configuration; aborts a rebuild before clustering starts
        #[error("Configuration error: {0}")]
        Config(String),

        /// A rebuild is already in flight
        #[error("Busy: a rebuild is already in progress")]
        Busy,

        /// The rebuild was abandoned; the previous view stays live
        #[error("Rebuild cancelled")]
        Cancelled,

        /// Structurally unreadable input (bad header, unknown format)
        #[error("Parse error: {0}")]
        Parse(String),

        /// Persisted table could not be encoded or decoded
        #[error("Serialization error: {0}")]
        Serialization(String),

        /// IO error
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
    }

    impl From<serde_json::Error> for SwarmError {
        fn from(err: serde_json::Error) -> Self {
            SwarmError::Serialization(err.to_string())
        }
    }

    impl From<bincode::Error> for SwarmError {
        fn from(err: bincode::Error) -> Self {
            SwarmError::Serialization(err.to_string())
        }
    }
}

// Re-export commonly used types
pub use error::{Result, SwarmError};
