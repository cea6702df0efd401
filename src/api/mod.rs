//! Read API over materialized views and the holder of the live view.

pub mod query_engine;
pub mod service;

pub use query_engine::QueryEngine;
pub use service::{RebuildTicket, SwarmService};
