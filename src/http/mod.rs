//! HTTP API module for quakeswarm
//!
//! Provides REST endpoints for:
//! - Swarm, cluster and summary lookups against the live view
//! - Triggering a rebuild from the configured catalog

pub mod server;

pub use server::{
    create_server, start_server, ApiError, AppState, ErrorResponse, NearQuery, SuccessResponse,
    SwarmDetailResponse,
};
