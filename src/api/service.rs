//! Live view holder.
//!
//! The service keeps the current [`MaterializedView`] behind an
//! `Arc<RwLock<Arc<_>>>`. Readers clone the inner `Arc` and query without
//! holding the lock. A rebuild builds a fresh view off to the side and swaps
//! it in only when it completes; a failed or cancelled rebuild leaves the old
//! view in place. Only one rebuild may be in flight: a second request gets
//! [`SwarmError::Busy`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{info, warn};

use super::QueryEngine;
use crate::catalog::CatalogStore;
use crate::config::SwarmConfig;
use crate::core::CancelToken;
use crate::error::{Result, SwarmError};
use crate::view::{rebuild_with_cancel, MaterializedView, RebuildSummary};

#[derive(Debug, Clone)]
pub struct SwarmService {
    live: Arc<RwLock<Arc<MaterializedView>>>,
    rebuilding: Arc<AtomicBool>,
}

impl Default for SwarmService {
    fn default() -> Self {
        Self::new()
    }
}

impl SwarmService {
    /// Service serving an empty view until the first rebuild.
    pub fn new() -> Self {
        Self::with_view(MaterializedView::empty())
    }

    pub fn with_view(view: MaterializedView) -> Self {
        Self { live: Arc::new(RwLock::new(Arc::new(view))), rebuilding: Arc::new(AtomicBool::new(false)) }
    }

    /// Current view snapshot.
    pub fn snapshot(&self) -> Arc<MaterializedView> {
        Arc::clone(&self.live.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Query engine pinned to the current snapshot.
    pub fn query(&self) -> QueryEngine {
        QueryEngine::new(self.snapshot())
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    /// Reserve the single rebuild slot.
    ///
    /// Fails with `Busy` while another ticket is alive. The slot is released
    /// when the ticket is dropped, whether or not it ran.
    pub fn begin_rebuild(&self) -> Result<RebuildTicket> {
        if self.rebuilding.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            warn!("Rejecting rebuild request: another rebuild is in progress");
            return Err(SwarmError::Busy);
        }
        Ok(RebuildTicket {
            live: Arc::clone(&self.live),
            rebuilding: Arc::clone(&self.rebuilding),
            cancel: CancelToken::new(),
        })
    }

    /// Rebuild from `catalog` and publish the result.
    pub fn rebuild(&self, catalog: &CatalogStore, config: &SwarmConfig) -> Result<RebuildSummary> {
        self.begin_rebuild()?.run(catalog, config)
    }
}

/// Exclusive right to run one rebuild.
#[derive(Debug)]
pub struct RebuildTicket {
    live: Arc<RwLock<Arc<MaterializedView>>>,
    rebuilding: Arc<AtomicBool>,
    cancel: CancelToken,
}

impl RebuildTicket {
    /// Token that abandons this rebuild when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Build a view and, if nothing failed, make it the live one.
    pub fn run(self, catalog: &CatalogStore, config: &SwarmConfig) -> Result<RebuildSummary> {
        let view = match rebuild_with_cancel(catalog, config, &self.cancel) {
            Ok(view) => view,
            Err(e) => {
                warn!("Rebuild failed, keeping the previous view: {}", e);
                return Err(e);
            }
        };
        let summary = view.rebuild_summary().clone();

        *self.live.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(view);
        info!("Published new view with {} swarms", summary.swarms_matched);
        Ok(summary)
    }
}

impl Drop for RebuildTicket {
    fn drop(&mut self) {
        self.rebuilding.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SeismicEvent;

    fn catalog() -> CatalogStore {
        CatalogStore::from_events(vec![
            SeismicEvent::new("e1", 0, 40.0, 15.0, 8.0, 2.0),
            SeismicEvent::new("m1", 3_600_000, 40.0, 15.0, 10.0, 5.0),
        ])
    }

    #[test]
    fn test_second_ticket_is_busy() {
        let service = SwarmService::new();
        let ticket = service.begin_rebuild().unwrap();
        assert!(service.is_rebuilding());
        assert!(matches!(service.begin_rebuild(), Err(SwarmError::Busy)));
        assert!(matches!(service.rebuild(&catalog(), &SwarmConfig::default()), Err(SwarmError::Busy)));
        drop(ticket);
        assert!(!service.is_rebuilding());
        assert!(service.begin_rebuild().is_ok());
    }

    #[test]
    fn test_rebuild_publishes() {
        let service = SwarmService::new();
        let before = service.query();
        let summary = service.rebuild(&catalog(), &SwarmConfig::default()).unwrap();
        assert_eq!(summary.swarms_matched, 1);
        // The old engine keeps its snapshot.
        assert!(before.swarms_for_mainshock("m1").is_empty());
        assert_eq!(service.query().swarms_for_mainshock("m1").len(), 1);
        assert!(!service.is_rebuilding());
    }

    #[test]
    fn test_cancelled_rebuild_keeps_old_view() {
        let service = SwarmService::new();
        service.rebuild(&catalog(), &SwarmConfig::default()).unwrap();
        let old = service.snapshot();

        let ticket = service.begin_rebuild().unwrap();
        ticket.cancel_token().cancel();
        let result = ticket.run(&CatalogStore::default(), &SwarmConfig::default());
        assert!(matches!(result, Err(SwarmError::Cancelled)));
        assert!(Arc::ptr_eq(&old, &service.snapshot()));
        assert!(!service.is_rebuilding());
    }
}
