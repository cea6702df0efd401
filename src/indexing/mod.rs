//! Indexing Module
//!
//! Structures a rebuild uses to find candidate neighbors without scanning the
//! whole catalog.
//!
//! - **SpatialIndex** - grid of latitude rows and columns answering
//!   great-circle radius queries
//! - **WindowScanner** - walks time-sorted events and reports which earlier
//!   events fall inside the trailing time window of each one

pub mod spatial;
pub mod window;

pub use spatial::{PointId, SpatialCell, SpatialIndex, MIN_CELL_SIZE_KM};
pub use window::{WindowScanner, WindowStep};
