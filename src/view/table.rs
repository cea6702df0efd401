//! Persisted swarm table.
//!
//! One row per swarm, keyed by swarm id, carrying the mainshock id and the
//! ordered member ids. Stored as bincode for reloading or as JSON for export.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::association::{Swarm, SwarmId};
use crate::core::EventId;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmRow {
    pub swarm_id: SwarmId,
    pub mainshock_id: EventId,
    /// Member ids in time order.
    pub members: Vec<EventId>,
    pub lead_time_ms: i64,
    pub start: i64,
    pub end: i64,
    pub peak_magnitude: f64,
    pub peak_event_id: EventId,
    pub magnitude_gap: f64,
    pub distance_km: f64,
    pub centroid_latitude: f64,
    pub centroid_longitude: f64,
}

impl From<&Swarm> for SwarmRow {
    fn from(swarm: &Swarm) -> Self {
        Self {
            swarm_id: swarm.swarm_id,
            mainshock_id: swarm.mainshock_id.clone(),
            members: swarm.cluster.members.clone(),
            lead_time_ms: swarm.lead_time_ms,
            start: swarm.cluster.start,
            end: swarm.cluster.end,
            peak_magnitude: swarm.cluster.peak_magnitude,
            peak_event_id: swarm.cluster.peak_event_id.clone(),
            magnitude_gap: swarm.magnitude_gap,
            distance_km: swarm.distance_km,
            centroid_latitude: swarm.cluster.centroid_latitude,
            centroid_longitude: swarm.cluster.centroid_longitude,
        }
    }
}

/// Swarm rows ordered by swarm id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmTable {
    pub rows: Vec<SwarmRow>,
}

impl SwarmTable {
    pub fn from_swarms<'a, I>(swarms: I) -> Self
    where
        I: IntoIterator<Item = &'a Swarm>,
    {
        let mut rows: Vec<SwarmRow> = swarms.into_iter().map(SwarmRow::from).collect();
        rows.sort_by_key(|r| r.swarm_id);
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, swarm_id: SwarmId) -> Option<&SwarmRow> {
        self.rows.binary_search_by_key(&swarm_id, |r| r.swarm_id).ok().map(|i| &self.rows[i])
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        let mut file = File::create(path)?;
        file.write_all(&encoded)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        Ok(bincode::deserialize(&buffer)?)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogStore;
    use crate::config::SwarmConfig;
    use crate::core::{SeismicEvent, MILLIS_PER_HOUR};
    use crate::view::rebuild;

    fn table() -> SwarmTable {
        let catalog = CatalogStore::from_events(vec![
            SeismicEvent::new("e1", 0, 40.0, 15.0, 8.0, 2.0),
            SeismicEvent::new("e2", 2 * MILLIS_PER_HOUR, 40.01, 15.01, 8.0, 2.3),
            SeismicEvent::new("m1", 36 * MILLIS_PER_HOUR, 40.0, 15.0, 10.0, 5.5),
        ]);
        rebuild(&catalog, &SwarmConfig::default()).unwrap().to_table()
    }

    #[test]
    fn test_rows_from_view() {
        let table = table();
        assert_eq!(table.len(), 1);
        let row = table.get(0).unwrap();
        assert_eq!(row.mainshock_id, "m1");
        assert_eq!(row.members, vec!["e1", "e2"]);
        assert_eq!(row.lead_time_ms, 34 * MILLIS_PER_HOUR);
        assert!(table.get(5).is_none());
    }

    #[test]
    fn test_bincode_file_round_trip() {
        let table = table();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarms.bin");
        table.save_to_file(&path).unwrap();
        assert_eq!(SwarmTable::load_from_file(&path).unwrap(), table);
    }

    #[test]
    fn test_json_file_round_trip() {
        let table = table();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swarms.json");
        table.save_json(&path).unwrap();
        assert_eq!(SwarmTable::load_json(&path).unwrap(), table);
    }

    #[test]
    fn test_load_garbage_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.bin");
        std::fs::write(&path, [0xffu8; 3]).unwrap();
        assert!(matches!(
            SwarmTable::load_from_file(&path),
            Err(crate::SwarmError::Serialization(_))
        ));
    }
}
