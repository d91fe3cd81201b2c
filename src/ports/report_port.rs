//! Result output port trait.

use std::path::PathBuf;

use crate::domain::account::Snapshot;
use crate::domain::error::SimError;

/// Port for persisting the NAV snapshot series of a finished run.
pub trait ReportPort {
    /// Writes the series under `save_id` and returns where it went.
    fn write_nav(&self, save_id: &str, snapshots: &[Snapshot]) -> Result<PathBuf, SimError>;
}
