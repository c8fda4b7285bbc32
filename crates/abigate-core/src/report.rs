//! Machine-readable run reports.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::runner::RunOutcome;
use crate::version::ReleaseId;

/// Everything an operator needs to reconstruct what a run tested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run finished.
    pub finished_at: DateTime<Utc>,

    /// The configuration it ran with.
    pub config: HarnessConfig,

    /// The catalog it tested, in order.
    pub catalog: Vec<ReleaseId>,

    /// The verdict.
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn new(config: HarnessConfig, catalog: Vec<ReleaseId>, outcome: RunOutcome) -> Self {
        Self {
            finished_at: Utc::now(),
            config,
            catalog,
            outcome,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
