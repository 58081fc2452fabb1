//! Run manifest: which batch files make up a run

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sb_core::{BatchKey, RunPlan, SimulationRequest};

use crate::error::OutputResult;
use crate::file::FileWriter;

/// One batch file of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestBatch {
    pub thread_id: usize,
    pub batch_index: usize,
    pub start_index: u64,
    pub size: u64,
    /// Path relative to the writer root
    pub file: String,
}

/// Description of a finished run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub game_id: String,
    pub mode: String,
    pub num_sims: u64,
    pub thread_count: usize,
    pub batch_size: u64,
    pub compress: bool,
    pub elapsed_secs: f64,
    /// Merged book file, if the run was published
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    /// Batches in global trial order
    pub batches: Vec<ManifestBatch>,
}

impl RunManifest {
    pub fn new(
        request: &SimulationRequest,
        plan: &RunPlan,
        writer: &FileWriter,
        elapsed: Duration,
    ) -> Self {
        let batches = plan
            .iter_batches()
            .map(|(partition, batch)| {
                let key = BatchKey::new(request, partition, &batch);
                let path = writer.batch_path(&key, request.compress);
                let file = path
                    .strip_prefix(writer.root())
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .into_owned();
                ManifestBatch {
                    thread_id: key.thread_id,
                    batch_index: key.batch_index,
                    start_index: key.start_index,
                    size: key.size,
                    file,
                }
            })
            .collect();

        Self {
            game_id: request.game_id.clone(),
            mode: request.mode.clone(),
            num_sims: plan.num_sims,
            thread_count: plan.thread_count(),
            batch_size: plan.batch_size,
            compress: request.compress,
            elapsed_secs: elapsed.as_secs_f64(),
            published: None,
            batches,
        }
    }

    /// Record the merged book file
    pub fn with_published(mut self, path: &Path) -> Self {
        self.published = Some(path.display().to_string());
        self
    }

    /// File name used by [`write_to`](Self::write_to)
    pub fn file_name(mode: &str) -> String {
        format!("manifest_{mode}.json")
    }

    /// Write `manifest_<mode>.json` into `dir`
    pub fn write_to(&self, dir: &Path) -> OutputResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(&self.mode));
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        log::debug!("Wrote manifest {}", path.display());
        Ok(path)
    }

    /// Load a manifest
    pub fn load(path: &Path) -> OutputResult<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Total trials across listed batches
    pub fn total_trials(&self) -> u64 {
        self.batches.iter().map(|b| b.size).sum()
    }
}
