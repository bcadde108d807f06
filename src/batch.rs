use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

pub const RUN_DIR_FORMAT: &str = "%Y%m%d-%H%M%S";

/// Writes one JSON array file per page into a run directory named after the
/// fetch start time.
#[derive(Debug)]
pub struct BatchWriter {
    run_dir: PathBuf,
    base_name: String,
    next_counter: usize,
    created: bool,
}

impl BatchWriter {
    pub fn new(output_root: &Path, base_name: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            run_dir: output_root.join(started_at.format(RUN_DIR_FORMAT).to_string()),
            base_name: base_name.to_string(),
            next_counter: 1,
            created: false,
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Path the next batch will be written to.
    pub fn next_path(&self) -> PathBuf {
        self.run_dir
            .join(format!("{}_{}.json", self.base_name, self.next_counter))
    }

    pub fn write_batch(&mut self, records: &[Value]) -> Result<PathBuf> {
        if !self.created {
            std::fs::create_dir_all(&self.run_dir).with_context(|| {
                format!("create output directory {}", self.run_dir.display())
            })?;
            self.created = true;
        }

        let path = self.next_path();
        let file = File::create(&path)
            .with_context(|| format!("create batch file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, records)
            .with_context(|| format!("serialize batch to {}", path.display()))?;
        writer
            .flush()
            .with_context(|| format!("flush batch file {}", path.display()))?;

        debug!("wrote {} records to {}", records.len(), path.display());
        self.next_counter += 1;
        Ok(path)
    }
}
