//! Report storage and retrieval
//!
//! Keeps one JSON file per test-run under the data directory.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::RunReport;

/// Stored test-run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    /// Report produced by the run
    pub report: RunReport,

    /// Environment info
    pub environment: EnvironmentInfo,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system
    pub os: String,

    /// Architecture
    pub arch: String,

    /// Tool version
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn new(report: RunReport) -> Self {
        Self {
            id: generate_run_id(),
            report,
            environment: EnvironmentInfo::default(),
        }
    }
}

/// Generate unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Report storage manager
pub struct ReportStorage {
    /// Base directory for stored runs
    base_dir: PathBuf,
}

impl ReportStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Create with default directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mozmill-automation")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    /// Save a test-run
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!("Failed to create results directory: {}", self.base_dir.display())
        })?;

        let path = self.run_path(&run.id);
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, run).context("Failed to write results")?;

        info!("Saved test-run report to {}", path.display());
        Ok(path)
    }

    /// Load a test-run
    pub fn load(&self, run_id: &str) -> Result<StoredRun> {
        let path = self.run_path(run_id);
        let run = Self::load_from_path(&path)
            .with_context(|| format!("Failed to load test-run '{run_id}'"))?;

        debug!("Loaded test-run report from {}", path.display());
        Ok(run)
    }

    fn load_from_path(path: &Path) -> Result<StoredRun> {
        let file = File::open(path).context("Failed to open results file")?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).context("Failed to parse results")
    }

    /// List stored runs, newest first
    pub fn list(&self) -> Result<Vec<RunInfo>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if !path.extension().map(|e| e == "json").unwrap_or(false) {
                continue;
            }

            match Self::load_from_path(&path) {
                Ok(run) => runs.push(RunInfo {
                    id: run.id,
                    started_at: run.report.started_at,
                    mode: run.report.mode,
                    total: run.report.total,
                    failed: run.report.failed,
                }),
                Err(e) => debug!("Failed to load {}: {}", path.display(), e),
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        Ok(runs)
    }

    /// Most recent test-run
    pub fn latest(&self) -> Result<Option<StoredRun>> {
        match self.list()?.first() {
            Some(info) => self.load(&info.id).map(Some),
            None => Ok(None),
        }
    }

    /// Delete a run
    pub fn delete(&self, run_id: &str) -> Result<()> {
        let path = self.run_path(run_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted results: {}", path.display());
        }
        Ok(())
    }

    /// Export run to a file
    pub fn export(&self, run: &StoredRun, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)?;
                let writer = BufWriter::new(file);
                serde_json::to_writer_pretty(writer, run)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;

                writer.write_record([
                    "run_id",
                    "binary",
                    "kind",
                    "status",
                    "stage",
                    "branch",
                    "exit_code",
                    "duration_ms",
                    "message",
                ])?;

                for outcome in &run.report.outcomes {
                    writer.write_record([
                        run.id.clone(),
                        outcome.binary.display().to_string(),
                        outcome.kind.to_string(),
                        outcome.status.to_string(),
                        outcome.stage.map(|s| s.to_string()).unwrap_or_default(),
                        outcome.branch.clone().unwrap_or_default(),
                        outcome.exit_code.map(|c| c.to_string()).unwrap_or_default(),
                        outcome.duration_ms.to_string(),
                        outcome.message.clone().unwrap_or_default(),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported results to {}", path.display());
        Ok(())
    }
}

/// Brief run information
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub mode: String,
    pub total: usize,
    pub failed: usize,
}

/// Export format
#[derive(Clone, Copy, Debug)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BinaryEntry, BinaryOutcome, Stage};
    use chrono::Duration;
    use tempfile::tempdir;

    fn report(started_at: DateTime<Utc>) -> RunReport {
        let entry = BinaryEntry::installer("/builds/firefox-3.6.tar.bz2");
        RunReport::new(
            "http://hg.mozilla.org/qa/mozmill-tests",
            "restart",
            started_at,
            vec![
                BinaryOutcome::passed(&entry, 10),
                BinaryOutcome::failed(&entry, Stage::SelectBranch, 5, "no SourceRepository, \"quoted\""),
            ],
        )
    }

    #[test]
    fn test_generate_run_id_format() {
        let id = generate_run_id();
        let parts: Vec<_> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 4);
    }

    #[test]
    fn test_save_load_list() {
        let dir = tempdir().unwrap();
        let storage = ReportStorage::new(dir.path().join("results"));
        assert!(storage.list().unwrap().is_empty());
        assert!(storage.latest().unwrap().is_none());

        let mut older = StoredRun::new(report(Utc::now() - Duration::hours(1)));
        older.id = "20240101_000000_0001".to_string();
        let mut newer = StoredRun::new(report(Utc::now()));
        newer.id = "20240101_010000_0002".to_string();

        storage.save(&older).unwrap();
        storage.save(&newer).unwrap();
        std::fs::write(dir.path().join("results").join("junk.json"), "{").unwrap();

        let runs = storage.list().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, newer.id);
        assert_eq!(runs[0].failed, 1);
        assert_eq!(runs[0].mode, "restart");

        let loaded = storage.load(&older.id).unwrap();
        assert_eq!(loaded.report.total, 2);
        assert_eq!(storage.latest().unwrap().unwrap().id, newer.id);

        storage.delete(&older.id).unwrap();
        assert!(storage.load(&older.id).is_err());
        assert_eq!(storage.list().unwrap().len(), 1);
    }

    #[test]
    fn test_export_csv() {
        let dir = tempdir().unwrap();
        let storage = ReportStorage::new(dir.path());
        let run = StoredRun::new(report(Utc::now()));
        let path = dir.path().join("export.csv");

        storage.export(&run, &path, ExportFormat::Csv).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[1][4], "select-branch");
        assert_eq!(&rows[1][8], "no SourceRepository, \"quoted\"");
    }

    #[test]
    fn test_export_format() {
        assert!(matches!(ExportFormat::from_str("json"), Some(ExportFormat::Json)));
        assert!(matches!(
            ExportFormat::from_extension(Path::new("out.CSV")),
            Some(ExportFormat::Csv)
        ));
        assert!(ExportFormat::from_str("unknown").is_none());
    }

    #[test]
    fn test_environment_info() {
        let env = EnvironmentInfo::default();
        assert!(!env.os.is_empty());
        assert_eq!(env.tool_version, env!("CARGO_PKG_VERSION"));
    }
}
