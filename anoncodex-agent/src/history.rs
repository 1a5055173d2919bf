//! Run history: finished reports stored as pretty JSON, one file per run.

use crate::record::RunReport;
use anoncodex_error::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Longest goal slug used in a file name
const SLUG_LEN: usize = 40;

pub struct RunHistory {
    dir: PathBuf,
}

impl RunHistory {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir).map_err(|e| {
            Error::from(e)
                .with_operation("history::new")
                .with_context("dir", dir.display().to_string())
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `report` to `<dir>/<started>-<slug>.json`
    pub fn save(&self, report: &RunReport) -> Result<PathBuf> {
        let stem = format!(
            "{}-{}",
            report.started_at.format("%Y%m%d-%H%M%S"),
            slug(&report.goal)
        );
        let mut path = self.dir.join(format!("{}.json", stem));
        let mut n = 2;
        while path.exists() {
            path = self.dir.join(format!("{}-{}.json", stem, n));
            n += 1;
        }

        let json = serde_json::to_string_pretty(report).map_err(|e| {
            Error::new(ErrorKind::Unexpected, format!("failed to serialize run report: {}", e))
                .with_operation("history::save")
        })?;
        std::fs::write(&path, json).map_err(|e| {
            Error::from(e)
                .with_operation("history::save")
                .with_context("path", path.display().to_string())
        })?;

        debug!(path = %path.display(), "run report saved");
        Ok(path)
    }

    /// Every stored report, oldest first. Files that do not parse are skipped.
    pub fn list(&self) -> Result<Vec<RunReport>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|e| {
            Error::from(e)
                .with_operation("history::list")
                .with_context("dir", self.dir.display().to_string())
        })?;

        let mut reports = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = std::fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|json| {
                    serde_json::from_str::<RunReport>(&json).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(report) => reports.push(report),
                Err(e) => warn!(path = %path.display(), "skipping unreadable run report: {}", e),
            }
        }

        reports.sort_by_key(|r| r.started_at);
        Ok(reports)
    }
}

/// Lowercase ASCII words of `goal` joined by dashes
fn slug(goal: &str) -> String {
    let mut slug = String::new();
    for word in goal
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        if slug.len() + word.len() + 1 > SLUG_LEN {
            break;
        }
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    if slug.is_empty() {
        slug.push_str("run");
    }
    slug
}
