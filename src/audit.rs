//! The timestamped audit directory.
//!
//! Fixed filenames, append-only, UTF-8 text. The directory exists before
//! the first stage runs, so even a crashed run leaves a trail.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rand::Rng;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::RunStatus;
use crate::util::compact_timestamp;
use crate::warnings::WarningSink;

pub const BEFORE_DOCX: &str = "before.docx";
pub const AFTER_DOCX: &str = "after.docx";
pub const BEFORE_STRUCTURE: &str = "before_structure.v1.json";
pub const AFTER_STRUCTURE: &str = "after_structure.v1.json";
pub const INVENTORY: &str = "inventory.full.v1.json";
pub const PLAN: &str = "plan.v1.json";
pub const DIFF_REPORT: &str = "diff.report.json";
pub const WARNINGS_LOG: &str = "warnings.log";
pub const STATUS_FILE: &str = "result.status.txt";

#[derive(Debug)]
pub struct AuditRun {
    dir: PathBuf,
}

impl AuditRun {
    /// Create `run_YYYYMMDD_HHMMSS_<rand>/` under the audit root.
    pub fn create(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("create audit root {}", root.display()))?;
        let mut rng = rand::thread_rng();
        for _ in 0..8 {
            let suffix: String = (0..4)
                .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
                .collect();
            let dir = root.join(format!("run_{}_{suffix}", compact_timestamp(Utc::now())));
            match fs::create_dir(&dir) {
                Ok(()) => return Ok(Self { dir }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("create audit directory {}", dir.display()));
                }
            }
        }
        Err(anyhow!(
            "could not allocate a unique run directory under {}",
            root.display()
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_of(name);
        fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))
    }

    pub fn write_text(&self, name: &str, text: &str) -> Result<()> {
        self.write_bytes(name, text.as_bytes())
    }

    pub fn write_json<T: serde::Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let mut bytes = serde_json::to_vec_pretty(value).context("serialise audit artifact")?;
        bytes.push(b'\n');
        self.write_bytes(name, &bytes)
    }

    pub fn copy_in(&self, name: &str, source: &Path) -> Result<()> {
        let dest = self.path_of(name);
        fs::copy(source, &dest).with_context(|| {
            format!("copy {} into {}", source.display(), dest.display())
        })?;
        Ok(())
    }

    /// Write the warnings log and the status token. Called exactly once, on
    /// every exit path.
    pub fn finalize(
        &self,
        status: RunStatus,
        sink: &WarningSink,
        errors: &[String],
    ) -> Result<()> {
        let mut log = sink.render_log();
        for error in errors {
            log.push_str(&format!("ERROR {error}\n"));
        }
        self.write_text(WARNINGS_LOG, &log)?;
        self.write_text(STATUS_FILE, &format!("{}\n", status.audit_token()))?;
        Ok(())
    }
}
