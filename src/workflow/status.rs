//! Environment diagnostics for the `status` subcommand.

use serde::Serialize;
use std::env;
use std::fs;
use std::path::Path;

use crate::config::Options;
use crate::monitor::rss_mb;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub engine: String,
    pub model_id: String,
    pub uses_model_command: bool,
    pub api_key_env: String,
    pub api_key_present: bool,
    pub audit_root: String,
    pub audit_root_writable: bool,
    pub disk_free_mb: Option<u64>,
    pub memory_available_mb: Option<u64>,
    pub process_rss_mb: Option<u64>,
}

pub fn gather(options: &Options) -> StatusReport {
    let audit_root = options.audit_dir.clone();
    let writable = probe_writable(&audit_root);
    StatusReport {
        engine: format!("autodocx {} (headless OOXML)", env!("CARGO_PKG_VERSION")),
        model_id: options.model_id.clone(),
        uses_model_command: options.model_command.is_some(),
        api_key_env: options.api_key_env.clone(),
        api_key_present: env::var(&options.api_key_env).is_ok(),
        audit_root: audit_root.display().to_string(),
        audit_root_writable: writable,
        disk_free_mb: disk_free_mb(&audit_root),
        memory_available_mb: memory_available_mb(),
        process_rss_mb: rss_mb(),
    }
}

pub fn render(report: &StatusReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("engine:              {}\n", report.engine));
    out.push_str(&format!("model:               {}\n", report.model_id));
    out.push_str(&format!(
        "model transport:     {}\n",
        if report.uses_model_command {
            "subprocess command"
        } else {
            "http endpoint"
        }
    ));
    out.push_str(&format!(
        "api key ({}): {}\n",
        report.api_key_env,
        if report.api_key_present { "present" } else { "missing" }
    ));
    out.push_str(&format!(
        "audit root:          {} ({})\n",
        report.audit_root,
        if report.audit_root_writable {
            "writable"
        } else {
            "NOT writable"
        }
    ));
    if let Some(mb) = report.disk_free_mb {
        out.push_str(&format!("disk headroom:       {mb} MB\n"));
    }
    if let Some(mb) = report.memory_available_mb {
        out.push_str(&format!("memory headroom:     {mb} MB\n"));
    }
    if let Some(mb) = report.process_rss_mb {
        out.push_str(&format!("process rss:         {mb} MB\n"));
    }
    out
}

fn probe_writable(root: &Path) -> bool {
    if fs::create_dir_all(root).is_err() {
        return false;
    }
    let probe = root.join(".autodocx-probe");
    match fs::write(&probe, b"probe") {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

fn disk_free_mb(root: &Path) -> Option<u64> {
    fs2::available_space(root).ok().map(|bytes| bytes / (1024 * 1024))
}

fn memory_available_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = fs::read_to_string("/proc/meminfo").ok()?;
        for line in meminfo.lines() {
            if let Some(rest) = line.strip_prefix("MemAvailable:") {
                let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
                return Some(kb / 1024);
            }
        }
        None
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_covers_audit_root_and_model() {
        let root = tempfile::tempdir().unwrap();
        let options = Options {
            audit_dir: root.path().join("audit"),
            ..Options::default()
        };
        let report = gather(&options);
        assert!(report.audit_root_writable);
        assert_eq!(report.model_id, "gpt-4o");
        let rendered = render(&report);
        assert!(rendered.contains("audit root"));
        assert!(rendered.contains("engine"));
    }
}
