//! Report generation
//!
//! Summarizes a harness run as plain text or JSON.

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Outcome of one harness run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// Plugin library path, or "in-process"
    pub plugin: String,
    pub plugin_version: String,
    pub started_at: DateTime<Utc>,
    pub registered_host: usize,
    pub registered_device: usize,
    pub rounds: u64,
    pub threads: usize,
    pub host_callbacks: usize,
    pub device_callbacks: usize,
    pub elapsed_ns: u64,
}

impl DispatchReport {
    pub fn total_callbacks(&self) -> usize {
        self.host_callbacks + self.device_callbacks
    }

    /// Mean wall time per invoked callback (`None` if nothing was invoked)
    pub fn mean_ns_per_callback(&self) -> Option<f64> {
        match self.total_callbacks() {
            0 => None,
            n => Some(self.elapsed_ns as f64 / n as f64),
        }
    }
}

/// Render the report in the requested format
pub fn render(report: &DispatchReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Txt => Ok(render_txt(report)),
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize report")
        }
    }
}

fn render_txt(report: &DispatchReport) -> String {
    let mean = report
        .mean_ns_per_callback()
        .map(|ns| format!("{:.1} ns", ns))
        .unwrap_or_else(|| String::from("n/a"));

    let mut out = String::new();
    out.push_str("Trace-Compass Plugin Dispatch Report\n");
    out.push_str("====================================\n");
    out.push_str(&format!("Plugin:            {} (v{})\n", report.plugin, report.plugin_version));
    out.push_str(&format!("Started:           {}\n", report.started_at.to_rfc3339()));
    out.push_str(&format!(
        "Registrations:     {} host, {} device\n",
        report.registered_host, report.registered_device
    ));
    out.push_str(&format!(
        "Rounds:            {} on {} thread(s)\n",
        report.rounds, report.threads
    ));
    out.push_str(&format!(
        "Callbacks invoked: {} host, {} device\n",
        report.host_callbacks, report.device_callbacks
    ));
    out.push_str(&format!("Elapsed:           {} ns\n", report.elapsed_ns));
    out.push_str(&format!("Mean per callback: {}\n", mean));
    out
}

/// Write the report to `output`, or stdout when unset
pub fn write_report(report: &DispatchReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let rendered = render(report, format)?;
    match output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write report: {:?}", path))?;
            log::info!("Report written to {:?}", path);
        }
        None => print!("{}", rendered),
    }
    Ok(())
}
