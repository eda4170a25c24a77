//! Structured run report for downstream tool consumption.
//!
//! Written as JSON next to the outputs of a job when requested: tool version,
//! job description and scan statistics.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::{ConversionJob, ConversionSummary};

/// Complete report of one conversion job.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    /// Timestamp of run (RFC 3339)
    pub timestamp: String,
    pub job: JobInfo,
    pub statistics: Statistics,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub chromosome_name: String,
    pub chromosome_number: u16,
    pub reference: String,
    pub samples: Vec<SampleInfo>,
    pub input_format: String,
    pub output_format: String,
    pub outputs: Vec<String>,
    pub buffer_budget: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SampleInfo {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Statistics {
    pub chunks: u64,
    pub sites_scanned: u64,
    pub polymorphic_sites: u64,
    pub multiallelic_sites: u64,
    pub all_missing_sites: u64,
    pub rows_written: u64,
}

impl From<&ConversionSummary> for Statistics {
    fn from(s: &ConversionSummary) -> Self {
        Statistics {
            chunks: s.chunks,
            sites_scanned: s.sites_scanned,
            polymorphic_sites: s.polymorphic_sites,
            multiallelic_sites: s.multiallelic_sites,
            all_missing_sites: s.all_missing_sites,
            rows_written: s.rows_written,
        }
    }
}

impl RunReport {
    pub fn new(job: &ConversionJob, summary: &ConversionSummary) -> Self {
        let now = time::OffsetDateTime::now_utc();
        let timestamp = now
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        RunReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            job: JobInfo {
                chromosome_name: job.chromosome_name.clone(),
                chromosome_number: job.chromosome_number,
                reference: job.reference_file.display().to_string(),
                samples: job
                    .sample_names
                    .iter()
                    .zip(&job.sample_files)
                    .map(|(name, path)| SampleInfo {
                        name: name.clone(),
                        path: path.display().to_string(),
                    })
                    .collect(),
                input_format: job.input_format.name().to_string(),
                output_format: job.output_format.name().to_string(),
                outputs: job
                    .output_format
                    .paths(&job.output_base)
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect(),
                buffer_budget: job.buffer_budget,
            },
            statistics: Statistics::from(summary),
        }
    }

    /// Path of the report for an output base: `<base>_report.json`.
    pub fn path_for(output_base: &Path) -> PathBuf {
        let mut raw = output_base.as_os_str().to_os_string();
        raw.push("_report.json");
        PathBuf::from(raw)
    }

    /// Write the report as JSON next to the job's outputs.
    pub fn write(&self, output_base: &Path) -> std::io::Result<PathBuf> {
        let report_path = Self::path_for(output_base);
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;

        std::fs::write(&report_path, json)?;
        tracing::info!("Wrote run report to {}", report_path.display());

        Ok(report_path)
    }
}
