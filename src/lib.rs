#![doc = include_str!("../README.md")]

pub mod bvt;
pub mod chunk;
pub mod cli;
pub mod conversion;
pub mod manifest;
pub mod output;
pub mod plink;
pub mod report;
pub mod site;

pub use conversion::{
    ConversionError, ConversionJob, DEFAULT_BUFFER_BUDGET, InputFormat, convert_all,
    convert_sequences,
};
pub use output::OutputFormat;
pub use site::SiteObservation;

/// Counters collected while scanning one chromosome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionSummary {
    pub chunks: u64,
    pub sites_scanned: u64,
    pub polymorphic_sites: u64,
    pub multiallelic_sites: u64,
    pub all_missing_sites: u64,
    pub rows_written: u64,
}

impl ConversionSummary {
    pub fn record_site(&mut self, site: &SiteObservation<'_>) {
        self.sites_scanned += 1;
        if site.polymorphic {
            self.polymorphic_sites += 1;
            if !site.biallelic {
                self.multiallelic_sites += 1;
            }
        } else if site.is_all_missing() {
            self.all_missing_sites += 1;
        }
    }

    /// Sum of several jobs' counters.
    pub fn merge(&mut self, other: &ConversionSummary) {
        self.chunks += other.chunks;
        self.sites_scanned += other.sites_scanned;
        self.polymorphic_sites += other.polymorphic_sites;
        self.multiallelic_sites += other.multiallelic_sites;
        self.all_missing_sites += other.all_missing_sites;
        self.rows_written += other.rows_written;
    }
}
