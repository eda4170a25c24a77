use std::{
    io,
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use thiserror::Error;

use crate::{
    ConversionSummary,
    bvt::BvtWriter,
    chunk::ChunkReader,
    output::OutputFormat,
    plink::PlinkWriter,
    site::SiteObservation,
};

/// Default memory shared by the reference and all sample buffers.
pub const DEFAULT_BUFFER_BUDGET: u64 = 2_000_000_000;

/// Supported input formats.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum InputFormat {
    /// Headerless flat sequence, one byte per position (`.seq`).
    #[value(name = "seq")]
    SequenceFlat,
}

impl InputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "seq" => Some(Self::SequenceFlat),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SequenceFlat => "seq",
        }
    }
}

/// Everything needed to convert one chromosome.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub sample_files: Vec<PathBuf>,
    pub sample_names: Vec<String>,
    pub reference_file: PathBuf,
    pub chromosome_name: String,
    pub chromosome_number: u16,
    /// Output path without extension.
    pub output_base: PathBuf,
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
    pub buffer_budget: u64,
}

impl ConversionJob {
    /// Change the output format before the job runs.
    pub fn set_output_format(&mut self, format: OutputFormat) {
        self.output_format = format;
    }

    pub fn sample_count(&self) -> usize {
        self.sample_files.len()
    }

    /// Check the invariants that must hold before any output is touched.
    pub fn validate(&self) -> Result<(), ConversionError> {
        if self.sample_files.is_empty() {
            return Err(ConversionError::InvalidJob {
                reason: String::from("no sample files"),
            });
        }
        if self.sample_files.len() != self.sample_names.len() {
            return Err(ConversionError::InvalidJob {
                reason: format!(
                    "{} sample files but {} sample names",
                    self.sample_files.len(),
                    self.sample_names.len()
                ),
            });
        }
        crate::chunk::chunk_size(self.buffer_budget, self.sample_count())?;
        Ok(())
    }
}

/// Fatal errors of a conversion job. Every variant maps to a distinct process
/// exit code.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("invalid conversion job: {reason}")]
    InvalidJob { reason: String },
    #[error("unable to open input file {}: {source}", path.display())]
    InputOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read input file {}: {source}", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("chromosome position {position} does not fit in 32 bits")]
    PositionOverflow { position: u64 },
}

impl ConversionError {
    /// Error mapper attaching the output file `path` to an I/O failure.
    pub(crate) fn output(path: &Path) -> impl Fn(io::Error) -> Self + '_ {
        move |source| Self::Output {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            Self::InvalidJob { .. } => 4,
            Self::InputOpen { .. } | Self::InputRead { .. } => 5,
            Self::Output { .. } => 6,
            Self::PositionOverflow { .. } => 7,
        }
    }
}

/// Output strategy driven by the shared scan loop.
pub trait SiteWriter {
    /// Handle one classified column; returns whether a row was emitted.
    fn write_site(&mut self, site: &SiteObservation<'_>) -> Result<bool, ConversionError>;

    /// Push everything written so far to disk.
    fn flush(&mut self) -> Result<(), ConversionError>;
}

impl SiteWriter for BvtWriter {
    fn write_site(&mut self, site: &SiteObservation<'_>) -> Result<bool, ConversionError> {
        BvtWriter::write_site(self, site)
    }

    fn flush(&mut self) -> Result<(), ConversionError> {
        BvtWriter::flush(self)
    }
}

impl SiteWriter for PlinkWriter {
    fn write_site(&mut self, site: &SiteObservation<'_>) -> Result<bool, ConversionError> {
        PlinkWriter::write_site(self, site)
    }

    fn flush(&mut self) -> Result<(), ConversionError> {
        PlinkWriter::flush(self)
    }
}

/// Run a conversion job to completion.
pub fn convert_sequences(job: &ConversionJob) -> Result<ConversionSummary, ConversionError> {
    job.validate()?;

    tracing::info!(
        chromosome = %job.chromosome_name,
        chromosome_number = job.chromosome_number,
        input_format = ?job.input_format,
        output_format = ?job.output_format,
        reference = %job.reference_file.display(),
        samples = job.sample_count(),
        output = %job.output_base.display(),
        buffer_budget = job.buffer_budget,
        "starting conversion",
    );

    let summary = match job.output_format {
        OutputFormat::BinaryVariantTable => {
            let mut writer =
                BvtWriter::create(&job.output_base, &job.chromosome_name, &job.sample_names)?;
            scan_sequences(job, &mut writer)?
        }
        OutputFormat::PackedGenotypeMatrix => {
            let mut writer = PlinkWriter::create(
                &job.output_base,
                &job.sample_names,
                &job.chromosome_name,
                job.chromosome_number,
            )?;
            scan_sequences(job, &mut writer)?
        }
    };

    tracing::info!(
        chromosome = %job.chromosome_name,
        chunks = summary.chunks,
        sites = summary.sites_scanned,
        polymorphic = summary.polymorphic_sites,
        written = summary.rows_written,
        "finished conversion",
    );
    Ok(summary)
}

/// Stream every window through `writer`, flushing after each chunk.
fn scan_sequences<W>(
    job: &ConversionJob,
    writer: &mut W,
) -> Result<ConversionSummary, ConversionError>
where
    W: SiteWriter,
{
    let mut summary = ConversionSummary::default();
    let mut reader = ChunkReader::new(&job.reference_file, &job.sample_files, job.buffer_budget)?;
    let mut calls = Vec::with_capacity(job.sample_count());

    while let Some(window) = reader.next_window()? {
        summary.chunks += 1;
        for (index, &ancestral) in window.reference().iter().enumerate() {
            let position = site_position(summary.sites_scanned)?;
            window.gather_column(index, &mut calls);
            let site = SiteObservation::classify(position, ancestral, &calls);
            summary.record_site(&site);
            if writer.write_site(&site)? {
                summary.rows_written += 1;
            }
        }
        writer.flush()?;
    }

    Ok(summary)
}

/// 1-based position of the column after `scanned` earlier columns.
fn site_position(scanned: u64) -> Result<u32, ConversionError> {
    let position = scanned + 1;
    u32::try_from(position).map_err(|_| ConversionError::PositionOverflow { position })
}

/// Run independent jobs in parallel, one worker per job, and wait for all.
///
/// Results are returned in job order.
pub fn convert_all(jobs: &[ConversionJob]) -> Vec<Result<ConversionSummary, ConversionError>> {
    use rayon::prelude::*;

    if jobs.len() <= 1 {
        return jobs.iter().map(convert_sequences).collect();
    }
    match rayon::ThreadPoolBuilder::new().num_threads(jobs.len()).build() {
        Ok(pool) => pool.install(|| jobs.par_iter().map(convert_sequences).collect()),
        Err(e) => {
            tracing::warn!(error = %e, "failed to build thread pool; converting sequentially");
            jobs.iter().map(convert_sequences).collect()
        }
    }
}
