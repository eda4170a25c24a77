use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use crate::{
    ConversionError, ConversionSummary, DEFAULT_BUFFER_BUDGET, InputFormat, OutputFormat,
    convert_all,
    manifest::{self, JobOverrides, ManifestError},
    report::RunReport,
};

/// Exit code for command-line usage errors not covered by a job error.
const USAGE_EXIT_CODE: u8 = 4;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Extract polymorphic sites from aligned sequence files into BVT or PLINK BED filesets",
    long_about = None
)]
struct Cli {
    /// File listing the sequences of one chromosome (reference prefixed with `r:`).
    /// Repeat once per chromosome.
    #[arg(long = "list", value_name = "FILE", required = true)]
    lists: Vec<PathBuf>,

    /// Output file for the matching --list; the extension (.bvt or .bed) selects the
    /// format and the text after the last `_` names the chromosome.
    #[arg(long = "output", value_name = "FILE", required = true)]
    outputs: Vec<PathBuf>,

    /// Chromosome name for the matching --list, overriding the output file name.
    #[arg(long = "chrom-name", value_name = "NAME")]
    chrom_names: Vec<String>,

    /// Chromosome number for the matching --list (defaults to its position on the command line).
    #[arg(long = "chrom-num", value_name = "NUM")]
    chrom_nums: Vec<u16>,

    /// Output format for every job, ignoring output extensions
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Input format for every job, ignoring input extensions
    #[arg(long, value_enum)]
    input_format: Option<InputFormat>,

    /// Bytes of buffer shared by the reference and all sample sequences of a job
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_BUDGET)]
    buffer_bytes: u64,

    /// Write a JSON run report next to each job's outputs
    #[arg(long)]
    report: bool,

    /// Logging verbosity (e.g. error, warn, info, debug)
    #[arg(long, default_value = "info")]
    log_level: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    if cli.lists.len() != cli.outputs.len() {
        bail!(
            "{} --list arguments but {} --output arguments; they must pair up",
            cli.lists.len(),
            cli.outputs.len()
        );
    }
    for (flag, count) in [
        ("--chrom-name", cli.chrom_names.len()),
        ("--chrom-num", cli.chrom_nums.len()),
    ] {
        if count != 0 && count != cli.lists.len() {
            bail!("{flag} must be given once per --list or not at all");
        }
    }

    let mut jobs = Vec::with_capacity(cli.lists.len());
    for (index, (list, output)) in cli.lists.iter().zip(&cli.outputs).enumerate() {
        let overrides = JobOverrides {
            chromosome_name: cli.chrom_names.get(index).cloned(),
            chromosome_number: cli.chrom_nums.get(index).copied(),
            input_format: cli.input_format,
            output_format: cli.format,
            buffer_budget: cli.buffer_bytes,
        };
        let ordinal = u16::try_from(index + 1).unwrap_or(u16::MAX);
        let job = manifest::resolve_job(list, output, ordinal, &overrides)
            .with_context(|| format!("failed to set up conversion for {}", list.display()))?;
        jobs.push(job);
    }

    let mut total = ConversionSummary::default();
    for (job, result) in jobs.iter().zip(convert_all(&jobs)) {
        let summary = result
            .with_context(|| format!("conversion of {} failed", job.chromosome_name))?;
        if cli.report {
            RunReport::new(job, &summary)
                .write(&job.output_base)
                .context("failed to write run report")?;
        }
        print_summary(&job.chromosome_name, &summary);
        total.merge(&summary);
    }
    if jobs.len() > 1 {
        print_summary("all chromosomes", &total);
    }

    Ok(())
}

/// Process exit code for an error returned by [`run`].
pub fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| {
            cause
                .downcast_ref::<ConversionError>()
                .map(ConversionError::exit_code)
                .or_else(|| {
                    cause
                        .downcast_ref::<ManifestError>()
                        .map(ManifestError::exit_code)
                })
        })
        .unwrap_or(USAGE_EXIT_CODE)
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
    Ok(())
}

fn print_summary(label: &str, summary: &ConversionSummary) {
    println!(
        "{label}: scanned {sites} sites in {chunks} chunks; {polymorphic} polymorphic, wrote {written} rows.",
        sites = summary.sites_scanned,
        chunks = summary.chunks,
        polymorphic = summary.polymorphic_sites,
        written = summary.rows_written,
    );

    if summary.multiallelic_sites > 0 {
        println!(
            "{label}: {count} polymorphic sites had more than two alleles.",
            count = summary.multiallelic_sites
        );
    }

    if summary.all_missing_sites > 0 {
        println!(
            "{label}: {count} sites were missing in the reference and every sample.",
            count = summary.all_missing_sites
        );
    }
}
