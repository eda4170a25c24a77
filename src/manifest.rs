//! Turning file lists and output names into [`ConversionJob`]s.
//!
//! A file list has one path per line. The line prefixed with `r:` names the
//! reference sequence; every other non-blank line is a sample sequence. Sample
//! names come from the file name up to the first `_` or `.`, and the chromosome
//! name from the last `_`-separated field of the output file stem
//! (`snp_Chr2L.bed` → `Chr2L`).

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::{
    conversion::{ConversionJob, DEFAULT_BUFFER_BUDGET, InputFormat},
    output::OutputFormat,
};

const REFERENCE_PREFIX: &str = "r:";

/// Chromosome label used when none can be derived.
pub const UNKNOWN_CHROMOSOME: &str = "NN";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot open file list {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read file list {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("file list {} names no reference (expected a line starting with `r:`)", path.display())]
    MissingReference { path: PathBuf },
    #[error("file list {} names no sample files", path.display())]
    NoSamples { path: PathBuf },
    #[error("no extension found in file name {}", path.display())]
    MissingExtension { path: PathBuf },
    #[error("unknown extension `{ext}` for {role} file {}", path.display())]
    UnknownExtension {
        ext: String,
        role: &'static str,
        path: PathBuf,
    },
}

impl ManifestError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Open { .. }
            | Self::Read { .. }
            | Self::MissingReference { .. }
            | Self::NoSamples { .. } => 1,
            Self::MissingExtension { .. } => 2,
            Self::UnknownExtension { .. } => 3,
        }
    }
}

/// Parsed contents of a file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileList {
    pub reference: PathBuf,
    pub samples: Vec<PathBuf>,
    pub sample_names: Vec<String>,
    /// First entry in listing order; its extension names the input format.
    pub first_entry: PathBuf,
}

impl FileList {
    pub fn read(path: &Path) -> Result<Self, ManifestError> {
        let file = File::open(path).map_err(|source| ManifestError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(BufReader::new(file), path)
    }

    /// Parse a file list; `origin` is only used in messages.
    pub fn parse<R: BufRead>(reader: R, origin: &Path) -> Result<Self, ManifestError> {
        let mut reference = None;
        let mut samples = Vec::new();
        let mut first_entry = None;

        for line in reader.lines() {
            let line = line.map_err(|source| ManifestError::Read {
                path: origin.to_path_buf(),
                source,
            })?;
            let entry = line.trim_end_matches('\r');
            if entry.trim().is_empty() {
                continue;
            }
            if let Some(path) = entry.strip_prefix(REFERENCE_PREFIX) {
                first_entry.get_or_insert_with(|| PathBuf::from(path));
                reference = Some(PathBuf::from(path));
            } else {
                first_entry.get_or_insert_with(|| PathBuf::from(entry));
                samples.push(PathBuf::from(entry));
            }
        }

        let reference = reference.ok_or_else(|| ManifestError::MissingReference {
            path: origin.to_path_buf(),
        })?;
        if samples.is_empty() {
            return Err(ManifestError::NoSamples {
                path: origin.to_path_buf(),
            });
        }
        if u32::try_from(samples.len()).is_err() {
            tracing::warn!(
                samples = samples.len(),
                limit = u32::MAX,
                list = %origin.display(),
                "number of lines larger than allowed",
            );
        }

        let sample_names = samples
            .iter()
            .enumerate()
            .map(|(index, path)| {
                let name = line_name(&path.to_string_lossy());
                if name.is_empty() {
                    let fallback = format!("line{}", index + 1);
                    tracing::warn!(
                        file = %path.display(),
                        fallback = %fallback,
                        "no line name found in sample file name; using placeholder",
                    );
                    fallback
                } else {
                    name
                }
            })
            .collect();

        Ok(Self {
            reference,
            samples,
            sample_names,
            first_entry: first_entry.unwrap_or_default(),
        })
    }

    /// Input format named by the first entry's extension.
    pub fn detect_input_format(&self) -> Result<InputFormat, ManifestError> {
        let ext = extension(&self.first_entry).ok_or_else(|| ManifestError::MissingExtension {
            path: self.first_entry.clone(),
        })?;
        InputFormat::from_extension(&ext).ok_or_else(|| ManifestError::UnknownExtension {
            ext,
            role: "input",
            path: self.first_entry.clone(),
        })
    }
}

/// Line name of a sample file: directories stripped (`/` or `\`), then
/// everything before the first `_` or `.`.
pub fn line_name(path: &str) -> String {
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    file_name
        .split(['_', '.'])
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Output location and labels derived from an output file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub base: PathBuf,
    pub format: OutputFormat,
    pub chromosome_name: Option<String>,
}

impl OutputTarget {
    /// Derive the format from the extension (`bvt` or `bed`).
    pub fn from_path(path: &Path) -> Result<Self, ManifestError> {
        let ext = extension(path).ok_or_else(|| ManifestError::MissingExtension {
            path: path.to_path_buf(),
        })?;
        let format =
            OutputFormat::from_extension(&ext).ok_or_else(|| ManifestError::UnknownExtension {
                ext,
                role: "output",
                path: path.to_path_buf(),
            })?;
        let base = path.with_extension("");
        Ok(Self {
            chromosome_name: chromosome_name(&base),
            base,
            format,
        })
    }

    /// Use an explicit format; a known output extension is stripped if present.
    pub fn with_format(path: &Path, format: OutputFormat) -> Self {
        let known = extension(path).is_some_and(|ext| {
            [OutputFormat::BinaryVariantTable, OutputFormat::PackedGenotypeMatrix]
                .iter()
                .any(|f| f.extensions().contains(&ext.as_str()))
        });
        let base = if known {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };
        Self {
            chromosome_name: chromosome_name(&base),
            base,
            format,
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .filter(|ext| !ext.is_empty())
}

fn chromosome_name(base: &Path) -> Option<String> {
    let stem = base.file_name()?.to_string_lossy();
    stem.rsplit('_')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Caller-supplied settings that take precedence over derived ones.
#[derive(Debug, Clone)]
pub struct JobOverrides {
    pub chromosome_name: Option<String>,
    pub chromosome_number: Option<u16>,
    pub input_format: Option<InputFormat>,
    pub output_format: Option<OutputFormat>,
    pub buffer_budget: u64,
}

impl Default for JobOverrides {
    fn default() -> Self {
        Self {
            chromosome_name: None,
            chromosome_number: None,
            input_format: None,
            output_format: None,
            buffer_budget: DEFAULT_BUFFER_BUDGET,
        }
    }
}

/// Build the job for one file list and output name.
///
/// `ordinal` is the 1-based position of this job on the command line; it
/// numbers the chromosome when no number is given.
pub fn resolve_job(
    list: &Path,
    output: &Path,
    ordinal: u16,
    overrides: &JobOverrides,
) -> Result<ConversionJob, ManifestError> {
    let target = match overrides.output_format {
        Some(format) => OutputTarget::with_format(output, format),
        None => OutputTarget::from_path(output)?,
    };
    let files = FileList::read(list)?;
    let input_format = match overrides.input_format {
        Some(format) => format,
        None => files.detect_input_format()?,
    };

    let (chromosome_name, derived_number) =
        match overrides.chromosome_name.clone().or(target.chromosome_name) {
            Some(name) => (name, ordinal),
            None => {
                tracing::warn!(
                    output = %output.display(),
                    "no chromosome name found in output file name; setting default",
                );
                (String::from(UNKNOWN_CHROMOSOME), 0)
            }
        };

    Ok(ConversionJob {
        sample_files: files.samples,
        sample_names: files.sample_names,
        reference_file: files.reference,
        chromosome_name,
        chromosome_number: overrides.chromosome_number.unwrap_or(derived_number),
        output_base: target.base,
        input_format,
        output_format: target.format,
        buffer_budget: overrides.buffer_budget,
    })
}
