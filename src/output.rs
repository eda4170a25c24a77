use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

use anyhow::{Result, anyhow};
use clap::ValueEnum;

/// Supported output formats.
#[derive(Debug, Clone, Copy, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Binary variant table (.bvt + .bvtm).
    #[value(name = "bvt")]
    BinaryVariantTable,
    /// PLINK 1 binary fileset (.bed, .bim, .fam).
    #[value(name = "plink", alias = "bed")]
    PackedGenotypeMatrix,
}

impl OutputFormat {
    /// Recognise an output file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "bvt" => Some(Self::BinaryVariantTable),
            "bed" => Some(Self::PackedGenotypeMatrix),
            _ => None,
        }
    }

    /// Extensions of every file the format produces, primary file first.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::BinaryVariantTable => &["bvt", "bvtm"],
            Self::PackedGenotypeMatrix => &["bed", "bim", "fam"],
        }
    }

    /// Output paths for a base path without extension.
    pub fn paths(self, base: &Path) -> Vec<PathBuf> {
        self.extensions()
            .iter()
            .map(|ext| with_appended_extension(base, ext))
            .collect()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::BinaryVariantTable => "bvt",
            Self::PackedGenotypeMatrix => "plink",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bvt" => Ok(Self::BinaryVariantTable),
            "plink" | "bed" => Ok(Self::PackedGenotypeMatrix),
            other => Err(anyhow!("unsupported output format: {other}")),
        }
    }
}

/// `base` + `.ext`, keeping any dots already in the file name.
pub fn with_appended_extension(base: &Path, ext: &str) -> PathBuf {
    let mut raw = base.as_os_str().to_os_string();
    raw.push(".");
    raw.push(ext);
    PathBuf::from(raw)
}

/// Remove whatever is at `path` and open a fresh buffered file there.
pub fn recreate(path: &Path) -> io::Result<BufWriter<File>> {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed existing output"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    File::create(path).map(BufWriter::new)
}
