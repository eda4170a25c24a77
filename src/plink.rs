use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::conversion::ConversionError;
use crate::output;
use crate::site::{MISSING, SiteObservation};

/// SNP-major .bed magic bytes.
pub const BED_MAGIC: [u8; 3] = [0x6C, 0x1B, 0x01];

/// Unknown genetic distance in .bim, missing phenotype in .fam.
const UNKNOWN: &str = "-9";

/// Genotype classes that need bits cleared in a row seeded with `0xFF`.
/// Homozygous reference is the seed itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenotypeClass {
    HomozygousAlternate,
    Heterozygous,
    Missing,
}

impl GenotypeClass {
    /// AND-mask for call slot `slot` (0..4) of a byte. Slot 0 is the low bit
    /// pair.
    pub const fn clear_mask(self, slot: usize) -> u8 {
        let cleared = match self {
            Self::HomozygousAlternate => 0b11,
            Self::Heterozygous => 0b01,
            Self::Missing => 0b10,
        };
        !(cleared << (2 * slot))
    }
}

/// AND-mask zeroing the `unused` (1..=3) trailing slots of a row's last byte.
pub const fn padding_mask(unused: usize) -> u8 {
    0xFF >> (2 * unused)
}

/// Decoded two-bit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackedCall {
    HomozygousAlternate,
    Missing,
    Heterozygous,
    HomozygousReference,
}

impl PackedCall {
    const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => Self::HomozygousAlternate,
            0b01 => Self::Missing,
            0b10 => Self::Heterozygous,
            _ => Self::HomozygousReference,
        }
    }
}

/// Bytes per .bed row for `sample_count` calls.
pub const fn row_len(sample_count: usize) -> usize {
    sample_count.div_ceil(4)
}

/// Pack one biallelic site. Calls equal to `alternate` become homozygous
/// alternate, missing calls become missing, everything else stays homozygous
/// reference.
pub fn pack_row(calls: &[u8], alternate: u8, row: &mut Vec<u8>) {
    row.clear();
    row.resize(row_len(calls.len()), 0xFF);

    for (index, &call) in calls.iter().enumerate() {
        let class = if call == alternate {
            GenotypeClass::HomozygousAlternate
        } else if call == MISSING {
            GenotypeClass::Missing
        } else {
            continue;
        };
        row[index / 4] &= class.clear_mask(index % 4);
    }

    let unused = row.len() * 4 - calls.len();
    if unused > 0
        && let Some(last) = row.last_mut()
    {
        *last &= padding_mask(unused);
    }
}

/// Inverse of [`pack_row`]; padding slots are not returned.
pub fn decode_row(row: &[u8], sample_count: usize) -> Vec<PackedCall> {
    (0..sample_count)
        .map(|index| PackedCall::from_bits(row[index / 4] >> (2 * (index % 4))))
        .collect()
}

/// Raw two-bit values of every slot in a row, padding included.
pub fn row_slots(row: &[u8]) -> Vec<u8> {
    row.iter()
        .flat_map(|&byte| (0..4).map(move |slot| (byte >> (2 * slot)) & 0b11))
        .collect()
}

/// Site label suffix and allele pair written to .bim. `allele1` is the allele
/// encoded as homozygous alternate in the .bed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BimAlleles {
    pub suffix: &'static str,
    pub allele1: u8,
    pub allele2: u8,
}

impl BimAlleles {
    /// Orient a biallelic site against its ancestral call.
    ///
    /// Returns `None` when the site carries no alternate.
    pub fn orient(site: &SiteObservation<'_>) -> Option<Self> {
        let alternate = site.alternate?;
        let reference = site.effective_reference;
        let ancestral = site.ancestral;

        let alleles = if ancestral == MISSING {
            Self {
                suffix: "m",
                allele1: alternate,
                allele2: reference,
            }
        } else if alternate != ancestral && reference != ancestral {
            Self {
                suffix: "d",
                allele1: alternate,
                allele2: reference,
            }
        } else {
            let derived = if alternate == ancestral {
                reference
            } else {
                alternate
            };
            Self {
                suffix: "",
                allele1: derived,
                allele2: ancestral,
            }
        };
        Some(alleles)
    }
}

/// PLINK 1 writer for .bed, .bim and .fam files
pub struct PlinkWriter {
    bed: BufWriter<File>,
    bed_path: PathBuf,
    bim: BufWriter<File>,
    bim_path: PathBuf,
    chromosome_name: String,
    chromosome_number: u16,
    sample_count: usize,
    row: Vec<u8>,
}

impl PlinkWriter {
    /// Create the fileset at `base` (extensions are appended), write the .fam
    /// file and the .bed magic bytes.
    pub fn create(
        base: &Path,
        sample_names: &[String],
        chromosome_name: &str,
        chromosome_number: u16,
    ) -> Result<Self, ConversionError> {
        let bed_path = output::with_appended_extension(base, "bed");
        let bim_path = output::with_appended_extension(base, "bim");
        let fam_path = output::with_appended_extension(base, "fam");

        let fam_error = ConversionError::output(&fam_path);
        let mut fam = output::recreate(&fam_path).map_err(&fam_error)?;
        for name in sample_names {
            writeln!(fam, "{0} {0} 0 0 0 {UNKNOWN}", name).map_err(&fam_error)?;
        }
        fam.flush().map_err(&fam_error)?;

        let mut bed = output::recreate(&bed_path).map_err(ConversionError::output(&bed_path))?;
        bed.write_all(&BED_MAGIC)
            .map_err(ConversionError::output(&bed_path))?;
        let bim = output::recreate(&bim_path).map_err(ConversionError::output(&bim_path))?;

        Ok(Self {
            bed,
            bed_path,
            bim,
            bim_path,
            chromosome_name: chromosome_name.to_string(),
            chromosome_number,
            sample_count: sample_names.len(),
            row: Vec::with_capacity(row_len(sample_names.len())),
        })
    }

    /// Write a site if it is a biallelic polymorphism. Returns whether a row
    /// was written.
    pub fn write_site(&mut self, site: &SiteObservation<'_>) -> Result<bool, ConversionError> {
        if !site.is_biallelic_polymorphism() {
            return Ok(false);
        }
        let Some(alleles) = BimAlleles::orient(site) else {
            return Ok(false);
        };
        debug_assert_eq!(site.calls.len(), self.sample_count);

        writeln!(
            self.bim,
            "{} s{}{}_{} {UNKNOWN} {} {} {}",
            self.chromosome_number,
            site.position,
            alleles.suffix,
            self.chromosome_name,
            site.position,
            alleles.allele1 as char,
            alleles.allele2 as char,
        )
        .map_err(ConversionError::output(&self.bim_path))?;

        pack_row(site.calls, alleles.allele1, &mut self.row);
        self.bed
            .write_all(&self.row)
            .map_err(ConversionError::output(&self.bed_path))?;
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<(), ConversionError> {
        self.bed
            .flush()
            .map_err(ConversionError::output(&self.bed_path))?;
        self.bim
            .flush()
            .map_err(ConversionError::output(&self.bim_path))
    }
}
