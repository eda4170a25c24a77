//! Binary variant table writer.
//!
//! Each polymorphic site becomes one fixed-width row: the 1-based position as
//! a little-endian `u32`, the reference call, then one byte per sample. The
//! `.bvtm` companion holds the chromosome name and sample names on one line.

use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::{conversion::ConversionError, output, site::SiteObservation};

/// Bytes in a table row for `sample_count` samples.
pub const fn row_len(sample_count: usize) -> usize {
    4 + 1 + sample_count
}

pub struct BvtWriter {
    table: BufWriter<File>,
    table_path: PathBuf,
}

impl BvtWriter {
    /// Write the `.bvtm` metadata line and open an empty `.bvt` table.
    pub fn create(
        base: &Path,
        chromosome_name: &str,
        sample_names: &[String],
    ) -> Result<Self, ConversionError> {
        let meta_path = output::with_appended_extension(base, "bvtm");
        let meta_error = ConversionError::output(&meta_path);
        let mut meta = output::recreate(&meta_path).map_err(&meta_error)?;
        let mut line = String::from(chromosome_name);
        for name in sample_names {
            line.push(' ');
            line.push_str(name);
        }
        writeln!(meta, "{line}").map_err(&meta_error)?;
        meta.flush().map_err(&meta_error)?;

        let table_path = output::with_appended_extension(base, "bvt");
        let table = output::recreate(&table_path).map_err(ConversionError::output(&table_path))?;
        Ok(Self { table, table_path })
    }

    /// Write every polymorphic site, biallelic or not.
    pub fn write_site(&mut self, site: &SiteObservation<'_>) -> Result<bool, ConversionError> {
        if !site.polymorphic {
            return Ok(false);
        }
        let mut write = || -> io::Result<()> {
            self.table.write_all(&site.position.to_le_bytes())?;
            self.table.write_all(&[site.ancestral])?;
            self.table.write_all(site.calls)
        };
        write().map_err(ConversionError::output(&self.table_path))?;
        Ok(true)
    }

    pub fn flush(&mut self) -> Result<(), ConversionError> {
        self.table
            .flush()
            .map_err(ConversionError::output(&self.table_path))
    }
}

/// A decoded table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub position: u32,
    pub reference: u8,
    pub calls: Vec<u8>,
}

/// Split a `.bvt` file's contents into rows.
pub fn read_rows(bytes: &[u8], sample_count: usize) -> io::Result<Vec<TableRow>> {
    let width = row_len(sample_count);
    if bytes.len() % width != 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "table of {} bytes is not a whole number of {width}-byte rows",
                bytes.len()
            ),
        ));
    }
    Ok(bytes
        .chunks_exact(width)
        .map(|row| TableRow {
            position: u32::from_le_bytes([row[0], row[1], row[2], row[3]]),
            reference: row[4],
            calls: row[5..].to_vec(),
        })
        .collect())
}
