//! Bounded-memory window reader over a reference sequence and its aligned
//! sample sequences.
//!
//! Every stream is opened, seeked, read and closed again for each chunk, so no
//! more than `sample_count + 1` descriptors are ever open at once no matter how
//! many jobs or samples a run has.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use crate::{conversion::ConversionError, site::MISSING};

/// Sequences end at the first line terminator.
const LINE_TERMINATOR: u8 = b'\n';

/// One aligned slice of the reference and every sample sequence.
#[derive(Debug, Default)]
pub struct Window {
    start: u64,
    reference: Vec<u8>,
    samples: Vec<Vec<u8>>,
}

impl Window {
    /// 0-based byte offset of the first column.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }

    pub fn reference(&self) -> &[u8] {
        &self.reference
    }

    pub fn samples(&self) -> &[Vec<u8>] {
        &self.samples
    }

    /// Copy the sample calls of column `index` into `calls`, in sample order.
    pub fn gather_column(&self, index: usize, calls: &mut Vec<u8>) {
        calls.clear();
        calls.extend(self.samples.iter().map(|sample| sample[index]));
    }
}

/// Lazily yields [`Window`]s until the reference is exhausted.
///
/// The reader is not restartable: its only state is the offset where the next
/// chunk begins.
pub struct ChunkReader<'a> {
    reference: &'a Path,
    samples: &'a [PathBuf],
    chunk_size: usize,
    next_offset: u64,
    finished: bool,
    /// Offset of each sample's line terminator, once seen.
    sample_ends: Vec<Option<u64>>,
    window: Window,
}

impl<'a> ChunkReader<'a> {
    /// Split `buffer_budget` evenly across the reference and all samples.
    pub fn new(
        reference: &'a Path,
        samples: &'a [PathBuf],
        buffer_budget: u64,
    ) -> Result<Self, ConversionError> {
        let chunk_size = chunk_size(buffer_budget, samples.len())?;
        Ok(Self {
            reference,
            samples,
            chunk_size,
            next_offset: 0,
            finished: false,
            sample_ends: vec![None; samples.len()],
            window: Window {
                start: 0,
                reference: Vec::new(),
                samples: vec![Vec::new(); samples.len()],
            },
        })
    }

    /// Load the next window, reusing the previous window's buffers.
    pub fn next_window(&mut self) -> Result<Option<&Window>, ConversionError> {
        if self.finished {
            return Ok(None);
        }

        let requested = self.chunk_size - 1;
        let start = self.next_offset;
        read_segment(self.reference, start, requested, &mut self.window.reference)?;
        let len = self.window.reference.len();
        if len < requested {
            self.finished = true;
        }
        self.next_offset = start + len as u64;
        self.window.start = start;

        let streams = self
            .samples
            .iter()
            .zip(self.sample_ends.iter_mut())
            .zip(self.window.samples.iter_mut());
        for ((path, end), buffer) in streams {
            // a terminated sample stays missing for the rest of the chromosome
            let limit = match *end {
                Some(end) => len.min(end.saturating_sub(start) as usize),
                None => len,
            };
            buffer.clear();
            if (end.is_none() || limit > 0)
                && let Some(terminator) = read_segment(path, start, limit, buffer)?
            {
                *end = Some(start + terminator as u64);
            }
            if buffer.len() < len {
                tracing::debug!(
                    sample = %path.display(),
                    offset = start + buffer.len() as u64,
                    "sample sequence shorter than reference; padding with missing calls",
                );
                buffer.resize(len, MISSING);
            }
        }

        if len == 0 {
            self.finished = true;
            return Ok(None);
        }

        tracing::debug!(start, len, final_chunk = self.finished, "loaded chunk");
        Ok(Some(&self.window))
    }
}

/// Per-stream chunk size for a shared budget.
pub fn chunk_size(buffer_budget: u64, sample_count: usize) -> Result<usize, ConversionError> {
    let streams = sample_count as u64 + 1;
    let size = buffer_budget / streams;
    if size < 2 {
        return Err(ConversionError::InvalidJob {
            reason: format!(
                "buffer budget of {buffer_budget} bytes leaves {size} bytes per stream for {streams} streams; at least 2 are required"
            ),
        });
    }
    usize::try_from(size).map_err(|_| ConversionError::InvalidJob {
        reason: format!("chunk size {size} does not fit in memory on this platform"),
    })
}

/// Read at most `limit` bytes starting at `offset`, stopping before the first
/// line terminator. Returns the terminator's index within the segment, if
/// one was found. The file is closed before returning.
fn read_segment(
    path: &Path,
    offset: u64,
    limit: usize,
    buffer: &mut Vec<u8>,
) -> Result<Option<usize>, ConversionError> {
    buffer.clear();
    let mut file = File::open(path).map_err(|source| ConversionError::InputOpen {
        path: path.to_path_buf(),
        source,
    })?;
    let read_error = |source: io::Error| ConversionError::InputRead {
        path: path.to_path_buf(),
        source,
    };
    file.seek(SeekFrom::Start(offset)).map_err(read_error)?;
    file.take(limit as u64)
        .read_to_end(buffer)
        .map_err(read_error)?;

    let terminator = buffer.iter().position(|&byte| byte == LINE_TERMINATOR);
    if let Some(end) = terminator {
        buffer.truncate(end);
    }
    Ok(terminator)
}
