use std::{fs, path::PathBuf};

use proptest::prelude::*;
use seq2snp::{
    ConversionJob, InputFormat, OutputFormat, SiteObservation, bvt, convert_sequences,
};

const ALPHABET: [u8; 5] = *b"ACGTN";

fn sequence(len: usize) -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec(prop::sample::select(ALPHABET.to_vec()), len)
}

/// One sample that may be shorter or longer than the reference and may carry
/// a line terminator anywhere.
fn ragged_sample(len: usize) -> impl Strategy<Value = Vec<u8>> {
    (
        proptest::collection::vec(prop::sample::select(ALPHABET.to_vec()), 0..len + 4),
        proptest::option::of(0..len + 4),
    )
        .prop_map(|(mut calls, terminator)| {
            if let Some(at) = terminator {
                calls.insert(at.min(calls.len()), b'\n');
            }
            calls
        })
}

/// Reference plus 1..6 samples of unrelated lengths.
fn ragged_alignment() -> impl Strategy<Value = (Vec<u8>, Vec<Vec<u8>>)> {
    (1usize..120, 1usize..6).prop_flat_map(|(len, samples)| {
        (
            sequence(len),
            proptest::collection::vec(ragged_sample(len), samples),
        )
    })
}

/// Call of a sample at `index`: `N` past its end or its line terminator.
fn call_at(sample: &[u8], index: usize) -> u8 {
    let end = sample.iter().position(|&b| b == b'\n').unwrap_or(sample.len());
    if index < end { sample[index] } else { b'N' }
}

fn write_job(
    dir: &tempfile::TempDir,
    tag: &str,
    reference: &[u8],
    samples: &[Vec<u8>],
    format: OutputFormat,
    buffer_budget: u64,
) -> ConversionJob {
    let reference_file = dir.path().join("ref.seq");
    fs::write(&reference_file, reference).unwrap();
    let sample_files: Vec<PathBuf> = samples
        .iter()
        .enumerate()
        .map(|(k, calls)| {
            let path = dir.path().join(format!("line{k}.seq"));
            fs::write(&path, calls).unwrap();
            path
        })
        .collect();
    ConversionJob {
        sample_names: (0..samples.len()).map(|k| format!("line{k}")).collect(),
        sample_files,
        reference_file,
        chromosome_name: String::from("Chr2L"),
        chromosome_number: 2,
        output_base: dir.path().join(format!("{tag}_Chr2L")),
        input_format: InputFormat::SequenceFlat,
        output_format: format,
        buffer_budget,
    }
}

fn outputs(job: &ConversionJob) -> Vec<Vec<u8>> {
    job.output_format
        .paths(&job.output_base)
        .iter()
        .map(|path| fs::read(path).unwrap())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn chunk_size_is_not_observable(
        (reference, samples) in ragged_alignment(),
        per_stream in 2u64..9,
        matrix in any::<bool>(),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let format = if matrix {
            OutputFormat::PackedGenotypeMatrix
        } else {
            OutputFormat::BinaryVariantTable
        };
        let streams = samples.len() as u64 + 1;

        let whole = write_job(&dir, "whole", &reference, &samples, format, 1 << 20);
        let whole_summary = convert_sequences(&whole).unwrap();
        prop_assert_eq!(whole_summary.chunks, 1);

        let chunked = write_job(&dir, "chunked", &reference, &samples, format, per_stream * streams);
        let chunked_summary = convert_sequences(&chunked).unwrap();

        prop_assert_eq!(outputs(&whole), outputs(&chunked));
        prop_assert_eq!(whole_summary.sites_scanned, reference.len() as u64);
        prop_assert_eq!(chunked_summary.sites_scanned, whole_summary.sites_scanned);
        prop_assert_eq!(chunked_summary.rows_written, whole_summary.rows_written);
        prop_assert_eq!(
            chunked_summary.chunks,
            (reference.len() as u64).div_ceil(per_stream - 1)
        );
    }

    #[test]
    fn table_rows_are_the_polymorphic_columns_in_order(
        (reference, samples) in ragged_alignment(),
        per_stream in 2u64..7,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let streams = samples.len() as u64 + 1;
        let job = write_job(
            &dir,
            "table",
            &reference,
            &samples,
            OutputFormat::BinaryVariantTable,
            per_stream * streams,
        );
        convert_sequences(&job).unwrap();

        let table = fs::read(job.output_base.with_extension("bvt")).unwrap();
        let rows = bvt::read_rows(&table, samples.len()).unwrap();

        let mut expected = Vec::new();
        for (index, &ancestral) in reference.iter().enumerate() {
            let calls: Vec<u8> = samples.iter().map(|s| call_at(s, index)).collect();
            let site = SiteObservation::classify(index as u32 + 1, ancestral, &calls);
            if site.polymorphic {
                expected.push((site.position, ancestral, calls));
            }
        }
        let actual: Vec<(u32, u8, Vec<u8>)> = rows
            .into_iter()
            .map(|row| (row.position, row.reference, row.calls))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn packed_rows_decode_to_calls(calls in proptest::collection::vec(prop::sample::select(b"ACN".to_vec()), 1..40)) {
        use seq2snp::plink::{PackedCall, decode_row, pack_row, row_len, row_slots};

        let mut row = Vec::new();
        pack_row(&calls, b'C', &mut row);
        prop_assert_eq!(row.len(), row_len(calls.len()));

        let decoded = decode_row(&row, calls.len());
        for (call, packed) in calls.iter().zip(decoded) {
            let expected = match call {
                b'C' => PackedCall::HomozygousAlternate,
                b'N' => PackedCall::Missing,
                _ => PackedCall::HomozygousReference,
            };
            prop_assert_eq!(packed, expected);
        }
        prop_assert!(row_slots(&row)[calls.len()..].iter().all(|&slot| slot == 0));
    }
}
