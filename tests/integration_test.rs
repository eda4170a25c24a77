use std::{
    fs, io,
    path::{Path, PathBuf},
};

use seq2snp::{
    ConversionError, ConversionJob, DEFAULT_BUFFER_BUDGET, InputFormat, OutputFormat, bvt,
    convert_all, convert_sequences,
    manifest::{self, JobOverrides},
};
use tempfile::tempdir;

fn write_sequences(
    dir: &tempfile::TempDir,
    chromosome: &str,
    reference: &str,
    samples: &[&str],
) -> io::Result<(PathBuf, Vec<PathBuf>)> {
    let reference_path = dir.path().join(format!("dmel_{chromosome}.seq"));
    fs::write(&reference_path, reference)?;
    let mut sample_paths = Vec::new();
    for (k, sequence) in samples.iter().enumerate() {
        let path = dir.path().join(format!("RAL-{}_{chromosome}.seq", k + 1));
        fs::write(&path, sequence)?;
        sample_paths.push(path);
    }
    Ok((reference_path, sample_paths))
}

fn base_job(
    reference_file: PathBuf,
    sample_files: Vec<PathBuf>,
    output_base: PathBuf,
    format: OutputFormat,
) -> ConversionJob {
    let sample_names = (1..=sample_files.len())
        .map(|k| format!("RAL-{k}"))
        .collect();
    ConversionJob {
        sample_files,
        sample_names,
        reference_file,
        chromosome_name: String::from("Chr2L"),
        chromosome_number: 2,
        output_base,
        input_format: InputFormat::SequenceFlat,
        output_format: format,
        buffer_budget: DEFAULT_BUFFER_BUDGET,
    }
}

fn read(path: &Path) -> Vec<u8> {
    fs::read(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

#[test]
fn missing_ancestral_site_is_the_only_site_retained() {
    let dir = tempdir().unwrap();
    let (reference, samples) = write_sequences(&dir, "Chr2L", "NAAC", &["AAAC", "GAAC"]).unwrap();
    let base = dir.path().join("snp_Chr2L");
    let job = base_job(reference, samples, base.clone(), OutputFormat::PackedGenotypeMatrix);

    let summary = convert_sequences(&job).expect("convert to PLINK");
    assert_eq!(summary.sites_scanned, 4);
    assert_eq!(summary.rows_written, 1);

    let bim = fs::read_to_string(base.with_extension("bim")).unwrap();
    let fields: Vec<&str> = bim.split_whitespace().collect();
    assert_eq!(fields, vec!["2", "s1m_Chr2L", "-9", "1", "G", "A"]);
}

#[test]
fn multiallelic_site_only_reaches_the_table() {
    let dir = tempdir().unwrap();
    // position 1 has A, C and G among samples; position 2 is biallelic
    let (reference, samples) =
        write_sequences(&dir, "Chr2L", "AT", &["AT", "AT", "CT", "GA"]).unwrap();

    let bed_base = dir.path().join("bed_Chr2L");
    let bed_job = base_job(
        reference.clone(),
        samples.clone(),
        bed_base.clone(),
        OutputFormat::PackedGenotypeMatrix,
    );
    let bed_summary = convert_sequences(&bed_job).unwrap();
    assert_eq!(bed_summary.polymorphic_sites, 2);
    assert_eq!(bed_summary.multiallelic_sites, 1);
    assert_eq!(bed_summary.rows_written, 1);
    let bim = fs::read_to_string(bed_base.with_extension("bim")).unwrap();
    assert_eq!(bim.lines().count(), 1);
    assert!(bim.starts_with("2 s2_Chr2L "));

    let bvt_base = dir.path().join("bvt_Chr2L");
    let bvt_job = base_job(reference, samples, bvt_base.clone(), OutputFormat::BinaryVariantTable);
    let bvt_summary = convert_sequences(&bvt_job).unwrap();
    assert_eq!(bvt_summary.rows_written, 2);

    let rows = bvt::read_rows(&read(&bvt_base.with_extension("bvt")), 4).unwrap();
    assert_eq!(rows[0].position, 1);
    assert_eq!(rows[0].calls, b"AACG");
    assert_eq!(rows[1].position, 2);
    assert_eq!(rows[1].reference, b'T');
}

#[test]
fn rerunning_a_job_replaces_previous_output() {
    let dir = tempdir().unwrap();
    let (reference, samples) =
        write_sequences(&dir, "Chr2L", "ACGTACGT", &["ACGTACGT", "ACCTACGA"]).unwrap();
    let base = dir.path().join("snp_Chr2L");
    let job = base_job(reference, samples, base.clone(), OutputFormat::BinaryVariantTable);

    convert_sequences(&job).unwrap();
    let first = read(&base.with_extension("bvt"));
    convert_sequences(&job).unwrap();
    let second = read(&base.with_extension("bvt"));
    assert_eq!(first, second);
    assert_eq!(first.len(), 2 * bvt::row_len(2));

    let meta = fs::read_to_string(base.with_extension("bvtm")).unwrap();
    assert_eq!(meta, "Chr2L RAL-1 RAL-2\n");
}

#[test]
fn calls_after_a_sample_terminator_never_reach_the_table() {
    let dir = tempdir().unwrap();
    let (reference, samples) =
        write_sequences(&dir, "Chr2L", "AAAAA", &["AAAAA", "AA\nCC"]).unwrap();

    let mut tables = Vec::new();
    for (tag, budget) in [("whole", 1 << 20), ("chunked", 9)] {
        let base = dir.path().join(format!("{tag}_Chr2L"));
        let mut job = base_job(
            reference.clone(),
            samples.clone(),
            base.clone(),
            OutputFormat::BinaryVariantTable,
        );
        job.buffer_budget = budget;
        let summary = convert_sequences(&job).unwrap();
        assert_eq!(summary.rows_written, 0);
        tables.push(read(&base.with_extension("bvt")));
    }
    assert_eq!(tables[0], tables[1]);
    assert!(tables[0].is_empty());
}

#[test]
fn missing_reference_aborts_after_headers() {
    let dir = tempdir().unwrap();
    let (_, samples) = write_sequences(&dir, "Chr2L", "ACGT", &["ACGT"]).unwrap();
    let base = dir.path().join("snp_Chr2L");
    let job = base_job(
        dir.path().join("absent.seq"),
        samples,
        base.clone(),
        OutputFormat::PackedGenotypeMatrix,
    );

    let err = convert_sequences(&job).unwrap_err();
    assert!(matches!(err, ConversionError::InputOpen { .. }));
    assert_eq!(err.exit_code(), 5);
    // output opened before the scan stays on disk
    assert_eq!(read(&base.with_extension("bed")), vec![0x6C, 0x1B, 0x01]);
    assert_eq!(
        fs::read_to_string(base.with_extension("fam")).unwrap(),
        "RAL-1 RAL-1 0 0 0 -9\n"
    );
}

#[test]
fn chromosomes_convert_independently_in_parallel() {
    let dir = tempdir().unwrap();
    let chromosomes = ["Chr2L", "Chr2R", "Chr3L", "ChrX"];
    let mut outputs = Vec::new();
    for chromosome in chromosomes {
        write_sequences(&dir, chromosome, "ACGTN", &["ACGTN", "ACGAN", "TCGTN"]).unwrap();
        let list = dir.path().join(format!("seqList_{chromosome}.txt"));
        let lines = format!(
            "r:{0}/dmel_{1}.seq\n{0}/RAL-1_{1}.seq\n{0}/RAL-2_{1}.seq\n{0}/RAL-3_{1}.seq\n",
            dir.path().display(),
            chromosome
        );
        fs::write(&list, lines).unwrap();
        outputs.push((list, dir.path().join(format!("snp_{chromosome}.bed"))));
    }

    let jobs: Vec<ConversionJob> = outputs
        .iter()
        .enumerate()
        .map(|(index, (list, output))| {
            manifest::resolve_job(list, output, index as u16 + 1, &JobOverrides::default())
                .unwrap()
        })
        .collect();

    let results = convert_all(&jobs);
    assert_eq!(results.len(), 4);
    for ((job, result), chromosome) in jobs.iter().zip(results).zip(chromosomes) {
        let summary = result.unwrap();
        assert_eq!(summary.sites_scanned, 5);
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.all_missing_sites, 1);
        assert_eq!(job.chromosome_name, chromosome);

        let bim = fs::read_to_string(job.output_base.with_extension("bim")).unwrap();
        let names: Vec<&str> = bim
            .lines()
            .map(|line| line.split(' ').nth(1).unwrap())
            .collect();
        assert_eq!(
            names,
            vec![format!("s1_{chromosome}"), format!("s4_{chromosome}")]
        );
    }
}
