#![no_main]

use libfuzzer_sys::fuzz_target;
use seq2snp::manifest::FileList;
use std::{io::Cursor, path::Path};

fuzz_target!(|data: &[u8]| {
    // Parsing arbitrary bytes must fail cleanly, never panic
    let Ok(list) = FileList::parse(Cursor::new(data), Path::new("fuzz.txt")) else {
        return;
    };

    assert!(!list.samples.is_empty());
    assert_eq!(list.samples.len(), list.sample_names.len());
    assert!(list.sample_names.iter().all(|name| !name.is_empty()));
    let _ = list.detect_input_format();
});
