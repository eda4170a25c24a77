#![no_main]

use libfuzzer_sys::fuzz_target;
use seq2snp::{SiteObservation, plink};

fuzz_target!(|data: &[u8]| {
    // first byte is the ancestral call, the rest are sample calls
    let Some((&ancestral, calls)) = data.split_first() else {
        return;
    };
    if calls.is_empty() {
        return;
    }

    let site = SiteObservation::classify(1, ancestral, calls);
    assert!(site.biallelic || site.polymorphic, "multiallelic site must be polymorphic");
    assert_eq!(site.polymorphic, site.alternate.is_some());

    if let Some(alleles) = plink::BimAlleles::orient(&site) {
        assert_ne!(alleles.allele1, alleles.allele2);

        let mut row = Vec::new();
        plink::pack_row(calls, alleles.allele1, &mut row);
        assert_eq!(row.len(), plink::row_len(calls.len()));
        assert_eq!(plink::decode_row(&row, calls.len()).len(), calls.len());
    }
});
