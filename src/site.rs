//! Per-column polymorphism and biallelism classification.
//!
//! Only variation within the sample set counts: the comparison state for a
//! column starts as the first sample's call, so a column where every sample
//! agrees but differs from the reference is monomorphic.

/// Symbol used for a missing call in reference and sample sequences.
pub const MISSING: u8 = b'N';

/// One classified column of an aligned window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteObservation<'a> {
    /// 1-based chromosome position.
    pub position: u32,
    /// Call from the reference sequence; may be [`MISSING`].
    pub ancestral: u8,
    /// Sample calls in sample order.
    pub calls: &'a [u8],
    /// Comparison state after the scan: the first sample call, replaced by
    /// later calls for as long as it stays missing.
    pub effective_reference: u8,
    /// First non-missing call that differs from the effective reference.
    pub alternate: Option<u8>,
    pub polymorphic: bool,
    pub biallelic: bool,
}

impl<'a> SiteObservation<'a> {
    /// Classify a column. `calls` must hold at least one sample call.
    pub fn classify(position: u32, ancestral: u8, calls: &'a [u8]) -> Self {
        let mut effective_reference = calls.first().copied().unwrap_or(MISSING);
        let mut alternate = None;
        let mut polymorphic = false;
        let mut biallelic = true;

        for &call in calls {
            if effective_reference == MISSING {
                effective_reference = call;
            }
            if call == MISSING || call == effective_reference {
                continue;
            }
            match alternate {
                None => alternate = Some(call),
                Some(alt) if alt != call => {
                    // polymorphic is already set by the first alternate
                    biallelic = false;
                    break;
                }
                Some(_) => {}
            }
            polymorphic = true;
        }

        Self {
            position,
            ancestral,
            calls,
            effective_reference,
            alternate,
            polymorphic,
            biallelic,
        }
    }

    /// Polymorphic with exactly two alleles among the samples.
    pub fn is_biallelic_polymorphism(&self) -> bool {
        self.polymorphic && self.biallelic
    }

    /// Reference and every sample call are missing.
    pub fn is_all_missing(&self) -> bool {
        self.ancestral == MISSING && self.calls.iter().all(|&call| call == MISSING)
    }
}
