//! The comparator capability.

use crate::constants::{comparator::BITS_PER_FRAME, similarity};
use crate::model::FingerprintRecord;

/// Failure to compare one pair. Never fatal to a run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompareError {
    /// A fingerprint payload could not be decoded.
    #[error("malformed fingerprint for {record}: {reason}")]
    MalformedFingerprint {
        /// Record identity.
        record: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The fingerprints share no frames at any allowed offset.
    #[error("fingerprints do not overlap")]
    NoOverlap,

    /// The comparator produced a score outside `[0, 1]` or NaN.
    #[error("comparator returned invalid similarity {0}")]
    InvalidSimilarity(f64),

    /// Any other comparator failure.
    #[error("{0}")]
    Failed(String),
}

/// Scores the acoustic similarity of two fingerprinted records.
///
/// Implementations are deterministic for identical inputs but are not
/// assumed to be thread-safe: each worker owns its own instance, hence
/// `&mut self`.
pub trait Comparator {
    /// Similarity in `[0, 1]`.
    fn compare(
        &mut self,
        a: &FingerprintRecord,
        b: &FingerprintRecord,
    ) -> Result<f64, CompareError>;
}

impl<F> Comparator for F
where
    F: FnMut(&FingerprintRecord, &FingerprintRecord) -> Result<f64, CompareError>,
{
    fn compare(
        &mut self,
        a: &FingerprintRecord,
        b: &FingerprintRecord,
    ) -> Result<f64, CompareError> {
        self(a, b)
    }
}

/// Reject NaN and out-of-range scores.
pub fn checked_similarity(value: f64) -> Result<f64, CompareError> {
    if (similarity::MIN..=similarity::MAX).contains(&value) {
        Ok(value)
    } else {
        Err(CompareError::InvalidSimilarity(value))
    }
}

/// Comparator for raw Chromaprint sub-fingerprints.
///
/// Payloads are comma-separated unsigned 32-bit integers (the `fpcalc -raw`
/// layout). The score is the best matching-bit ratio over all alignments
/// within `±max_offset` frames.
#[derive(Debug, Clone, Copy)]
pub struct RawFingerprintComparator {
    max_offset: usize,
}

impl RawFingerprintComparator {
    /// Create a comparator searching alignments up to `max_offset` frames.
    pub const fn new(max_offset: usize) -> Self {
        Self { max_offset }
    }
}

impl Comparator for RawFingerprintComparator {
    fn compare(
        &mut self,
        a: &FingerprintRecord,
        b: &FingerprintRecord,
    ) -> Result<f64, CompareError> {
        let fa = decode_raw(a)?;
        let fb = decode_raw(b)?;
        best_alignment_similarity(&fa, &fb, self.max_offset).ok_or(CompareError::NoOverlap)
    }
}

fn decode_raw(record: &FingerprintRecord) -> Result<Vec<u32>, CompareError> {
    record
        .fingerprint
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| CompareError::MalformedFingerprint {
                    record: record.id().to_string(),
                    reason: format!("'{part}': {e}"),
                })
        })
        .collect()
}

/// Highest matching-bit ratio over offsets in `-max_offset..=max_offset`.
///
/// Offsets that cannot overlap are never visited, so the search is bounded
/// by the fingerprint lengths whatever `max_offset` is. `None` when either
/// side is empty.
fn best_alignment_similarity(a: &[u32], b: &[u32], max_offset: usize) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    // Frame i of `a` aligns with frame i + offset of `b`; overlap needs
    // -(len_a - 1) <= offset <= len_b - 1.
    let below = isize::try_from(max_offset.min(a.len() - 1)).ok()?;
    let above = isize::try_from(max_offset.min(b.len() - 1)).ok()?;
    let len_a = isize::try_from(a.len()).ok()?;
    let len_b = isize::try_from(b.len()).ok()?;
    let mut best: Option<f64> = None;

    for offset in -below..=above {
        let start = 0.max(-offset);
        let end = len_a.min(len_b.checked_sub(offset)?);
        if end <= start {
            continue;
        }

        let mut differing_bits: u64 = 0;
        for i in start..end {
            #[allow(clippy::cast_sign_loss)]
            let (x, y) = (a[i as usize], b[(i + offset) as usize]);
            differing_bits += u64::from((x ^ y).count_ones());
        }

        #[allow(clippy::cast_precision_loss, clippy::cast_sign_loss)]
        let total_bits = ((end - start) as u64 * u64::from(BITS_PER_FRAME)) as f64;
        #[allow(clippy::cast_precision_loss)]
        let score = 1.0 - differing_bits as f64 / total_bits;
        best = Some(best.map_or(score, |b: f64| b.max(score)));
    }

    best
}
