use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;

use crate::alphabet::UTF8_TO_DIGITAL_NUCLEOTIDE;

#[derive(Error, Debug)]
#[error("empty pattern")]
pub struct EmptyPatternError;

#[derive(Error, Debug)]
#[error("pattern symbol is outside the nucleotide alphabet: {byte}")]
pub struct UnsupportedPatternSymbolError {
    pub byte: u8,
}

#[derive(Error, Debug)]
#[error("pattern length {length} exceeds the supported word width of {max} symbols")]
pub struct PatternTooLongError {
    pub length: usize,
    pub max: usize,
}

#[derive(Error, Debug)]
#[error("edit distance bound {distance} leaves no non-empty seed for a pattern of length {pattern_length}")]
pub struct DistanceTooLargeError {
    pub distance: usize,
    pub pattern_length: usize,
}

#[derive(Error, Debug)]
#[error("search cancelled")]
pub struct SearchCancelledError;

/// A search pattern admitted against the alphabet. Zero-length patterns
/// and symbols outside the alphabet are rejected here, before any
/// traversal starts.
#[derive(Debug)]
pub struct Pattern {
    pub utf8_bytes: Vec<u8>,
    pub digital_bytes: Vec<u8>,
}

impl Pattern {
    pub fn new(utf8: &[u8]) -> Result<Self> {
        if utf8.is_empty() {
            return Err(EmptyPatternError.into());
        }

        let mut digital_bytes = Vec::with_capacity(utf8.len());
        for byte in utf8 {
            match UTF8_TO_DIGITAL_NUCLEOTIDE.get(byte) {
                Some(b) => digital_bytes.push(*b),
                None => return Err(UnsupportedPatternSymbolError { byte: *byte }.into()),
            }
        }

        Ok(Pattern {
            utf8_bytes: utf8.to_vec(),
            digital_bytes,
        })
    }

    pub fn len(&self) -> usize {
        self.digital_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digital_bytes.is_empty()
    }
}

/// Per-search knobs.
#[derive(Clone, Default)]
pub struct SearchParams {
    /// Edit distance bound for the approximate matchers; the exact
    /// matchers ignore it
    pub max_edit_distance: usize,
    /// Cooperative cancellation flag, checked between traversal nodes
    pub cancel: Option<Arc<AtomicBool>>,
}

impl SearchParams {
    pub fn with_max_edit_distance(max_edit_distance: usize) -> Self {
        SearchParams {
            max_edit_distance,
            ..Default::default()
        }
    }

    pub fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}

/// One hit reported by a matcher, local to the window being consumed.
///
/// `end` is the offset of the last symbol of the hit within the window
/// (for the pigeonhole filter, of the putative pattern window its seed
/// implies, which may reach past the window's edge). `distance` is the
/// tracked edit distance, zero for the exact matchers.
#[derive(Clone, Copy, Debug)]
pub struct LocalHit {
    pub end: usize,
    pub distance: usize,
}

/// The capability contract between the traversal engine and one
/// pattern-matching algorithm.
///
/// A matcher is split into an immutable per-search program (tables,
/// masks, seeds, all built once in `new`) and a small incremental
/// [`Matcher::State`] owned by each live traversal path. Cloning a state forks it for a
/// diverging branch. States that compare equal are behaviorally identical
/// on all future content; the engine relies on this to coalesce paths
/// whose content has reconverged.
pub trait Matcher: Sized {
    type State: Clone + PartialEq;

    fn new(pattern: &Pattern, params: &SearchParams) -> Result<Self>;

    fn begin(&self) -> Self::State;

    /// Feed one content window, reporting hits through `sink`.
    fn consume(&self, state: &mut Self::State, window: &[u8], sink: &mut impl FnMut(LocalHit));

    fn pattern_len(&self) -> usize;

    /// Number of identical symbols after which two forked states are
    /// guaranteed to have converged if they ever will.
    fn sync_len(&self) -> usize {
        self.pattern_len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_admission() {
        assert!(Pattern::new(b"")
            .unwrap_err()
            .downcast_ref::<EmptyPatternError>()
            .is_some());

        let err = Pattern::new(b"ACGN").unwrap_err();
        let err = err.downcast::<UnsupportedPatternSymbolError>().unwrap();
        assert_eq!(err.byte, b'N');

        let pattern = Pattern::new(b"TTCG").unwrap();
        assert_eq!(pattern.digital_bytes, vec![3, 3, 1, 2]);
    }

    #[test]
    fn test_params_cancelled() {
        let params = SearchParams::default();
        assert!(!params.cancelled());

        let flag = Arc::new(AtomicBool::new(false));
        let params = SearchParams {
            cancel: Some(flag.clone()),
            ..Default::default()
        };
        assert!(!params.cancelled());
        flag.store(true, Ordering::Relaxed);
        assert!(params.cancelled());
    }
}
