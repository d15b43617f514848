use anyhow::Result;

use crate::alphabet::ALPHABET_SIZE;
use crate::util::low_bits;

use super::matcher::{LocalHit, Matcher, Pattern, PatternTooLongError, SearchParams};

/// Bit-parallel bounded edit distance after Myers: the last column of the
/// distance matrix is carried as positive/negative delta words, and one
/// word-parallel step per symbol tracks the distance of the best
/// occurrence ending there. Reports every end position with distance at
/// most the configured bound.
pub struct Myers {
    peq: [u64; ALPHABET_SIZE],
    ones: u64,
    length: usize,
    max_distance: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MyersState {
    positive: u64,
    negative: u64,
    score: usize,
}

impl Matcher for Myers {
    type State = MyersState;

    fn new(pattern: &Pattern, params: &SearchParams) -> Result<Self> {
        let length = pattern.len();
        if length > 64 {
            return Err(PatternTooLongError { length, max: 64 }.into());
        }

        let mut peq = [0u64; ALPHABET_SIZE];
        for (idx, &byte) in pattern.digital_bytes.iter().enumerate() {
            peq[byte as usize] |= 1 << idx;
        }

        Ok(Myers {
            peq,
            ones: low_bits(length),
            length,
            max_distance: params.max_edit_distance,
        })
    }

    fn begin(&self) -> MyersState {
        MyersState {
            positive: self.ones,
            negative: 0,
            score: self.length,
        }
    }

    fn consume(&self, state: &mut MyersState, window: &[u8], sink: &mut impl FnMut(LocalHit)) {
        let high_bit = 1u64 << (self.length - 1);

        for (idx, &byte) in window.iter().enumerate() {
            let eq = self.peq[byte as usize];
            let xv = eq | state.negative;
            let xh = (((eq & state.positive).wrapping_add(state.positive)) ^ state.positive) | eq;

            let mut ph = state.negative | !(xh | state.positive);
            let mut mh = state.positive & xh;

            if ph & high_bit != 0 {
                state.score += 1;
            }
            if mh & high_bit != 0 {
                state.score -= 1;
            }

            ph <<= 1;
            mh <<= 1;
            // the top matrix row is all zeros, so no carry enters the
            // bottom bit of the shifted horizontal deltas
            state.positive = (mh | !(xv | ph)) & self.ones;
            state.negative = (ph & xv) & self.ones;

            if state.score <= self.max_distance {
                sink(LocalHit {
                    end: idx,
                    distance: state.score,
                });
            }
        }
    }

    fn pattern_len(&self) -> usize {
        self.length
    }

    /// A distance column depends on at most twice the pattern length of
    /// trailing text, so forked states converge within that.
    fn sync_len(&self) -> usize {
        2 * self.length
    }
}
