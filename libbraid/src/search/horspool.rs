use std::collections::VecDeque;

use anyhow::Result;

use crate::alphabet::ALPHABET_SIZE;

use super::matcher::{LocalHit, Matcher, Pattern, SearchParams};

/// Boyer-Moore-Horspool with the bad-symbol rule. Between verifications
/// the skip countdown makes the per-symbol work constant, and most end
/// positions are never compared at all.
pub struct Horspool {
    pattern: Vec<u8>,
    skip: [usize; ALPHABET_SIZE],
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HorspoolState {
    window: VecDeque<u8>,
    until_check: usize,
}

impl Matcher for Horspool {
    type State = HorspoolState;

    fn new(pattern: &Pattern, _params: &SearchParams) -> Result<Self> {
        let pattern = pattern.digital_bytes.clone();
        let mut skip = [pattern.len(); ALPHABET_SIZE];
        for (idx, &byte) in pattern[..pattern.len() - 1].iter().enumerate() {
            skip[byte as usize] = pattern.len() - 1 - idx;
        }
        Ok(Horspool { pattern, skip })
    }

    fn begin(&self) -> HorspoolState {
        HorspoolState {
            window: VecDeque::with_capacity(self.pattern.len()),
            until_check: 0,
        }
    }

    fn consume(&self, state: &mut HorspoolState, window: &[u8], sink: &mut impl FnMut(LocalHit)) {
        for (idx, &byte) in window.iter().enumerate() {
            state.window.push_back(byte);
            if state.window.len() > self.pattern.len() {
                state.window.pop_front();
            }
            if state.window.len() < self.pattern.len() {
                continue;
            }

            if state.until_check > 0 {
                state.until_check -= 1;
                continue;
            }

            if state.window.iter().eq(self.pattern.iter()) {
                sink(LocalHit {
                    end: idx,
                    distance: 0,
                });
            }

            // the bad-symbol shift never steps over an occurrence, so
            // skipped end positions need no verification
            state.until_check = self.skip[byte as usize] - 1;
        }
    }

    fn pattern_len(&self) -> usize {
        self.pattern.len()
    }
}
