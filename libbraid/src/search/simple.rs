use std::collections::VecDeque;

use anyhow::Result;

use super::matcher::{LocalHit, Matcher, Pattern, SearchParams};

/// Brute-force comparison at every end position. The slowest matcher and
/// the correctness oracle the others are tested against.
pub struct Simple {
    pattern: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleState {
    window: VecDeque<u8>,
}

impl Matcher for Simple {
    type State = SimpleState;

    fn new(pattern: &Pattern, _params: &SearchParams) -> Result<Self> {
        Ok(Simple {
            pattern: pattern.digital_bytes.clone(),
        })
    }

    fn begin(&self) -> SimpleState {
        SimpleState {
            window: VecDeque::with_capacity(self.pattern.len()),
        }
    }

    fn consume(&self, state: &mut SimpleState, window: &[u8], sink: &mut impl FnMut(LocalHit)) {
        for (idx, &byte) in window.iter().enumerate() {
            state.window.push_back(byte);
            if state.window.len() > self.pattern.len() {
                state.window.pop_front();
            }

            if state.window.len() == self.pattern.len()
                && state.window.iter().eq(self.pattern.iter())
            {
                sink(LocalHit {
                    end: idx,
                    distance: 0,
                });
            }
        }
    }

    fn pattern_len(&self) -> usize {
        self.pattern.len()
    }
}
