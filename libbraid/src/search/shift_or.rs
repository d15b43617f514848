use anyhow::Result;

use crate::alphabet::ALPHABET_SIZE;

use super::matcher::{LocalHit, Matcher, Pattern, SearchParams};
use super::shift_and::prefix_masks;

/// Shift-Or: the complemented twin of Shift-And. A zero bit marks a live
/// prefix, which saves the `| 1` in the inner step.
pub struct ShiftOr {
    masks: [u64; ALPHABET_SIZE],
    accept: u64,
    length: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShiftOrState {
    bits: u64,
}

impl Matcher for ShiftOr {
    type State = ShiftOrState;

    fn new(pattern: &Pattern, _params: &SearchParams) -> Result<Self> {
        let mut masks = prefix_masks(&pattern.digital_bytes)?;
        for mask in masks.iter_mut() {
            *mask = !*mask;
        }
        Ok(ShiftOr {
            masks,
            accept: 1 << (pattern.len() - 1),
            length: pattern.len(),
        })
    }

    fn begin(&self) -> ShiftOrState {
        ShiftOrState { bits: u64::MAX }
    }

    fn consume(&self, state: &mut ShiftOrState, window: &[u8], sink: &mut impl FnMut(LocalHit)) {
        for (idx, &byte) in window.iter().enumerate() {
            state.bits = (state.bits << 1) | self.masks[byte as usize];
            if state.bits & self.accept == 0 {
                sink(LocalHit {
                    end: idx,
                    distance: 0,
                });
            }
        }
    }

    fn pattern_len(&self) -> usize {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::shift_and::ShiftAnd;
    use rand::Rng;
    use rand_pcg::Pcg64;

    #[test]
    fn test_agrees_with_shift_and_on_random_text() {
        let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);
        let params = SearchParams::default();

        for _ in 0..200 {
            let text: Vec<u8> = (0..rng.gen_range(5..200))
                .map(|_| rng.gen_range(0..4u8))
                .collect();
            let pattern_digital: Vec<u8> = (0..rng.gen_range(1..=10))
                .map(|_| rng.gen_range(0..4u8))
                .collect();
            let pattern = Pattern {
                utf8_bytes: vec![],
                digital_bytes: pattern_digital,
            };

            let shift_or = ShiftOr::new(&pattern, &params).unwrap();
            let shift_and = ShiftAnd::new(&pattern, &params).unwrap();

            let mut or_ends = vec![];
            let mut and_ends = vec![];
            let mut or_state = shift_or.begin();
            let mut and_state = shift_and.begin();
            shift_or.consume(&mut or_state, &text, &mut |hit| or_ends.push(hit.end));
            shift_and.consume(&mut and_state, &text, &mut |hit| and_ends.push(hit.end));

            assert_eq!(or_ends, and_ends);
        }
    }

    #[test]
    fn test_single_window_occurrences() {
        let pattern = Pattern::new(b"GT").unwrap();
        let matcher = ShiftOr::new(&pattern, &SearchParams::default()).unwrap();

        let mut state = matcher.begin();
        let mut ends = vec![];
        // GTGT
        matcher.consume(&mut state, &[2, 3, 2, 3], &mut |hit| ends.push(hit.end));
        assert_eq!(ends, vec![1, 3]);
    }
}
