use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::structs::{Braid, MemberId};

pub mod matcher;
pub use matcher::{
    DistanceTooLargeError, EmptyPatternError, LocalHit, Matcher, Pattern, PatternTooLongError,
    SearchCancelledError, SearchParams, UnsupportedPatternSymbolError,
};

mod engine;
use engine::RawHit;

mod simple;
pub use simple::Simple;

mod horspool;
pub use horspool::Horspool;

mod shift_and;
pub use shift_and::ShiftAnd;

mod shift_or;
pub use shift_or::ShiftOr;

mod myers;
pub use myers::Myers;

mod pigeonhole;
pub use pigeonhole::{verify_candidates, Pigeonhole};

/// The closed set of matching algorithms. Dispatch happens once per
/// search invocation; the scanning loop itself is monomorphic.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatcherKind {
    Simple,
    Horspool,
    ShiftAnd,
    ShiftOr,
    Myers,
    Pigeonhole,
}

/// A confirmed occurrence in one member's virtual sequence.
///
/// `start` is the position of the first matched symbol, counted from 1 as
/// sequence positions conventionally are; journal edit offsets stay
/// 0-based. For the approximate matcher the span is the pattern-length
/// window ending where the tracked distance met the bound; the true
/// occurrence may start up to `distance` symbols away.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    pub member: MemberId,
    /// Virtual position of the first matched symbol, 1-based
    pub start: usize,
    pub length: usize,
    pub distance: usize,
}

/// An unverified pigeonhole hit: some seed of the pattern occurs exactly
/// at this window. Requires verification before it can be trusted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate {
    pub member: MemberId,
    /// Virtual position of the putative pattern window's first symbol,
    /// 1-based like [`Match::start`]
    pub start: usize,
    pub length: usize,
}

/// What a search produced. Every matcher reports confirmed matches,
/// except pigeonhole: its output is a candidate set, a superset of the
/// true matches that needs caller-driven verification (see
/// [`verify_candidates`]). Candidates are a documented non-error outcome,
/// not a failure.
#[derive(Debug)]
pub enum SearchHits {
    Matches(HashMap<MemberId, Vec<Match>>),
    Candidates(HashMap<MemberId, Vec<Candidate>>),
}

impl SearchHits {
    pub fn into_matches(self) -> Option<HashMap<MemberId, Vec<Match>>> {
        match self {
            SearchHits::Matches(matches) => Some(matches),
            SearchHits::Candidates(_) => None,
        }
    }

    pub fn into_candidates(self) -> Option<HashMap<MemberId, Vec<Candidate>>> {
        match self {
            SearchHits::Matches(_) => None,
            SearchHits::Candidates(candidates) => Some(candidates),
        }
    }
}

/// Search every member of `braid` for `pattern` in one coordinated pass.
pub fn search(
    braid: &Braid,
    pattern: &[u8],
    kind: MatcherKind,
    params: &SearchParams,
) -> Result<SearchHits> {
    let pattern = Pattern::new(pattern)?;
    match kind {
        MatcherKind::Simple => matches_with::<Simple>(braid, &pattern, params),
        MatcherKind::Horspool => matches_with::<Horspool>(braid, &pattern, params),
        MatcherKind::ShiftAnd => matches_with::<ShiftAnd>(braid, &pattern, params),
        MatcherKind::ShiftOr => matches_with::<ShiftOr>(braid, &pattern, params),
        MatcherKind::Myers => matches_with::<Myers>(braid, &pattern, params),
        MatcherKind::Pigeonhole => {
            let filter = Pigeonhole::new(&pattern, params)?;
            let raw = engine::run(braid, &filter, params)?;
            Ok(SearchHits::Candidates(demux_candidates(
                braid,
                raw,
                pattern.len(),
            )))
        }
    }
}

impl Braid {
    /// Convenience forward to [`search`].
    pub fn search(
        &self,
        pattern: &[u8],
        kind: MatcherKind,
        params: &SearchParams,
    ) -> Result<SearchHits> {
        search(self, pattern, kind, params)
    }
}

fn matches_with<M: Matcher>(
    braid: &Braid,
    pattern: &Pattern,
    params: &SearchParams,
) -> Result<SearchHits> {
    let matcher = M::new(pattern, params)?;
    let raw = engine::run(braid, &matcher, params)?;
    Ok(SearchHits::Matches(demux_matches(
        braid,
        raw,
        pattern.len(),
    )))
}

fn demux_matches(
    braid: &Braid,
    raw: Vec<RawHit>,
    pattern_len: usize,
) -> HashMap<MemberId, Vec<Match>> {
    let ids = braid.member_ids();
    let mut out: HashMap<MemberId, Vec<Match>> =
        ids.iter().map(|&id| (id, vec![])).collect();

    for hit in raw {
        let member = ids[hit.member];
        out.get_mut(&member).unwrap().push(Match {
            member,
            start: (hit.end + 1).saturating_sub(pattern_len) + 1,
            length: pattern_len,
            distance: hit.distance,
        });
    }

    for matches in out.values_mut() {
        matches.sort_by_key(|m| (m.start, m.distance));
    }
    out
}

fn demux_candidates(
    braid: &Braid,
    raw: Vec<RawHit>,
    pattern_len: usize,
) -> HashMap<MemberId, Vec<Candidate>> {
    let ids = braid.member_ids();
    let mut out: HashMap<MemberId, Vec<Candidate>> =
        ids.iter().map(|&id| (id, vec![])).collect();

    for hit in raw {
        let member = ids[hit.member];
        out.get_mut(&member).unwrap().push(Candidate {
            member,
            start: (hit.end + 1).saturating_sub(pattern_len) + 1,
            length: pattern_len,
        });
    }

    // several seeds may point at the same window
    for candidates in out.values_mut() {
        candidates.sort_by_key(|c| c.start);
        candidates.dedup();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::journal::random_ops;
    use crate::structs::{JournalBuilder, Sequence};
    use assert2::check;
    use rand::Rng;
    use rand_pcg::Pcg64;

    const EXACT_KINDS: [MatcherKind; 4] = [
        MatcherKind::Simple,
        MatcherKind::Horspool,
        MatcherKind::ShiftAnd,
        MatcherKind::ShiftOr,
    ];

    fn matches_of(
        braid: &Braid,
        pattern: &[u8],
        kind: MatcherKind,
        params: &SearchParams,
    ) -> HashMap<MemberId, Vec<Match>> {
        search(braid, pattern, kind, params)
            .unwrap()
            .into_matches()
            .unwrap()
    }

    #[test]
    fn test_substituted_member_scenario() -> Result<()> {
        let reference = Sequence::from_utf8(b"ACGTACGTACGT")?;
        let mut journal = JournalBuilder::new();
        journal.substitute(4, b"T")?;
        let braid = Braid::construct(
            reference,
            vec![(1, journal.finalize(12)?.edits().to_vec())],
        )?;

        let matches = matches_of(&braid, b"TTCG", MatcherKind::ShiftAnd, &SearchParams::default());
        check!(
            matches[&1]
                == vec![Match {
                    member: 1,
                    start: 4,
                    length: 4,
                    distance: 0,
                }]
        );
        Ok(())
    }

    #[test]
    fn test_branch_and_merge_scenario() -> Result<()> {
        let reference = Sequence::from_utf8(b"AAAACCCC")?;
        let mut journal_a = JournalBuilder::new();
        journal_a.insert(4, b"G")?;
        let braid = Braid::construct(
            reference,
            vec![(0, journal_a.finalize(8)?.edits().to_vec()), (1, vec![])],
        )?;
        let params = SearchParams::default();

        for kind in EXACT_KINDS {
            let matches = matches_of(&braid, b"AAAAG", kind, &params);
            check!(matches[&0].len() == 1, "kind {kind:?}");
            check!(matches[&0][0].start == 1);
            check!(matches[&1].is_empty());

            let matches = matches_of(&braid, b"AAAACCCC", kind, &params);
            check!(matches[&0].is_empty(), "kind {kind:?}");
            check!(matches[&1] == vec![Match { member: 1, start: 1, length: 8, distance: 0 }]);
        }
        Ok(())
    }

    #[test]
    fn test_search_is_deterministic() -> Result<()> {
        let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);
        let reference = Sequence::random_nucleotide(120, &mut rng);
        let members: Vec<(MemberId, Vec<crate::structs::EditOp>)> = (0..6)
            .map(|id| (id, random_ops(120, &mut rng)))
            .collect();
        let braid = Braid::construct(reference, members)?;
        let params = SearchParams::default();

        let first = matches_of(&braid, b"ACGT", MatcherKind::ShiftOr, &params);
        let second = matches_of(&braid, b"ACGT", MatcherKind::ShiftOr, &params);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn test_exact_matchers_agree_on_random_collections() -> Result<()> {
        let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);
        let params = SearchParams::default();

        for round in 0..40 {
            let ref_len = rng.gen_range(10..=200);
            let reference = Sequence::random_nucleotide(ref_len, &mut rng);
            let member_count = rng.gen_range(1..=10);
            let members: Vec<(MemberId, Vec<crate::structs::EditOp>)> = (0..member_count)
                .map(|id| (id, random_ops(ref_len, &mut rng)))
                .collect();
            let braid = Braid::construct(reference, members)?;

            let pattern_len = rng.gen_range(1..=10);
            let pattern: Vec<u8> = (0..pattern_len)
                .map(|_| b"ACGT"[rng.gen_range(0..4)])
                .collect();

            let oracle = matches_of(&braid, &pattern, MatcherKind::Simple, &params);
            for kind in [MatcherKind::Horspool, MatcherKind::ShiftAnd, MatcherKind::ShiftOr] {
                let matches = matches_of(&braid, &pattern, kind, &params);
                check!(matches == oracle, "round {round} kind {kind:?}");
            }

            // the approximate matcher at a zero bound is exact
            let myers = matches_of(&braid, &pattern, MatcherKind::Myers, &params);
            check!(myers == oracle, "round {round} myers");
        }
        Ok(())
    }

    #[test]
    fn test_matches_agree_with_materialized_views() -> Result<()> {
        // the oracle of oracles: scan each member's materialized virtual
        // sequence directly
        let mut rng = Pcg64::new(0x853c49e6748fea9b, 0xda3e39cb94b95bdb);
        let params = SearchParams::default();

        for _ in 0..40 {
            let ref_len = rng.gen_range(10..=150);
            let reference = Sequence::random_nucleotide(ref_len, &mut rng);
            let member_count = rng.gen_range(1..=8);
            let members: Vec<(MemberId, Vec<crate::structs::EditOp>)> = (0..member_count)
                .map(|id| (id, random_ops(ref_len, &mut rng)))
                .collect();
            let braid = Braid::construct(reference, members)?;

            let pattern_len = rng.gen_range(1..=6);
            let pattern_digital: Vec<u8> = (0..pattern_len)
                .map(|_| rng.gen_range(0..4u8))
                .collect();
            let pattern_utf8: Vec<u8> = pattern_digital
                .iter()
                .map(|&b| b"ACGT"[b as usize])
                .collect();

            let matches = matches_of(&braid, &pattern_utf8, MatcherKind::Simple, &params);

            for &id in braid.member_ids() {
                let content = braid.view(id).unwrap().to_digital_vec();
                let expected: Vec<usize> = (0..content.len().saturating_sub(pattern_len - 1))
                    .filter(|&start| content[start..start + pattern_len] == pattern_digital[..])
                    .map(|start| start + 1)
                    .collect();
                let found: Vec<usize> = matches[&id].iter().map(|m| m.start).collect();
                check!(found == expected);
            }
        }
        Ok(())
    }

    #[test]
    fn test_pigeonhole_candidates_cover_matches() -> Result<()> {
        let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7);

        for _ in 0..40 {
            let ref_len = rng.gen_range(20..=150);
            let reference = Sequence::random_nucleotide(ref_len, &mut rng);
            let member_count = rng.gen_range(1..=6);
            let members: Vec<(MemberId, Vec<crate::structs::EditOp>)> = (0..member_count)
                .map(|id| (id, random_ops(ref_len, &mut rng)))
                .collect();
            let braid = Braid::construct(reference, members)?;

            let pattern: Vec<u8> = (0..8).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();
            let max_edit_distance = rng.gen_range(0..=2);
            let params = SearchParams::with_max_edit_distance(max_edit_distance);

            let candidates = search(&braid, &pattern, MatcherKind::Pigeonhole, &params)?
                .into_candidates()
                .unwrap();
            let confirmed = search(&braid, &pattern, MatcherKind::Myers, &params)?
                .into_matches()
                .unwrap();

            // any occurrence within the bound keeps one seed intact, so
            // every confirmed match must have a candidate window nearby:
            // the seed drifts by at most k indels, and the reported start
            // of an approximate match by at most k more
            let slack = 2 * max_edit_distance;
            for (member, member_matches) in &confirmed {
                for m in member_matches {
                    let covered = candidates[member].iter().any(|c| {
                        c.start.saturating_sub(slack) <= m.start && m.start <= c.start + slack
                    });
                    check!(covered, "match {m:?} has no covering candidate");
                }
            }
        }
        Ok(())
    }

    #[test]
    fn test_pigeonhole_verified_equals_exact_at_distance_zero() -> Result<()> {
        let mut rng = Pcg64::new(0x853c49e6748fea9b, 0xda3e39cb94b95bdb);
        let params = SearchParams::default();

        for _ in 0..40 {
            let ref_len = rng.gen_range(20..=150);
            let reference = Sequence::random_nucleotide(ref_len, &mut rng);
            let members: Vec<(MemberId, Vec<crate::structs::EditOp>)> = (0..4)
                .map(|id| (id, random_ops(ref_len, &mut rng)))
                .collect();
            let braid = Braid::construct(reference, members)?;
            let pattern: Vec<u8> = (0..6).map(|_| b"ACGT"[rng.gen_range(0..4)]).collect();

            let candidates = search(&braid, &pattern, MatcherKind::Pigeonhole, &params)?
                .into_candidates()
                .unwrap();
            let confirmed = verify_candidates(&braid, &pattern, &params, &candidates)?;
            let oracle = matches_of(&braid, &pattern, MatcherKind::Simple, &params);

            for &id in braid.member_ids() {
                let confirmed_starts: Vec<usize> =
                    confirmed[&id].iter().map(|m| m.start).collect();
                let oracle_starts: Vec<usize> = oracle[&id].iter().map(|m| m.start).collect();
                check!(confirmed_starts == oracle_starts);
            }
        }
        Ok(())
    }

    #[test]
    fn test_empty_pattern_rejected() -> Result<()> {
        let braid = Braid::construct(Sequence::from_utf8(b"ACGT")?, vec![(0, vec![])])?;
        let err = search(&braid, b"", MatcherKind::Simple, &SearchParams::default()).unwrap_err();
        assert!(err.downcast_ref::<EmptyPatternError>().is_some());
        Ok(())
    }

    #[test]
    fn test_unsupported_symbol_rejected() -> Result<()> {
        let braid = Braid::construct(Sequence::from_utf8(b"ACGT")?, vec![(0, vec![])])?;
        let err = search(&braid, b"ANN", MatcherKind::Horspool, &SearchParams::default())
            .unwrap_err();
        assert!(err.downcast_ref::<UnsupportedPatternSymbolError>().is_some());
        Ok(())
    }

    #[test]
    fn test_members_without_hits_are_present_and_empty() -> Result<()> {
        let braid = Braid::construct(
            Sequence::from_utf8(b"AAAA")?,
            vec![(10, vec![]), (20, vec![])],
        )?;
        let matches = matches_of(&braid, b"GG", MatcherKind::ShiftAnd, &SearchParams::default());
        assert_eq!(matches.len(), 2);
        assert!(matches[&10].is_empty());
        assert!(matches[&20].is_empty());
        Ok(())
    }
}
