use anyhow::Result;

use crate::structs::braid::{Arm, ArmBody};
use crate::structs::Braid;
use crate::util::intersect_sorted;

use super::matcher::{LocalHit, Matcher, SearchCancelledError, SearchParams};

/// One hit in virtual coordinates, keyed by dense member index.
#[derive(Clone, Copy, Debug)]
pub(crate) struct RawHit {
    pub member: usize,
    /// Inclusive virtual offset of the hit's last symbol
    pub end: usize,
    pub distance: usize,
}

/// One live traversal path: a set of members whose content has been
/// byte-identical since the path was forked, and the matcher state they
/// share. Paths partition the member set at all times, so their number
/// never exceeds the member count.
struct Path<S> {
    members: Vec<usize>,
    state: S,
}

fn arm_body<'a>(arm: &'a Arm, reference_run: &'a [u8]) -> &'a [u8] {
    match &arm.body {
        ArmBody::Reference => reference_run,
        ArmBody::Patched(bytes) => bytes,
        ArmBody::Skipped => &[],
    }
}

fn feed<M: Matcher>(
    matcher: &M,
    state: &mut M::State,
    bytes: &[u8],
    base_offset: usize,
    members: &[usize],
    virtual_offsets: &[usize],
    hits: &mut Vec<RawHit>,
) {
    if bytes.is_empty() {
        return;
    }
    matcher.consume(state, bytes, &mut |hit: LocalHit| {
        for &member in members {
            hits.push(RawHit {
                member,
                end: virtual_offsets[member] + base_offset + hit.end,
                distance: hit.distance,
            });
        }
    });
}

/// One coordinated pass over the braid: every node's content is fed to
/// the matcher state of each live path crossing it. Paths fork where a
/// node's arms split their members and coalesce again once their states
/// reconverge, so a run shared by many members costs one scan per
/// distinct state rather than one per member.
pub(crate) fn run<M: Matcher>(
    braid: &Braid,
    matcher: &M,
    params: &SearchParams,
) -> Result<Vec<RawHit>> {
    let member_count = braid.member_count();
    let mut hits: Vec<RawHit> = vec![];
    if member_count == 0 {
        return Ok(hits);
    }

    let mut virtual_offsets: Vec<usize> = vec![0; member_count];
    let mut paths: Vec<Path<M::State>> = vec![Path {
        members: (0..member_count).collect(),
        state: matcher.begin(),
    }];
    let sync_len = matcher.sync_len();

    for node in braid.nodes() {
        if params.cancelled() {
            return Err(SearchCancelledError.into());
        }

        let reference_run = &braid.reference().digital_bytes[node.ref_start..node.ref_end];

        // fork each live path across the node's arms and feed the arm
        // prefix plus the first sync window of its body
        let mut children: Vec<Vec<Path<M::State>>> = node.arms.iter().map(|_| vec![]).collect();
        for path in paths.drain(..) {
            for (arm_idx, arm) in node.arms.iter().enumerate() {
                let members = intersect_sorted(&path.members, &arm.members);
                if members.is_empty() {
                    continue;
                }

                let body = arm_body(arm, reference_run);
                let sync_cut = sync_len.min(body.len());
                let mut state = path.state.clone();
                feed(
                    matcher,
                    &mut state,
                    &arm.prefix,
                    0,
                    &members,
                    &virtual_offsets,
                    &mut hits,
                );
                feed(
                    matcher,
                    &mut state,
                    &body[..sync_cut],
                    arm.prefix.len(),
                    &members,
                    &virtual_offsets,
                    &mut hits,
                );
                children[arm_idx].push(Path { members, state });
            }
        }

        // coalesce reconverged paths, then scan each arm's remaining
        // body once per surviving state
        for (arm_idx, arm_children) in children.into_iter().enumerate() {
            let arm = &node.arms[arm_idx];
            let body = arm_body(arm, reference_run);
            let sync_cut = sync_len.min(body.len());

            let mut survivors: Vec<Path<M::State>> = vec![];
            for child in arm_children {
                match survivors.iter().position(|p| p.state == child.state) {
                    Some(idx) => {
                        survivors[idx].members.extend(child.members);
                        survivors[idx].members.sort_unstable();
                    }
                    None => survivors.push(child),
                }
            }

            for path in survivors.iter_mut() {
                feed(
                    matcher,
                    &mut path.state,
                    &body[sync_cut..],
                    arm.prefix.len() + sync_cut,
                    &path.members,
                    &virtual_offsets,
                    &mut hits,
                );
            }
            paths.extend(survivors);
        }

        for arm in &node.arms {
            let content_len = arm.content_len(node.span());
            for &member in &arm.members {
                virtual_offsets[member] += content_len;
            }
        }
    }

    Ok(hits)
}
