use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;
use thiserror::Error;

use super::journal::EditOp;
use super::{Journal, MemberView, Sequence};

/// Caller-chosen identity of one member sequence.
pub type MemberId = usize;

#[derive(Error, Debug)]
#[error("duplicate member id: {id}")]
pub struct DuplicateMemberError {
    pub id: MemberId,
}

#[derive(Error, Debug)]
#[error("node arena violates the reference partition at coordinate {coordinate}")]
pub struct PartitionInvariantError {
    pub coordinate: usize,
}

#[derive(Error, Debug)]
#[error("member {member} is tracked by {arm_count} arms in the node spanning [{ref_start}, {ref_end})")]
pub struct MemberCoverageError {
    pub member: MemberId,
    pub arm_count: usize,
    pub ref_start: usize,
    pub ref_end: usize,
}

/// What one group of members emits over a node's reference span, after any
/// insertion content anchored at the node's start coordinate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ArmBody {
    /// Pass the reference span through unchanged
    Reference,
    /// Substituted content covering the span
    Patched(Vec<u8>),
    /// The span is deleted
    Skipped,
}

/// One group of members whose local content over a node is byte-identical.
#[derive(Clone, Debug)]
pub struct Arm {
    /// Dense member indices, ascending
    pub members: Vec<usize>,
    /// Insertion content anchored at the node's start coordinate
    pub prefix: Vec<u8>,
    pub body: ArmBody,
}

impl Arm {
    pub fn body_len(&self, span: usize) -> usize {
        match &self.body {
            ArmBody::Reference => span,
            ArmBody::Patched(bytes) => bytes.len(),
            ArmBody::Skipped => 0,
        }
    }

    pub fn content_len(&self, span: usize) -> usize {
        self.prefix.len() + self.body_len(span)
    }
}

/// A maximal reference run over which no active member has an internal
/// edit boundary. A node with one arm is a shared pass-through; a node
/// with several arms is a divergence point.
#[derive(Clone, Debug)]
pub struct Node {
    pub ref_start: usize,
    pub ref_end: usize,
    pub arms: Vec<Arm>,
}

impl Node {
    pub fn span(&self) -> usize {
        self.ref_end - self.ref_start
    }
}

/// The coordinate-partitioned structure braiding every member's journal
/// over one reference: runs shared by many members appear once, and
/// members fork away from (and rejoin) the shared strand exactly where
/// their journals say they differ.
///
/// Built once from a finalized journal set, immutable afterward; safe to
/// share by reference across concurrent searches.
#[derive(Debug)]
pub struct Braid {
    reference: Sequence,
    member_ids: Vec<MemberId>,
    journals: Vec<Journal>,
    nodes: Vec<Node>,
}

impl Braid {
    /// Validate every member's edit list and merge all edit boundaries
    /// into the node arena. A validation failure yields no partial value.
    pub fn construct(reference: Sequence, members: Vec<(MemberId, Vec<EditOp>)>) -> Result<Self> {
        let mut member_ids: Vec<MemberId> = Vec::with_capacity(members.len());
        let mut journals: Vec<Journal> = Vec::with_capacity(members.len());

        for (id, ops) in members {
            if member_ids.contains(&id) {
                return Err(DuplicateMemberError { id }.into());
            }
            member_ids.push(id);
            journals.push(Journal::from_ops(ops, reference.length)?);
        }

        let nodes = Self::build_nodes(&reference, &journals);

        let braid = Braid {
            reference,
            member_ids,
            journals,
            nodes,
        };
        braid.check_invariants()?;
        Ok(braid)
    }

    fn build_nodes(reference: &Sequence, journals: &[Journal]) -> Vec<Node> {
        let ref_len = reference.length;

        let mut breakpoints: BTreeSet<usize> = BTreeSet::new();
        breakpoints.insert(0);
        breakpoints.insert(ref_len);
        for journal in journals {
            for op in journal.edits() {
                breakpoints.insert(op.offset());
                breakpoints.insert(op.offset() + op.ref_span());
            }
        }

        let coords: Vec<usize> = breakpoints.into_iter().collect();
        let mut spans: Vec<(usize, usize)> = coords.windows(2).map(|w| (w[0], w[1])).collect();

        // insertions anchored at the end of the reference live in a
        // trailing zero-width node
        let tail_insert = journals.iter().any(|journal| {
            journal
                .edits()
                .iter()
                .any(|op| op.ref_span() == 0 && op.offset() == ref_len)
        });
        if tail_insert {
            spans.push((ref_len, ref_len));
        }

        let mut nodes: Vec<Node> = spans
            .iter()
            .map(|&(ref_start, ref_end)| Node {
                ref_start,
                ref_end,
                arms: vec![],
            })
            .collect();

        for (member_idx, journal) in journals.iter().enumerate() {
            let mut edits = journal.edits().iter().peekable();

            for node in nodes.iter_mut() {
                let (start, end) = (node.ref_start, node.ref_end);

                let mut prefix: Vec<u8> = vec![];
                if let Some(op) = edits.peek().copied() {
                    if op.ref_span() == 0 && op.offset() == start {
                        if let EditOp::Insert { bytes, .. } = op {
                            prefix = bytes.clone();
                        }
                        edits.next();
                    }
                }

                let mut body = ArmBody::Reference;
                if let Some(op) = edits.peek().copied() {
                    let op_end = op.offset() + op.ref_span();
                    if op.ref_span() > 0 && op.offset() <= start && op_end >= end {
                        // the edit covers this whole span: boundaries are
                        // breakpoints, so partial overlap cannot happen
                        body = match op {
                            EditOp::Delete { .. } => ArmBody::Skipped,
                            EditOp::Substitute { offset, bytes } => {
                                ArmBody::Patched(bytes[start - offset..end - offset].to_vec())
                            }
                            EditOp::Insert { .. } => unreachable!("insertions span no reference"),
                        };
                        if op_end == end {
                            edits.next();
                        }
                    }
                }

                Self::place_member(node, member_idx, prefix, body);
            }

            // every edit lies inside some node span, so the walk must
            // have consumed the whole journal
            debug_assert!(edits.peek().is_none());
        }

        nodes
    }

    fn place_member(node: &mut Node, member_idx: usize, prefix: Vec<u8>, body: ArmBody) {
        for arm in node.arms.iter_mut() {
            if arm.prefix == prefix && arm.body == body {
                arm.members.push(member_idx);
                return;
            }
        }
        node.arms.push(Arm {
            members: vec![member_idx],
            prefix,
            body,
        });
    }

    /// Arena self-check: node spans must partition the reference
    /// exactly, and every member must sit in exactly one arm per node.
    /// A violation is a build defect, not a caller error.
    fn check_invariants(&self) -> Result<()> {
        let mut expected = 0usize;

        for node in &self.nodes {
            if node.ref_start != expected || node.ref_end < node.ref_start {
                return Err(PartitionInvariantError {
                    coordinate: node.ref_start,
                }
                .into());
            }
            expected = node.ref_end;

            let mut arm_counts = vec![0usize; self.member_ids.len()];
            for arm in &node.arms {
                for &member_idx in &arm.members {
                    arm_counts[member_idx] += 1;
                }
            }
            if let Some(member_idx) = arm_counts.iter().position(|&c| c != 1) {
                return Err(MemberCoverageError {
                    member: self.member_ids[member_idx],
                    arm_count: arm_counts[member_idx],
                    ref_start: node.ref_start,
                    ref_end: node.ref_end,
                }
                .into());
            }
        }

        if expected != self.reference.length {
            return Err(PartitionInvariantError {
                coordinate: expected,
            }
            .into());
        }
        Ok(())
    }

    pub fn reference(&self) -> &Sequence {
        &self.reference
    }

    pub fn member_ids(&self) -> &[MemberId] {
        &self.member_ids
    }

    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn journal(&self, id: MemberId) -> Option<&Journal> {
        let idx = self.member_ids.iter().position(|&m| m == id)?;
        Some(&self.journals[idx])
    }

    /// The lazy virtual sequence of one member.
    pub fn view(&self, id: MemberId) -> Option<MemberView<'_>> {
        let idx = self.member_ids.iter().position(|&m| m == id)?;
        Some(MemberView::new(&self.reference, &self.journals[idx]))
    }

    pub fn dump(&self, out: &mut impl Write) -> Result<()> {
        writeln!(
            out,
            "braid: {} reference symbols, {} members, {} nodes",
            self.reference.length,
            self.member_ids.len(),
            self.nodes.len()
        )?;

        for node in &self.nodes {
            writeln!(out, "[{:>6}, {:>6})", node.ref_start, node.ref_end)?;
            for arm in &node.arms {
                let body = match &arm.body {
                    ArmBody::Reference => "reference".to_string(),
                    ArmBody::Patched(bytes) => format!("patched({})", bytes.len()),
                    ArmBody::Skipped => "skipped".to_string(),
                };
                writeln!(
                    out,
                    "    +{:<3} {:<12} members {:?}",
                    arm.prefix.len(),
                    body,
                    arm.members
                )?;
            }
        }
        Ok(())
    }
}
