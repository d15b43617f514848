use anyhow::Result;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alphabet::{ALPHABET_SIZE, UTF8_TO_DIGITAL_NUCLEOTIDE};

use super::sequence::{UnknownDigitalSequenceByteError, UnknownUtf8SequenceByteError};

#[derive(Error, Debug)]
#[error("edit at offset {offset} is out of range for a reference of length {reference_length}")]
pub struct EditOutOfRangeError {
    pub offset: usize,
    pub reference_length: usize,
}

#[derive(Error, Debug)]
#[error("edits at offsets {first_offset} and {second_offset} overlap")]
pub struct OverlappingEditsError {
    pub first_offset: usize,
    pub second_offset: usize,
}

#[derive(Error, Debug)]
#[error("more than one insertion anchored at offset {offset}")]
pub struct DuplicateInsertError {
    pub offset: usize,
}

#[derive(Error, Debug)]
#[error("edit at offset {offset} has no content")]
pub struct EmptyEditError {
    pub offset: usize,
}

/// One run of difference between a member sequence and the reference.
///
/// Offsets are reference coordinates. An insertion is anchored in front of
/// the reference symbol at its offset; a substitution replaces exactly
/// `bytes.len()` reference symbols, so only insertions and deletions change
/// a member's length. Content bytes are digital (`0..4`).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum EditOp {
    Insert { offset: usize, bytes: Vec<u8> },
    Delete { offset: usize, length: usize },
    Substitute { offset: usize, bytes: Vec<u8> },
}

impl EditOp {
    pub fn offset(&self) -> usize {
        match self {
            EditOp::Insert { offset, .. } => *offset,
            EditOp::Delete { offset, .. } => *offset,
            EditOp::Substitute { offset, .. } => *offset,
        }
    }

    /// The number of reference symbols this edit consumes.
    pub fn ref_span(&self) -> usize {
        match self {
            EditOp::Insert { .. } => 0,
            EditOp::Delete { length, .. } => *length,
            EditOp::Substitute { bytes, .. } => bytes.len(),
        }
    }

    /// The number of member symbols this edit produces.
    pub fn out_len(&self) -> usize {
        match self {
            EditOp::Insert { bytes, .. } => bytes.len(),
            EditOp::Delete { .. } => 0,
            EditOp::Substitute { bytes, .. } => bytes.len(),
        }
    }
}

fn digital_content(utf8: &[u8]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(utf8.len());
    for utf8_byte in utf8 {
        match UTF8_TO_DIGITAL_NUCLEOTIDE.get(utf8_byte) {
            Some(b) => bytes.push(*b),
            None => return Err(UnknownUtf8SequenceByteError { byte: *utf8_byte }.into()),
        }
    }
    Ok(bytes)
}

/// Accumulates edit operations for one member sequence.
///
/// Operations may be appended in any order; `finalize` sorts them by
/// reference coordinate and validates the journal against the reference
/// length. A journal that fails validation yields no value.
#[derive(Default)]
pub struct JournalBuilder {
    edits: Vec<EditOp>,
}

impl JournalBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: EditOp) -> &mut Self {
        self.edits.push(op);
        self
    }

    /// Append an insertion of `content` (UTF8) in front of reference
    /// position `offset`.
    pub fn insert(&mut self, offset: usize, content: &[u8]) -> Result<&mut Self> {
        let bytes = digital_content(content)?;
        Ok(self.push(EditOp::Insert { offset, bytes }))
    }

    /// Append a deletion of `length` reference symbols starting at `offset`.
    pub fn delete(&mut self, offset: usize, length: usize) -> &mut Self {
        self.push(EditOp::Delete { offset, length })
    }

    /// Append a substitution replacing `content.len()` reference symbols
    /// starting at `offset` with `content` (UTF8).
    pub fn substitute(&mut self, offset: usize, content: &[u8]) -> Result<&mut Self> {
        let bytes = digital_content(content)?;
        Ok(self.push(EditOp::Substitute { offset, bytes }))
    }

    pub fn finalize(self, reference_length: usize) -> Result<Journal> {
        Journal::from_ops(self.edits, reference_length)
    }
}

/// A validated, coordinate-sorted edit list for one member sequence.
///
/// Owns no reference content; a member's sequence is defined entirely as
/// "reference transformed by journal".
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Journal {
    edits: Vec<EditOp>,
}

impl Journal {
    /// Sort and validate a raw edit list: every edit in range and
    /// non-empty, no two edits overlapping, at most one insertion anchored
    /// at any offset. Edits are never silently repaired or reordered
    /// beyond the coordinate sort.
    pub fn from_ops(mut ops: Vec<EditOp>, reference_length: usize) -> Result<Self> {
        for op in &ops {
            if op.out_len() == 0 && op.ref_span() == 0 {
                return Err(EmptyEditError { offset: op.offset() }.into());
            }
            if op.offset() + op.ref_span() > reference_length {
                return Err(EditOutOfRangeError {
                    offset: op.offset(),
                    reference_length,
                }
                .into());
            }
            if let EditOp::Insert { bytes, .. } | EditOp::Substitute { bytes, .. } = op {
                if let Some(byte) = bytes.iter().find(|&&b| b >= ALPHABET_SIZE as u8) {
                    return Err(UnknownDigitalSequenceByteError { byte: *byte }.into());
                }
            }
        }

        // inserts (span 0) sort in front of covering edits at the same offset
        ops.sort_by_key(|op| (op.offset(), op.ref_span()));

        for pair in ops.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.offset() == next.offset() && prev.ref_span() == 0 && next.ref_span() == 0 {
                return Err(DuplicateInsertError {
                    offset: prev.offset(),
                }
                .into());
            }
            if prev.offset() + prev.ref_span() > next.offset() {
                return Err(OverlappingEditsError {
                    first_offset: prev.offset(),
                    second_offset: next.offset(),
                }
                .into());
            }
        }

        Ok(Journal { edits: ops })
    }

    pub fn edits(&self) -> &[EditOp] {
        &self.edits
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Length of the member sequence this journal produces.
    pub fn virtual_length(&self, reference_length: usize) -> usize {
        let delta: i64 = self
            .edits
            .iter()
            .map(|op| op.out_len() as i64 - op.ref_span() as i64)
            .sum();
        (reference_length as i64 + delta) as usize
    }
}

/// Random valid edit list for property tests: a left-to-right walk that
/// never produces overlapping edits.
#[cfg(test)]
pub fn random_ops(reference_length: usize, rng: &mut impl rand::Rng) -> Vec<EditOp> {
    let mut ops = vec![];
    let mut pos = 0usize;

    for _ in 0..rng.gen_range(0..=5) {
        pos += rng.gen_range(0..=4);
        if pos > reference_length {
            break;
        }

        match rng.gen_range(0..3) {
            0 => {
                let bytes = (0..rng.gen_range(1..=3)).map(|_| rng.gen_range(0..4u8)).collect();
                ops.push(EditOp::Insert { offset: pos, bytes });
                // the next edit must clear this anchor
                pos += 1;
            }
            1 => {
                let available = reference_length - pos;
                if available == 0 {
                    break;
                }
                let length = rng.gen_range(1..=available.min(3));
                ops.push(EditOp::Delete { offset: pos, length });
                pos += length;
            }
            _ => {
                let available = reference_length - pos;
                if available == 0 {
                    break;
                }
                let length = rng.gen_range(1..=available.min(3));
                let bytes = (0..length).map(|_| rng.gen_range(0..4u8)).collect();
                ops.push(EditOp::Substitute { offset: pos, bytes });
                pos += length;
            }
        }
    }
    ops
}
