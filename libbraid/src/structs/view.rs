use super::journal::EditOp;
use super::{Journal, Sequence};

#[derive(Clone, Copy, Debug)]
enum SegmentSource {
    /// Pass-through reference content starting at this reference offset
    Reference(usize),
    /// Content carried by the journal edit at this index
    Patch(usize),
}

#[derive(Clone, Copy, Debug)]
struct Segment {
    virtual_start: usize,
    length: usize,
    source: SegmentSource,
}

/// The lazy, logical sequence produced by applying one journal to the
/// reference. No member content is materialized; reads resolve into either
/// the reference or the journal's own edit content.
///
/// Sequential scanning via [`MemberView::cursor`] is the primary access
/// pattern. `byte_at` and `slice` exist for verification and testing.
pub struct MemberView<'a> {
    reference: &'a Sequence,
    journal: &'a Journal,
    segments: Vec<Segment>,
    length: usize,
}

impl<'a> MemberView<'a> {
    pub fn new(reference: &'a Sequence, journal: &'a Journal) -> Self {
        let mut segments: Vec<Segment> = vec![];
        let mut ref_pos = 0usize;
        let mut virtual_pos = 0usize;

        for (edit_idx, op) in journal.edits().iter().enumerate() {
            if op.offset() > ref_pos {
                let length = op.offset() - ref_pos;
                segments.push(Segment {
                    virtual_start: virtual_pos,
                    length,
                    source: SegmentSource::Reference(ref_pos),
                });
                virtual_pos += length;
                ref_pos = op.offset();
            }

            if op.out_len() > 0 {
                segments.push(Segment {
                    virtual_start: virtual_pos,
                    length: op.out_len(),
                    source: SegmentSource::Patch(edit_idx),
                });
                virtual_pos += op.out_len();
            }
            ref_pos += op.ref_span();
        }

        if ref_pos < reference.length {
            segments.push(Segment {
                virtual_start: virtual_pos,
                length: reference.length - ref_pos,
                source: SegmentSource::Reference(ref_pos),
            });
            virtual_pos += reference.length - ref_pos;
        }

        debug_assert_eq!(virtual_pos, journal.virtual_length(reference.length));

        MemberView {
            reference,
            journal,
            segments,
            length: virtual_pos,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    fn segment_bytes(&self, segment: &Segment) -> &[u8] {
        match segment.source {
            SegmentSource::Reference(ref_start) => {
                &self.reference.digital_bytes[ref_start..ref_start + segment.length]
            }
            SegmentSource::Patch(edit_idx) => match &self.journal.edits()[edit_idx] {
                EditOp::Insert { bytes, .. } | EditOp::Substitute { bytes, .. } => bytes,
                EditOp::Delete { .. } => unreachable!("deletions produce no segment"),
            },
        }
    }

    /// Digital byte at virtual position `pos`. Logarithmic in the number
    /// of edits. Panics if `pos` is past the end of the view.
    pub fn byte_at(&self, pos: usize) -> u8 {
        assert!(pos < self.length, "virtual position {pos} out of range");
        let seg_idx = self
            .segments
            .partition_point(|s| s.virtual_start + s.length <= pos);
        let segment = &self.segments[seg_idx];
        self.segment_bytes(segment)[pos - segment.virtual_start]
    }

    /// Digital bytes over `[start, end)`, clamped to the view's length.
    pub fn slice(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.length);
        if start >= end {
            return vec![];
        }
        self.cursor_at(start).take(end - start).collect()
    }

    pub fn to_digital_vec(&self) -> Vec<u8> {
        self.cursor().collect()
    }

    pub fn cursor(&self) -> Cursor<'_, 'a> {
        Cursor {
            view: self,
            seg_idx: 0,
            offset: 0,
        }
    }

    pub fn cursor_at(&self, pos: usize) -> Cursor<'_, 'a> {
        let seg_idx = self
            .segments
            .partition_point(|s| s.virtual_start + s.length <= pos);
        let offset = match self.segments.get(seg_idx) {
            Some(segment) => pos - segment.virtual_start,
            None => 0,
        };
        Cursor {
            view: self,
            seg_idx,
            offset,
        }
    }
}

/// Amortized constant-time sequential reader over a [`MemberView`].
pub struct Cursor<'v, 'a> {
    view: &'v MemberView<'a>,
    seg_idx: usize,
    offset: usize,
}

impl<'v, 'a> Iterator for Cursor<'v, 'a> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let segment = self.view.segments.get(self.seg_idx)?;
        let byte = self.view.segment_bytes(segment)[self.offset];
        self.offset += 1;
        if self.offset == segment.length {
            self.seg_idx += 1;
            self.offset = 0;
        }
        Some(byte)
    }
}
