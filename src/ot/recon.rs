//! Reconstruction data for deletes that only know their length.
//!
//! A delete issued as "remove n characters at p" does not carry the text it
//! removes. When it is transformed against a concurrent delete that already
//! removed part of its range, that part disappears from the transformed
//! operation. To be able to invert the original delete later, the lost text
//! is collected here.
//!
//! Offsets are measured in the coordinates of the *original* range: the text
//! the delete covered before any transformation. Segments never overlap and
//! are kept sorted, so restoring them in ascending order into the text that
//! is still present rebuilds the original range exactly.
//!
//! ```text
//! original   a b c d e f g
//! present    a       e   g      (c, d and f removed by others)
//! recon      (2, "cd") (5, "f")
//! ```

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::Result;
use crate::ot::primitives::Buffer;

/// A piece of removed text and the offset at which it is restored.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReconSegment {
    pub offset: u64,
    pub buffer: Buffer,
}

impl ReconSegment {
    pub fn new(offset: u64, buffer: Buffer) -> ReconSegment {
        return ReconSegment { offset, buffer };
    }
}

/// The text transformation removed from a delete, by original offset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recon {
    segments: SmallVec<[ReconSegment; 1]>,
}

impl Recon {
    pub fn new() -> Recon {
        return Recon {
            segments: SmallVec::new(),
        };
    }

    pub fn segments(&self) -> &[ReconSegment] {
        return &self.segments;
    }

    pub fn is_empty(&self) -> bool {
        return self.segments.is_empty();
    }

    /// Total number of characters held for restoration.
    pub fn restored_len(&self) -> u64 {
        return self.segments.iter().map(|s| s.buffer.len()).sum();
    }

    /// Map an offset into the text still present to an offset into the
    /// original range. Removed pieces sitting exactly at the offset count as
    /// lying before it.
    pub fn to_original(&self, offset: u64) -> u64 {
        let mut original = offset;
        for segment in &self.segments {
            if segment.offset > original {
                break;
            }
            original += segment.buffer.len();
        }
        return original;
    }

    /// Record that the present characters `[at, at + removed.len())` were
    /// removed, `removed` being their text. Returns the updated record.
    ///
    /// The removed run may straddle pieces removed earlier, in which case it
    /// is stored as several pieces around them.
    pub fn capture(&self, at: u64, removed: &Buffer) -> Result<Recon> {
        let mut result = self.clone();
        let total = removed.len();
        if total == 0 {
            return Ok(result);
        }

        let mut cursor = self.to_original(at);
        let mut taken = 0;
        for segment in &self.segments {
            if segment.offset < cursor {
                continue;
            }
            let take = (segment.offset - cursor).min(total - taken);
            if take > 0 {
                let piece = removed.slice(taken, taken + take)?;
                result.segments.push(ReconSegment::new(cursor, piece));
                taken += take;
            }
            if taken == total {
                break;
            }
            cursor = segment.offset + segment.buffer.len();
        }
        if taken < total {
            let piece = removed.slice(taken, total)?;
            result.segments.push(ReconSegment::new(cursor, piece));
        }

        result.segments.sort_by_key(|s| s.offset);
        return Ok(result);
    }

    /// Split the record at a present offset. Pieces exactly at the split
    /// point stay with the first half; the second half is rebased to start
    /// at zero.
    pub fn split(&self, at: u64) -> (Recon, Recon) {
        let boundary = self.to_original(at);
        let mut first = Recon::new();
        let mut second = Recon::new();
        for segment in &self.segments {
            if segment.offset < boundary {
                first.segments.push(segment.clone());
            } else {
                let offset = segment.offset - boundary;
                second.segments.push(ReconSegment::new(offset, segment.buffer.clone()));
            }
        }
        return (first, second);
    }

    /// Concatenate with the record of the range that directly follows.
    /// `span` is the original length of the range this record belongs to.
    pub fn merge(&self, span: u64, other: &Recon) -> Recon {
        let mut result = self.clone();
        for segment in &other.segments {
            let offset = segment.offset + span;
            result.segments.push(ReconSegment::new(offset, segment.buffer.clone()));
        }
        return result;
    }

    /// Put the recorded pieces back into `buffer`, which holds the text of
    /// the range that is still present.
    pub fn restore(&self, buffer: &mut Buffer) -> Result<()> {
        for segment in &self.segments {
            buffer.splice(segment.offset, 0, &segment.buffer)?;
        }
        return Ok(());
    }
}
