//! Attributed text storage.
//!
//! A buffer is a sequence of segments, each segment a run of text written by
//! a single user. Positions and lengths count Unicode scalar values, not
//! bytes, so a position means the same thing on every replica regardless of
//! how the text is encoded on the wire.
//!
//! Invariants of a normalized buffer:
//! - no segment is empty
//! - no two adjacent segments share a user (segments are maximally merged)
//! - `len` equals the sum of the segment lengths
//!
//! Complexity (s = number of segments):
//! - char_at: O(s)
//! - slice: O(s)
//! - splice: O(s), always followed by a compaction pass

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use super::id::UserId;
use crate::error::Error;
use crate::error::Result;

/// A run of text written by one user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    pub user: UserId,
    pub text: String,
}

/// Byte offset of the `index`-th character, or the end of the string.
fn byte_offset(text: &str, index: u64) -> usize {
    return text
        .char_indices()
        .nth(index as usize)
        .map(|(offset, _)| offset)
        .unwrap_or(text.len());
}

impl Segment {
    /// Create a segment.
    pub fn new(user: UserId, text: impl Into<String>) -> Segment {
        return Segment {
            user,
            text: text.into(),
        };
    }

    /// Length in characters.
    pub fn len(&self) -> u64 {
        return self.text.chars().count() as u64;
    }

    pub fn is_empty(&self) -> bool {
        return self.text.is_empty();
    }

    /// Append `other` to this segment if both were written by the same user.
    /// Returns whether the join happened.
    pub fn join(&mut self, other: &Segment) -> bool {
        if self.user != other.user {
            return false;
        }
        self.text.push_str(&other.text);
        return true;
    }

    /// The characters `[start, end)` of this segment, same author.
    fn slice(&self, start: u64, end: u64) -> Segment {
        let from = byte_offset(&self.text, start);
        let to = byte_offset(&self.text, end);
        return Segment::new(self.user, &self.text[from..to]);
    }
}

/// A sequence of attributed segments with a cached length.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Segment>", into = "Vec<Segment>")]
pub struct Buffer {
    segments: SmallVec<[Segment; 2]>,
    len: u64,
}

impl Buffer {
    /// Create an empty buffer.
    pub fn new() -> Buffer {
        return Buffer {
            segments: SmallVec::new(),
            len: 0,
        };
    }

    /// Create a buffer holding `text` written by a single user.
    pub fn from_text(user: UserId, text: &str) -> Buffer {
        return Buffer::from_segments([Segment::new(user, text)]);
    }

    /// Create a buffer from segments, normalizing them.
    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Buffer {
        let mut buffer = Buffer {
            segments: segments.into_iter().collect(),
            len: 0,
        };
        buffer.compact();
        return buffer;
    }

    /// Length in characters.
    #[inline]
    pub fn len(&self) -> u64 {
        return self.len;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    pub fn segments(&self) -> &[Segment] {
        return &self.segments;
    }

    /// The character at `index`, if any.
    pub fn char_at(&self, index: u64) -> Option<char> {
        let mut start = 0;
        for segment in &self.segments {
            let len = segment.len();
            if index < start + len {
                return segment.text.chars().nth((index - start) as usize);
            }
            start += len;
        }
        return None;
    }

    /// A new buffer holding the characters `[start, end)`, authorship kept.
    pub fn slice(&self, start: u64, end: u64) -> Result<Buffer> {
        if start > end || end > self.len {
            return Err(Error::OutOfRange {
                start,
                end,
                len: self.len,
            });
        }

        let mut segments: SmallVec<[Segment; 2]> = SmallVec::new();
        let mut offset = 0;
        for segment in &self.segments {
            let seg_start = offset;
            let seg_end = offset + segment.len();
            offset = seg_end;

            if seg_end <= start {
                continue;
            }
            if seg_start >= end {
                break;
            }
            let from = start.max(seg_start) - seg_start;
            let to = end.min(seg_end) - seg_start;
            segments.push(segment.slice(from, to));
        }

        return Ok(Buffer {
            segments,
            len: end - start,
        });
    }

    /// Remove `remove` characters at `start` and put `insert` in their place.
    ///
    /// This is the only mutating primitive; every operation applies itself
    /// through it. Fails without touching the buffer if the removed range
    /// runs past the end.
    pub fn splice(&mut self, start: u64, remove: u64, insert: &Buffer) -> Result<()> {
        let end = start.saturating_add(remove);
        if end > self.len {
            return Err(Error::OutOfRange {
                start,
                end,
                len: self.len,
            });
        }

        let mut segments: SmallVec<[Segment; 2]> =
            SmallVec::with_capacity(self.segments.len() + insert.segments.len() + 1);
        let mut inserted = false;
        let mut offset = 0;
        for segment in &self.segments {
            let seg_start = offset;
            let seg_end = offset + segment.len();
            offset = seg_end;

            // Head: the part before the removed range.
            if seg_start < start {
                segments.push(segment.slice(0, seg_end.min(start) - seg_start));
            }
            if !inserted && seg_end >= start {
                segments.extend(insert.segments.iter().cloned());
                inserted = true;
            }
            // Tail: the part after the removed range.
            if seg_end > end {
                segments.push(segment.slice(end.max(seg_start) - seg_start, seg_end - seg_start));
            }
        }
        if !inserted {
            segments.extend(insert.segments.iter().cloned());
        }

        self.segments = segments;
        self.len = self.len - remove + insert.len;
        self.compact();
        return Ok(());
    }

    /// Append another buffer at the end.
    pub fn append(&mut self, other: &Buffer) {
        self.segments.extend(other.segments.iter().cloned());
        self.compact();
    }

    /// Drop empty segments and merge adjacent segments by the same user.
    pub fn compact(&mut self) {
        let mut merged: SmallVec<[Segment; 2]> = SmallVec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            if segment.is_empty() {
                continue;
            }
            let joined = match merged.last_mut() {
                Some(last) => last.join(&segment),
                None => false,
            };
            if !joined {
                merged.push(segment);
            }
        }
        self.len = merged.iter().map(Segment::len).sum();
        self.segments = merged;
    }
}

impl fmt::Display for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            f.write_str(&segment.text)?;
        }
        return Ok(());
    }
}

impl From<Vec<Segment>> for Buffer {
    fn from(segments: Vec<Segment>) -> Buffer {
        return Buffer::from_segments(segments);
    }
}

impl From<Buffer> for Vec<Segment> {
    fn from(buffer: Buffer) -> Vec<Segment> {
        return buffer.segments.into_vec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);

    fn authors(buffer: &Buffer) -> Vec<(u32, &str)> {
        return buffer
            .segments()
            .iter()
            .map(|s| (s.user.0, s.text.as_str()))
            .collect();
    }

    #[test]
    fn segment_join_requires_same_user() {
        let mut a = Segment::new(ALICE, "ab");
        assert!(a.join(&Segment::new(ALICE, "c")));
        assert_eq!(a.text, "abc");

        assert!(!a.join(&Segment::new(BOB, "d")));
        assert_eq!(a.text, "abc");
    }

    #[test]
    fn empty_buffer() {
        let buffer = Buffer::from_text(ALICE, "");
        assert!(buffer.is_empty());
        assert!(buffer.segments().is_empty());
        assert_eq!(buffer, Buffer::new());
    }

    #[test]
    fn from_segments_normalizes() {
        let buffer = Buffer::from_segments([
            Segment::new(ALICE, "ab"),
            Segment::new(ALICE, ""),
            Segment::new(ALICE, "c"),
            Segment::new(BOB, "d"),
        ]);
        assert_eq!(authors(&buffer), vec![(1, "abc"), (2, "d")]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn compact_joins_runs_only() {
        let buffer = Buffer::from_segments([
            Segment::new(BOB, ""),
            Segment::new(ALICE, "a"),
            Segment::new(BOB, "b"),
            Segment::new(BOB, "c"),
            Segment::new(ALICE, ""),
            Segment::new(BOB, "d"),
            Segment::new(ALICE, "é"),
        ]);
        assert_eq!(authors(&buffer), vec![(1, "a"), (2, "bcd"), (1, "é")]);
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn char_at_counts_characters() {
        let buffer = Buffer::from_segments([Segment::new(ALICE, "hé"), Segment::new(BOB, "ü!")]);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.char_at(1), Some('é'));
        assert_eq!(buffer.char_at(2), Some('ü'));
        assert_eq!(buffer.char_at(4), None);
    }

    #[test]
    fn slice_keeps_authorship() {
        let buffer = Buffer::from_segments([Segment::new(ALICE, "hello"), Segment::new(BOB, "world")]);

        let middle = buffer.slice(3, 7).unwrap();
        assert_eq!(middle.to_string(), "lowo");
        assert_eq!(authors(&middle), vec![(1, "lo"), (2, "wo")]);

        assert_eq!(buffer.slice(0, 0).unwrap(), Buffer::new());
        assert_eq!(buffer.slice(10, 10).unwrap(), Buffer::new());
        assert_eq!(buffer.slice(0, 10).unwrap(), buffer);
    }

    #[test]
    fn slice_out_of_bounds() {
        let buffer = Buffer::from_text(ALICE, "abc");
        assert!(matches!(buffer.slice(0, 4), Err(Error::OutOfRange { .. })));
        assert!(buffer.slice(2, 1).is_err());
    }

    #[test]
    fn splice_insert_inside_segment() {
        let mut buffer = Buffer::from_text(ALICE, "held");
        buffer.splice(2, 0, &Buffer::from_text(BOB, "XY")).unwrap();

        assert_eq!(buffer.to_string(), "heXYld");
        assert_eq!(authors(&buffer), vec![(1, "he"), (2, "XY"), (1, "ld")]);
        assert_eq!(buffer.len(), 6);
    }

    #[test]
    fn splice_at_boundaries() {
        let mut buffer = Buffer::from_text(ALICE, "mid");
        buffer.splice(0, 0, &Buffer::from_text(BOB, "<")).unwrap();
        buffer.splice(4, 0, &Buffer::from_text(BOB, ">")).unwrap();
        assert_eq!(buffer.to_string(), "<mid>");

        let mut empty = Buffer::new();
        empty.splice(0, 0, &Buffer::from_text(ALICE, "x")).unwrap();
        assert_eq!(empty.to_string(), "x");
    }

    #[test]
    fn splice_removal_across_segments_merges_neighbours() {
        let mut buffer = Buffer::from_segments([
            Segment::new(ALICE, "abc"),
            Segment::new(BOB, "XYZ"),
            Segment::new(ALICE, "def"),
        ]);
        buffer.splice(2, 5, &Buffer::new()).unwrap();

        assert_eq!(buffer.to_string(), "abef");
        assert_eq!(authors(&buffer), vec![(1, "abef")]);
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn splice_replace() {
        let mut buffer = Buffer::from_text(ALICE, "hello world");
        buffer.splice(6, 5, &Buffer::from_text(BOB, "there")).unwrap();
        assert_eq!(buffer.to_string(), "hello there");
        assert_eq!(authors(&buffer), vec![(1, "hello "), (2, "there")]);
    }

    #[test]
    fn splice_out_of_range_leaves_buffer_untouched() {
        let mut buffer = Buffer::from_text(ALICE, "abc");
        let result = buffer.splice(2, 2, &Buffer::new());

        assert!(matches!(result, Err(Error::OutOfRange { start: 2, end: 4, len: 3 })));
        assert_eq!(buffer.to_string(), "abc");
    }

    #[test]
    fn append_joins_same_author() {
        let mut buffer = Buffer::from_text(ALICE, "ab");
        buffer.append(&Buffer::from_text(ALICE, "cd"));
        assert_eq!(authors(&buffer), vec![(1, "abcd")]);
    }

    #[test]
    fn serde_round_trip() {
        let buffer = Buffer::from_segments([Segment::new(ALICE, "ab"), Segment::new(BOB, "c")]);
        let json = serde_json::to_string(&buffer).unwrap();
        assert_eq!(json, r#"[{"user":1,"text":"ab"},{"user":2,"text":"c"}]"#);

        let back: Buffer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, buffer);
        assert_eq!(back.len(), 3);
    }
}
