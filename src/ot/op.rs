//! Edit operations and their transformation rules.
//!
//! An operation is always expressed against some buffer state. `transform`
//! rewrites an operation so it can be applied after a concurrent operation
//! that was expressed against the same state:
//!
//! ```text
//!         S
//!     a /   \ b
//!      S_a   S_b
//!  b.t(a) \ / a.t(b)
//!         S'
//! ```
//!
//! Both paths around the square lead to the same buffer (TP1). Requests and
//! operations are values: transforming never mutates its inputs, because the
//! same logged request is translated to many different target states.
//!
//! `Split` only appears as the result of transforming a delete against an
//! insert that landed strictly inside it. Both halves are expressed against
//! the same state; applying the split applies the first half and then the
//! second half transformed against the first.

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::ot::primitives::Buffer;
use crate::ot::recon::Recon;

/// Which side of a conflict yields.
///
/// Only inserts at the same position really conflict. The operation picked
/// by the cid is the one that gets shifted past the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cid {
    /// The operation being transformed yields.
    Own,
    /// The operation transformed against yields.
    Other,
}

/// Insert `text` so that it starts at `position`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Insert {
    pub position: u64,
    pub text: Buffer,
}

impl Insert {
    pub fn new(position: u64, text: Buffer) -> Insert {
        return Insert { position, text };
    }

    pub fn len(&self) -> u64 {
        return self.text.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.text.is_empty();
    }

    fn shifted(&self, position: u64) -> Insert {
        return Insert::new(position, self.text.clone());
    }

    fn transform_insert(&self, other: &Insert, cid: Cid) -> Insert {
        if self.position < other.position || (self.position == other.position && cid == Cid::Other) {
            return self.clone();
        }
        return self.shifted(self.position + other.len());
    }

    fn transform_delete(&self, other: &Delete) -> Insert {
        if self.position >= other.position + other.len() {
            return self.shifted(self.position - other.len());
        }
        if self.position < other.position {
            return self.clone();
        }
        return self.shifted(other.position);
    }
}

/// What a delete knows about the text it removes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Removal {
    /// The removed text itself. The delete can be mirrored.
    Text(Buffer),
    /// Only the number of removed characters.
    Length(u64),
}

/// Remove characters starting at `position`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Delete {
    pub position: u64,
    pub what: Removal,
    #[serde(default, skip_serializing_if = "Recon::is_empty")]
    pub recon: Recon,
}

impl Delete {
    /// A delete that only knows how many characters it removes.
    pub fn new(position: u64, len: u64) -> Delete {
        return Delete {
            position,
            what: Removal::Length(len),
            recon: Recon::new(),
        };
    }

    /// A delete that carries the text it removes.
    pub fn reversible(position: u64, text: Buffer) -> Delete {
        return Delete {
            position,
            what: Removal::Text(text),
            recon: Recon::new(),
        };
    }

    pub fn len(&self) -> u64 {
        return match &self.what {
            Removal::Text(text) => text.len(),
            Removal::Length(len) => *len,
        };
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    pub fn is_reversible(&self) -> bool {
        return matches!(self.what, Removal::Text(_));
    }

    fn end(&self) -> u64 {
        return self.position + self.len();
    }

    fn moved(&self, position: u64) -> Delete {
        return Delete {
            position,
            what: self.what.clone(),
            recon: self.recon.clone(),
        };
    }

    /// The removed text between `start` and `end`, if this delete knows it.
    fn removed_text(&self, start: u64, end: u64) -> Result<Option<Buffer>> {
        return match &self.what {
            Removal::Text(text) => Ok(Some(text.slice(start, end)?)),
            Removal::Length(_) => Ok(None),
        };
    }

    /// Shrink this delete by `len` characters at offset `at` within its own
    /// range, because another delete already removed them. `removed` is the
    /// text of those characters when known.
    fn remove_range(&self, position: u64, at: u64, len: u64, removed: Option<Buffer>) -> Result<Delete> {
        let what = match &self.what {
            Removal::Text(text) => {
                let mut text = text.clone();
                text.splice(at, len, &Buffer::new())?;
                Removal::Text(text)
            }
            Removal::Length(total) => Removal::Length(total - len),
        };
        let recon = match removed {
            Some(removed) => self.recon.capture(at, &removed)?,
            None => self.recon.clone(),
        };
        return Ok(Delete { position, what, recon });
    }

    /// Divide into two adjoining deletes at offset `at` within the range.
    pub fn split(&self, at: u64) -> Result<(Delete, Delete)> {
        let (first_what, second_what) = match &self.what {
            Removal::Text(text) => (
                Removal::Text(text.slice(0, at)?),
                Removal::Text(text.slice(at, text.len())?),
            ),
            Removal::Length(len) => {
                if at > *len {
                    return Err(Error::OutOfRange {
                        start: at,
                        end: at,
                        len: *len,
                    });
                }
                (Removal::Length(at), Removal::Length(len - at))
            }
        };
        let (first_recon, second_recon) = self.recon.split(at);

        let first = Delete {
            position: self.position,
            what: first_what,
            recon: first_recon,
        };
        let second = Delete {
            position: self.position + at,
            what: second_what,
            recon: second_recon,
        };
        return Ok((first, second));
    }

    /// Join with the delete that directly follows this one's range. Both
    /// must be reversible, or neither.
    pub fn merge(&self, other: &Delete) -> Result<Delete> {
        let what = match (&self.what, &other.what) {
            (Removal::Text(a), Removal::Text(b)) => {
                let mut text = a.clone();
                text.append(b);
                Removal::Text(text)
            }
            (Removal::Length(a), Removal::Length(b)) => Removal::Length(a + b),
            _ => return Err(Error::MixedReversibility),
        };
        let span = self.len() + self.recon.restored_len();
        return Ok(Delete {
            position: self.position,
            what,
            recon: self.recon.merge(span, &other.recon),
        });
    }

    /// The text this delete originally targeted, rebuilt from what is still
    /// in `buffer` plus the pieces collected while transforming.
    pub fn affected_text(&self, buffer: &Buffer) -> Result<Buffer> {
        let mut text = buffer.slice(self.position, self.end())?;
        self.recon.restore(&mut text)?;
        return Ok(text);
    }

    fn transform_insert(&self, other: &Insert) -> Result<Operation> {
        if other.is_empty() || other.position >= self.end() {
            return Ok(Operation::Delete(self.clone()));
        }
        if other.position <= self.position {
            return Ok(Operation::Delete(self.moved(self.position + other.len())));
        }
        let (first, mut second) = self.split(other.position - self.position)?;
        second.position += other.len();
        return Ok(Operation::split(Operation::Delete(first), Operation::Delete(second)));
    }

    fn transform_delete(&self, other: &Delete) -> Result<Delete> {
        let (start, end) = (self.position, self.end());
        let (other_start, other_end) = (other.position, other.end());

        // disjoint
        if end <= other_start {
            return Ok(self.clone());
        }
        if start >= other_end {
            return Ok(self.moved(start - other.len()));
        }

        if other_start <= start && other_end >= end {
            // swallowed whole
            let removed = other.removed_text(start - other_start, end - other_start)?;
            return self.remove_range(other_start, 0, self.len(), removed);
        }
        if other_start <= start {
            // head removed
            let removed = other.removed_text(start - other_start, other.len())?;
            return self.remove_range(other_start, 0, other_end - start, removed);
        }
        if other_end >= end {
            // tail removed
            let removed = other.removed_text(0, end - other_start)?;
            return self.remove_range(start, other_start - start, end - other_start, removed);
        }
        // hole punched in the middle
        let removed = other.removed_text(0, other.len())?;
        return self.remove_range(start, other_start - start, other.len(), removed);
    }
}

/// An edit to a buffer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    NoOp,
    Insert(Insert),
    Delete(Delete),
    Split {
        first: Box<Operation>,
        second: Box<Operation>,
    },
}

impl Operation {
    pub fn insert(position: u64, text: Buffer) -> Operation {
        return Operation::Insert(Insert::new(position, text));
    }

    pub fn delete(position: u64, len: u64) -> Operation {
        return Operation::Delete(Delete::new(position, len));
    }

    pub fn split(first: Operation, second: Operation) -> Operation {
        return Operation::Split {
            first: Box::new(first),
            second: Box::new(second),
        };
    }

    /// Apply to a buffer. Fails if the operation addresses text beyond the
    /// end of the buffer.
    pub fn apply(&self, buffer: &mut Buffer) -> Result<()> {
        return match self {
            Operation::NoOp => Ok(()),
            Operation::Insert(insert) => buffer.splice(insert.position, 0, &insert.text),
            Operation::Delete(delete) => buffer.splice(delete.position, delete.len(), &Buffer::new()),
            Operation::Split { first, second } => {
                first.apply(buffer)?;
                second.transform(first, Cid::Own)?.apply(buffer)
            }
        };
    }

    /// Rewrite this operation to apply after `other`. The `cid` settles
    /// same-position inserts and is ignored everywhere else.
    pub fn transform(&self, other: &Operation, cid: Cid) -> Result<Operation> {
        return match (self, other) {
            (_, Operation::Split { first, second }) => {
                let transformed = self.transform(first, cid)?;
                let second = second.transform(first, Cid::Own)?;
                transformed.transform(&second, cid)
            }
            (Operation::NoOp, _) | (_, Operation::NoOp) => Ok(self.clone()),
            (Operation::Split { first, second }, _) => Ok(Operation::split(
                first.transform(other, cid)?,
                second.transform(other, cid)?,
            )),
            (Operation::Insert(insert), Operation::Insert(other)) => {
                Ok(Operation::Insert(insert.transform_insert(other, cid)))
            }
            (Operation::Insert(insert), Operation::Delete(other)) => {
                Ok(Operation::Insert(insert.transform_delete(other)))
            }
            (Operation::Delete(delete), Operation::Insert(other)) => delete.transform_insert(other),
            (Operation::Delete(delete), Operation::Delete(other)) => {
                Ok(Operation::Delete(delete.transform_delete(other)?))
            }
        };
    }

    /// The operation undoing this one, expressed against the state this one
    /// produces.
    pub fn mirror(&self) -> Result<Operation> {
        return match self {
            Operation::NoOp => Ok(Operation::NoOp),
            Operation::Insert(insert) => Ok(Operation::Delete(Delete::reversible(
                insert.position,
                insert.text.clone(),
            ))),
            Operation::Delete(delete) => match &delete.what {
                Removal::Text(text) => Ok(Operation::insert(delete.position, text.clone())),
                Removal::Length(_) => Err(Error::Irreversible),
            },
            Operation::Split { first, second } => {
                let second = second.transform(first, Cid::Own)?;
                Ok(Operation::split(first.mirror()?, second.mirror()?))
            }
        };
    }

    /// Whether transforming this operation may need a tie-break.
    pub fn requires_cid(&self) -> bool {
        return matches!(self, Operation::Insert(_) | Operation::Split { .. });
    }

    /// Decide which operation yields when `self` is transformed against
    /// `other`, if their positions decide it. `None` means they do not and
    /// the caller has to break the tie.
    pub fn cid(&self, other: &Operation) -> Option<Cid> {
        return match (self, other) {
            (Operation::Insert(a), Operation::Insert(b)) => {
                if a.position < b.position {
                    Some(Cid::Other)
                } else if a.position > b.position {
                    Some(Cid::Own)
                } else {
                    None
                }
            }
            (Operation::Insert(_), _) => Some(Cid::Other),
            (Operation::Split { .. }, Operation::Split { .. }) => None,
            (Operation::Split { .. }, _) => Some(Cid::Own),
            _ => None,
        };
    }

    /// The text a delete (or split of deletes) originally targeted, given
    /// the buffer it is about to be applied to.
    pub fn affected_text(&self, buffer: &Buffer) -> Result<Buffer> {
        return match self {
            Operation::Delete(delete) => delete.affected_text(buffer),
            Operation::Split { first, second } => {
                let mut text = first.affected_text(buffer)?;
                text.append(&second.affected_text(buffer)?);
                Ok(text)
            }
            _ => Err(Error::NotADelete),
        };
    }

    /// True for a delete that only knows the length of what it removes.
    pub fn is_irreversible_delete(&self) -> bool {
        return match self {
            Operation::Delete(delete) => !delete.is_reversible(),
            _ => false,
        };
    }
}
