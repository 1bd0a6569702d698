//! Error type shared by every layer of the engine.

use thiserror::Error;

use crate::ot::primitives::UserId;
use crate::ot::primitives::Vector;

/// Errors raised by buffers, operations and replicas.
///
/// Requests that are not yet causally ready are never errors: they wait in
/// the queue. Everything here either points at a malformed request or at a
/// broken invariant upstream.
#[derive(Debug, Error)]
pub enum Error {
    /// A splice or slice addressed characters outside the buffer.
    #[error("range {start}..{end} is out of bounds for a buffer of length {len}")]
    OutOfRange { start: u64, end: u64, len: u64 },

    /// An undo or redo request has no request it could refer to.
    #[error("history request by user {user} at {vector} has no associated request")]
    MalformedHistoryReference { user: UserId, vector: Vector },

    /// No translation path leads to the requested state.
    #[error("no translation path to state {vector}")]
    UnreachableState { vector: Vector },

    /// A delete that only knows its length cannot be inverted.
    #[error("cannot mirror a delete whose removed text is unknown")]
    Irreversible,

    /// Two deletes can only be merged when both or neither know their text.
    #[error("cannot merge a reversible delete with a non-reversible one")]
    MixedReversibility,

    /// Affected text only exists for deletes and splits of deletes.
    #[error("operation does not remove any text")]
    NotADelete,

    /// Folding skips do/undo pairs, so it always moves by an even amount.
    #[error("fold amount {by} is not a multiple of two")]
    OddFold { by: u64 },

    /// A vector string did not have the `user:count;...` shape.
    #[error("invalid vector string: {0:?}")]
    InvalidVector(String),

    /// A snapshot, trace or config document failed to (de)serialize.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
