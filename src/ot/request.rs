//! Requests: operations stamped with their issuer and causal context.
//!
//! A request says "user U, having seen the state described by vector V,
//! wants this". A `Do` request carries an operation. `Undo` and `Redo`
//! carry nothing; they refer back to an earlier request of the same user,
//! found by counting through the log (see [`Request::associated_request`]).

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;
use crate::log::Log;
use crate::ot::State;
use crate::ot::op::Cid;
use crate::ot::op::Delete;
use crate::ot::op::Operation;
use crate::ot::primitives::Buffer;
use crate::ot::primitives::UserId;
use crate::ot::primitives::Vector;

/// A request carrying an operation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DoRequest {
    pub user: UserId,
    pub vector: Vector,
    pub operation: Operation,
}

impl DoRequest {
    pub fn new(user: UserId, vector: Vector, operation: Operation) -> DoRequest {
        return DoRequest {
            user,
            vector,
            operation,
        };
    }

    /// Apply the operation to the state's buffer and count the request in
    /// the state's vector.
    pub(crate) fn execute(&self, state: &mut State) -> Result<()> {
        self.operation.apply(&mut state.buffer)?;
        state.vector = state.vector.increment(self.user, 1);
        return Ok(());
    }

    /// Rewrite this request to apply after `other`, which was issued
    /// against the same state.
    pub fn transform(&self, other: &DoRequest, cid: Cid) -> Result<DoRequest> {
        let operation = match self.operation {
            Operation::NoOp => Operation::NoOp,
            _ => self.operation.transform(&other.operation, cid)?,
        };
        return Ok(DoRequest {
            user: self.user,
            vector: self.vector.increment(other.user, 1),
            operation,
        });
    }

    /// The request undoing this one, placed `amount` steps later on the
    /// issuer's own axis.
    pub fn mirror(&self, amount: u64) -> Result<DoRequest> {
        return Ok(DoRequest {
            user: self.user,
            vector: self.vector.increment(self.user, amount),
            operation: self.operation.mirror()?,
        });
    }

    /// Move this request past `by` requests of `user` that cancel out in
    /// pairs (do/undo, undo/redo), leaving the operation untouched.
    pub fn fold(&self, user: UserId, by: u64) -> Result<DoRequest> {
        if by % 2 != 0 {
            return Err(Error::OddFold { by });
        }
        return Ok(DoRequest {
            user: self.user,
            vector: self.vector.increment(user, by),
            operation: self.operation.clone(),
        });
    }

    /// A copy whose delete carries the removed text, recovered from the
    /// translated request and the buffer it is about to be applied to.
    /// Requests with any other operation are returned as they are.
    pub fn make_reversible(&self, translated: &DoRequest, buffer: &Buffer) -> Result<DoRequest> {
        let Operation::Delete(delete) = &self.operation else {
            return Ok(self.clone());
        };
        if delete.is_reversible() {
            return Ok(self.clone());
        }
        let text = translated.operation.affected_text(buffer)?;
        return Ok(DoRequest {
            user: self.user,
            vector: self.vector.clone(),
            operation: Operation::Delete(Delete::reversible(delete.position, text)),
        });
    }
}

/// An undo or redo. Which request it refers to follows from its position
/// in the issuer's history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub user: UserId,
    pub vector: Vector,
}

impl HistoryRequest {
    pub fn new(user: UserId, vector: Vector) -> HistoryRequest {
        return HistoryRequest { user, vector };
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    Do(DoRequest),
    Undo(HistoryRequest),
    Redo(HistoryRequest),
}

impl Request {
    pub fn user(&self) -> UserId {
        return match self {
            Request::Do(request) => request.user,
            Request::Undo(request) | Request::Redo(request) => request.user,
        };
    }

    pub fn vector(&self) -> &Vector {
        return match self {
            Request::Do(request) => &request.vector,
            Request::Undo(request) | Request::Redo(request) => &request.vector,
        };
    }

    /// How many requests the issuer had made before this one.
    pub fn own_count(&self) -> u64 {
        return self.vector().get(self.user());
    }

    pub fn is_history(&self) -> bool {
        return !matches!(self, Request::Do(_));
    }

    pub fn as_do(&self) -> Option<&DoRequest> {
        return match self {
            Request::Do(request) => Some(request),
            _ => None,
        };
    }

    /// A copy stamped with a different vector.
    pub fn with_vector(&self, vector: Vector) -> Request {
        return match self {
            Request::Do(request) => Request::Do(DoRequest::new(request.user, vector, request.operation.clone())),
            Request::Undo(request) => Request::Undo(HistoryRequest::new(request.user, vector)),
            Request::Redo(request) => Request::Redo(HistoryRequest::new(request.user, vector)),
        };
    }

    fn same_kind(&self, other: &Request) -> bool {
        return std::mem::discriminant(self) == std::mem::discriminant(other);
    }

    /// The log index of the request an undo or redo refers to.
    ///
    /// Walks the issuer's earlier requests backwards, starting from this
    /// request's own log entry (or the end of the log if it is not logged
    /// yet). Each request of the same kind opens one more level of nesting,
    /// each request of another kind closes one; the request that closes the
    /// level we started in is the answer.
    ///
    /// ```text
    /// do(a) do(b) undo undo redo      redo -> undo #2 -> do(a)
    /// ```
    ///
    /// An undo must land on a do or a redo, a redo on an undo. Anything else
    /// (including running off the start of the log) yields `None`. `Do`
    /// requests have no associated request.
    pub fn associated_request(&self, log: &Log) -> Option<usize> {
        if !self.is_history() {
            return None;
        }
        let user = self.user();
        let own = self.own_count();
        let start = log.position(self).unwrap_or(log.len());

        let mut sequence: u64 = 1;
        for index in (0..start).rev() {
            let entry = log.get(index)?;
            if entry.user() != user || entry.own_count() >= own {
                continue;
            }
            if entry.same_kind(self) {
                sequence += 1;
                continue;
            }
            sequence -= 1;
            if sequence == 0 {
                let valid = match self {
                    Request::Undo(_) => !matches!(entry, Request::Undo(_)),
                    Request::Redo(_) => matches!(entry, Request::Undo(_)),
                    Request::Do(_) => false,
                };
                return if valid { Some(index) } else { None };
            }
        }
        return None;
    }
}

impl From<DoRequest> for Request {
    fn from(request: DoRequest) -> Request {
        return Request::Do(request);
    }
}
