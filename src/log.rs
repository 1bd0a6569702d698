//! Append-only history of executed requests.
//!
//! Entries are stored in execution order and never change once pushed.
//! Requests refer to each other (an undo to the request it undoes) by log
//! index, never by reference, so the log owns every request outright.
//!
//! Two indexes are kept alongside the entries:
//! - `(user, count) -> index`, where `count` is the issuer's own component
//!   of the request's vector. Only the first entry for a pair is indexed.
//! - `user -> lowest count` over that user's entries.
//!
//! Complexity (n = entries):
//! - push: O(1) amortized
//! - request_by_user / position: O(1) expected
//! - first_count: O(1) expected

use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde::Serialize;

use crate::ot::Request;
use crate::ot::primitives::UserId;

/// The executed requests of one replica.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Request>", into = "Vec<Request>")]
pub struct Log {
    entries: Vec<Request>,
    by_user: FxHashMap<(UserId, u64), usize>,
    first: FxHashMap<UserId, u64>,
}

impl Log {
    /// Create a new empty log.
    pub fn new() -> Log {
        return Log {
            entries: Vec::new(),
            by_user: FxHashMap::default(),
            first: FxHashMap::default(),
        };
    }

    /// Return the number of entries in the log.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// Return true if the log is empty.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Append a request. Returns its index.
    pub fn push(&mut self, request: Request) -> usize {
        let index = self.entries.len();
        let user = request.user();
        let count = request.own_count();

        self.by_user.entry((user, count)).or_insert(index);
        self.first
            .entry(user)
            .and_modify(|first| *first = (*first).min(count))
            .or_insert(count);
        self.entries.push(request);
        return index;
    }

    /// Get an entry by index.
    pub fn get(&self, index: usize) -> Option<&Request> {
        return self.entries.get(index);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Request> + '_ {
        return self.entries.iter();
    }

    /// The index of `request`, if this exact request was logged.
    pub fn position(&self, request: &Request) -> Option<usize> {
        let index = *self.by_user.get(&(request.user(), request.own_count()))?;
        if self.entries.get(index)? == request {
            return Some(index);
        }
        return None;
    }

    /// The logged request `user` issued after `count` of their own requests.
    pub fn request_by_user(&self, user: UserId, count: u64) -> Option<&Request> {
        let index = *self.by_user.get(&(user, count))?;
        return self.entries.get(index);
    }

    /// The lowest own count among `user`'s logged requests.
    pub fn first_count(&self, user: UserId) -> Option<u64> {
        return self.first.get(&user).copied();
    }
}

impl PartialEq for Log {
    fn eq(&self, other: &Log) -> bool {
        return self.entries == other.entries;
    }
}

impl Eq for Log {}

impl From<Vec<Request>> for Log {
    fn from(entries: Vec<Request>) -> Log {
        let mut log = Log::new();
        for request in entries {
            log.push(request);
        }
        return log;
    }
}

impl From<Log> for Vec<Request> {
    fn from(log: Log) -> Vec<Request> {
        return log.entries;
    }
}
