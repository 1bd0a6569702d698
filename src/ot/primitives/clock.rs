//! State vectors for tracking which requests a replica has seen.
//!
//! A state vector maps every user to the number of that user's requests
//! incorporated into a state. Absent users count as zero, and zero
//! components are never stored, so two vectors describing the same state
//! compare (and hash) equal no matter how they were built.
//!
//! Complexity (n = number of users with a non-zero component):
//! - get: O(log n)
//! - increment / decrement: O(n) (vectors are values, updates copy)
//! - sup / compare: O(n)

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use super::id::UserId;
use crate::error::Error;

/// A state vector.
///
/// The partial order is causal: `a <= b` iff every component of `a` is at
/// most the matching component of `b`. Vectors of concurrent states are
/// incomparable, so `partial_cmp` returns `None` for them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "BTreeMap<UserId, u64>", into = "BTreeMap<UserId, u64>")]
pub struct Vector {
    /// Non-zero components, keyed by user.
    entries: BTreeMap<UserId, u64>,
}

impl Vector {
    /// Create the empty vector (the initial state).
    pub fn new() -> Vector {
        return Vector {
            entries: BTreeMap::new(),
        };
    }

    /// Get the component for a user.
    #[inline]
    pub fn get(&self, user: UserId) -> u64 {
        return *self.entries.get(&user).unwrap_or(&0);
    }

    fn set(&mut self, user: UserId, count: u64) {
        if count == 0 {
            self.entries.remove(&user);
        } else {
            self.entries.insert(user, count);
        }
    }

    /// Return a copy with one component replaced.
    pub fn with(&self, user: UserId, count: u64) -> Vector {
        let mut result = self.clone();
        result.set(user, count);
        return result;
    }

    /// Return a copy with one component increased by `by`.
    pub fn increment(&self, user: UserId, by: u64) -> Vector {
        return self.with(user, self.get(user) + by);
    }

    /// Return a copy with one component decreased by `by`, stopping at zero.
    pub fn decrement(&self, user: UserId, by: u64) -> Vector {
        return self.with(user, self.get(user).saturating_sub(by));
    }

    /// The supremum (least common successor) of two vectors.
    pub fn sup(&self, other: &Vector) -> Vector {
        let mut result = self.clone();
        for (&user, &count) in &other.entries {
            if count > result.get(user) {
                result.set(user, count);
            }
        }
        return result;
    }

    /// Users with a non-zero component, in ascending order.
    pub fn users(&self) -> impl Iterator<Item = UserId> + '_ {
        return self.entries.keys().copied();
    }

    /// Non-zero components, in ascending user order.
    pub fn iter(&self) -> impl Iterator<Item = (UserId, u64)> + '_ {
        return self.entries.iter().map(|(&user, &count)| (user, count));
    }

    /// Number of users with a non-zero component.
    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    /// True for the initial state.
    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    /// Sum of all components: the total number of requests in the state.
    pub fn total(&self) -> u64 {
        return self.entries.values().sum();
    }

    fn dominated_by(&self, other: &Vector) -> bool {
        return self.entries.iter().all(|(&user, &count)| count <= other.get(user));
    }
}

impl PartialOrd for Vector {
    fn partial_cmp(&self, other: &Vector) -> Option<Ordering> {
        return match (self.dominated_by(other), other.dominated_by(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => None,
        };
    }
}

impl From<BTreeMap<UserId, u64>> for Vector {
    fn from(entries: BTreeMap<UserId, u64>) -> Vector {
        let mut vector = Vector::new();
        for (user, count) in entries {
            vector.set(user, count);
        }
        return vector;
    }
}

impl From<Vector> for BTreeMap<UserId, u64> {
    fn from(vector: Vector) -> BTreeMap<UserId, u64> {
        return vector.entries;
    }
}

impl FromIterator<(UserId, u64)> for Vector {
    fn from_iter<I: IntoIterator<Item = (UserId, u64)>>(iter: I) -> Vector {
        let mut vector = Vector::new();
        for (user, count) in iter {
            vector.set(user, vector.get(user) + count);
        }
        return vector;
    }
}

/// Renders as `user:count` pairs joined by `;`, e.g. `1:3;4:1`.
impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (user, count) in self.iter() {
            if !first {
                f.write_str(";")?;
            }
            write!(f, "{}:{}", user, count)?;
            first = false;
        }
        return Ok(());
    }
}

impl FromStr for Vector {
    type Err = Error;

    fn from_str(text: &str) -> Result<Vector, Error> {
        let mut vector = Vector::new();
        for pair in text.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
            let invalid = || Error::InvalidVector(text.to_string());
            let (user, count) = pair.split_once(':').ok_or_else(invalid)?;
            let user = user.trim().parse::<u32>().map_err(|_| invalid())?;
            let count = count.trim().parse::<u64>().map_err(|_| invalid())?;
            vector.set(UserId(user), count);
        }
        return Ok(vector);
    }
}
