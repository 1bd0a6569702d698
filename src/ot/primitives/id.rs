//! Identifier types for the participants of a shared document.
//!
//! The engine never looks inside a user id. It only needs ids to be:
//! - Hashable and comparable for equality: they key vector components.
//! - Totally ordered: the last-resort tie-break between two inserts at the
//!   same position compares user ids.

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::de;

/// A user identifier.
///
/// Each editor (or any other source of requests) gets its own id. Ids are
/// handed out by the session layer; the engine does not allocate them.
///
/// Serializes as a plain number. Deserializing also accepts the number as a
/// string, which is how it arrives when used as a JSON object key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct UserId(pub u32);

impl UserId {
    /// Create a new user id.
    pub fn new(id: u32) -> UserId {
        return UserId(id);
    }
}

impl From<u32> for UserId {
    fn from(id: u32) -> UserId {
        return UserId(id);
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.0);
    }
}

struct UserIdVisitor;

impl<'de> de::Visitor<'de> for UserIdVisitor {
    type Value = UserId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return f.write_str("a user id");
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<UserId, E> {
        let id = u32::try_from(value).map_err(|_| E::custom(format!("user id {value} out of range")))?;
        return Ok(UserId(id));
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<UserId, E> {
        let id = u32::try_from(value).map_err(|_| E::custom(format!("user id {value} out of range")))?;
        return Ok(UserId(id));
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<UserId, E> {
        let id = value
            .parse::<u32>()
            .map_err(|_| E::custom(format!("invalid user id {value:?}")))?;
        return Ok(UserId(id));
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<UserId, D::Error> {
        return deserializer.deserialize_any(UserIdVisitor);
    }
}
