//! Replica configuration.
//!
//! Every replica of a document must run with the same settings, otherwise
//! tie-breaks between concurrent inserts can resolve differently and the
//! replicas diverge.

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;

/// How two inserts at the same position are ordered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Compare positions, then retry at the least common successor of the
    /// two requests, and only then fall back to the user ids.
    #[default]
    Cascade,
    /// Compare positions, and on a tie compare user ids straight away.
    UserId,
}

/// Settings for a [`State`](crate::State).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Memoize translations by `(request, target vector)`.
    pub translation_cache: bool,
    /// Ordering of same-position inserts.
    pub tie_break: TieBreak,
}

impl Default for Config {
    fn default() -> Config {
        return Config {
            translation_cache: true,
            tie_break: TieBreak::Cascade,
        };
    }
}

impl Config {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Config> {
        return Ok(serde_json::from_str(text)?);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.translation_cache);
        assert_eq!(config.tie_break, TieBreak::Cascade);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{ "tie_break": "user_id" }"#).unwrap();
        assert!(config.translation_cache);
        assert_eq!(config.tie_break, TieBreak::UserId);

        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn rejects_unknown_tie_break() {
        assert!(Config::from_json(r#"{ "tie_break": "coin_flip" }"#).is_err());
    }
}
