//! A single-replica document with a replayable edit history.
//!
//! `Document` wraps a [`State`] for callers that deal in plain edits
//! (insert this text, delete that many characters, undo) rather than
//! requests. Every edit is tried once: if the replica cannot execute it
//! yet, it is not queued and nothing is recorded. Edits that went through
//! are kept in order, so the document can be rebuilt from its initial text.

use serde::Deserialize;
use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::ot::DoRequest;
use crate::ot::HistoryRequest;
use crate::ot::Operation;
use crate::ot::Request;
use crate::ot::State;
use crate::ot::primitives::Buffer;
use crate::ot::primitives::UserId;
use crate::ot::primitives::Vector;

/// An edit that was applied to a document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Edit {
    Insert {
        user: UserId,
        vector: Vector,
        position: u64,
        text: String,
    },
    Delete {
        user: UserId,
        vector: Vector,
        position: u64,
        len: u64,
    },
    Undo {
        user: UserId,
    },
    Redo {
        user: UserId,
    },
}

pub struct Document {
    owner: UserId,
    initial: String,
    state: State,
    edits: Vec<Edit>,
}

impl Document {
    /// A document whose initial text is attributed to `owner`.
    pub fn new(owner: UserId, initial: &str) -> Document {
        return Document::with_config(owner, initial, Config::default());
    }

    pub fn with_config(owner: UserId, initial: &str, config: Config) -> Document {
        return Document {
            owner,
            initial: initial.to_string(),
            state: State::with_buffer(Buffer::from_text(owner, initial), config),
            edits: Vec::new(),
        };
    }

    pub fn state(&self) -> &State {
        return &self.state;
    }

    pub fn text(&self) -> String {
        return self.state.text();
    }

    /// Insert `text` by `user`, who last saw the state `vector`.
    pub fn insert(&mut self, user: UserId, vector: Vector, position: u64, text: &str) -> Result<Option<DoRequest>> {
        return self.apply(Edit::Insert {
            user,
            vector,
            position,
            text: text.to_string(),
        });
    }

    /// Delete `len` characters by `user`, who last saw the state `vector`.
    pub fn delete(&mut self, user: UserId, vector: Vector, position: u64, len: u64) -> Result<Option<DoRequest>> {
        return self.apply(Edit::Delete {
            user,
            vector,
            position,
            len,
        });
    }

    /// Undo `user`'s most recent edit that is not undone yet.
    pub fn undo(&mut self, user: UserId) -> Result<Option<DoRequest>> {
        return self.apply(Edit::Undo { user });
    }

    /// Redo `user`'s most recent undo.
    pub fn redo(&mut self, user: UserId) -> Result<Option<DoRequest>> {
        return self.apply(Edit::Redo { user });
    }

    /// Try an edit. Returns the applied request, or `None` if the replica
    /// could not execute it now.
    pub fn apply(&mut self, edit: Edit) -> Result<Option<DoRequest>> {
        let request = self.request_for(&edit);
        if !self.state.can_execute(&request) {
            return Ok(None);
        }
        let executed = self.state.execute(Some(request))?;
        if executed.is_some() {
            self.edits.push(edit);
        }
        return Ok(executed);
    }

    fn request_for(&self, edit: &Edit) -> Request {
        return match edit {
            Edit::Insert {
                user,
                vector,
                position,
                text,
            } => {
                let operation = Operation::insert(*position, Buffer::from_text(*user, text));
                Request::Do(DoRequest::new(*user, vector.clone(), operation))
            }
            Edit::Delete {
                user,
                vector,
                position,
                len,
            } => Request::Do(DoRequest::new(*user, vector.clone(), Operation::delete(*position, *len))),
            // History requests are issued at the replica's current state.
            Edit::Undo { user } => Request::Undo(HistoryRequest::new(*user, self.state.vector().clone())),
            Edit::Redo { user } => Request::Redo(HistoryRequest::new(*user, self.state.vector().clone())),
        };
    }

    /// The last `limit` applied edits, or all of them.
    pub fn edits(&self, limit: Option<usize>) -> &[Edit] {
        let skip = match limit {
            Some(limit) => self.edits.len().saturating_sub(limit),
            None => 0,
        };
        return &self.edits[skip..];
    }

    /// A fresh document built from the initial text and the edit history.
    pub fn replay(&self) -> Result<Document> {
        let mut document = Document::with_config(self.owner, &self.initial, self.state.config().clone());
        for edit in &self.edits {
            document.apply(edit.clone())?;
        }
        return Ok(document);
    }

    /// The current vector in string form and the current text.
    pub fn summary(&self) -> (String, String) {
        return (self.state.vector().to_string(), self.state.text());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: UserId = UserId(0);
    const ALICE: UserId = UserId(1);
    const BOB: UserId = UserId(2);

    #[test]
    fn seeded_document() {
        let doc = Document::new(OWNER, "hello");
        assert_eq!(doc.summary(), (String::new(), "hello".to_string()));
        assert!(doc.edits(None).is_empty());
    }

    #[test]
    fn edits_are_recorded() {
        let mut doc = Document::new(OWNER, "hello");
        doc.insert(ALICE, Vector::new(), 5, " world").unwrap();
        doc.delete(BOB, Vector::new(), 0, 1).unwrap();

        assert_eq!(doc.text(), "ello world");
        assert_eq!(doc.summary().0, "1:1;2:1");
        assert_eq!(doc.edits(None).len(), 2);
        assert_eq!(doc.edits(Some(1)), &doc.edits(None)[1..]);
        assert_eq!(doc.edits(Some(10)).len(), 2);
    }

    #[test]
    fn edit_that_cannot_run_is_not_recorded() {
        let mut doc = Document::new(OWNER, "x");
        // alice claims to have seen an edit of bob's that never happened
        let early = doc.insert(ALICE, Vector::new().increment(BOB, 1), 0, "a").unwrap();
        assert!(early.is_none());
        assert!(doc.edits(None).is_empty());
        assert!(doc.state().queued().is_empty());

        // nothing to undo
        assert!(doc.undo(ALICE).unwrap().is_none());
    }

    #[test]
    fn undo_and_redo() {
        let mut doc = Document::new(OWNER, "ab");
        doc.delete(ALICE, Vector::new(), 0, 1).unwrap();
        assert_eq!(doc.text(), "b");

        doc.undo(ALICE).unwrap();
        assert_eq!(doc.text(), "ab");
        doc.redo(ALICE).unwrap();
        assert_eq!(doc.text(), "b");
        assert_eq!(doc.edits(None).len(), 3);
    }

    #[test]
    fn replay_reproduces_state() {
        let mut doc = Document::new(OWNER, "abc");
        let v0 = Vector::new();
        doc.insert(ALICE, v0.clone(), 1, "X").unwrap();
        doc.delete(BOB, v0, 1, 2).unwrap();
        doc.undo(ALICE).unwrap();

        let replayed = doc.replay().unwrap();
        assert_eq!(replayed.summary(), doc.summary());
        assert_eq!(replayed.state().fingerprint(), doc.state().fingerprint());
        assert_eq!(replayed.edits(None), doc.edits(None));
    }

    #[test]
    fn edit_serde_shape() {
        let edit = Edit::Undo { user: ALICE };
        assert_eq!(serde_json::to_string(&edit).unwrap(), r#"{"kind":"undo","user":1}"#);

        let edit = Edit::Insert {
            user: BOB,
            vector: Vector::new().increment(ALICE, 2),
            position: 3,
            text: "hi".to_string(),
        };
        let back: Edit = serde_json::from_str(&serde_json::to_string(&edit).unwrap()).unwrap();
        assert_eq!(back, edit);
    }
}
