//! Concord - A consistency engine for collaborative text editing.
//!
//! Every participant edits a local replica and broadcasts requests. A
//! replica accepts requests from all participants in any order that keeps
//! each participant's own requests in sequence, transforms them against
//! whatever it executed concurrently, and converges to the same text as
//! every other replica. Undo and redo are requests like any other, and undo
//! the issuer's own edits even after others edited around them.
//!
//! # Quick Start
//!
//! ```
//! use concord::{DoRequest, Operation, Request, State, UserId, Vector};
//! use concord::Buffer;
//!
//! let alice = UserId(1);
//! let bob = UserId(2);
//!
//! // Two replicas of the same document
//! let mut here = State::from_text(UserId(0), "ab");
//! let mut there = State::from_text(UserId(0), "ab");
//!
//! // Concurrent edits, both made against the initial state
//! let insert = Operation::insert(1, Buffer::from_text(alice, "X"));
//! let delete = Operation::delete(0, 1);
//! let from_alice = Request::Do(DoRequest::new(alice, Vector::new(), insert));
//! let from_bob = Request::Do(DoRequest::new(bob, Vector::new(), delete));
//!
//! // Delivered in opposite orders
//! here.submit(from_alice.clone()).unwrap();
//! here.submit(from_bob.clone()).unwrap();
//! there.submit(from_bob).unwrap();
//! there.submit(from_alice).unwrap();
//!
//! assert_eq!(here.text(), "Xb");
//! assert_eq!(there.text(), "Xb");
//! assert_eq!(here.fingerprint(), there.fingerprint());
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod log;
pub mod ot;

pub use config::Config;
pub use config::TieBreak;
pub use document::Document;
pub use document::Edit;
pub use error::Error;
pub use error::Result;
pub use log::Log;
pub use ot::Cid;
pub use ot::DoRequest;
pub use ot::HistoryRequest;
pub use ot::Operation;
pub use ot::Request;
pub use ot::Snapshot;
pub use ot::State;
pub use ot::primitives::Buffer;
pub use ot::primitives::Segment;
pub use ot::primitives::UserId;
pub use ot::primitives::Vector;
