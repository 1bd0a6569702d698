//! Operational transformation engine.
//!
//! Layers, bottom up:
//! - `primitives`: user ids, state vectors and attributed text
//! - `recon`: text lost from length-only deletes during transformation
//! - `op`: edit operations and their transformation rules
//! - `request`: operations stamped with issuer and causal context
//! - `state`: the replica that queues, translates and applies requests

pub mod op;
pub mod primitives;
pub mod recon;
pub mod request;
pub mod state;

pub use op::Cid;
pub use op::Delete;
pub use op::Insert;
pub use op::Operation;
pub use op::Removal;
pub use recon::Recon;
pub use recon::ReconSegment;
pub use request::DoRequest;
pub use request::HistoryRequest;
pub use request::Request;
pub use state::Fingerprint;
pub use state::Readiness;
pub use state::Snapshot;
pub use state::State;
