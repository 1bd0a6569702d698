//! Building blocks shared by operations, requests and replicas.
//!
//! - `UserId`: opaque, totally ordered participant identifier
//! - `Vector`: state vector with a causal partial order
//! - `Segment` / `Buffer`: text with per-character authorship

pub mod buffer;
pub mod clock;
pub mod id;

pub use buffer::Buffer;
pub use buffer::Segment;
pub use clock::Vector;
pub use id::UserId;
