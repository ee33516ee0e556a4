//! Connection registry for broadcast fan-out
//!
//! The registry tracks every subscriber the server is currently pushing to.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<ConnectionRegistry>
//!                    ┌──────────────────────────────┐
//!                    │ Mutex<BTreeMap<Id,           │
//!                    │   Arc<Subscriber> {          │
//!                    │     writer: OwnedWriteHalf,  │
//!                    │   }                          │
//!                    │ >>                           │
//!                    └──────────────┬───────────────┘
//!                                   │ snapshot()
//!         ┌─────────────────────────┼─────────────────────────┐
//!         │                         │                         │
//!         ▼                         ▼                         ▼
//!   [Subscriber 1]            [Subscriber 2]            [Subscriber 3]
//!   send(msg) ──► TCP         send(msg) ──► TCP         send(msg) ✗ ──► evicted
//! ```
//!
//! # Encode Once
//!
//! `publish` encodes a frame into a single `bytes::Bytes`; the same buffer is
//! written to every subscriber in the snapshot.

pub mod entry;
pub mod store;

pub use entry::{ConnectionId, Subscriber};
pub use store::{ConnectionRegistry, PublishReport};
