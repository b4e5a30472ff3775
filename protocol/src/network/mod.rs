//! # Network Module
//!
//! How parties reach each other and agree on what is spent.
//!
//! ## Architecture
//!
//! ```text
//! messaging.rs — sessions over tokio channels and the in-memory router
//! notary.rs    — UniquenessProvider trait and the in-memory notary
//! map.rs       — NetworkMap of well-known parties
//! node.rs      — NodeHandle runtime and the MockNetwork that hosts nodes
//! ```
//!
//! ## Design Decisions
//!
//! - The router keeps inboxes in a `DashMap` so opening a session never
//!   blocks on other parties. The sender is cloned out of the map before
//!   any `.await`.
//! - The notary's spent set sits behind a single `parking_lot::Mutex`. The
//!   whole claim runs under that lock with no await point, so the first
//!   transaction to arrive wins and there are no partial claims.

pub mod map;
pub mod messaging;
pub mod node;
pub mod notary;

pub use map::NetworkMap;
pub use messaging::{FlowSession, InMemoryNetwork, IncomingSession, SessionError, SessionMessage};
pub use node::{MockNetwork, NodeHandle};
pub use notary::{InMemoryNotary, NotaryError, UniquenessProvider};
