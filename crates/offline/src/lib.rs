//! `tillpoint-offline`
//!
//! **Responsibility:** the two-tier storage subsystem behind the POS app.
//!
//! This crate provides:
//! - A SQLite-backed local shadow store for entity records
//! - A durable sync queue carrying locally-originated writes to the remote
//!   service, with bounded retries and a dead-letter state
//! - A background sync worker with explicit start/shutdown lifecycle
//! - A data adapter presenting one read/write surface per entity type,
//!   hiding the local/remote split from callers
//!
//! The remote service remains the source of truth once synchronized; the
//! local store is a durable, offline-capable holding area.

pub mod adapter;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod queue;
pub mod remote;
pub mod store;
pub mod worker;

pub use adapter::{DataAdapter, Session};
pub use config::RemoteConfig;
pub use connectivity::{Connectivity, ConnectivityState};
pub use error::SyncError;
pub use queue::{EntryStatus, Operation, QueueEntry, SyncQueue, MAX_ATTEMPTS};
pub use remote::{RemoteStore, RestRemote};
pub use store::{LocalStore, SyncStatus};
pub use worker::{PassOutcome, SyncWorker};
