//! Shared record store subsystem.
//!
//! The directory is the database: one JSON file per request, one per response,
//! plus zero-length completion markers and transient lock markers.
//!
//! # Data Flow
//! ```text
//! Front role:
//!     create_request (no lock, first writer wins)
//!     → poll is_complete
//!     → read_response → delete_response + delete_request (under locks)
//!
//! Worker role:
//!     list_requests → lock_request → read_request → update_request(claimed)
//!     → write_response → mark_complete → update_request(terminal) → release
//!
//! Sweeper:
//!     stale locks, abandoned claims, expired requests, orphaned responses
//! ```
//!
//! # Invariants
//! - Full records are staged to a hidden temp file, flushed, then renamed into place,
//!   so a reader never observes a partial record.
//! - The completion marker is created only after its response record is durable.
//! - Mutating or deleting an existing record requires holding its `RecordLock`.

pub mod error;
pub mod id;
pub mod layout;
pub mod lock;
pub mod record;
pub mod repository;
pub mod sweeper;

pub use error::{StoreError, StoreResult};
pub use id::RequestId;
pub use layout::StoreLayout;
pub use lock::RecordLock;
pub use record::{
    append_header, Body, HeaderValues, Headers, RequestRecord, RequestStatus, ResponseRecord,
    Submission, SYNTHETIC_HEADER,
};
pub use repository::{Inventory, RecordStore};
pub use sweeper::{SweepReport, Sweeper};
