//! Background knowledge sync
//!
//! Note changes flow through a debounce queue, are cut into batches on each
//! control-loop tick and written to the graph and vector stores by the
//! executor. The status tracker observes every stage.

pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod queue;
pub mod status;

pub use dispatcher::{Batch, BatchDispatcher};
pub use error::{StoreKind, SyncError, SyncResult};
pub use executor::{BatchReport, ItemOutcome, SyncExecutor};
pub use pipeline::{FlushSummary, SyncPipeline};
pub use queue::{DebouncePolicy, DebounceQueue, EnqueueOutcome, PendingUpdate, SizeClass, Snapshot};
pub use status::{StatusTracker, SyncStatus};
