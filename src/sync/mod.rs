pub mod poller;
pub mod status;

pub use poller::{PollSettings, StatusSource, SyncError, SyncPoller};
pub use status::{classify, derive_message, SyncStatus, TickOutcome};
