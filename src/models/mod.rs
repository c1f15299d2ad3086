pub mod loaders;
pub mod request;
pub mod result;
pub mod summary;

pub use loaders::{load_all_request_files, load_request_file, remove_request_file};
pub use request::RedemptionRequest;
pub use result::{AttemptResult, DebugArtifacts, DebugLogEntry, UNKNOWN_ERROR};
pub use summary::{BatchSummary, FailureDetail};
