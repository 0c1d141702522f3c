pub mod download;
pub mod extract;
pub mod http;
pub mod poll;
pub mod types;

pub use download::{ensure_dir, fetch_to_file, list_files_with_extensions, stamped_filename};
pub use http::{HttpConfig, RetryingClient};
pub use poll::{drive, submit_task_id, PollConfig, TaskOutcome, TaskProbe};
pub use types::{CloudTaskError, Result};
