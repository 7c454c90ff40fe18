//! ACR builds: quick build submission, build logs and build tasks

pub mod archive;
pub mod blob;
pub mod logs;
pub mod submit;
pub mod tasks;

pub use blob::{BlobClient, BlobLocation};
pub use logs::{BuildLog, BuildLogFilter, BuildLogViewer, LogLineKind};
pub use submit::{QuickBuildOptions, QuickBuildSubmitter};
pub use tasks::{BuildTaskRequest, build_task_summary, create_build_task, list_build_tasks, run_build_task};
