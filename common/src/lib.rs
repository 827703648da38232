pub mod queue;
pub mod task;

pub use queue::{QueueError, QueueStats, TaskQueue};
pub use task::{CacheMode, CompletedTask, FileBinding, FileType, TaskId, TaskOutcome, TaskSpec};
