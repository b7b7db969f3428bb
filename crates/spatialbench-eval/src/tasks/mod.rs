//! Task specs and their discovery

mod loader;
mod task;

pub use loader::{TaskLoader, load_task_file, read_task_spec};
pub use task::{DataNode, TaskSpec};

pub(crate) use task::is_single_component;
