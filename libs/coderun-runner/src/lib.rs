pub mod admission;
pub mod engine;
pub mod executor;
pub mod process;
pub mod workspace;

pub use admission::Admission;
pub use engine::{DummyEngine, ExecutionEngine};
pub use executor::Executor;
pub use process::{CommandSpec, ProcessRunner, RunOptions};
pub use workspace::{Workspace, WorkspaceGuard, WorkspaceManager};
