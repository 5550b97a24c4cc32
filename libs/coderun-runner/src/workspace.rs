/// Workspace Manager - one private directory per execution
///
/// Every execution gets a fresh `coderun-<uuid>` directory under the
/// configured root. It holds the submitted source and any build artifact,
/// and is removed when the execution ends however it ends: normal return,
/// error, timeout, cancelled future or panic.

use coderun_common::RunnerError;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub const WORKSPACE_PREFIX: &str = "coderun-";

/// Handle to a live workspace directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    id: Uuid,
    dir: PathBuf,
}

impl Workspace {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Write the source verbatim as UTF-8. `file_name` must be a bare name.
    pub async fn write_source(&self, file_name: &str, code: &str) -> Result<PathBuf, RunnerError> {
        if !is_bare_file_name(file_name) {
            return Err(RunnerError::Validation(format!(
                "source file name '{}' is not a plain file name",
                file_name
            )));
        }

        let path = self.dir.join(file_name);
        tokio::fs::write(&path, code.as_bytes())
            .await
            .map_err(|e| RunnerError::workspace(format!("write {}", path.display()), e))?;

        debug!(workspace = %self.id, file = file_name, bytes = code.len(), "source written");
        Ok(path)
    }
}

fn is_bare_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Removes its directory on drop unless `cleanup` already did
#[derive(Debug)]
pub struct WorkspaceGuard {
    workspace: Workspace,
    armed: bool,
}

impl WorkspaceGuard {
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Recursive, best-effort removal. Failures are logged, never returned.
    pub async fn cleanup(mut self) {
        self.armed = false;
        let dir = self.workspace.dir.clone();
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(workspace = %self.workspace.id, "workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                workspace = %self.workspace.id,
                path = %dir.display(),
                error = %e,
                "failed to remove workspace"
            ),
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        // Reached on cancellation or panic: async cleanup never ran
        if let Err(e) = std::fs::remove_dir_all(&self.workspace.dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    workspace = %self.workspace.id,
                    error = %e,
                    "failed to remove workspace on drop"
                );
            }
        } else {
            debug!(workspace = %self.workspace.id, "workspace removed on drop");
        }
    }
}

/// Creates and tears down workspaces under an injected root directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn create(&self) -> Result<WorkspaceGuard, RunnerError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| RunnerError::workspace(format!("create root {}", self.root.display()), e))?;

        let id = Uuid::new_v4();
        let dir = self.root.join(format!("{}{}", WORKSPACE_PREFIX, id));
        // create_dir, not create_dir_all: an existing directory is never reused
        tokio::fs::create_dir(&dir)
            .await
            .map_err(|e| RunnerError::workspace(format!("create {}", dir.display()), e))?;

        debug!(workspace = %id, path = %dir.display(), "workspace created");
        Ok(WorkspaceGuard {
            workspace: Workspace { id, dir },
            armed: true,
        })
    }

    /// Run `f` inside a fresh workspace and remove it afterwards
    pub async fn with_workspace<F, Fut, T>(&self, f: F) -> Result<T, RunnerError>
    where
        F: FnOnce(Workspace) -> Fut,
        Fut: Future<Output = Result<T, RunnerError>>,
    {
        let guard = self.create().await?;
        let result = f(guard.workspace().clone()).await;
        guard.cleanup().await;
        result
    }
}
