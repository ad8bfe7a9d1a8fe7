use crate::errors::ExpiryError;
use async_trait::async_trait;
use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::{process::Command, time::timeout};
use tracing::debug;

/// What a whois client invocation produced.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub elapsed: Duration,
}

/// Runs the external whois client. The only seam between OS processes and
/// the rest of the crate.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Invoke the client with `target` as the first argument followed by
    /// `args` verbatim.
    async fn run(&self, target: &str, args: &[String]) -> Result<CommandOutput, ExpiryError>;
}

/// Spawns the whois binary found on `PATH` (or at an explicit path).
pub struct SystemRunner {
    binary: String,
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(binary: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Locate the configured binary, searching `PATH` for bare names.
    pub fn resolve_binary(&self) -> Result<PathBuf, ExpiryError> {
        let candidate = Path::new(&self.binary);
        if candidate.components().count() > 1 {
            return if is_executable(candidate) {
                Ok(candidate.to_path_buf())
            } else {
                Err(ExpiryError::ToolNotFound(self.binary.clone()))
            };
        }

        let path_var = std::env::var_os("PATH").unwrap_or_default();
        std::env::split_paths(&path_var)
            .map(|dir| dir.join(&self.binary))
            .find(|path| is_executable(path))
            .ok_or_else(|| ExpiryError::ToolNotFound(self.binary.clone()))
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, target: &str, args: &[String]) -> Result<CommandOutput, ExpiryError> {
        let path = self.resolve_binary()?;
        debug!("Running {} {} {:?}", path.display(), target, args);

        let mut command = Command::new(&path);
        command
            .arg(target)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let start = Instant::now();
        let output = match self.timeout {
            Some(limit) => timeout(limit, command.output()).await??,
            None => command.output().await?,
        };
        let elapsed = start.elapsed();

        debug!(
            "{} exited with {:?} after {:?} ({} bytes)",
            path.display(),
            output.status.code(),
            elapsed,
            output.stdout.len()
        );

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            status: output.status.code(),
            elapsed,
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn test_resolve_missing_binary() {
        let runner = SystemRunner::new("definitely-not-a-whois-client-xyz", None);
        assert!(matches!(runner.resolve_binary(), Err(ExpiryError::ToolNotFound(_))));
    }

    #[test]
    fn test_resolve_explicit_path_requires_exec_bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("whois");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();

        let runner = SystemRunner::new(path.to_string_lossy(), None);
        assert!(matches!(runner.resolve_binary(), Err(ExpiryError::ToolNotFound(_))));

        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(runner.resolve_binary().unwrap(), path);
    }

    #[tokio::test]
    async fn test_run_captures_stdout_and_status() {
        let runner = SystemRunner::new("sh", None);
        let args = vec!["printf 'Domain Name: example.com\\n'; exit 2".to_string()];
        let output = runner.run("-c", &args).await.unwrap();
        assert_eq!(output.stdout, b"Domain Name: example.com\n");
        assert_eq!(output.status, Some(2));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let runner = SystemRunner::new("sh", Some(Duration::from_millis(100)));
        let args = vec!["sleep 5".to_string()];
        let err = runner.run("-c", &args).await.unwrap_err();
        assert!(matches!(err, ExpiryError::Timeout));
    }
}
