//! The execution gate
//!
//! A script can only be run through a [`Verified`] value, and the only way to
//! obtain one is a passing signature verification. There is no other
//! constructor, so no code path runs an unverified script.

use crate::error::{Error, Result};
use sget_crypto::Sha256Hash;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output, Stdio};
use tokio::process::Command;

/// Proof that a script passed verification
#[derive(Debug)]
pub struct Verified {
    script: PathBuf,
    digest: Sha256Hash,
    identity: Option<String>,
}

impl Verified {
    pub(crate) fn new(script: PathBuf, digest: Sha256Hash, identity: Option<String>) -> Self {
        Self {
            script,
            digest,
            identity,
        }
    }

    /// The verified script
    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Digest the signature was checked against
    pub fn digest(&self) -> &Sha256Hash {
        &self.digest
    }

    /// Identity named in the signing certificate, if any
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }
}

/// Runs verified scripts with an interpreter
#[derive(Debug, Clone)]
pub struct Executor {
    interpreter: PathBuf,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new("bash")
    }
}

impl Executor {
    /// Run scripts with `interpreter`
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
        }
    }

    async fn prepare(&self, verified: &Verified) -> Result<Command> {
        mark_executable(verified.script())
            .await
            .map_err(|e| Error::Execution(format!("cannot mark script executable: {}", e)))?;
        let mut command = Command::new(&self.interpreter);
        command.arg(verified.script());
        tracing::info!(script = %verified.script().display(), "executing verified script");
        Ok(command)
    }

    /// Run the script with the standard streams of this process
    pub async fn run(&self, verified: Verified) -> Result<ExitStatus> {
        let mut command = self.prepare(&verified).await?;
        command
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))
    }

    /// Run the script and collect its output instead of inheriting streams
    pub async fn output(&self, verified: Verified) -> Result<Output> {
        let mut command = self.prepare(&verified).await?;
        command
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))
    }

    fn spawn_error(&self, e: std::io::Error) -> Error {
        Error::Execution(format!(
            "failed to start {}: {}",
            self.interpreter.display(),
            e
        ))
    }
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700)).await
}

#[cfg(not(unix))]
async fn mark_executable(path: &Path) -> std::io::Result<()> {
    tokio::fs::metadata(path).await.map(|_| ())
}

/// Exit code to report for a finished script
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    crate::error::EXIT_FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verified(path: PathBuf) -> Verified {
        Verified::new(path, sget_crypto::sha256(b""), None)
    }

    #[tokio::test]
    async fn test_missing_interpreter_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "echo hi\n").unwrap();

        let result = Executor::new("/nonexistent/interpreter")
            .run(verified(script))
            .await;
        assert!(matches!(result, Err(Error::Execution(_))));
    }

    #[tokio::test]
    async fn test_missing_script_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = Executor::default()
            .run(verified(dir.path().join("absent.sh")))
            .await;
        assert!(matches!(result, Err(Error::Execution(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_script_marked_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "exit 3\n").unwrap();

        let status = Executor::default().run(verified(script.clone())).await.unwrap();
        assert_eq!(exit_code(status), 3);
        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
