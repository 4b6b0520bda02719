//! Running the generator as a subprocess.

use std::ffi::OsStr;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tracing::{info, instrument, warn};

use crate::error::{NswagError, Result};
use crate::locator::GeneratorBinary;

/// What the generator produced.
#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    /// Everything written to standard output, decoded lossily.
    pub stdout: String,
    pub status: ExitStatus,
}

impl GeneratorOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, if the process exited normally.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Runs `binary` with `args` and waits for it to exit.
///
/// Standard error is passed through to this process; standard output is
/// buffered and returned. A non-zero exit is reported in the output rather
/// than as an error.
///
/// ## Errors
///
/// - [`NswagError::BinaryNotFound`] if the binary file does not exist
/// - [`NswagError::ProcessSpawn`] if the process cannot be started
#[instrument(skip_all, fields(program = %binary.program().display()))]
pub async fn invoke<I, S>(binary: &GeneratorBinary, args: I, cwd: Option<&Path>) -> Result<GeneratorOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    if !binary.exists() {
        return Err(NswagError::BinaryNotFound(binary.executable().to_path_buf()));
    }

    let mut cmd = binary.command();
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn().map_err(|source| NswagError::ProcessSpawn {
        program: binary.program().to_path_buf(),
        source,
    })?;
    info!(pid = child.id(), "Started generator");

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    if output.status.success() {
        info!(bytes = stdout.len(), "Generator finished");
    } else {
        warn!(status = %output.status, "Generator exited unsuccessfully");
    }

    Ok(GeneratorOutput {
        stdout,
        status: output.status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_reported_before_spawn() {
        let binary = GeneratorBinary::direct("/no/such/NSwag.exe");
        let err = invoke(&binary, ["version"], None).await.unwrap_err();

        assert!(matches!(err, NswagError::BinaryNotFound(_)));
        assert_eq!(err.to_string(), "The path /no/such/NSwag.exe does not exist.");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_stdout_and_status() {
        let sh = GeneratorBinary::direct("/bin/sh");

        let ok = invoke(&sh, ["-c", "echo generated; echo noise >&2"], None).await.unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout, "generated\n");

        let failed = invoke(&sh, ["-c", "echo partial; exit 3"], None).await.unwrap();
        assert!(!failed.success());
        assert_eq!(failed.code(), Some(3));
        assert_eq!(failed.stdout, "partial\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let sh = GeneratorBinary::direct("/bin/sh");

        let out = invoke(&sh, ["-c", "pwd -P"], Some(dir.path())).await.unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(out.stdout.trim(), expected.to_string_lossy());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hosted_binary_gets_assembly_first() {
        let dir = tempfile::tempdir().unwrap();
        let assembly = dir.path().join("dotnet-nswag.dll");
        std::fs::write(&assembly, "echo \"assembly args: $*\"").unwrap();

        let binary = GeneratorBinary::hosted("/bin/sh", &assembly);
        let out = invoke(&binary, ["run", "main.nswag"], None).await.unwrap();
        assert_eq!(out.stdout, "assembly args: run main.nswag\n");
    }
}
