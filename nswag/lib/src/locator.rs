//! Locating the NSwag binaries and building a launcher for them.

use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;
use which::which;

use crate::error::{NswagError, Result};
use crate::runtime::Runtime;

/// Environment variable naming the NSwag `bin/binaries` directory.
pub const BINARIES_DIR_ENV: &str = "NSWAG_BINARIES_DIR";

/// Where the npm `nswag` package puts its binaries, relative to a project root.
const NPM_BINARIES_DIR: [&str; 4] = ["node_modules", "nswag", "bin", "binaries"];

/// Finds the NSwag `binaries` directory.
///
/// ## Search Order
///
/// 1. An explicit directory set with [`with_dir`](Self::with_dir)
/// 2. The `NSWAG_BINARIES_DIR` environment variable
/// 3. `node_modules/nswag/bin/binaries` in the start directory or any ancestor
#[derive(Debug, Clone)]
pub struct BinaryLocator {
    explicit: Option<PathBuf>,
    start: PathBuf,
}

impl Default for BinaryLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryLocator {
    /// A locator starting its upward search at the current directory.
    pub fn new() -> Self {
        Self {
            explicit: None,
            start: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Uses `dir` instead of searching.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.explicit = Some(dir.into());
        self
    }

    /// Starts the upward `node_modules` search at `dir`.
    pub fn starting_at(mut self, dir: impl Into<PathBuf>) -> Self {
        self.start = dir.into();
        self
    }

    /// Candidate directories, in search order.
    pub fn candidates(&self) -> Vec<PathBuf> {
        if let Some(dir) = &self.explicit {
            return vec![dir.clone()];
        }

        let from_env = env::var_os(BINARIES_DIR_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        from_env
            .into_iter()
            .chain(self.start.ancestors().map(|dir| {
                NPM_BINARIES_DIR
                    .iter()
                    .fold(dir.to_path_buf(), |acc, part| acc.join(part))
            }))
            .collect()
    }

    /// Returns the first candidate that is a directory.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::BinariesNotFound`] listing every candidate tried.
    pub fn locate(&self) -> Result<PathBuf> {
        let candidates = self.candidates();

        if let Some(found) = candidates.iter().find(|dir| dir.is_dir()) {
            debug!(dir = %found.display(), "Found NSwag binaries");
            return Ok(found.clone());
        }

        Err(NswagError::BinariesNotFound {
            searched: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// How to launch a generator binary.
///
/// Managed builds (`dotnet-nswag.dll`) are started through the `dotnet`
/// host; native builds and custom executables are started directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorBinary {
    executable: PathBuf,
    host: Option<PathBuf>,
}

impl GeneratorBinary {
    /// An executable launched as-is.
    pub fn direct(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            host: None,
        }
    }

    /// An assembly launched as `<host> <assembly>`.
    pub fn hosted(host: impl Into<PathBuf>, assembly: impl Into<PathBuf>) -> Self {
        Self {
            executable: assembly.into(),
            host: Some(host.into()),
        }
    }

    /// The launcher for `runtime` inside `binaries_dir`.
    ///
    /// `dotnet` is resolved through PATH; if it is missing the bare name is
    /// kept and spawning reports the failure.
    pub fn for_runtime(runtime: Runtime, binaries_dir: &Path) -> Self {
        let executable = binaries_dir.join(runtime.binary_path());

        if runtime.uses_dotnet_host() {
            let host = which("dotnet").unwrap_or_else(|_| PathBuf::from("dotnet"));
            Self::hosted(host, executable)
        } else {
            Self::direct(executable)
        }
    }

    /// The NSwag binary itself (the assembly for hosted launches).
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// The `dotnet` host, if any.
    pub fn host(&self) -> Option<&Path> {
        self.host.as_deref()
    }

    /// The program handed to the OS.
    pub fn program(&self) -> &Path {
        self.host.as_deref().unwrap_or(&self.executable)
    }

    pub fn exists(&self) -> bool {
        self.executable.is_file()
    }

    pub(crate) fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(self.program());
        if self.host.is_some() {
            cmd.arg(&self.executable);
        }
        cmd
    }
}
