//! The [`Nswag`] facade: probe, patch, invoke, restore.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument, warn};

use crate::config::{ConfigFile, ConfigLock};
use crate::error::{NswagError, Result};
use crate::locator::{BinaryLocator, GeneratorBinary};
use crate::options::{RunOptions, normalize_separators};
use crate::process::{GeneratorOutput, invoke};
use crate::runtime::Runtime;

/// Runs the NSwag generator for one runtime variant.
///
/// ## Examples
///
/// ```no_run
/// use nswag_lib::{Input, Nswag, RunOptions};
///
/// # async fn example() -> nswag_lib::Result<()> {
/// let nswag = Nswag::detect()?;
/// let options = RunOptions::new(Input::path("api/openapi.json"))
///     .with_output("openApiToTypeScriptClient", "src/api/client.ts");
///
/// let output = nswag.run("api/main.nswag", &options).await?;
/// print!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Nswag {
    runtime: Option<Runtime>,
    binary: GeneratorBinary,
    working_dir: Option<PathBuf>,
}

impl Nswag {
    /// Uses `runtime`, finding the binaries with the default search.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::BinariesNotFound`] if no binaries directory exists.
    pub fn new(runtime: Runtime) -> Result<Self> {
        Self::with_locator(runtime, &BinaryLocator::new())
    }

    /// Detects the runtime, then behaves like [`new`](Self::new).
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::NoCompatibleRuntime`] or
    /// [`NswagError::BinariesNotFound`].
    pub fn detect() -> Result<Self> {
        Self::new(Runtime::detect()?)
    }

    /// Uses `runtime` with binaries from `dir`.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::BinariesNotFound`] if `dir` is not a directory.
    pub fn with_binaries_dir(runtime: Runtime, dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_locator(runtime, &BinaryLocator::new().with_dir(dir))
    }

    /// Uses `runtime` with binaries found by `locator`.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::BinariesNotFound`] if the locator finds nothing.
    pub fn with_locator(runtime: Runtime, locator: &BinaryLocator) -> Result<Self> {
        let dir = locator.locate()?;
        let binary = GeneratorBinary::for_runtime(runtime, &dir);
        debug!(%runtime, executable = %binary.executable().display(), "Selected NSwag binary");

        Ok(Self {
            runtime: Some(runtime),
            binary,
            working_dir: None,
        })
    }

    /// Uses a specific generator executable, bypassing runtime selection.
    pub fn from_binary(binary: GeneratorBinary) -> Self {
        Self {
            runtime: None,
            binary,
            working_dir: None,
        }
    }

    /// Runs the generator in `dir` instead of the current directory.
    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The runtime variant, unless built with [`from_binary`](Self::from_binary).
    pub fn runtime(&self) -> Option<Runtime> {
        self.runtime
    }

    pub fn binary(&self) -> &GeneratorBinary {
        &self.binary
    }

    /// Runs `nswag run` against a temporarily patched config.
    ///
    /// 1. Validates `options`
    /// 2. Locks the config against concurrent runs
    /// 3. Patches input and outputs into the config and writes it
    /// 4. Invokes the generator
    /// 5. Restores the original config bytes
    ///
    /// The config is restored whether or not the generator succeeds. The
    /// generator receives the config as an absolute path, so a relative
    /// `config_path` resolves against the current directory even with
    /// [`in_dir`](Self::in_dir).
    ///
    /// The lock is an empty `<config>.lock` file next to the config. It is
    /// left in place after the run so that waiting runs keep locking the
    /// same file; ignore it in version control.
    ///
    /// ## Errors
    ///
    /// Every validation error is returned before the generator is spawned:
    /// [`NswagError::InvalidOption`], [`NswagError::ConfigNotFound`],
    /// [`NswagError::ConfigParse`], [`NswagError::InvalidConfig`],
    /// [`NswagError::UnknownGenerator`], [`NswagError::InputRead`].
    /// Spawn and restore failures are returned as well.
    #[instrument(skip(self, config_path, options), fields(config = %config_path.as_ref().display()))]
    pub async fn run(&self, config_path: impl AsRef<Path>, options: &RunOptions) -> Result<GeneratorOutput> {
        let config_path = config_path.as_ref();
        options.validate()?;

        if !config_path.exists() {
            return Err(NswagError::ConfigNotFound(config_path.to_path_buf()));
        }
        // The generator may run in another directory than ours.
        let absolute = std::path::absolute(config_path)?;

        let _lock = acquire_lock(config_path).await?;

        let mut config = ConfigFile::open(config_path)?;
        config.apply(options)?;
        let guard = config.write_patched()?;

        let mut args = vec!["run".to_string(), normalize_separators(&absolute.to_string_lossy())];
        args.extend(options.variables_arg());

        let result = invoke(&self.binary, &args, self.working_dir.as_deref()).await;
        let restored = guard.restore();

        match (result, restored) {
            (Ok(output), Ok(())) => Ok(output),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), restored) => {
                if let Err(restore_err) = restored {
                    warn!(error = %restore_err, "Failed to restore config after generator error");
                }
                Err(e)
            }
        }
    }

    /// Generates a TypeScript client straight from an OpenAPI document.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::BinaryNotFound`] or [`NswagError::ProcessSpawn`].
    #[instrument(skip(self))]
    pub async fn openapi2tsclient(&self, input: &str, output: &str) -> Result<GeneratorOutput> {
        let args = [
            "openapi2tsclient".to_string(),
            format!("/input:{}", normalize_separators(input)),
            format!("/output:{}", normalize_separators(output)),
        ];

        invoke(&self.binary, &args, self.working_dir.as_deref()).await
    }
}

async fn acquire_lock(config_path: &Path) -> Result<ConfigLock> {
    let path = config_path.to_path_buf();
    tokio::task::spawn_blocking(move || ConfigLock::acquire(&path))
        .await
        .map_err(|e| NswagError::Io(std::io::Error::other(e)))?
}
