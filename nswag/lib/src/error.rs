use std::path::PathBuf;

/// Errors produced while preparing or running the NSwag generator.
///
/// Every validation failure surfaces before the generator process is
/// spawned. Failures of the generator itself are not errors: they are
/// reported through [`GeneratorOutput`](crate::GeneratorOutput).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum NswagError {
    /// No runtime variant matches the host.
    #[error("No compatible NSwag runtime found ({found}). Do you have .NET installed?")]
    NoCompatibleRuntime {
        /// What the probe saw instead.
        found: String,
    },

    /// A runtime label could not be parsed.
    #[error("Unknown runtime '{0}' (expected one of: {expected})", expected = crate::Runtime::labels().join(", "))]
    UnknownRuntime(String),

    /// None of the candidate directories hold NSwag binaries.
    #[error("NSwag binaries directory not found (searched: {searched})")]
    BinariesNotFound {
        /// The candidate directories, joined for display.
        searched: String,
    },

    /// The generator executable is missing.
    #[error("The path {} does not exist.", .0.display())]
    BinaryNotFound(PathBuf),

    /// The config document is missing.
    #[error("Config file path '{}' does not exist.", .0.display())]
    ConfigNotFound(PathBuf),

    /// The config document is not valid JSON.
    #[error("Unable to parse config.\n{0}")]
    ConfigParse(#[source] serde_json::Error),

    /// The config document is JSON but lacks a required section.
    #[error("Invalid config '{}': {reason}", path.display())]
    InvalidConfig { path: PathBuf, reason: String },

    /// An output targets a code generator the config does not define.
    #[error("Code generator {0} does not exist.")]
    UnknownGenerator(String),

    /// A caller-supplied option is malformed.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The input document named by `json` could not be read.
    #[error("Unable to read input document '{}'", path.display())]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generator process could not be started.
    #[error("Failed to spawn '{}'", program.display())]
    ProcessSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config lock could not be acquired.
    #[error("Failed to lock config '{}'", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type for NSwag operations.
pub type Result<T> = std::result::Result<T, NswagError>;
