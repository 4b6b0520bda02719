//! NSwag runner
//!
//! Drives the external NSwag code generator: picks the runtime variant the
//! host can execute, patches a `.nswag` config with the caller's input and
//! output paths, runs the generator and puts the config back exactly as it
//! was.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nswag_lib::{Input, Nswag, RunOptions};
//!
//! # async fn example() -> nswag_lib::Result<()> {
//! let nswag = Nswag::detect()?;
//!
//! nswag
//!     .run(
//!         "api/main.nswag",
//!         &RunOptions::new(Input::url("https://example.com/openapi.json"))
//!             .with_output("openApiToTypeScriptClient", "src/api/client.ts"),
//!     )
//!     .await?;
//!
//! nswag.openapi2tsclient("api/openapi.json", "src/api/client.ts").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`runtime`] - Runtime variants and host probing
//! - [`locator`] - Finding the NSwag binaries and launching them
//! - [`options`] - Input and output options for a run
//! - [`config`] - Patching and restoring config documents
//! - [`process`] - Running the generator subprocess

pub mod config;
mod error;
pub mod locator;
mod nswag;
pub mod options;
pub mod process;
pub mod runtime;

pub use config::{ConfigFile, ConfigGuard, ConfigLock};
pub use error::{NswagError, Result};
pub use locator::{BINARIES_DIR_ENV, BinaryLocator, GeneratorBinary};
pub use nswag::Nswag;
pub use options::{Input, RunOptions, normalize_separators};
pub use process::{GeneratorOutput, invoke};
pub use runtime::{HostPlatform, Runtime, RuntimeProbe};
