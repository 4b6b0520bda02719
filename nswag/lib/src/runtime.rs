//! Runtime variants and host probing.
//!
//! NSwag ships one pre-built binary per runtime: native executables for
//! hosts with the full .NET Framework and `dotnet-nswag.dll` builds for each
//! supported .NET Core release. [`RuntimeProbe`] picks the variant the
//! current host can execute.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use strum::{EnumIter, IntoEnumIterator};
use tracing::{debug, instrument};
use which::which;

use crate::error::{NswagError, Result};

/// Leading `major.minor` of `dotnet --version` output.
static DOTNET_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+\.[0-9]+).+\s*$").expect("valid regex"));

/// A runtime variant, selecting which pre-built NSwag binary to invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum Runtime {
    /// Native executable, 64-bit Windows with the full .NET Framework.
    WinX64,
    /// Native executable, 32-bit Windows with the full .NET Framework.
    WinX86,
    NetCore21,
    NetCore22,
    NetCore30,
    NetCore31,
}

impl Runtime {
    /// Human-readable label, e.g. `NetCore 3.1`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::WinX64 => "Win x64",
            Self::WinX86 => "Win x86",
            Self::NetCore21 => "NetCore 2.1",
            Self::NetCore22 => "NetCore 2.2",
            Self::NetCore30 => "NetCore 3.0",
            Self::NetCore31 => "NetCore 3.1",
        }
    }

    /// Directory under `bin/binaries` holding this variant.
    pub const fn directory(self) -> &'static str {
        match self {
            Self::WinX64 | Self::WinX86 => "Win",
            Self::NetCore21 => "NetCore21",
            Self::NetCore22 => "NetCore22",
            Self::NetCore30 => "NetCore30",
            Self::NetCore31 => "NetCore31",
        }
    }

    /// File name of the binary inside [`directory`](Self::directory).
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::WinX64 => "NSwag.exe",
            Self::WinX86 => "NSwag.x86.exe",
            _ => "dotnet-nswag.dll",
        }
    }

    /// Binary path relative to the binaries directory.
    ///
    /// ```
    /// use nswag_lib::Runtime;
    /// use std::path::Path;
    ///
    /// assert_eq!(
    ///     Runtime::NetCore31.binary_path(),
    ///     Path::new("NetCore31").join("dotnet-nswag.dll")
    /// );
    /// ```
    pub fn binary_path(self) -> PathBuf {
        Path::new(self.directory()).join(self.file_name())
    }

    /// Whether the binary is a managed assembly launched through `dotnet`.
    pub const fn uses_dotnet_host(self) -> bool {
        !matches!(self, Self::WinX64 | Self::WinX86)
    }

    /// All labels, in declaration order.
    pub fn labels() -> Vec<&'static str> {
        Self::iter().map(Self::label).collect()
    }

    /// Maps `dotnet --version` output to a .NET Core variant.
    ///
    /// Only the leading `major.minor` is considered.
    ///
    /// ```
    /// use nswag_lib::Runtime;
    ///
    /// assert_eq!(Runtime::from_dotnet_version("3.1.426\n"), Some(Runtime::NetCore31));
    /// assert_eq!(Runtime::from_dotnet_version("8.0.100"), None);
    /// ```
    pub fn from_dotnet_version(output: &str) -> Option<Self> {
        let line = output.lines().find(|l| !l.trim().is_empty())?;
        let version = DOTNET_VERSION.captures(line)?.get(1)?.as_str();

        match version {
            "2.1" => Some(Self::NetCore21),
            "2.2" => Some(Self::NetCore22),
            "3.0" => Some(Self::NetCore30),
            "3.1" => Some(Self::NetCore31),
            _ => None,
        }
    }

    /// Detects the runtime variant for the current host.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::NoCompatibleRuntime`] when neither the full .NET
    /// Framework nor a supported `dotnet` release is available.
    pub fn detect() -> Result<Self> {
        RuntimeProbe::current().detect()
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Runtime {
    type Err = NswagError;

    /// Accepts the label (`NetCore 3.1`) or the compact form (`netcore31`,
    /// `winx64`), case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        let wanted = compact(s);
        Self::iter()
            .find(|r| compact(r.label()) == wanted)
            .ok_or_else(|| NswagError::UnknownRuntime(s.to_string()))
    }
}

fn compact(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// The facts about a host that runtime detection depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    /// Operating system family, as in [`std::env::consts::OS`].
    pub os: String,
    /// CPU architecture, as in [`std::env::consts::ARCH`].
    pub arch: String,
    /// Value of the `windir` environment variable.
    pub windir: Option<PathBuf>,
}

impl HostPlatform {
    /// Snapshot of the running host.
    pub fn current() -> Self {
        Self {
            os: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            windir: env::var_os("windir").map(PathBuf::from),
        }
    }

    /// Whether `<windir>/Microsoft.NET` exists as a directory.
    pub fn has_full_dotnet(&self) -> bool {
        self.windir
            .as_ref()
            .is_some_and(|dir| dir.join("Microsoft.NET").is_dir())
    }
}

/// Picks a [`Runtime`] for a host.
///
/// ## Detection order
///
/// 1. Windows with the full .NET Framework: `Win x64` on x86_64, `Win x86` on x86
/// 2. Otherwise `dotnet --version` decides between the .NET Core variants
#[derive(Debug, Clone)]
pub struct RuntimeProbe {
    host: HostPlatform,
    dotnet: Option<PathBuf>,
}

impl RuntimeProbe {
    /// Probe for the running host, locating `dotnet` through PATH.
    pub fn current() -> Self {
        Self {
            host: HostPlatform::current(),
            dotnet: which("dotnet").ok(),
        }
    }

    /// Probe with explicit host facts and `dotnet` location.
    pub fn new(host: HostPlatform, dotnet: Option<PathBuf>) -> Self {
        Self { host, dotnet }
    }

    pub fn host(&self) -> &HostPlatform {
        &self.host
    }

    /// Runs the detection.
    ///
    /// ## Errors
    ///
    /// - [`NswagError::NoCompatibleRuntime`] if nothing usable is found
    /// - [`NswagError::ProcessSpawn`] if `dotnet --version` cannot be run
    #[instrument(skip(self), fields(os = %self.host.os, arch = %self.host.arch))]
    pub fn detect(&self) -> Result<Runtime> {
        if self.host.os == "windows" && self.host.has_full_dotnet() {
            match self.host.arch.as_str() {
                "x86_64" => return Ok(Runtime::WinX64),
                "x86" => return Ok(Runtime::WinX86),
                other => debug!(arch = other, "No native NSwag build for arch, trying dotnet"),
            }
        }

        let dotnet = self
            .dotnet
            .as_ref()
            .ok_or_else(|| NswagError::NoCompatibleRuntime {
                found: "dotnet not found on PATH".to_string(),
            })?;

        let output = Command::new(dotnet)
            .arg("--version")
            .output()
            .map_err(|source| NswagError::ProcessSpawn {
                program: dotnet.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(version = stdout.trim(), "dotnet --version");

        Runtime::from_dotnet_version(&stdout).ok_or_else(|| NswagError::NoCompatibleRuntime {
            found: format!("dotnet {}", stdout.trim()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for runtime in Runtime::iter() {
            assert_eq!(runtime.to_string().parse::<Runtime>().unwrap(), runtime);
        }
    }

    #[test]
    fn parse_accepts_compact_forms() {
        assert_eq!("netcore31".parse::<Runtime>().unwrap(), Runtime::NetCore31);
        assert_eq!("NetCore21".parse::<Runtime>().unwrap(), Runtime::NetCore21);
        assert_eq!("WIN X86".parse::<Runtime>().unwrap(), Runtime::WinX86);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "NetCore 5.0".parse::<Runtime>().unwrap_err();
        assert!(matches!(err, NswagError::UnknownRuntime(_)));
        assert!(err.to_string().contains("NetCore 3.1"));
    }

    #[test]
    fn binary_paths() {
        assert_eq!(Runtime::WinX64.binary_path(), Path::new("Win").join("NSwag.exe"));
        assert_eq!(Runtime::WinX86.binary_path(), Path::new("Win").join("NSwag.x86.exe"));
        assert_eq!(
            Runtime::NetCore22.binary_path(),
            Path::new("NetCore22").join("dotnet-nswag.dll")
        );
        assert_eq!(
            Runtime::NetCore30.binary_path(),
            Path::new("NetCore30").join("dotnet-nswag.dll")
        );
    }

    #[test]
    fn dotnet_host_only_for_netcore() {
        assert!(!Runtime::WinX64.uses_dotnet_host());
        assert!(!Runtime::WinX86.uses_dotnet_host());
        assert!(Runtime::NetCore21.uses_dotnet_host());
        assert!(Runtime::NetCore31.uses_dotnet_host());
    }

    #[test]
    fn dotnet_versions() {
        assert_eq!(Runtime::from_dotnet_version("2.1.818"), Some(Runtime::NetCore21));
        assert_eq!(Runtime::from_dotnet_version("2.2.402\n"), Some(Runtime::NetCore22));
        assert_eq!(Runtime::from_dotnet_version("  3.0.103  "), Some(Runtime::NetCore30));
        assert_eq!(Runtime::from_dotnet_version("\n3.1.426\r\n"), Some(Runtime::NetCore31));
    }

    #[test]
    fn dotnet_versions_unsupported() {
        assert_eq!(Runtime::from_dotnet_version("6.0.100"), None);
        assert_eq!(Runtime::from_dotnet_version("3.10.1"), None);
        // a bare major.minor has nothing after it for `.+` to match
        assert_eq!(Runtime::from_dotnet_version("3.1"), None);
        assert_eq!(Runtime::from_dotnet_version(""), None);
        assert_eq!(Runtime::from_dotnet_version("command not found"), None);
    }

    #[test]
    fn windows_with_full_framework() {
        let windir = tempfile::tempdir().unwrap();
        std::fs::create_dir(windir.path().join("Microsoft.NET")).unwrap();

        let host = |arch: &str| HostPlatform {
            os: "windows".to_string(),
            arch: arch.to_string(),
            windir: Some(windir.path().to_path_buf()),
        };

        assert_eq!(RuntimeProbe::new(host("x86_64"), None).detect().unwrap(), Runtime::WinX64);
        assert_eq!(RuntimeProbe::new(host("x86"), None).detect().unwrap(), Runtime::WinX86);
    }

    #[test]
    fn windows_without_framework_needs_dotnet() {
        let windir = tempfile::tempdir().unwrap();
        let host = HostPlatform {
            os: "windows".to_string(),
            arch: "x86_64".to_string(),
            windir: Some(windir.path().to_path_buf()),
        };

        let err = RuntimeProbe::new(host, None).detect().unwrap_err();
        assert!(matches!(err, NswagError::NoCompatibleRuntime { .. }));
    }

    #[test]
    fn missing_dotnet_is_no_runtime() {
        let host = HostPlatform {
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            windir: None,
        };
        assert!(!host.has_full_dotnet());

        let err = RuntimeProbe::new(host, None).detect().unwrap_err();
        assert!(err.to_string().contains("dotnet not found"));
    }
}
