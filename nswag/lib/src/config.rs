//! Patching `.nswag` config documents in place and putting them back.
//!
//! The patched document only lives on disk for as long as the generator
//! runs. [`ConfigGuard`] owns the original bytes and writes them back when
//! restored or dropped, so the file ends up byte-identical to what it was.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, instrument, warn};

use crate::error::{NswagError, Result};
use crate::options::{RunOptions, resolve_inline_document};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// A config document read from disk, with its original bytes.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    raw: Vec<u8>,
    document: Value,
}

impl ConfigFile {
    /// Reads and parses the config at `path`.
    ///
    /// A leading UTF-8 byte order mark is skipped for parsing but kept in
    /// the original bytes.
    ///
    /// ## Errors
    ///
    /// - [`NswagError::ConfigNotFound`] if `path` does not exist
    /// - [`NswagError::ConfigParse`] if the content is not JSON
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(NswagError::ConfigNotFound(path.to_path_buf()));
        }

        let raw = fs::read(path)?;
        let body = raw.strip_prefix(UTF8_BOM).unwrap_or(&raw);
        let document = serde_json::from_slice(body).map_err(NswagError::ConfigParse)?;
        debug!(bytes = raw.len(), "Read config");

        Ok(Self {
            path: path.to_path_buf(),
            raw,
            document,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bytes as they were on disk.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The (possibly patched) document.
    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Names of the code generators the config defines.
    pub fn generators(&self) -> Vec<&str> {
        self.document
            .get("codeGenerators")
            .and_then(Value::as_object)
            .map(|gens| {
                gens.iter()
                    .filter(|(_, v)| v.is_object())
                    .map(|(k, _)| k.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Applies `options` to the in-memory document.
    ///
    /// Every output key is checked against `codeGenerators` before anything
    /// is changed, so a failed call leaves the document as it was.
    ///
    /// ## Errors
    ///
    /// - [`NswagError::UnknownGenerator`] for an output key the config lacks
    /// - [`NswagError::InvalidConfig`] if `documentGenerator.fromDocument` is missing
    /// - [`NswagError::InputRead`] if `input.json` names an unreadable file
    pub fn apply(&mut self, options: &RunOptions) -> Result<()> {
        let outputs = options.normalized_outputs();

        let known = self.generators();
        if let Some(missing) = outputs.keys().find(|k| !known.contains(*k)) {
            return Err(NswagError::UnknownGenerator((*missing).to_string()));
        }

        let location = options.input.location();
        let inline = resolve_inline_document(&options.input, location.as_deref())?;

        let from_document = self.section_mut("/documentGenerator/fromDocument")?;
        if let Some(json) = inline {
            debug!(bytes = json.len(), "Inlining input document");
            from_document.insert("json".to_string(), Value::String(json));
        }
        from_document.insert(
            "url".to_string(),
            location.map_or(Value::Null, Value::String),
        );

        for (generator, output) in outputs {
            let section = self.section_mut(&format!("/codeGenerators/{}", escape_pointer(generator)))?;
            section.insert("output".to_string(), Value::String(output));
        }

        Ok(())
    }

    fn section_mut(&mut self, pointer: &str) -> Result<&mut Map<String, Value>> {
        let path = self.path.clone();
        self.document
            .pointer_mut(pointer)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| NswagError::InvalidConfig {
                path,
                reason: format!("missing object at '{pointer}'"),
            })
    }

    /// Writes the patched document and returns a guard holding the original.
    ///
    /// ## Errors
    ///
    /// Returns an error if the document cannot be written; the file on disk
    /// is unchanged in that case.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn write_patched(self) -> Result<ConfigGuard> {
        let patched = serde_json::to_vec(&self.document).map_err(std::io::Error::from)?;
        replace_contents(&self.path, &patched)?;
        debug!(bytes = patched.len(), "Wrote patched config");

        Ok(ConfigGuard {
            path: self.path,
            original: self.raw,
            restored: false,
        })
    }
}

/// Holds the original bytes of a patched config.
///
/// Call [`restore`](Self::restore) to put them back and observe failures.
/// A guard dropped without being restored restores on drop and logs any
/// failure.
#[derive(Debug)]
#[must_use = "dropping the guard restores the config immediately"]
pub struct ConfigGuard {
    path: PathBuf,
    original: Vec<u8>,
    restored: bool,
}

impl ConfigGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the original bytes back.
    ///
    /// ## Errors
    ///
    /// Returns the I/O error if the write fails.
    pub fn restore(mut self) -> Result<()> {
        self.restored = true;
        replace_contents(&self.path, &self.original)?;
        debug!(path = %self.path.display(), "Restored config");
        Ok(())
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(e) = replace_contents(&self.path, &self.original) {
            warn!(path = %self.path.display(), error = %e, "Failed to restore config");
        }
    }
}

/// Exclusive advisory lock on `<config>.lock`, held for a whole run.
#[derive(Debug)]
pub struct ConfigLock {
    file: File,
    path: PathBuf,
}

impl ConfigLock {
    /// Blocks until the lock for `config` is acquired.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::Lock`] if the lock file cannot be created or locked.
    pub fn acquire(config: &Path) -> Result<Self> {
        let path = lock_path(config);
        let lock_err = |source: std::io::Error| NswagError::Lock {
            path: path.clone(),
            source,
        };

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(lock_err)?;
        file.lock_exclusive().map_err(lock_err)?;
        debug!(path = %path.display(), "Acquired config lock");

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!(path = %self.path.display(), error = %e, "Failed to release config lock");
        }
    }
}

fn lock_path(config: &Path) -> PathBuf {
    let mut name = config.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    config.with_file_name(name)
}

/// Escapes a key for use as a JSON pointer segment.
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Replaces the content of `path` with `bytes`.
///
/// Symlinks are followed so the link survives and its target is written.
/// A missing file is created.
/// A file with other hard links is rewritten in place; anything else goes
/// through a temp file and rename, keeping the existing permissions.
fn replace_contents(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let target = match fs::canonicalize(path) {
        Ok(target) => target,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => path.to_path_buf(),
        Err(e) => return Err(e),
    };

    if target.exists() && has_other_links(&target)? {
        let mut file = OpenOptions::new().write(true).truncate(true).open(&target)?;
        file.write_all(bytes)?;
        return file.sync_all();
    }

    let parent = target
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let temp = NamedTempFile::new_in(parent)?;
    fs::write(temp.path(), bytes)?;
    if let Ok(meta) = fs::metadata(&target) {
        fs::set_permissions(temp.path(), meta.permissions())?;
    }
    temp.persist(&target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn has_other_links(path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;
    Ok(fs::metadata(path)?.nlink() > 1)
}

#[cfg(not(unix))]
fn has_other_links(_path: &Path) -> std::io::Result<bool> {
    Ok(false)
}
