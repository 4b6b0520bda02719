//! Caller-supplied options for a generator run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{NswagError, Result};

/// Replaces every `\` with `/`.
///
/// NSwag treats both as separators on Windows, and forward slashes survive
/// the trip through JSON and argument parsing unescaped.
///
/// ```
/// use nswag_lib::normalize_separators;
///
/// assert_eq!(normalize_separators(r"C:\api\client.ts"), "C:/api/client.ts");
/// ```
pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Where the OpenAPI/Swagger document comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Input {
    /// Local path to the document.
    pub path: Option<String>,
    /// URL of the document. Ignored when `path` is set.
    pub url: Option<String>,
    /// Inline JSON document, or a path to one.
    pub json: Option<String>,
}

impl Input {
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn json(json: impl Into<String>) -> Self {
        Self {
            json: Some(json.into()),
            ..Self::default()
        }
    }

    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }

    /// The document location written to `fromDocument.url`: `path`, else
    /// `url`, with separators normalized.
    pub fn location(&self) -> Option<String> {
        self.path
            .as_deref()
            .or(self.url.as_deref())
            .filter(|s| !s.is_empty())
            .map(normalize_separators)
    }
}

/// Options for [`Nswag::run`](crate::Nswag::run).
///
/// Deserializes from the JSON shape
/// `{ "input": {..}, "outputs": {"<generator>": "<path>"}, "variables": {..} }`.
///
/// ## Examples
///
/// ```
/// use nswag_lib::{Input, RunOptions};
///
/// let options = RunOptions::new(Input::path("api/openapi.json"))
///     .with_output("openApiToTypeScriptClient", "src/client.ts")
///     .with_variable("Configuration", "Release");
///
/// assert!(options.validate().is_ok());
/// assert_eq!(options.variables_arg().as_deref(), Some("/variables:Configuration=Release"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOptions {
    pub input: Input,
    /// Generator name (a key under `codeGenerators`) to output path.
    pub outputs: BTreeMap<String, String>,
    /// Forwarded as NSwag's `/variables:` argument.
    pub variables: BTreeMap<String, String>,
}

impl RunOptions {
    pub fn new(input: Input) -> Self {
        Self {
            input,
            ..Self::default()
        }
    }

    /// Loads options from a JSON file.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::InputRead`] if the file cannot be read and
    /// [`NswagError::InvalidOption`] if it is not a valid options document.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| NswagError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;

        serde_json::from_str(&text)
            .map_err(|e| NswagError::InvalidOption(format!("{}: {e}", path.display())))
    }

    pub fn with_output(mut self, generator: impl Into<String>, path: impl Into<String>) -> Self {
        self.outputs.insert(generator.into(), path.into());
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Output paths with separators normalized.
    pub fn normalized_outputs(&self) -> BTreeMap<&str, String> {
        self.outputs
            .iter()
            .map(|(generator, path)| (generator.as_str(), normalize_separators(path)))
            .collect()
    }

    /// Checks the options without touching the filesystem.
    ///
    /// ## Errors
    ///
    /// Returns [`NswagError::InvalidOption`] for empty generator names or
    /// variables that cannot be encoded in `/variables:`.
    pub fn validate(&self) -> Result<()> {
        if self.outputs.keys().any(|k| k.trim().is_empty()) {
            return Err(NswagError::InvalidOption(
                "output generator names must not be empty".to_string(),
            ));
        }

        for (name, value) in &self.variables {
            if name.trim().is_empty() {
                return Err(NswagError::InvalidOption(
                    "variable names must not be empty".to_string(),
                ));
            }
            if [name, value].iter().any(|s| s.contains([',', '='])) {
                return Err(NswagError::InvalidOption(format!(
                    "variable '{name}' must not contain ',' or '='"
                )));
            }
        }

        Ok(())
    }

    /// The `/variables:k1=v1,k2=v2` argument, if any variables are set.
    pub fn variables_arg(&self) -> Option<String> {
        if self.variables.is_empty() {
            return None;
        }

        let pairs: Vec<String> = self
            .variables
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();

        Some(format!("/variables:{}", pairs.join(",")))
    }
}

/// Resolves the inline document text for `input`.
///
/// `json` is used as-is when it parses as JSON, otherwise it is read as a
/// file. Without `json`, a `location` naming a readable local file is
/// inlined; anything else (a remote URL) yields `None`.
pub(crate) fn resolve_inline_document(input: &Input, location: Option<&str>) -> Result<Option<String>> {
    if let Some(json) = input.json.as_deref().filter(|j| !j.is_empty()) {
        if serde_json::from_str::<serde::de::IgnoredAny>(json).is_ok() {
            return Ok(Some(json.to_string()));
        }

        let path = PathBuf::from(json);
        let text = fs::read_to_string(&path).map_err(|source| NswagError::InputRead { path, source })?;
        return Ok(Some(text));
    }

    Ok(location.and_then(|loc| fs::read_to_string(loc).ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_prefers_path() {
        let input = Input {
            path: Some(r"specs\api.json".to_string()),
            url: Some("https://example.com/api.json".to_string()),
            json: None,
        };
        assert_eq!(input.location().as_deref(), Some("specs/api.json"));
        assert_eq!(
            Input::url("https://example.com/api.json").location().as_deref(),
            Some("https://example.com/api.json")
        );
        assert_eq!(Input::default().location(), None);
    }

    #[test]
    fn outputs_are_normalized() {
        let options = RunOptions::default().with_output("openApiToTypeScriptClient", r"out\client.ts");
        assert_eq!(
            options.normalized_outputs().get("openApiToTypeScriptClient").map(String::as_str),
            Some("out/client.ts")
        );
    }

    #[test]
    fn validate_rejects_bad_variables() {
        let options = RunOptions::default().with_variable("a", "b,c");
        assert!(matches!(options.validate(), Err(NswagError::InvalidOption(_))));

        let options = RunOptions::default().with_variable("a=b", "c");
        assert!(options.validate().is_err());

        let options = RunOptions::default().with_output(" ", "x.ts");
        assert!(options.validate().is_err());
    }

    #[test]
    fn variables_arg_is_sorted() {
        let options = RunOptions::default()
            .with_variable("B", "2")
            .with_variable("A", "1");
        assert_eq!(options.variables_arg().as_deref(), Some("/variables:A=1,B=2"));
        assert_eq!(RunOptions::default().variables_arg(), None);
    }

    #[test]
    fn inline_json_used_verbatim() {
        let input = Input::json(r#"{"openapi":"3.0.0"}"#);
        let doc = resolve_inline_document(&input, None).unwrap();
        assert_eq!(doc.as_deref(), Some(r#"{"openapi":"3.0.0"}"#));
    }

    #[test]
    fn json_path_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("doc.json");
        fs::write(&file, r#"{"swagger":"2.0"}"#).unwrap();

        let input = Input::json(file.to_string_lossy());
        let doc = resolve_inline_document(&input, None).unwrap();
        assert_eq!(doc.as_deref(), Some(r#"{"swagger":"2.0"}"#));
    }

    #[test]
    fn unreadable_json_path_fails() {
        let input = Input::json("/definitely/not/here.json");
        let err = resolve_inline_document(&input, None).unwrap_err();
        assert!(matches!(err, NswagError::InputRead { .. }));
    }

    #[test]
    fn remote_location_is_not_inlined() {
        let input = Input::url("https://example.com/openapi.yaml");
        let doc = resolve_inline_document(&input, input.location().as_deref()).unwrap();
        assert_eq!(doc, None);
    }

    #[test]
    fn options_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("options.json");
        fs::write(
            &file,
            r#"{"input":{"url":"https://example.com/api.json"},"outputs":{"openApiToCSharpClient":"Client.cs"}}"#,
        )
        .unwrap();

        let options = RunOptions::from_file(&file).unwrap();
        assert_eq!(options.input.url.as_deref(), Some("https://example.com/api.json"));
        assert_eq!(options.outputs.len(), 1);
        assert!(options.variables.is_empty());
    }

    #[test]
    fn options_reject_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("options.json");
        fs::write(&file, r#"{"outputz":{}}"#).unwrap();

        assert!(matches!(RunOptions::from_file(&file), Err(NswagError::InvalidOption(_))));
    }
}
