/// Parses `KEY=VALUE`, splitting at the first `=`.
///
/// Used for `--output GENERATOR=PATH` and `--var NAME=VALUE`.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }

    Ok((key.to_string(), value.to_string()))
}
