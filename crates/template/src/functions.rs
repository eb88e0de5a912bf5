//! Template functions and filters
//!
//! Functions:
//! - `env("NAME")`: environment variable, empty when unset
//! - `lookPath("git")`: absolute path of an executable, empty when missing
//! - `joinPath("a", "b")`: join path components
//! - `include("path")`: raw contents of a file in the source directory
//! - `output("cmd", "arg"...)`: stdout of a command
//!
//! Filters: `quote`, `toJson`, `fromJson`, `toToml`, `toYaml`.

use minijinja::value::Rest;
use minijinja::{ErrorKind, State, Value};
use std::borrow::Cow;
use std::fs;
use std::path::{Component, Path, PathBuf};

fn invalid(message: impl Into<Cow<'static, str>>) -> minijinja::Error {
    minijinja::Error::new(ErrorKind::InvalidOperation, message)
}

/// Get an environment variable
///
/// Usage: `{{ env("PATH") }}`
pub fn env(name: &str) -> String {
    std::env::var(name).unwrap_or_default()
}

/// Join path components
///
/// Usage: `{{ joinPath(chezmoi.homeDir, ".config") }}`
#[must_use]
pub fn join_path(args: &[Value]) -> String {
    let mut path = PathBuf::new();
    for arg in args {
        if let Some(s) = arg.as_str() {
            path.push(s);
        }
    }
    path.to_string_lossy().into_owned()
}

/// Look up an executable in PATH
///
/// Usage: `{{ if lookPath("git") }}...{{ end }}`
///
/// Only bare names of alphanumerics, dashes, underscores and dots are
/// accepted.
///
/// # Errors
///
/// Returns error if `name` is not a bare executable name
pub fn look_path(name: &str) -> Result<String, minijinja::Error> {
    if name.is_empty()
        || name.contains("..")
        || !name
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(invalid(format!("Invalid executable name: '{name}'")));
    }

    Ok(which::which(name)
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default())
}

/// Run a command and return its stdout
///
/// Usage: `{{ output("git", "config", "user.email") | trim }}`
///
/// # Errors
///
/// Returns error if the command cannot be started or exits non-zero
pub fn output(name: &str, args: Rest<String>) -> Result<String, minijinja::Error> {
    tracing::debug!(command = name, args = ?args.0, "Running template command");
    let out = duct::cmd(name, args.0.iter())
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| invalid(format!("Failed to run '{name}': {e}")))?;

    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(invalid(format!(
            "'{name}' failed with {}: {}",
            out.status,
            stderr.trim()
        )));
    }
    String::from_utf8(out.stdout).map_err(|e| invalid(format!("'{name}' printed invalid UTF-8: {e}")))
}

/// Wrap a string in double quotes, escaping quotes and backslashes
///
/// Usage: `{{ value | quote }}`
#[must_use]
pub fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Serialize a value as JSON
///
/// # Errors
///
/// Returns error if the value has no JSON form
pub fn to_json(value: &Value) -> Result<String, minijinja::Error> {
    serde_json::to_string(value).map_err(|e| invalid(format!("Failed to serialize to JSON: {e}")))
}

/// Parse a JSON string
///
/// # Errors
///
/// Returns error if `value` is not valid JSON
pub fn from_json(value: &str) -> Result<Value, minijinja::Error> {
    let parsed: serde_json::Value =
        serde_json::from_str(value).map_err(|e| invalid(format!("Failed to parse JSON: {e}")))?;
    Ok(Value::from_serialize(&parsed))
}

/// Serialize a table as TOML
///
/// # Errors
///
/// Returns error if the value is not a table TOML can represent
pub fn to_toml(value: &Value) -> Result<String, minijinja::Error> {
    // toml needs tables before scalars; a JSON value reorders correctly
    let json = serde_json::to_value(value).map_err(|e| invalid(format!("Failed to convert value: {e}")))?;
    toml::to_string(&json).map_err(|e| invalid(format!("Failed to serialize to TOML: {e}")))
}

/// Serialize a value as YAML
///
/// # Errors
///
/// Returns error if the value has no YAML form
pub fn to_yaml(value: &Value) -> Result<String, minijinja::Error> {
    serde_yaml::to_string(value).map_err(|e| invalid(format!("Failed to serialize to YAML: {e}")))
}

/// Resolve `path` inside `source_dir`, rejecting anything that escapes it
fn validate_include_path(path: &str, source_dir: &Path) -> Result<PathBuf, minijinja::Error> {
    let requested = Path::new(path);
    if requested.is_absolute() {
        return Err(invalid(format!("Absolute paths not allowed in include(): {path}")));
    }
    for component in requested.components() {
        match component {
            Component::ParentDir => {
                return Err(invalid(format!("Path traversal (..) not allowed in include(): {path}")));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid(format!("Invalid path component in include(): {path}")));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    let canonical_file = fs::canonicalize(source_dir.join(path))
        .map_err(|e| invalid(format!("Failed to resolve path '{path}': {e}")))?;
    let canonical_source =
        fs::canonicalize(source_dir).map_err(|e| invalid(format!("Failed to resolve source directory: {e}")))?;

    // symlinks inside the source tree may still point out of it
    if !canonical_file.starts_with(&canonical_source) {
        return Err(invalid(format!(
            "Path '{path}' escapes source directory: {}",
            canonical_file.display()
        )));
    }
    Ok(canonical_file)
}

/// Include the raw contents of a file from the source directory
///
/// Usage: `{{ include("dot_zshrc-common") }}`
///
/// The path is relative to `chezmoi.sourceDir`. The contents are not
/// rendered.
///
/// # Errors
///
/// Returns error if `chezmoi.sourceDir` is missing from the data, the path
/// escapes the source directory, or the file cannot be read
pub fn include(state: &State, path: &str) -> Result<String, minijinja::Error> {
    let source_dir = state
        .lookup("chezmoi")
        .and_then(|chezmoi| chezmoi.get_attr("sourceDir").ok())
        .and_then(|v| v.as_str().map(PathBuf::from))
        .ok_or_else(|| invalid("chezmoi.sourceDir not found in template data for include()"))?;

    let file = validate_include_path(path, &source_dir)?;
    fs::read_to_string(&file).map_err(|e| invalid(format!("Failed to read file '{path}': {e}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env() {
        temp_env::with_var("HEARTH_TEST_VALUE", Some("v"), || {
            assert_eq!(env("HEARTH_TEST_VALUE"), "v");
        });
        temp_env::with_var_unset("HEARTH_TEST_VALUE", || {
            assert_eq!(env("HEARTH_TEST_VALUE"), "");
        });
    }

    #[test]
    fn test_join_path() {
        let args = [Value::from("/home"), Value::from("me"), Value::from(".config")];
        assert_eq!(join_path(&args), "/home/me/.config");
        assert_eq!(join_path(&[]), "");
    }

    #[test]
    fn test_look_path() {
        assert!(look_path("sh").unwrap().ends_with("/sh"));
        assert_eq!(look_path("hearth-no-such-binary").unwrap(), "");
        assert!(look_path("../sh").is_err());
        assert!(look_path("/bin/sh").is_err());
        assert!(look_path("").is_err());
    }

    #[test]
    fn test_output() {
        let out = output("echo", Rest(vec!["a".to_string(), "b".to_string()])).unwrap();
        assert_eq!(out, "a b\n");
        assert!(output("false", Rest(Vec::new())).is_err());
        assert!(output("hearth-no-such-binary", Rest(Vec::new())).is_err());
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("hello"), "\"hello\"");
        assert_eq!(quote(r#"say "hi""#), r#""say \"hi\"""#);
        assert_eq!(quote(r"a\b"), r#""a\\b""#);
    }

    #[test]
    fn test_json() {
        let value = from_json(r#"{"a": [1, 2]}"#).unwrap();
        assert_eq!(to_json(&value).unwrap(), r#"{"a":[1,2]}"#);
        assert!(from_json("{").is_err());
    }

    #[test]
    fn test_to_toml() {
        let value = from_json(r#"{"table": {"k": "v"}, "name": "x"}"#).unwrap();
        let toml = to_toml(&value).unwrap();
        assert!(toml.starts_with("name = \"x\""));
        assert!(toml.contains("[table]\nk = \"v\""));
        assert!(to_toml(&Value::from(1)).is_err());
    }

    #[test]
    fn test_to_yaml() {
        let value = from_json(r#"{"k": "v"}"#).unwrap();
        assert_eq!(to_yaml(&value).unwrap(), "k: v\n");
    }

    #[test]
    fn test_validate_include_path() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("common"), "x").unwrap();
        assert!(validate_include_path("common", dir.path()).is_ok());
        assert!(validate_include_path("../common", dir.path()).is_err());
        assert!(validate_include_path("/etc/passwd", dir.path()).is_err());
        assert!(validate_include_path("missing", dir.path()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_include_rejects_escaping_symlink() {
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret"), "x").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), dir.path().join("link")).unwrap();
        let err = validate_include_path("link", dir.path()).unwrap_err();
        assert!(err.to_string().contains("escapes source directory"));
    }
}
