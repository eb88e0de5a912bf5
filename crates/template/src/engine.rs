//! Template engine implementation
//!
//! The engine wraps minijinja. Every source passes through
//! [`rewrite_go_dots`] before it is parsed.

use crate::functions;
use crate::preprocess::rewrite_go_dots;
use crate::{Error, Result};
use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;

/// Template engine for rendering source files
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl std::fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateEngine")
            .field("templates", &self.env.templates().count())
            .finish()
    }
}

impl TemplateEngine {
    /// Create an engine with the hearth functions and filters registered
    #[must_use]
    pub fn new() -> Self {
        let mut env = Environment::new();

        // Referencing missing data is an error, not an empty string
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        env.set_keep_trailing_newline(true);

        env.add_function("env", functions::env);
        env.add_function("joinPath", functions::join_path);
        env.add_function("lookPath", functions::look_path);
        env.add_function("include", functions::include);
        env.add_function("output", functions::output);

        env.add_filter("quote", functions::quote);
        env.add_filter("toJson", functions::to_json);
        env.add_filter("fromJson", functions::from_json);
        env.add_filter("toToml", functions::to_toml);
        env.add_filter("toYaml", functions::to_yaml);

        Self { env }
    }

    /// Register a shared template usable with `{% include "name" %}`
    ///
    /// # Errors
    ///
    /// Returns error if `source` does not parse
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        let source = rewrite_go_dots(source).into_owned();
        self.env
            .add_template_owned(name.to_string(), source)
            .map_err(Error::from)
    }

    /// Parse `source` without rendering it
    ///
    /// # Errors
    ///
    /// Returns error if `source` does not parse
    pub fn check(&self, name: &str, source: &str) -> Result<()> {
        let source = rewrite_go_dots(source);
        // Parsing needs no registered functions
        let env = Environment::new();
        env.template_from_named_str(name, &source)?;
        Ok(())
    }

    /// Render `source` with `data`, naming it `name` in error messages
    ///
    /// # Examples
    ///
    /// ```
    /// use hearth_template::TemplateEngine;
    /// use serde_json::json;
    ///
    /// let engine = TemplateEngine::new();
    /// let out = engine
    ///     .render_named_str("dot_gitconfig.tmpl", "email = {{ .email }}\n", &json!({"email": "me@example.com"}))
    ///     .unwrap();
    /// assert_eq!(out, "email = me@example.com\n");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns error if `source` does not parse or rendering fails
    pub fn render_named_str<S: Serialize>(&self, name: &str, source: &str, data: &S) -> Result<String> {
        let source = rewrite_go_dots(source);
        self.env
            .render_named_str(name, &source, data)
            .map_err(Error::from)
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn to_core(name: &str, err: &Error) -> hearth_core::Error {
    hearth_core::Error::Template {
        name: name.to_string(),
        message: err.to_string(),
    }
}

impl hearth_core::TemplateRenderer for TemplateEngine {
    fn add_template(&mut self, name: &str, source: &str) -> hearth_core::Result<()> {
        Self::add_template(self, name, source).map_err(|e| to_core(name, &e))
    }

    fn check(&self, name: &str, source: &str) -> hearth_core::Result<()> {
        Self::check(self, name, source).map_err(|e| to_core(name, &e))
    }

    fn render_named_str(&self, name: &str, source: &str, data: &serde_json::Value) -> hearth_core::Result<String> {
        Self::render_named_str(self, name, source, data).map_err(|e| to_core(name, &e))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;
    use hearth_core::TemplateRenderer;
    use serde_json::json;

    fn render(source: &str, data: &serde_json::Value) -> Result<String> {
        TemplateEngine::new().render_named_str("test", source, data)
    }

    #[test]
    fn test_go_style_references() {
        let data = json!({"chezmoi": {"os": "linux"}, "email": "me@example.com"});
        let out = render("{{ .chezmoi.os }} {{ .email }}", &data).unwrap();
        assert_eq!(out, "linux me@example.com");
    }

    #[test]
    fn test_plain_references() {
        let out = render("{{ chezmoi.os }}", &json!({"chezmoi": {"os": "darwin"}})).unwrap();
        assert_eq!(out, "darwin");
    }

    #[test]
    fn test_trailing_newline_kept() {
        assert_eq!(render("a\n", &json!({})).unwrap(), "a\n");
    }

    #[test]
    fn test_block_whitespace() {
        let source = "start\n  {% if .on %}\nyes\n  {% endif %}\nend\n";
        assert_eq!(render(source, &json!({"on": true})).unwrap(), "start\nyes\nend\n");
    }

    #[test]
    fn test_strict_undefined() {
        let err = render("{{ .missing }}", &json!({})).unwrap_err();
        assert!(matches!(err, Error::Render { .. }));
        assert!(render("{{ .a.missing }}", &json!({"a": {}})).is_err());
    }

    #[test]
    fn test_syntax_error() {
        let engine = TemplateEngine::new();
        let err = engine.check("broken", "{{ ").unwrap_err();
        assert!(matches!(err, Error::Syntax { .. }));
        assert!(err.to_string().contains("broken"));
        assert!(engine.check("ok", "{{ .a }}").is_ok());
    }

    #[test]
    fn test_shared_templates() {
        let mut engine = TemplateEngine::new();
        engine.add_template("greeting", "hi {{ .name }}").unwrap();
        let out = engine
            .render_named_str("dot_x.tmpl", "{% include \"greeting\" %}!", &json!({"name": "me"}))
            .unwrap();
        assert_eq!(out, "hi me!");
    }

    #[test]
    fn test_filters() {
        let data = json!({"v": {"a": 1}});
        assert_eq!(render("{{ .v | toJson }}", &data).unwrap(), r#"{"a":1}"#);
        assert_eq!(render("{{ \"x\" | quote }}", &data).unwrap(), "\"x\"");
        assert_eq!(render("{{ (\"[1]\" | fromJson)[0] }}", &data).unwrap(), "1");
    }

    #[test]
    fn test_renderer_trait_maps_errors() {
        let engine = TemplateEngine::new();
        let err = TemplateRenderer::render_named_str(&engine, "dot_x.tmpl", "{{ .nope }}", &json!({})).unwrap_err();
        assert!(matches!(err, hearth_core::Error::Template { ref name, .. } if name == "dot_x.tmpl"));
    }

    #[test]
    fn test_include_reads_source_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("common"), "shared\n").unwrap();
        let data = json!({"chezmoi": {"sourceDir": dir.path().to_string_lossy()}});
        assert_eq!(render("{{ include(\"common\") }}", &data).unwrap(), "shared\n");
    }
}
