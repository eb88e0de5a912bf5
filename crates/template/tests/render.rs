//! Rendering source files against the default data

#![allow(clippy::unwrap_used, clippy::panic)]

use hearth_template::{ChezmoiInfo, TemplateContext, TemplateEngine};
use indexmap::IndexMap;
use serde_json::json;
use std::fs;

fn info(source_dir: &str) -> ChezmoiInfo {
    ChezmoiInfo {
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        hostname: "box".to_string(),
        username: "me".to_string(),
        home_dir: "/home/me".to_string(),
        source_dir: source_dir.to_string(),
        dest_dir: "/home/me".to_string(),
        version: "0.1.1".to_string(),
    }
}

#[test]
fn test_chezmoi_style_gitconfig() {
    let mut data = IndexMap::new();
    data.insert("email".to_string(), json!("me@example.com"));
    data.insert("git".to_string(), json!({"signing": true}));
    let value = TemplateContext::from_info(info("/src")).with_data(&data).to_value();

    let source = "\
[user]
    email = {{ .email }}
    name = {{ .chezmoi.username }}
{% if .git.signing %}
[commit]
    gpgsign = true
{% endif %}
{% if .chezmoi.os == \"darwin\" %}
[credential]
    helper = osxkeychain
{% endif %}
";
    let out = TemplateEngine::new()
        .render_named_str("dot_gitconfig.tmpl", source, &value)
        .unwrap();
    assert_eq!(
        out,
        "[user]\n    email = me@example.com\n    name = me\n[commit]\n    gpgsign = true\n"
    );
}

#[test]
fn test_shared_template_with_include() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("aliases"), "alias ll='ls -l'\n").unwrap();
    let value = TemplateContext::from_info(info(&dir.path().to_string_lossy())).to_value();

    let mut engine = TemplateEngine::new();
    engine
        .add_template("header", "# managed on {{ .chezmoi.hostname }}\n")
        .unwrap();
    let out = engine
        .render_named_str(
            "dot_bashrc.tmpl",
            "{% include \"header\" %}{{ include(\"aliases\") }}",
            &value,
        )
        .unwrap();
    assert_eq!(out, "# managed on box\nalias ll='ls -l'\n");
}

#[test]
fn test_serialization_filters() {
    let data = json!({"settings": {"theme": "dark", "size": 12}});
    let engine = TemplateEngine::new();
    let toml = engine
        .render_named_str("t", "{{ .settings | toToml }}", &data)
        .unwrap();
    assert_eq!(toml, "size = 12\ntheme = \"dark\"\n");
    let yaml = engine
        .render_named_str("t", "{{ .settings | toYaml }}", &data)
        .unwrap();
    assert_eq!(yaml, "size: 12\ntheme: dark\n");
}

#[test]
fn test_errors_name_the_file() {
    let err = TemplateEngine::new()
        .render_named_str("dot_broken.tmpl", "{{ .nothing }}", &json!({}))
        .unwrap_err();
    assert!(err.to_string().contains("dot_broken.tmpl"));
}
