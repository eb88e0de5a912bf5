//! Benchmarks for engine hot paths
//!
//! - Source name decoding and encoding (every file in the source tree)
//! - Autotemplating (`add --autotemplate`)
//! - Path joins

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use hearth_engine::attr::{DirAttr, FileAttr};
use hearth_engine::autotemplate::auto_template;

/// Benchmark source name decoding, the hot path of reading the source state
fn bench_attribute_parsing(c: &mut Criterion) {
    let files = [
        "dot_bashrc",
        "private_readonly_dot_netrc",
        "executable_dot_local_bin_tool",
        "encrypted_private_dot_token.age",
        "create_dot_hushlogin",
        "modify_dot_gitconfig.tmpl",
        "run_once_before_10-install.sh.tmpl",
        "symlink_dot_vimrc",
        "literal_dot_literal",
    ];
    let dirs = ["dot_config", "exact_private_dot_ssh", "remove_dot_old"];

    c.bench_function("file_attr_parse", |b| {
        b.iter(|| {
            for name in &files {
                black_box(FileAttr::parse(black_box(name), ".age"));
            }
        });
    });

    c.bench_function("dir_attr_parse", |b| {
        b.iter(|| {
            for name in &dirs {
                black_box(DirAttr::parse(black_box(name)));
            }
        });
    });

    let parsed: Vec<FileAttr> = files.iter().map(|name| FileAttr::parse(name, ".age")).collect();
    c.bench_function("file_attr_encode", |b| {
        b.iter(|| {
            for attr in &parsed {
                black_box(attr.source_name(".age"));
            }
        });
    });
}

/// Benchmark autotemplating against growing data sets
fn bench_autotemplate(c: &mut Criterion) {
    let mut group = c.benchmark_group("autotemplate");

    for size in &[4usize, 32, 128] {
        let mut data = serde_json::Map::new();
        for i in 0..*size {
            data.insert(format!("key{i}"), serde_json::Value::String(format!("value-number-{i}")));
        }
        let data = serde_json::json!({ "user": data });
        let contents = (0..*size)
            .map(|i| format!("setting{i} = value-number-{i}\n"))
            .collect::<String>();

        group.bench_with_input(BenchmarkId::from_parameter(size), &contents, |b, contents| {
            b.iter(|| black_box(auto_template(black_box(contents), &data)));
        });
    }

    group.finish();
}

/// Benchmark path operations (very hot path)
fn bench_path_operations(c: &mut Criterion) {
    use hearth_engine::{AbsPath, RelPath};

    let base = AbsPath::new("/home/user/.local/share/chezmoi".into()).expect("Failed to create AbsPath");
    let rel = RelPath::new(".config/nvim/init.lua").expect("Failed to create RelPath");

    c.bench_function("path_join", |b| {
        b.iter(|| {
            let joined = black_box(&base).join(black_box(&rel));
            black_box(joined)
        });
    });
}

// Allow missing docs for criterion-generated code
#[allow(missing_docs)]
#[allow(clippy::wildcard_imports)]
mod bench_groups {
    use super::*;

    criterion_group!(benches, bench_attribute_parsing, bench_autotemplate, bench_path_operations,);
}

criterion_main!(bench_groups::benches);
