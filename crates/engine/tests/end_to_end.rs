//! Reading, applying and adding with the real encryption and template
//! backends against a temporary home directory

#![allow(clippy::unwrap_used, clippy::panic)]

use hearth_core::Umask;
use hearth_crypto::{AgeEncryption, Identity};
use hearth_engine::persistent::{ENTRY_STATE_BUCKET, MockPersistentState, PersistentState, RedbPersistentState};
use hearth_engine::system::{DumpEntry, DumpSystem, RealSystem};
use hearth_engine::{
    AbsPath, AddOptions, ApplyOptions, ApplyReport, ContentProcessor, ReadOptions, SourceState, Version,
};
use hearth_template::TemplateEngine;
use serde_json::{Value, json};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::rc::Rc;
use tempfile::TempDir;

struct Home {
    _temp: TempDir,
    root: AbsPath,
    source: AbsPath,
    dest: AbsPath,
    key: String,
    persistent: RedbPersistentState,
}

impl Home {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let root = AbsPath::from_path(temp.path()).unwrap();
        let source = root.join_str("source");
        let dest = root.join_str("home");
        fs::create_dir_all(source.as_path()).unwrap();
        fs::create_dir_all(dest.as_path()).unwrap();
        let persistent = RedbPersistentState::new(root.join_str("state.redb").as_path()).unwrap();
        Home {
            _temp: temp,
            root,
            source,
            dest,
            key: Identity::generate().to_string(),
            persistent,
        }
    }

    fn source_file(&self, rel: &str, contents: &str) {
        let path = self.source.join_str(rel);
        fs::create_dir_all(path.as_path().parent().unwrap()).unwrap();
        fs::write(path.as_path(), contents).unwrap();
    }

    fn dest_file(&self, rel: &str, contents: &str) {
        let path = self.dest.join_str(rel);
        fs::create_dir_all(path.as_path().parent().unwrap()).unwrap();
        fs::write(path.as_path(), contents).unwrap();
    }

    fn dest_contents(&self, rel: &str) -> String {
        fs::read_to_string(self.dest.join_str(rel).as_path()).unwrap()
    }

    fn dest_mode(&self, rel: &str) -> u32 {
        fs::metadata(self.dest.join_str(rel).as_path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777
    }

    fn dest_exists(&self, rel: &str) -> bool {
        fs::symlink_metadata(self.dest.join_str(rel).as_path()).is_ok()
    }

    fn processor(&self) -> ContentProcessor {
        let identity: Identity = self.key.parse().unwrap();
        let recipient = identity.to_public();
        ContentProcessor::new(
            Box::new(AgeEncryption::new(vec![recipient], vec![identity])),
            Box::new(TemplateEngine::new()),
        )
    }

    fn data(&self) -> Value {
        json!({
            "email": "someone@example.org",
            "chezmoi": {
                "os": "linux",
                "sourceDir": self.source.to_string(),
                "destDir": self.dest.to_string(),
            },
        })
    }

    fn read(&self) -> SourceState {
        SourceState::read(
            Rc::new(RealSystem),
            Rc::new(RealSystem),
            self.processor(),
            ReadOptions {
                source_dir: self.source.clone(),
                dest_dir: self.dest.clone(),
                data: self.data(),
                priority_data: Value::Null,
                version: Version::new(2, 0, 0),
            },
        )
        .unwrap()
    }

    fn apply_with(&self, umask: Umask) -> ApplyReport {
        let state = self.read();
        let report = state
            .apply_all(
                &RealSystem,
                &self.persistent,
                &state.target_rel_paths(),
                &mut ApplyOptions::new(umask),
            )
            .unwrap();
        assert!(report.is_ok(), "{:?}", report.errors);
        report
    }

    fn apply(&self) -> ApplyReport {
        self.apply_with(Umask::DEFAULT)
    }
}

#[test]
fn test_basic_tree() {
    let home = Home::new();
    home.source_file("dot_bashrc", "export EDITOR=vi\n");
    home.source_file("dot_config/git/config.tmpl", "[user]\n    email = {{ .email }}\n");
    home.source_file("empty_dot_hushlogin", "");
    home.source_file("symlink_dot_vimrc", ".config/vim/vimrc\n");
    home.apply();

    assert_eq!(home.dest_contents(".bashrc"), "export EDITOR=vi\n");
    assert_eq!(
        home.dest_contents(".config/git/config"),
        "[user]\n    email = someone@example.org\n"
    );
    assert_eq!(home.dest_contents(".hushlogin"), "");
    let link = fs::read_link(home.dest.join_str(".vimrc").as_path()).unwrap();
    assert_eq!(link.to_string_lossy(), ".config/vim/vimrc");
}

#[test]
fn test_empty_source_removes_target() {
    let home = Home::new();
    home.source_file("dot_blank", "");
    home.dest_file(".blank", "old\n");
    home.apply();
    assert!(!home.dest_exists(".blank"));
}

#[test]
fn test_second_apply_changes_nothing() {
    let home = Home::new();
    home.source_file("dot_profile", "umask 022\n");
    home.source_file("private_dot_ssh/config", "Host *\n");

    let first = home.apply();
    assert_eq!(first.applied.len(), 3);
    let second = home.apply();
    assert!(second.applied.is_empty(), "{:?}", second.applied);

    let key = home.dest.join_str(".profile").to_slash();
    assert!(
        home.persistent
            .get(ENTRY_STATE_BUCKET, key.as_bytes())
            .unwrap()
            .is_some()
    );
}

#[test]
fn test_exact_dir_removes_unmanaged() {
    let home = Home::new();
    home.source_file("exact_dot_bin/tool", "#!/bin/sh\n");
    home.dest_file(".bin/tool", "stale\n");
    home.dest_file(".bin/leftover", "x\n");
    home.apply();
    assert_eq!(home.dest_contents(".bin/tool"), "#!/bin/sh\n");
    assert!(!home.dest_exists(".bin/leftover"));
}

#[test]
fn test_remove_file() {
    let home = Home::new();
    home.source_file(".chezmoiremove", ".old_*\n");
    home.dest_file(".old_rc", "x\n");
    home.dest_file(".kept", "y\n");
    home.apply();
    assert!(!home.dest_exists(".old_rc"));
    assert!(home.dest_exists(".kept"));
}

#[test]
fn test_permissions_follow_umask() {
    let home = Home::new();
    home.source_file("dot_config/app.conf", "a\n");
    home.source_file("private_dot_netrc", "machine x\n");
    home.apply_with(Umask::new(0o022));
    assert_eq!(home.dest_mode(".config"), 0o755);
    assert_eq!(home.dest_mode(".config/app.conf"), 0o644);
    assert_eq!(home.dest_mode(".netrc"), 0o600);

    let strict = Home::new();
    strict.source_file("dot_config/app.conf", "a\n");
    strict.source_file("private_dot_netrc", "machine x\n");
    strict.apply_with(Umask::new(0o077));
    assert_eq!(strict.dest_mode(".config"), 0o700);
    assert_eq!(strict.dest_mode(".config/app.conf"), 0o600);
    assert_eq!(strict.dest_mode(".netrc"), 0o600);
}

#[test]
fn test_run_once_script_follows_contents() {
    let home = Home::new();
    let log = home.root.join_str("ran.log");
    let script = format!("#!/bin/sh\necho ran >> '{log}'\n");
    let runs = || {
        fs::read_to_string(log.as_path())
            .map(|s| s.lines().count())
            .unwrap_or(0)
    };

    home.source_file("run_once_install.sh", &script);
    home.apply();
    home.apply();
    assert_eq!(runs(), 1);

    // same contents under a new name
    fs::remove_file(home.source.join_str("run_once_install.sh").as_path()).unwrap();
    home.source_file("run_once_setup.sh", &script);
    home.apply();
    assert_eq!(runs(), 1);

    home.source_file("run_once_setup.sh", &format!("{script}# edited\n"));
    home.apply();
    assert_eq!(runs(), 2);
}

#[test]
fn test_add_autotemplate_renders_back() {
    let home = Home::new();
    home.dest_file(".gitconfig", "[user]\n    email = someone@example.org\n");

    let state = home.read();
    let options = AddOptions {
        autotemplate: true,
        ..AddOptions::default()
    };
    let written = state
        .add(
            &RealSystem,
            &home.persistent,
            &RealSystem,
            &[home.dest.join_str(".gitconfig")],
            &options,
        )
        .unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].as_str(), "dot_gitconfig.tmpl");
    let source = fs::read_to_string(home.source.join_str("dot_gitconfig.tmpl").as_path()).unwrap();
    assert_eq!(source, "[user]\n    email = {{ .email }}\n");

    fs::remove_file(home.dest.join_str(".gitconfig").as_path()).unwrap();
    home.apply();
    assert_eq!(
        home.dest_contents(".gitconfig"),
        "[user]\n    email = someone@example.org\n"
    );
}

#[test]
fn test_add_encrypted_roundtrip() {
    let home = Home::new();
    home.dest_file(".token", "s3cr3t\n");

    let state = home.read();
    let options = AddOptions {
        encrypt: true,
        ..AddOptions::default()
    };
    state
        .add(
            &RealSystem,
            &home.persistent,
            &RealSystem,
            &[home.dest.join_str(".token")],
            &options,
        )
        .unwrap();
    let stored = fs::read_to_string(home.source.join_str("encrypted_dot_token.age").as_path()).unwrap();
    assert!(stored.starts_with("-----BEGIN AGE ENCRYPTED FILE-----"));
    assert!(!stored.contains("s3cr3t"));

    fs::remove_file(home.dest.join_str(".token").as_path()).unwrap();
    home.apply();
    assert_eq!(home.dest_contents(".token"), "s3cr3t\n");
}

#[test]
fn test_template_errors_name_the_source() {
    let home = Home::new();
    home.source_file("dot_broken.tmpl", "{{ .nothing_here }}\n");
    let state = home.read();
    let err = state
        .apply_all(
            &RealSystem,
            &home.persistent,
            &state.target_rel_paths(),
            &mut ApplyOptions::new(Umask::DEFAULT),
        )
        .unwrap_err();
    assert!(err.to_string().contains("dot_broken.tmpl"), "{err}");
}

#[test]
fn test_dump_feeds_modifier_the_destination() {
    let home = Home::new();
    home.source_file("modify_dot_profile", "#!/bin/sh\nsed s/old/new/\n");
    home.dest_file(".profile", "old line\n");

    let state = home.read();
    let dump = DumpSystem::new(home.dest.clone());
    state
        .apply_all(
            &dump,
            &MockPersistentState::new(),
            &state.target_rel_paths(),
            &mut ApplyOptions::new(Umask::DEFAULT),
        )
        .unwrap();
    match dump.into_entries().get(".profile") {
        Some(DumpEntry::File { contents, .. }) => assert_eq!(contents, "new line\n"),
        other => panic!("unexpected dump entry {other:?}"),
    }
    assert_eq!(home.dest_contents(".profile"), "old line\n");
}

#[test]
fn test_data_files_reach_templates() {
    let home = Home::new();
    home.source_file(".chezmoidata.yaml", "editor: nvim\ngit:\n  signingKey: ABC123\n");
    home.source_file("dot_config/.chezmoidata.toml", "[git]\nsigningKey = \"DEF456\"\n");
    home.source_file("dot_editorrc.tmpl", "{{ .editor }} {{ .git.signingKey }}\n");
    home.apply();

    assert_eq!(home.dest_contents(".editorrc"), "nvim DEF456\n");
    assert!(!home.dest_exists(".chezmoidata.yaml"));
    assert!(!home.dest_exists(".config/.chezmoidata.toml"));
}

#[test]
fn test_scripts_dir_runs_without_a_target_dir() {
    let home = Home::new();
    let log = home.root.join_str("scripts.log");
    home.source_file(
        ".chezmoiscripts/run_once_after_setup.sh",
        &format!("#!/bin/sh\necho setup >> '{log}'\n"),
    );
    home.source_file("dot_profile", "x\n");
    home.apply();
    home.apply();

    assert_eq!(fs::read_to_string(log.as_path()).unwrap(), "setup\n");
    assert!(!home.dest_exists(".chezmoiscripts"));
    assert_eq!(home.dest_contents(".profile"), "x\n");
}

#[test]
fn test_templated_remove_file() {
    let home = Home::new();
    home.source_file(
        ".chezmoiremove.tmpl",
        "{% if .chezmoi.os == \"linux\" %}.linux_only{% endif %}\n",
    );
    home.dest_file(".linux_only", "x\n");
    home.apply();
    assert!(!home.dest_exists(".linux_only"));
}
