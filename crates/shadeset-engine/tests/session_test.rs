use std::fs;
use std::io::ErrorKind;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use shadeset_engine::config::keys;
use shadeset_engine::{
    EngineError, EngineEvent, LinkMode, MemoryStore, RendererEndpoint, Session, SessionOptions,
    SettingsStore, ShaderPaths,
};

const TEMPLATE: &str = r#"// Shader settings for kwin-effects-glsl.
const int SHADER_ORDER[SHADERS+1] = int[] ( // Don't change this line.

    SHADER_FOO,
    SHADER_BAR,

SHADERS); // Don't change this line.

// Whitelist: "firefox"

// Description: Sharpen.
#define FOO_ENABLED 0
#if FOO_ENABLED == 1
// Strength.
#define FOO_STRENGTH 0.5
#endif

// Description: Tint.
#define BAR_ENABLED 1
#if BAR_ENABLED == 1
// Tint color.
uniform vec3 BAR_TINT = vec3(1.0, 1.0, 1.0);
#define BAR_MIX 0.25
#endif
"#;

fn options() -> SessionOptions {
    SessionOptions {
        link_mode: LinkMode::Copy,
        watch: false,
        renderer: RendererEndpoint::Disabled,
    }
}

fn shader_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(ShaderPaths::new(dir.path()).template(), TEMPLATE).unwrap();
    dir
}

fn open(dir: &Path, store: MemoryStore) -> Session {
    Session::open(ShaderPaths::new(dir), Box::new(store), options()).unwrap()
}

fn canonical(dir: &Path) -> String {
    fs::read_to_string(ShaderPaths::new(dir).canonical()).unwrap()
}

#[test]
fn open_bootstraps_first_profile_from_template() {
    let dir = shader_dir();
    let session = open(dir.path(), MemoryStore::default());

    let profiles = session.profiles().unwrap();
    assert_eq!(profiles.len(), 1);
    assert_eq!(session.active_profile(), Some(profiles[0].name.as_str()));
    assert_eq!(canonical(dir.path()), TEMPLATE);
    assert_eq!(session.text(), TEMPLATE);
    assert_eq!(session.settings().active_profile.as_deref(), Some(profiles[0].name.as_str()));
    assert_eq!(session.view().order, ["FOO", "BAR"]);
}

#[test]
fn open_without_template_or_profiles_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = Session::open(ShaderPaths::new(dir.path()), Box::new(MemoryStore::default()), options())
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::NotFound { .. }));
}

#[test]
fn toggle_scenario_rewrites_only_the_directive() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());

    assert!(!session.view().shader("SHADER_FOO").unwrap().enabled);
    assert!(session.toggle_shader("FOO").unwrap());

    let expected = TEMPLATE.replace("#define FOO_ENABLED 0", "#define FOO_ENABLED 1");
    assert_eq!(session.text(), expected);
    let foo = session.view().shader("SHADER_FOO").unwrap();
    assert!(foo.enabled);
    assert_eq!(foo.settings[0].name, "FOO_STRENGTH");

    // Not persisted until saved.
    assert!(session.is_dirty());
    assert_eq!(canonical(dir.path()), TEMPLATE);
    session.save().unwrap();
    assert_eq!(canonical(dir.path()), expected);
    assert!(!session.is_dirty());
}

#[test]
fn toggle_twice_restores_original() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    session.toggle_shader("SHADER_BAR").unwrap();
    session.toggle_shader("SHADER_BAR").unwrap();
    assert_eq!(session.text(), TEMPLATE);
}

#[test]
fn toggle_unknown_shader_is_noop() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    assert!(!session.toggle_shader("NOPE").unwrap());
    assert!(!session.is_dirty());
}

#[test]
fn autosave_persists_each_change() {
    let dir = shader_dir();
    let mut store = MemoryStore::default();
    store.set(keys::AUTO_SAVE, Value::Bool(true)).unwrap();
    let mut session = open(dir.path(), store);
    let events = session.subscribe();

    session.edit_setting("BAR_MIX", "0.75").unwrap();
    assert!(canonical(dir.path()).contains("#define BAR_MIX 0.75"));
    assert!(!session.is_dirty());

    let saved: Vec<_> = events.try_iter().collect();
    assert!(saved.iter().any(|e| matches!(e, EngineEvent::DocumentSaved { .. })));
    assert!(saved.contains(&EngineEvent::RendererNotified { delivered: false }));

    // The active profile file follows the canonical copy.
    let profile = session.profiles().unwrap().remove(0);
    assert!(fs::read_to_string(profile.path).unwrap().contains("#define BAR_MIX 0.75"));
}

#[test]
fn failed_autosave_leaves_buffer_untouched() {
    let dir = shader_dir();
    let mut store = MemoryStore::default();
    store.set(keys::AUTO_SAVE, Value::Bool(true)).unwrap();
    let mut session = open(dir.path(), store);
    fs::remove_file(ShaderPaths::new(dir.path()).canonical()).unwrap();

    let err = session.edit_setting("BAR_MIX", "0.75").unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(session.text(), TEMPLATE);
    assert_eq!(session.view().setting("BAR_MIX").unwrap().1.value, "0.25");
    assert!(!session.is_dirty());

    assert!(session.update_whitelist("mpv").is_err());
    assert_eq!(session.view().whitelist.as_deref(), Some("firefox"));
    assert_eq!(session.settings().whitelist, None);
}

#[test]
fn rejected_edit_keeps_buffer_and_reports() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    let events = session.subscribe();

    let err = session.edit_setting("BAR_TINT", "vec3(1, 2, 3)").unwrap_err();
    assert!(matches!(err, EngineError::InvalidValue { .. }));
    assert_eq!(session.text(), TEMPLATE);
    assert_eq!(session.view().setting("BAR_TINT").unwrap().1.value, "vec3(1.0, 1.0, 1.0)");
    assert_eq!(
        events.try_recv().unwrap(),
        EngineEvent::EditRejected { name: "BAR_TINT".into(), value: "vec3(1, 2, 3)".into() }
    );

    session.edit_setting("BAR_TINT", "vec3(1.0, -2.5, 0.0)").unwrap();
    assert!(session.text().contains("uniform vec3 BAR_TINT = vec3(1.0, -2.5, 0.0);"));
}

#[test]
fn settings_of_disabled_blocks_are_not_editable() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    assert!(!session.edit_setting("FOO_STRENGTH", "1.0").unwrap());
    assert_eq!(session.text(), TEMPLATE);
}

#[test]
fn move_down_swaps_neighbours_and_stops_at_edges() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());

    assert!(!session.move_shader_up("FOO").unwrap());
    assert!(session.move_shader_down("SHADER_FOO").unwrap());
    assert_eq!(session.view().order, ["BAR", "FOO"]);
    assert!(!session.move_shader_down("FOO").unwrap());

    let text = session.text();
    let bar = text.find("    SHADER_BAR,").unwrap();
    let foo = text.find("    SHADER_FOO,").unwrap();
    assert!(bar < foo);
    // Everything after the order block is untouched.
    let tail = &TEMPLATE[TEMPLATE.find("// Whitelist").unwrap()..];
    assert!(text.ends_with(tail));
}

#[test]
fn whitelist_update_mirrors_into_store() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());

    assert!(session.update_whitelist("firefox\nmpv\t\"vlc\"").unwrap());
    assert_eq!(session.view().whitelist.as_deref(), Some("firefox mpv vlc"));
    assert_eq!(session.settings().whitelist.as_deref(), Some("firefox mpv vlc"));
}

#[test]
fn reload_discards_unsaved_changes() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    session.toggle_shader("FOO").unwrap();
    session.reload().unwrap();
    assert_eq!(session.text(), TEMPLATE);
    assert!(!session.is_dirty());
}

#[test]
fn activation_switches_document_and_store() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    let first = session.active_profile().unwrap().to_string();

    let second = session.copy_profile(&first).unwrap();
    fs::write(&second.path, TEMPLATE.replace("BAR_MIX 0.25", "BAR_MIX 0.9")).unwrap();
    session.activate_profile(&second.name).unwrap();

    assert_eq!(session.active_profile(), Some(second.name.as_str()));
    assert_eq!(session.view().setting("BAR_MIX").unwrap().1.value, "0.9");
    assert!(canonical(dir.path()).contains("BAR_MIX 0.9"));
    assert_eq!(session.settings().active_profile.as_deref(), Some(second.name.as_str()));
}

#[test]
fn stored_active_profile_is_restored() {
    let dir = shader_dir();
    let name = {
        let mut session = open(dir.path(), MemoryStore::default());
        let p = session.create_profile().unwrap();
        p.name
    };
    let mut store = MemoryStore::default();
    store.set(keys::ACTIVE_PROFILE, Value::from(name.clone())).unwrap();
    let session = open(dir.path(), store);
    assert_eq!(session.active_profile(), Some(name.as_str()));
}

#[test]
fn edits_made_while_closed_survive_reopen() {
    let dir = shader_dir();
    let name = open(dir.path(), MemoryStore::default()).active_profile().unwrap().to_string();

    let edited = TEMPLATE.replace("BAR_MIX 0.25", "BAR_MIX 0.7");
    fs::write(ShaderPaths::new(dir.path()).canonical(), &edited).unwrap();

    let mut store = MemoryStore::default();
    store.set(keys::ACTIVE_PROFILE, Value::from(name.clone())).unwrap();
    let session = open(dir.path(), store);

    assert_eq!(session.active_profile(), Some(name.as_str()));
    assert_eq!(session.view().setting("BAR_MIX").unwrap().1.value, "0.7");
    assert_eq!(canonical(dir.path()), edited);
    let profile = session.profiles().unwrap().remove(0);
    assert_eq!(fs::read_to_string(profile.path).unwrap(), edited);
}

#[test]
fn reopening_does_not_relink_or_signal() {
    let dir = shader_dir();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let options = SessionOptions {
        renderer: RendererEndpoint::Tcp(listener.local_addr().unwrap()),
        ..options()
    };

    let mut store = MemoryStore::default();
    let first = Session::open(ShaderPaths::new(dir.path()), Box::new(store.clone()), options.clone()).unwrap();
    store.set(keys::ACTIVE_PROFILE, Value::from(first.active_profile().unwrap())).unwrap();
    drop(first);
    // The first open linked the canonical file and said so.
    assert!(listener.accept().is_ok());

    let session = Session::open(ShaderPaths::new(dir.path()), Box::new(store), options).unwrap();
    assert_eq!(session.text(), TEMPLATE);
    let err = listener.accept().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WouldBlock);
}

#[test]
fn blacklist_is_normalized_into_store() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());

    let stored = session.set_blacklist("plasmashell\r\nkrunner\t\"latte\" ").unwrap();
    assert_eq!(stored, "plasmashell krunner latte");
    assert_eq!(session.settings().blacklist.as_deref(), Some("plasmashell krunner latte"));
    // The document has no blacklist line of its own.
    assert_eq!(session.text(), TEMPLATE);
}

#[test]
fn renaming_active_profile_keeps_it_active() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    let old = session.active_profile().unwrap().to_string();

    let renamed = session.rename_profile(&old, "evening").unwrap();
    assert_eq!(renamed.name, "evening");
    assert_eq!(session.active_profile(), Some("evening"));
    let names: Vec<_> = session.profiles().unwrap().into_iter().map(|p| p.name).collect();
    assert_eq!(names, ["evening"]);
}

#[test]
fn deleting_active_profile_activates_another() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    let first = session.active_profile().unwrap().to_string();

    let err = session.delete_profile(&first).unwrap_err();
    assert!(matches!(err, EngineError::LastProfile { .. }));
    assert_eq!(session.profiles().unwrap().len(), 1);

    let other = session.create_profile().unwrap();
    session.delete_profile(&first).unwrap();
    assert_eq!(session.active_profile(), Some(other.name.as_str()));
    assert_eq!(session.profiles().unwrap().len(), 1);
}

#[test]
fn store_flags_are_written() {
    let dir = shader_dir();
    let mut session = open(dir.path(), MemoryStore::default());
    session.set_auto_save(true).unwrap();
    session.set_default_enabled(true).unwrap();
    let settings = session.settings();
    assert!(settings.auto_save);
    assert!(settings.default_enabled);
    assert_eq!(settings.shader_path.as_deref(), Some(dir.path().display().to_string().as_str()));
}

#[test]
fn external_edit_is_reconciled_but_own_save_is_not() {
    let dir = shader_dir();
    let mut session = Session::open(
        ShaderPaths::new(dir.path()),
        Box::new(MemoryStore::default()),
        SessionOptions { watch: true, ..options() },
    )
    .unwrap();

    session.toggle_shader("FOO").unwrap();
    session.save().unwrap();
    assert!(!session.wait_external_change(Duration::from_millis(300)).unwrap());

    let edited = TEMPLATE.replace("BAR_MIX 0.25", "BAR_MIX 0.5");
    fs::write(ShaderPaths::new(dir.path()).canonical(), &edited).unwrap();
    assert!(session.wait_external_change(Duration::from_secs(5)).unwrap());
    assert_eq!(session.text(), edited);
}
