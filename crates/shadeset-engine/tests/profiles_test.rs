use std::fs;

use shadeset_engine::profiles::ProfileManager;
use shadeset_engine::{
    EngineError, InstanceGuard, LinkMode, MemoryStore, RendererEndpoint, Session, SessionOptions,
    ShaderPaths,
};

const TEMPLATE: &str = "SHADERS); //\n#define FOO_ENABLED 0\n#endif\n";

fn shader_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(ShaderPaths::new(dir.path()).template(), TEMPLATE).unwrap();
    dir
}

#[test]
fn last_profile_cannot_be_deleted() {
    let dir = shader_dir();
    let paths = ShaderPaths::new(dir.path());
    let manager = ProfileManager::new(&paths, LinkMode::Copy);
    let only = manager.bootstrap(paths.template()).unwrap().unwrap();

    let before = manager.list().unwrap().len();
    assert!(matches!(manager.delete(&only.name), Err(EngineError::LastProfile { .. })));
    assert_eq!(manager.list().unwrap().len(), before);
    assert!(only.path.exists());
}

#[test]
fn rename_conflict_leaves_both_profiles() {
    let dir = shader_dir();
    let paths = ShaderPaths::new(dir.path());
    let manager = ProfileManager::new(&paths, LinkMode::Copy);
    let a = manager.create_from(paths.template()).unwrap();
    let b = manager.create_from(paths.template()).unwrap();

    assert!(matches!(manager.rename(&a.name, &b.name), Err(EngineError::NameConflict { .. })));
    assert!(a.path.exists());
    assert!(b.path.exists());
}

#[cfg(unix)]
#[test]
fn symlinked_canonical_saves_into_active_profile() {
    let dir = shader_dir();
    let mut session = Session::open(
        ShaderPaths::new(dir.path()),
        Box::new(MemoryStore::default()),
        SessionOptions {
            link_mode: LinkMode::Symlink,
            watch: false,
            renderer: RendererEndpoint::Disabled,
        },
    )
    .unwrap();

    let canonical = ShaderPaths::new(dir.path()).canonical().to_path_buf();
    assert!(fs::symlink_metadata(&canonical).unwrap().file_type().is_symlink());

    session.toggle_shader("FOO").unwrap();
    session.save().unwrap();

    let active = session.profiles().unwrap().remove(0);
    assert_eq!(fs::read_to_string(&active.path).unwrap(), "SHADERS); //\n#define FOO_ENABLED 1\n#endif\n");
    // Still a link after the write.
    assert!(fs::symlink_metadata(&canonical).unwrap().file_type().is_symlink());

    // Switching profiles repoints the link without touching the old profile.
    let fresh = session.create_profile().unwrap();
    session.activate_profile(&fresh.name).unwrap();
    assert_eq!(fs::read_to_string(&canonical).unwrap(), TEMPLATE);
    assert!(fs::read_to_string(&active.path).unwrap().contains("FOO_ENABLED 1"));
}

#[cfg(unix)]
#[test]
fn reopening_keeps_existing_symlink() {
    use std::os::unix::fs::MetadataExt;

    let dir = shader_dir();
    let paths = ShaderPaths::new(dir.path());
    let options = SessionOptions {
        link_mode: LinkMode::Symlink,
        watch: false,
        renderer: RendererEndpoint::Disabled,
    };
    let first = Session::open(paths.clone(), Box::new(MemoryStore::default()), options.clone()).unwrap();
    let name = first.active_profile().unwrap().to_string();
    drop(first);
    let inode = fs::symlink_metadata(paths.canonical()).unwrap().ino();

    let session = Session::open(paths.clone(), Box::new(MemoryStore::default()), options).unwrap();
    assert_eq!(session.active_profile(), Some(name.as_str()));
    assert_eq!(fs::symlink_metadata(paths.canonical()).unwrap().ino(), inode);
}

#[test]
fn activating_missing_profile_changes_nothing() {
    let dir = shader_dir();
    let mut session = Session::open(
        ShaderPaths::new(dir.path()),
        Box::new(MemoryStore::default()),
        SessionOptions {
            link_mode: LinkMode::Copy,
            watch: false,
            renderer: RendererEndpoint::Disabled,
        },
    )
    .unwrap();
    let before = session.active_profile().map(str::to_string);

    assert!(matches!(session.activate_profile("ghost"), Err(EngineError::NotFound { .. })));
    assert!(matches!(session.activate_profile(""), Err(EngineError::NoSelection)));
    assert_eq!(session.active_profile().map(str::to_string), before);
    assert_eq!(session.text(), TEMPLATE);
}

#[test]
fn instance_guard_is_exclusive_until_dropped() {
    let dir = tempfile::tempdir().unwrap();
    let guard = InstanceGuard::acquire_in(dir.path()).unwrap();

    // Same process re-acquiring treats its own pid as stale, so simulate a live
    // foreign holder by planting a pid that exists.
    #[cfg(unix)]
    {
        fs::write(guard.marker(), "1").unwrap();
        assert!(matches!(
            InstanceGuard::acquire_in(dir.path()),
            Err(EngineError::AlreadyRunning { pid: 1 })
        ));
        fs::write(guard.marker(), std::process::id().to_string()).unwrap();
    }

    let marker = guard.marker().to_path_buf();
    drop(guard);
    assert!(!marker.exists());
    assert!(InstanceGuard::acquire_in(dir.path()).is_ok());
}
