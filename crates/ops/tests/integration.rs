//! The build operation end to end, offline

use dop_cache::DopHome;
use dop_profile::{Arch, BuildType, HostInfo, Os, Profile};
use dop_recipe::RECIPE_FILE;
use dop_resolver::LOCK_FILE;
use dop_stager::StageKind;
use dop_types::Options;
use std::collections::BTreeMap;
use std::path::Path;

fn profile() -> Profile {
    Profile::new(
        "default",
        HostInfo {
            os: Os::Linux,
            arch: Arch::X86_64,
        },
        BuildType::Debug,
        BTreeMap::new(),
    )
}

/// A recipe with one cached dependency, both shell-built
fn seed_cache(home: &DopHome) {
    let dep_text = r#"
name: libgreet
version: 1.2.0
source: .
build:
  - shell: "echo greetings > $DOP_INSTALL_DIR/greet.txt"
"#;
    let version = dop_types::Version::new(1, 2, 0);
    let revision = dop_recipe::revision_of(dep_text.as_bytes());
    let dir = home.revision_dir("libgreet", &version, &revision);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(RECIPE_FILE), dep_text).unwrap();
    home.revision_flag("libgreet", &version, &revision)
        .write(Some(&revision))
        .unwrap();
}

fn write_root(dir: &Path) {
    let text = r#"
name: greeter
version: 0.1.0
dependencies:
  - libgreet ~>1.2
source: .
build:
  - shell: "cp $DOP_DEP_LIBGREET_DIR/greet.txt $DOP_INSTALL_DIR/greet.txt"
"#;
    std::fs::write(dir.join(RECIPE_FILE), text).unwrap();
}

#[tokio::test]
async fn build_resolves_locks_and_stages() {
    let home_dir = tempfile::tempdir().unwrap();
    let home = DopHome::new(home_dir.path());
    seed_cache(&home);

    let recipe_dir = tempfile::tempdir().unwrap();
    write_root(recipe_dir.path());
    // the lock must land with a later mtime than the recipe file
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;

    let mut ctx = dop_ops::Context::builder(profile())
        .home(home)
        .build()
        .unwrap();

    let report = dop_ops::build(
        &mut ctx,
        recipe_dir.path(),
        Options::new(),
        StageKind::Install,
    )
    .await
    .unwrap();

    assert_eq!(report.package, "greeter");
    assert_eq!(report.packages, 2);
    assert_eq!(report.build_id.len(), 40);
    assert_eq!(
        std::fs::read_to_string(report.target_path.join("greet.txt")).unwrap(),
        "greetings\n"
    );

    // the lock file landed next to the recipe and is fresh
    let lock_path = recipe_dir.path().join(LOCK_FILE);
    assert!(lock_path.is_file());
    let lock_mtime = std::fs::metadata(&lock_path).unwrap().modified().unwrap();

    // a second build reuses the fresh lock instead of re-resolving
    let report = dop_ops::build(
        &mut ctx,
        recipe_dir.path(),
        Options::new(),
        StageKind::Install,
    )
    .await
    .unwrap();
    assert_eq!(report.packages, 2);
    assert_eq!(
        std::fs::metadata(&lock_path).unwrap().modified().unwrap(),
        lock_mtime
    );
}
