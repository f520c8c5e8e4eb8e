//! Stage kinds and their readiness computation
//!
//! Each stage's completion is recorded by a flag file (or, for the
//! archive, the artifact itself). Readiness is a pure function of the
//! flag mtimes and the recipe file mtime.

use dop_cache::{FlagFile, WorkDirs};
use dop_errors::Error;
use std::path::Path;
use std::time::SystemTime;

/// The stages a package moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StageKind {
    Source,
    Configure,
    Build,
    Install,
    Archive,
}

impl StageKind {
    /// All stages in execution order.
    pub const ORDER: [Self; 5] = [
        Self::Source,
        Self::Configure,
        Self::Build,
        Self::Install,
        Self::Archive,
    ];
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Configure => write!(f, "configure"),
            Self::Build => write!(f, "build"),
            Self::Install => write!(f, "install"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// Readiness of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    /// Flag present and newer than every prerequisite: skip
    Ready,
    /// Flag present but out of date: re-run
    Stale,
    /// Never reached: run
    Missing,
}

/// Compute the readiness of `kind`.
///
/// `archive_path` is the artifact standing in for the archive stage's
/// flag. Any change to the recipe file invalidates every stage; a stale
/// or missing prerequisite makes the successor stale.
///
/// # Errors
///
/// Returns an error when flag metadata cannot be read.
pub fn stage_status(
    kind: StageKind,
    work: &WorkDirs,
    archive_path: &Path,
    recipe_mtime: SystemTime,
) -> Result<StageStatus, Error> {
    let flag_for = |kind: StageKind| -> FlagFile {
        match kind {
            StageKind::Source => work.source_flag(),
            StageKind::Configure => work.config_flag(),
            StageKind::Build => work.build_flag(),
            StageKind::Install => work.install_flag(),
            StageKind::Archive => FlagFile::new(archive_path),
        }
    };

    let flag = flag_for(kind);
    if !flag.exists() {
        return Ok(StageStatus::Missing);
    }

    let mut prereqs = vec![recipe_mtime];
    let predecessor = match kind {
        StageKind::Source => None,
        StageKind::Configure => Some(StageKind::Source),
        StageKind::Build => Some(StageKind::Configure),
        StageKind::Install => Some(StageKind::Build),
        StageKind::Archive => Some(StageKind::Install),
    };
    if let Some(pred) = predecessor {
        match flag_for(pred).mtime()? {
            Some(mtime) => prereqs.push(mtime),
            // missing prerequisite: this flag cannot be trusted
            None => return Ok(StageStatus::Stale),
        }
    }

    // the source flag must also point at an existing directory
    if kind == StageKind::Source {
        let valid_payload = flag
            .read()?
            .is_some_and(|payload| Path::new(payload.trim()).is_dir());
        if !valid_payload {
            return Ok(StageStatus::Stale);
        }
    }

    if flag.is_up_to_date(prereqs)? {
        Ok(StageStatus::Ready)
    } else {
        Ok(StageStatus::Stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_stage_chain_freshness() {
        let dir = tempfile::tempdir().unwrap();
        let work = WorkDirs::new(dir.path(), "0123456789");
        let archive = work.archive_path("pkg", &dop_types::Version::new(1, 0, 0));

        let recipe_file = dir.path().join("dopamine.yaml");
        std::fs::write(&recipe_file, "name: pkg").unwrap();
        let recipe_mtime = std::fs::metadata(&recipe_file).unwrap().modified().unwrap();

        // nothing run yet
        assert_eq!(
            stage_status(StageKind::Source, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Missing
        );

        // source done
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        sleep(Duration::from_millis(20));
        work.source_flag()
            .write(Some(&src.display().to_string()))
            .unwrap();
        assert_eq!(
            stage_status(StageKind::Source, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Ready
        );

        // configure stale until run, then ready
        assert_eq!(
            stage_status(StageKind::Configure, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Missing
        );
        sleep(Duration::from_millis(20));
        work.config_flag().touch().unwrap();
        assert_eq!(
            stage_status(StageKind::Configure, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Ready
        );

        // build after configure
        sleep(Duration::from_millis(20));
        work.build_flag().touch().unwrap();
        assert_eq!(
            stage_status(StageKind::Build, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Ready
        );

        // touching the recipe invalidates everything
        sleep(Duration::from_millis(20));
        std::fs::write(&recipe_file, "name: pkg # touched").unwrap();
        let recipe_mtime = std::fs::metadata(&recipe_file).unwrap().modified().unwrap();
        assert_eq!(
            stage_status(StageKind::Source, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Stale
        );
        assert_eq!(
            stage_status(StageKind::Build, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Stale
        );
    }

    #[test]
    fn test_renewed_prerequisite_invalidates_successor() {
        let dir = tempfile::tempdir().unwrap();
        let work = WorkDirs::new(dir.path(), "0123456789");
        let archive = work.archive_path("pkg", &dop_types::Version::new(1, 0, 0));

        let recipe_file = dir.path().join("dopamine.yaml");
        std::fs::write(&recipe_file, "name: pkg").unwrap();
        let recipe_mtime = std::fs::metadata(&recipe_file).unwrap().modified().unwrap();

        sleep(Duration::from_millis(20));
        work.config_flag().touch().unwrap();
        sleep(Duration::from_millis(20));
        work.build_flag().touch().unwrap();
        assert_eq!(
            stage_status(StageKind::Build, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Ready
        );

        sleep(Duration::from_millis(20));
        work.config_flag().touch().unwrap();
        assert_eq!(
            stage_status(StageKind::Build, &work, &archive, recipe_mtime).unwrap(),
            StageStatus::Stale
        );
    }
}
