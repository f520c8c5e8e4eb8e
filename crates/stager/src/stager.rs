//! Driving a single package through its stages
//!
//! Each stage checks its flag first and is skipped when up to date; a
//! successful stage writes the next flag, a failed one leaves the prior
//! flag intact so the next run redoes only what is needed.

use crate::archive::create_archive;
use crate::build_id::{BuildConfig, BuildId};
use crate::source::fetch_source;
use crate::stage::{stage_status, StageKind, StageStatus};
use crate::steps::run_steps;
use dop_cache::{RecipeState, WorkDirs};
use dop_errors::{BuildError, Error, RecipeError};
use dop_recipe::{Recipe, StageSpec};
use dop_resolver::{DepBuildInfo, DepDag};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Stages one package recipe under one build configuration
#[derive(Debug)]
pub struct Stager<'a> {
    recipe: &'a Recipe,
    config: &'a BuildConfig,
    build_id: BuildId,
    work: WorkDirs,
    dep_infos: HashMap<String, DepBuildInfo>,
    cancel: CancellationToken,
}

impl<'a> Stager<'a> {
    /// Stage `recipe` with an explicit build id and dependency info map.
    ///
    /// # Errors
    ///
    /// Rejects light recipes: they have nothing to stage.
    pub fn new(
        recipe: &'a Recipe,
        config: &'a BuildConfig,
        build_id: BuildId,
        dep_infos: HashMap<String, DepBuildInfo>,
    ) -> Result<Self, Error> {
        if !recipe.is_package() {
            return Err(RecipeError::MissingBuild {
                path: recipe.path().display().to_string(),
            }
            .into());
        }
        let work = WorkDirs::new(recipe.root_dir(), build_id.dir_prefix());
        Ok(Self {
            recipe,
            config,
            build_id,
            work,
            dep_infos,
            cancel: CancellationToken::new(),
        })
    }

    /// Stage the root recipe of a resolved DAG.
    ///
    /// # Errors
    ///
    /// Fails when the profile lacks a tool for one of the DAG's
    /// languages, or on light recipes.
    pub fn for_dag(recipe: &'a Recipe, config: &'a BuildConfig, dag: &DepDag) -> Result<Self, Error> {
        ensure_langs_supported(config, dag)?;
        let build_id = BuildId::compute(config, dag)?;
        Self::new(recipe, config, build_id, dag.build_infos())
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn build_id(&self) -> &BuildId {
        &self.build_id
    }

    #[must_use]
    pub fn work(&self) -> &WorkDirs {
        &self.work
    }

    fn archive_path(&self) -> PathBuf {
        self.work
            .archive_path(self.recipe.name(), self.recipe.version())
    }

    fn recipe_mtime(&self) -> Result<SystemTime, Error> {
        Ok(std::fs::metadata(self.recipe.path())
            .map_err(|e| Error::io_with_path(&e, self.recipe.path()))?
            .modified()?)
    }

    /// Readiness of one stage.
    ///
    /// # Errors
    ///
    /// Flag metadata failures.
    pub fn status(&self, kind: StageKind) -> Result<StageStatus, Error> {
        stage_status(kind, &self.work, &self.archive_path(), self.recipe_mtime()?)
    }

    /// Run every stage up to and including `target`, skipping stages
    /// that are up to date.
    ///
    /// # Errors
    ///
    /// The first failing stage's error; prior flags stay valid.
    pub async fn reach(&self, target: StageKind) -> Result<PathBuf, Error> {
        for kind in StageKind::ORDER {
            if kind > target {
                break;
            }
            match self.status(kind)? {
                StageStatus::Ready => {
                    info!(package = self.recipe.name(), stage = %kind, "up-to-date");
                }
                status => {
                    debug!(package = self.recipe.name(), stage = %kind, ?status, "running");
                    self.run_stage(kind).await?;
                }
            }
        }
        Ok(match target {
            StageKind::Archive => self.archive_path(),
            _ => self.work.install_dir(),
        })
    }

    async fn run_stage(&self, kind: StageKind) -> Result<(), Error> {
        match kind {
            StageKind::Source => self.do_source().await,
            StageKind::Configure => self.do_configure(),
            StageKind::Build => self.do_build().await,
            StageKind::Install => self.do_install(),
            StageKind::Archive => self.do_archive().await,
        }
    }

    async fn do_source(&self) -> Result<(), Error> {
        let src_dir = fetch_source(self.recipe, &self.work, &self.cancel).await?;
        let mut state = RecipeState::load(&self.work.state_file())?;
        state.src_dir = Some(src_dir.clone());
        state.save(&self.work.state_file())?;
        self.work
            .source_flag()
            .write(Some(&src_dir.display().to_string()))?;
        Ok(())
    }

    /// Materialise the work area for this build id.
    fn do_configure(&self) -> Result<(), Error> {
        for dir in [self.work.build_dir(), self.work.install_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| Error::io_with_path(&e, &dir))?;
        }
        self.config
            .profile
            .save_to(&self.work.config_dir().join("profile.toml"))?;
        self.work
            .config_flag()
            .write(Some(self.build_id.as_str()))?;
        Ok(())
    }

    async fn do_build(&self) -> Result<(), Error> {
        let steps = self
            .recipe
            .build_steps()
            .ok_or_else(|| RecipeError::MissingBuild {
                path: self.recipe.path().display().to_string(),
            })?;
        let env = self.build_env()?;
        run_steps(steps, &self.work.build_dir(), &env, &self.cancel).await?;
        self.work.build_flag().touch()?;
        Ok(())
    }

    /// The build steps are expected to have produced install content.
    fn do_install(&self) -> Result<(), Error> {
        let install_dir = self.work.install_dir();
        let empty = std::fs::read_dir(&install_dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true);
        if empty {
            return Err(BuildError::StepFailed {
                step: "install".to_string(),
                message: "build produced no install content".to_string(),
            }
            .into());
        }
        let mut state = RecipeState::load(&self.work.state_file())?;
        state.build_time = Some(chrono::Utc::now());
        state.save(&self.work.state_file())?;
        self.work.install_flag().touch()?;
        Ok(())
    }

    async fn do_archive(&self) -> Result<(), Error> {
        let archive_src = match self.recipe.stage() {
            // staging disabled: archive the install prefix directly,
            // no relocation hook runs
            StageSpec::Toggle(false) => self.work.install_dir(),
            StageSpec::Toggle(true) => {
                self.run_post_stage(&self.work.install_dir()).await?;
                self.work.install_dir()
            }
            StageSpec::Steps(steps) => {
                let stage_dir = self.work.config_dir().join("stage");
                if stage_dir.exists() {
                    std::fs::remove_dir_all(&stage_dir)
                        .map_err(|e| Error::io_with_path(&e, &stage_dir))?;
                }
                std::fs::create_dir_all(&stage_dir)
                    .map_err(|e| Error::io_with_path(&e, &stage_dir))?;

                let mut env = self.build_env()?;
                env.insert(
                    "DOP_STAGE_DIR".to_string(),
                    stage_dir.display().to_string(),
                );
                run_steps(steps, &self.work.install_dir(), &env, &self.cancel).await?;
                self.run_post_stage(&stage_dir).await?;
                stage_dir
            }
        };
        create_archive(&archive_src, &self.archive_path()).await?;
        Ok(())
    }

    async fn run_post_stage(&self, cwd: &std::path::Path) -> Result<(), Error> {
        if self.recipe.post_stage().is_empty() {
            return Ok(());
        }
        let env = self.build_env()?;
        run_steps(self.recipe.post_stage(), cwd, &env, &self.cancel).await
    }

    /// Environment a step runs with: the profile's tool variables plus
    /// the working directories and one variable per dependency install
    /// prefix.
    fn build_env(&self) -> Result<BTreeMap<String, String>, Error> {
        let state = RecipeState::load(&self.work.state_file())?;
        let src_dir = state.src_dir.ok_or_else(|| BuildError::StepFailed {
            step: "build".to_string(),
            message: "source stage has not recorded a directory".to_string(),
        })?;

        let mut env = self.config.profile.collect_environment();
        env.insert("DOP_SRC_DIR".to_string(), src_dir.display().to_string());
        env.insert(
            "DOP_BUILD_DIR".to_string(),
            self.work.build_dir().display().to_string(),
        );
        env.insert(
            "DOP_INSTALL_DIR".to_string(),
            self.work.install_dir().display().to_string(),
        );
        for (name, info) in &self.dep_infos {
            env.insert(
                format!("DOP_DEP_{}_DIR", env_name(name)),
                info.install_dir.display().to_string(),
            );
        }
        for (key, value) in &self.config.options {
            env.insert(format!("DOP_OPT_{}", env_name(key)), value.to_string());
        }
        Ok(env)
    }
}

/// Check that the profile carries a tool for every language in the DAG.
///
/// # Errors
///
/// `DepError::UnsupportedLang` naming the first missing language.
pub fn ensure_langs_supported(config: &BuildConfig, dag: &DepDag) -> Result<(), Error> {
    for lang in dag.collect_langs() {
        if !config.profile.supports(lang) {
            return Err(dop_errors::DepError::UnsupportedLang {
                lang: lang.to_string(),
                profile: config.profile.name(),
            }
            .into());
        }
    }
    Ok(())
}

fn env_name(name: &str) -> String {
    name.to_ascii_uppercase().replace(['-', '.'], "_")
}
