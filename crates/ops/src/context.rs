//! Operations context for dependency injection
//!
//! Every operation receives an explicit [`Context`]; there is no
//! module-level state. The context owns the cache layout, the dependency
//! service, and the registry client when one is configured.

use dop_cache::DopHome;
use dop_errors::Error;
use dop_profile::Profile;
use dop_registry::RegistryClient;
use dop_resolver::{DepService, Heuristics};
use tokio_util::sync::CancellationToken;

/// Everything an operation needs, constructed once per invocation
pub struct Context {
    pub home: DopHome,
    pub profile: Profile,
    pub heuristics: Heuristics,
    pub registry: Option<RegistryClient>,
    pub service: DepService,
    pub cancel: CancellationToken,
}

impl Context {
    /// Start building a context around a profile.
    #[must_use]
    pub fn builder(profile: Profile) -> ContextBuilder {
        ContextBuilder {
            profile,
            home: None,
            heuristics: Heuristics::default(),
            registry: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    profile: Profile,
    home: Option<DopHome>,
    heuristics: Heuristics,
    registry: Option<RegistryClient>,
    cancel: CancellationToken,
}

impl ContextBuilder {
    #[must_use]
    pub fn home(mut self, home: DopHome) -> Self {
        self.home = Some(home);
        self
    }

    #[must_use]
    pub fn heuristics(mut self, heuristics: Heuristics) -> Self {
        self.heuristics = heuristics;
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: RegistryClient) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Assemble the context, resolving the home from the environment
    /// when none was given.
    ///
    /// # Errors
    ///
    /// Returns an error when no home directory can be determined.
    pub fn build(self) -> Result<Context, Error> {
        let home = match self.home {
            Some(home) => home,
            None => DopHome::from_env()?,
        };
        let service = DepService::new(home.clone(), self.registry.clone());
        Ok(Context {
            home,
            profile: self.profile,
            heuristics: self.heuristics,
            registry: self.registry,
            service,
            cancel: self.cancel,
        })
    }
}
