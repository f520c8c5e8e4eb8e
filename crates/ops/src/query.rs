//! Registry query operations

use crate::context::Context;
use dop_errors::{Error, RegistryError};
use dop_registry::{GetPackage, PackageResource, PackageSearchEntry, SearchPackages};

/// Search the registry for packages matching `query`.
///
/// # Errors
///
/// Registry errors surface unchanged; no configured registry is
/// reported as `NotLoggedIn`.
pub async fn search_packages(
    ctx: &Context,
    query: &str,
    limit: u32,
) -> Result<Vec<PackageSearchEntry>, Error> {
    let registry = registry(ctx)?;
    let request = SearchPackages {
        q: query.to_string(),
        limit,
        ..SearchPackages::default()
    };
    registry.send(&request).await
}

/// Fetch a package's versions and recipes.
///
/// # Errors
///
/// See [`search_packages`].
pub async fn package_info(ctx: &Context, name: &str) -> Result<PackageResource, Error> {
    let registry = registry(ctx)?;
    registry
        .send(&GetPackage {
            name: name.to_string(),
        })
        .await
}

fn registry(ctx: &Context) -> Result<&dop_registry::RegistryClient, Error> {
    ctx.registry.as_ref().ok_or_else(|| {
        RegistryError::NotLoggedIn {
            host: "no registry configured".to_string(),
        }
        .into()
    })
}
