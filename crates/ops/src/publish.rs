//! The publish operation

use crate::context::Context;
use dop_errors::{Error, RegistryError};
use dop_recipe::Recipe;
use dop_stager::PublishReport;
use std::path::Path;

/// Publish the recipe at `recipe_dir` to the configured registry.
///
/// # Errors
///
/// `RegistryError::NotLoggedIn` when no registry client is configured;
/// recipe, archive, and upload errors surface unchanged.
pub async fn publish(ctx: &Context, recipe_dir: &Path) -> Result<PublishReport, Error> {
    let registry = ctx
        .registry
        .as_ref()
        .ok_or_else(|| RegistryError::NotLoggedIn {
            host: "no registry configured".to_string(),
        })?;
    let recipe = Recipe::load_from_dir(recipe_dir)?;
    dop_stager::publish(&recipe, registry).await
}
