#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Registry client for the dopamine package manager
//!
//! Typed request/response layer over the versioned JSON HTTP API, used by
//! the dependency resolver (package/recipe lookups) and the publish path
//! (recipe POST + archive upload token flow).

mod auth;
mod blocking;
mod client;
mod models;
mod requests;

pub use auth::LoginFile;
pub use blocking::BlockingRegistryClient;
pub use client::{
    check_api_version, RegistryClient, RegistryConfig, API_VERSION, API_VERSION_HEADER,
    DEFAULT_HOST,
};
pub use models::{
    ArchiveUploadToken, AuthToken, NewKind, NewRecipeBody, NewRecipeResp, PackageRecipeResource,
    PackageResource, PackageSearchEntry, PackageVersionResource, RecipeResource, RefreshTokenBody,
};
pub use requests::{
    ApiRequest, AuthMode, GetPackage, GetRecipe, Method, PostAuthToken, PostRecipe, SearchPackages,
};
