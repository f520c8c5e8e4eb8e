//! Wire models of the v1 registry API

use chrono::{DateTime, Utc};
use dop_types::Version;
use serde::{Deserialize, Serialize};

/// A package with its ordered versions and their recipes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageResource {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Ascending by version
    pub versions: Vec<PackageVersionResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersionResource {
    pub version: Version,
    /// Most recent revision first
    pub recipes: Vec<PackageRecipeResource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecipeResource {
    pub id: String,
    pub revision: String,
    pub archive_name: String,
}

/// One entry of a package search result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSearchEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version: Option<Version>,
    #[serde(default)]
    pub version_count: u32,
}

/// A recipe with its full text and metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeResource {
    pub id: String,
    pub name: String,
    pub version: Version,
    pub revision: String,
    /// Full recipe file text
    pub recipe: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub archive_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /v1/recipes`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipeBody {
    pub name: String,
    pub version: Version,
    pub revision: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// What publishing created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NewKind {
    /// Nothing new: recipe already known
    #[serde(rename = "")]
    Existing,
    /// First recipe of a new package
    Package,
    /// New version of a known package
    Version,
}

/// Response of `POST /v1/recipes`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipeResp {
    pub new: NewKind,
    pub recipe: RecipeResource,
    /// Single-use, time-bounded token authorizing the archive upload
    pub upload_bearer_token: String,
}

/// Decoded scope of an archive upload token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveUploadToken {
    pub user_id: String,
    pub archive_id: String,
    pub archive_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Body of `POST /auth/token`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenBody {
    pub refresh_token: String,
}

/// An issued bearer token pair
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_resource_parses() {
        let json = r#"{
            "name": "zlib",
            "description": "compression",
            "versions": [
                {
                    "version": "1.3.1",
                    "recipes": [
                        {"id": "42", "revision": "abc", "archiveName": "zlib-1.3.1-abc.tar.xz"}
                    ]
                }
            ]
        }"#;
        let pkg: PackageResource = serde_json::from_str(json).unwrap();
        assert_eq!(pkg.name, "zlib");
        assert_eq!(pkg.versions[0].version, Version::new(1, 3, 1));
        assert_eq!(pkg.versions[0].recipes[0].archive_name, "zlib-1.3.1-abc.tar.xz");
    }

    #[test]
    fn test_new_kind_wire_values() {
        assert_eq!(
            serde_json::from_str::<NewKind>("\"\"").unwrap(),
            NewKind::Existing
        );
        assert_eq!(
            serde_json::from_str::<NewKind>("\"package\"").unwrap(),
            NewKind::Package
        );
        assert_eq!(
            serde_json::from_str::<NewKind>("\"version\"").unwrap(),
            NewKind::Version
        );
    }
}
