//! Typed request descriptions for the v1 API
//!
//! Each request value knows its method, path (with parameters filled in),
//! query string (default values omitted), auth requirement, and response
//! type. The client stays a single generic `send`.

use crate::models::{
    AuthToken, NewRecipeBody, NewRecipeResp, PackageResource, PackageSearchEntry, RecipeResource,
    RefreshTokenBody,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
}

/// Authentication requirement of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Never send a token
    None,
    /// Send a token when one is configured
    Optional,
    /// Fail before sending when no token is configured
    Required,
}

/// A typed API request
pub trait ApiRequest {
    type Response: DeserializeOwned;

    const METHOD: Method;
    const AUTH: AuthMode;

    /// URL path with parameters substituted, starting with `/`.
    fn path(&self) -> String;

    /// Query parameters; entries with default values are omitted.
    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// JSON body for POST/PATCH requests.
    fn body(&self) -> Option<serde_json::Value> {
        None
    }
}

/// `GET /v1/packages/:name`
#[derive(Debug, Clone)]
pub struct GetPackage {
    pub name: String,
}

impl ApiRequest for GetPackage {
    type Response = PackageResource;
    const METHOD: Method = Method::Get;
    const AUTH: AuthMode = AuthMode::None;

    fn path(&self) -> String {
        format!("/v1/packages/{}", self.name)
    }
}

/// `GET /v1/packages` with search parameters
#[derive(Debug, Clone, Default)]
pub struct SearchPackages {
    pub q: String,
    pub regex: bool,
    pub case_sensitive: bool,
    pub name_only: bool,
    pub extended: bool,
    pub offset: u32,
    pub limit: u32,
}

impl ApiRequest for SearchPackages {
    type Response = Vec<PackageSearchEntry>;
    const METHOD: Method = Method::Get;
    const AUTH: AuthMode = AuthMode::None;

    fn path(&self) -> String {
        "/v1/packages".to_string()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if !self.q.is_empty() {
            query.push(("q", self.q.clone()));
        }
        if self.regex {
            query.push(("regex", "true".to_string()));
        }
        if self.case_sensitive {
            query.push(("caseSensitive", "true".to_string()));
        }
        if self.name_only {
            query.push(("nameOnly", "true".to_string()));
        }
        if self.extended {
            query.push(("extended", "true".to_string()));
        }
        if self.offset != 0 {
            query.push(("offset", self.offset.to_string()));
        }
        if self.limit != 0 {
            query.push(("limit", self.limit.to_string()));
        }
        query
    }
}

/// `GET /v1/recipes/:id`
#[derive(Debug, Clone)]
pub struct GetRecipe {
    pub id: String,
}

impl ApiRequest for GetRecipe {
    type Response = RecipeResource;
    const METHOD: Method = Method::Get;
    const AUTH: AuthMode = AuthMode::None;

    fn path(&self) -> String {
        format!("/v1/recipes/{}", self.id)
    }
}

/// `POST /v1/recipes` (auth required)
#[derive(Debug, Clone)]
pub struct PostRecipe(pub NewRecipeBody);

impl ApiRequest for PostRecipe {
    type Response = NewRecipeResp;
    const METHOD: Method = Method::Post;
    const AUTH: AuthMode = AuthMode::Required;

    fn path(&self) -> String {
        "/v1/recipes".to_string()
    }

    fn body(&self) -> Option<serde_json::Value> {
        serialize_body(&self.0)
    }
}

/// `POST /auth/token` - exchange a refresh token
#[derive(Debug, Clone)]
pub struct PostAuthToken(pub RefreshTokenBody);

impl ApiRequest for PostAuthToken {
    type Response = AuthToken;
    const METHOD: Method = Method::Post;
    const AUTH: AuthMode = AuthMode::None;

    fn path(&self) -> String {
        "/auth/token".to_string()
    }

    fn body(&self) -> Option<serde_json::Value> {
        serialize_body(&self.0)
    }
}

fn serialize_body<T: Serialize>(body: &T) -> Option<serde_json::Value> {
    serde_json::to_value(body).ok()
}
