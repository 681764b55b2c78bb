use serde::{Deserialize, Serialize};

/// Repository object as returned by `GET /orgs/{org}/repos`. Only the
/// fields the pipeline reads are declared; everything is optional because
/// the API omits or nulls several of them for archived or empty repos.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiRepository {
    pub name: Option<String>,
    pub full_name: Option<String>,
    #[serde(default)]
    pub stargazers_count: Option<i64>,
    #[serde(default)]
    pub forks_count: Option<i64>,
    #[serde(default)]
    pub license: Option<ApiLicense>,
    pub language: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub pushed_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLicense {
    pub key: Option<String>,
    pub name: Option<String>,
    pub spdx_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubError {
    pub message: String,
    pub documentation_url: Option<String>,
}
