use crate::http::send_with_retry;
use anyhow::Context;
use reposync_core::paths::short_name;
use reposync_core::provider::{CreateOutcome, HostingService, ProviderFuture};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const API_VERSION: &str = "2022-11-28";

#[derive(Serialize)]
struct CreateRepoRequest<'a> {
    name: &'a str,
    private: bool,
    description: String,
    auto_init: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorItem>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorItem {
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiErrorBody {
    /// GitHub answers a duplicate create with 422 and a `name` error saying
    /// the name already exists on the account.
    fn is_name_taken(&self) -> bool {
        self.errors.iter().any(|item| {
            item.field.as_deref() == Some("name")
                && item
                    .message
                    .as_deref()
                    .is_some_and(|message| message.contains("already exists"))
        })
    }
}

/// GitHub REST client. Repositories are created under the authenticated user.
pub struct GitHubHosting {
    client: Client,
    api_url: String,
    token: String,
}

impl GitHubHosting {
    pub fn new(api_url: &str, token: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("reposync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }
}

impl HostingService for GitHubHosting {
    fn repo_exists<'a>(&'a self, owner: &'a str, name: &'a str) -> ProviderFuture<'a, bool> {
        Box::pin(async move {
            let url = format!("{}/repos/{owner}/{name}", self.api_url);
            let response = send_with_retry(
                || self.request(self.client.get(&url)),
                &[StatusCode::NOT_FOUND],
            )
            .await
            .with_context(|| format!("query {owner}/{name}"))?;
            let exists = response.status() != StatusCode::NOT_FOUND;
            debug!(owner, name, exists, "hosted repository lookup");
            Ok(exists)
        })
    }

    fn create_repo<'a>(
        &'a self,
        name: &'a str,
        source: &'a Path,
    ) -> ProviderFuture<'a, CreateOutcome> {
        Box::pin(async move {
            let url = format!("{}/user/repos", self.api_url);
            let body = CreateRepoRequest {
                name,
                private: true,
                description: format!("Synchronized working copy {}", short_name(source)),
                auto_init: false,
            };
            let response = send_with_retry(
                || self.request(self.client.post(&url).json(&body)),
                &[StatusCode::UNPROCESSABLE_ENTITY],
            )
            .await
            .with_context(|| format!("create repository {name}"))?;

            if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
                let error: ApiErrorBody = response.json().await.unwrap_or_default();
                if error.is_name_taken() {
                    return Ok(CreateOutcome::AlreadyExists);
                }
                anyhow::bail!("create repository {name} rejected: {}", error.message);
            }
            info!(name, "hosted repository created");
            Ok(CreateOutcome::Created)
        })
    }
}
