//! Harbor v2.0 API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use url::{Position, Url};

use crate::client::RegistryClient;
use crate::error::RegistryError;
use crate::model::{Artifact, Project, Repository, strip_project};

const API_BASE: [&str; 2] = ["api", "v2.0"];
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Connection settings for [`HarborClient`].
#[derive(Debug, Clone)]
pub struct HarborSettings {
    pub url: String,
    pub user: String,
    pub password: String,
    pub page_size: usize,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for HarborSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: String::new(),
            page_size: 100,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

/// Authenticated client for the Harbor REST API.
pub struct HarborClient {
    base_url: Url,
    host: String,
    user: String,
    password: String,
    page_size: usize,
    max_retries: u32,
    http: reqwest::Client,
}

impl HarborClient {
    pub fn new(settings: HarborSettings) -> Result<Self, RegistryError> {
        if settings.url.trim().is_empty()
            || settings.user.trim().is_empty()
            || settings.password.is_empty()
        {
            return Err(RegistryError::MissingCredentials);
        }

        let base_url =
            Url::parse(settings.url.trim()).map_err(|e| RegistryError::InvalidUrl {
                url: settings.url.clone(),
                message: e.to_string(),
            })?;
        if base_url.cannot_be_a_base() || base_url.host_str().is_none() {
            return Err(RegistryError::InvalidUrl {
                url: settings.url,
                message: "expected an absolute http(s) url".to_string(),
            });
        }
        let host = base_url[Position::BeforeHost..Position::AfterPath]
            .trim_end_matches('/')
            .to_string();

        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|source| RegistryError::Http {
                url: settings.url.clone(),
                source,
            })?;

        Ok(Self {
            base_url,
            host,
            user: settings.user,
            password: settings.password,
            page_size: settings.page_size.max(1),
            max_retries: settings.max_retries,
            http,
        })
    }

    /// Builds `<base>/api/v2.0/<segments...>`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RegistryError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RegistryError::InvalidUrl {
                url: self.base_url.to_string(),
                message: "url cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(API_BASE)
            .extend(segments);
        Ok(url)
    }

    /// Path segment for a repository inside `project`.
    ///
    /// Harbor wants nested names encoded twice (`a/b` → `a%252Fb`); the
    /// segment encoder takes care of the second pass.
    fn repository_segment(project: &str, repository: &str) -> String {
        strip_project(repository, project).replace('/', "%2F")
    }

    async fn send(&self, method: Method, url: Url) -> Result<reqwest::Response, RegistryError> {
        let mut attempt = 0;
        loop {
            let result = self
                .http
                .request(method.clone(), url.clone())
                .basic_auth(&self.user, Some(&self.password))
                .header(ACCEPT, "application/json")
                .send()
                .await;

            let error = match result {
                Ok(response) if response.status().is_success() => return Ok(response),
                // An earlier attempt may have completed server-side before timing out
                Ok(response)
                    if attempt > 0
                        && method == Method::DELETE
                        && response.status() == StatusCode::NOT_FOUND =>
                {
                    tracing::debug!(url = %url, attempt, "Resource already gone after retry");
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    RegistryError::Status {
                        url: url.to_string(),
                        status,
                        body,
                    }
                }
                Err(source) => RegistryError::Http {
                    url: url.to_string(),
                    source,
                },
            };

            if attempt >= self.max_retries || !error.is_transient() {
                return Err(error);
            }
            attempt += 1;
            let backoff = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
            tracing::warn!(
                method = %method,
                url = %url,
                attempt,
                backoff = ?backoff,
                error = %error,
                "Transient registry error, retrying"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    /// Follows `page`/`page_size` pagination until an empty page.
    ///
    /// Harbor caps `page_size` server-side, so a short page is not the end.
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, RegistryError> {
        let page_size = self.page_size.to_string();
        let mut items = Vec::new();

        for page in 1u32.. {
            let mut page_url = url.clone();
            {
                let mut pairs = page_url.query_pairs_mut();
                for (key, value) in query {
                    pairs.append_pair(key, value);
                }
                pairs.append_pair("page", &page.to_string());
                pairs.append_pair("page_size", &page_size);
            }

            let response = self.send(Method::GET, page_url.clone()).await?;
            let batch: Vec<T> = response
                .json()
                .await
                .map_err(|e| RegistryError::Decode {
                    url: page_url.to_string(),
                    message: e.to_string(),
                })?;

            if batch.is_empty() {
                break;
            }
            items.extend(batch);
        }

        Ok(items)
    }
}

#[async_trait]
impl RegistryClient for HarborClient {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_projects(&self) -> Result<Vec<Project>, RegistryError> {
        let url = self.endpoint(&["projects"])?;
        self.fetch_all(url, &[]).await
    }

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>, RegistryError> {
        let url = self.endpoint(&["projects", project, "repositories"])?;
        self.fetch_all(url, &[]).await
    }

    async fn list_artifacts(
        &self,
        project: &str,
        repository: &str,
    ) -> Result<Vec<Artifact>, RegistryError> {
        let segment = Self::repository_segment(project, repository);
        let url = self.endpoint(&["projects", project, "repositories", &segment, "artifacts"])?;
        self.fetch_all(
            url,
            &[
                ("with_tag", "true"),
                ("with_scan_overview", "false"),
                ("with_label", "false"),
            ],
        )
        .await
    }

    async fn delete_artifact(
        &self,
        project: &str,
        repository: &str,
        digest: &str,
    ) -> Result<(), RegistryError> {
        let segment = Self::repository_segment(project, repository);
        let url = self.endpoint(&[
            "projects",
            project,
            "repositories",
            &segment,
            "artifacts",
            digest,
        ])?;
        self.send(Method::DELETE, url).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> HarborSettings {
        HarborSettings {
            url: url.to_string(),
            user: "robot$cleaner".to_string(),
            password: "token".to_string(),
            ..HarborSettings::default()
        }
    }

    #[test]
    fn test_missing_credentials() {
        let mut incomplete = settings("https://harbor.example.com");
        incomplete.password.clear();
        assert!(matches!(
            HarborClient::new(incomplete),
            Err(RegistryError::MissingCredentials)
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            HarborClient::new(settings("harbor.example.com")),
            Err(RegistryError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_host_strips_scheme_and_trailing_slash() {
        let client = HarborClient::new(settings("https://harbor.example.com/")).unwrap();
        assert_eq!(client.host(), "harbor.example.com");

        let client = HarborClient::new(settings("http://registry.local:8080")).unwrap();
        assert_eq!(client.host(), "registry.local:8080");
    }

    #[test]
    fn test_endpoint_double_encodes_nested_repository() {
        let client = HarborClient::new(settings("https://harbor.example.com/")).unwrap();
        let segment = HarborClient::repository_segment("dev", "dev/team/app1");
        let url = client
            .endpoint(&["projects", "dev", "repositories", &segment, "artifacts"])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://harbor.example.com/api/v2.0/projects/dev/repositories/team%252Fapp1/artifacts"
        );
    }

    #[test]
    fn test_endpoint_plain_repository() {
        let client = HarborClient::new(settings("https://harbor.example.com")).unwrap();
        let segment = HarborClient::repository_segment("dev", "dev/app1");
        let url = client
            .endpoint(&[
                "projects",
                "dev",
                "repositories",
                &segment,
                "artifacts",
                "sha256:abc",
            ])
            .unwrap();

        assert_eq!(
            url.as_str(),
            "https://harbor.example.com/api/v2.0/projects/dev/repositories/app1/artifacts/sha256:abc"
        );
    }
}
