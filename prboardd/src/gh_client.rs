use chrono::{DateTime, Utc};
use log::debug;
use reqwest::{
    header::{self, HeaderMap, HeaderValue},
    StatusCode,
};
use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

use crate::config::GithubConfig;

pub const DEFAULT_PAGE_SIZE: usize = 30;
pub const PULL_REQUEST_PAGE_SIZE: usize = 20;

const USER_AGENT: &str = concat!("prboardd/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";

#[derive(Error, Debug)]
pub enum GithubClientError {
    #[error("GitHub token contains characters that cannot be sent in a header")]
    InvalidToken,
    #[error("Could not build http client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("Request for {operation} failed: {source}")]
    Request {
        operation: String,
        source: reqwest::Error,
    },
    #[error("Got status {status} from {operation}, body: {body}")]
    UnexpectedStatus {
        operation: String,
        status: StatusCode,
        body: String,
    },
    #[error(
        "Got unexpected output from operation {operation}, body: {body}, underlying error: {underlying_error}"
    )]
    UnexpectedOutput {
        operation: String,
        body: String,
        underlying_error: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, GithubClientError>;

#[derive(Clone, Deserialize, Debug)]
pub struct GithubRepository {
    pub name: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct GithubUser {
    pub login: String,
}

#[derive(Clone, Deserialize, Debug)]
pub struct GithubPullRequest {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub draft: bool,
    pub html_url: String,
    pub updated_at: DateTime<Utc>,
    pub user: GithubUser,
}

#[derive(Clone, Deserialize, Debug)]
pub struct GithubReview {
    pub state: String,
}

#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.page_size
    }
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
}

impl GithubClient {
    pub fn new(config: &GithubConfig) -> Result<GithubClient> {
        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| GithubClientError::InvalidToken)?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, authorization);
        headers.insert(header::ACCEPT, HeaderValue::from_static(GITHUB_JSON));

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(GithubClientError::ClientBuild)?;

        Ok(GithubClient {
            http,
            api_url: config.api_url.clone(),
        })
    }

    pub async fn list_repositories(&self, organization: &str) -> Result<Page<GithubRepository>> {
        let operation = format!("list repositories of {organization}");
        let body = self
            .get(&operation, &format!("/orgs/{organization}/repos"), &[])
            .await?;

        Ok(Page {
            items: parse(&operation, &body)?,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    // An empty or `null` body counts as no open pull requests.
    pub async fn list_open_pull_requests(
        &self,
        organization: &str,
        repository: &str,
    ) -> Result<Page<GithubPullRequest>> {
        let operation = format!("list open pull requests of {organization}/{repository}");
        let per_page = PULL_REQUEST_PAGE_SIZE.to_string();
        let body = self
            .get(
                &operation,
                &format!("/repos/{organization}/{repository}/pulls"),
                &[("state", "open"), ("per_page", per_page.as_str())],
            )
            .await?;

        let items = if body.trim().is_empty() {
            vec![]
        } else {
            parse::<Option<Vec<GithubPullRequest>>>(&operation, &body)?.unwrap_or_default()
        };

        Ok(Page {
            items,
            page_size: PULL_REQUEST_PAGE_SIZE,
        })
    }

    pub async fn list_reviews(
        &self,
        organization: &str,
        repository: &str,
        number: u64,
    ) -> Result<Page<GithubReview>> {
        let operation = format!("list reviews of {organization}/{repository}#{number}");
        let body = self
            .get(
                &operation,
                &format!("/repos/{organization}/{repository}/pulls/{number}/reviews"),
                &[],
            )
            .await?;

        Ok(Page {
            items: parse(&operation, &body)?,
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    async fn get(&self, operation: &str, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let request_error = |source| GithubClientError::Request {
            operation: operation.to_string(),
            source,
        };

        debug!("GET {path} ({operation})");
        let response = self
            .http
            .get(format!("{}{path}", self.api_url))
            .query(query)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(request_error)?;

        if !status.is_success() {
            return Err(GithubClientError::UnexpectedStatus {
                operation: operation.to_string(),
                status,
                body,
            });
        }

        Ok(body)
    }
}

fn parse<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|underlying_error| GithubClientError::UnexpectedOutput {
        operation: operation.to_string(),
        body: body.to_string(),
        underlying_error,
    })
}
