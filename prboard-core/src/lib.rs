use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const APPROVED_REVIEW_STATE: &str = "APPROVED";

pub type PullRequestId = String;

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct PullRequestRecord {
    pub id: PullRequestId,
    pub title: String,
    pub repo: String,
    pub author: String,
    pub url: String,
    pub updated_at: DateTime<Utc>,
    pub approvals: u32,
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct RefreshMetadata {
    #[serde(rename = "lastRefresh")]
    pub last_refresh: DateTime<Utc>,
    #[serde(rename = "lastRefreshCount")]
    pub last_refresh_count: usize,
}

#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct RefreshResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RefreshResponse {
    pub fn succeeded(count: usize, warnings: Vec<String>) -> RefreshResponse {
        RefreshResponse {
            success: true,
            count: Some(count),
            error: None,
            warnings,
        }
    }

    pub fn failed(error: impl Into<String>) -> RefreshResponse {
        RefreshResponse {
            success: false,
            count: None,
            error: Some(error.into()),
            warnings: vec![],
        }
    }
}

pub fn record_id(repository_name: &str, number: u64) -> PullRequestId {
    format!("{repository_name}-{number}")
}

// Exact, case-sensitive match. Repeated approvals from one reviewer each count.
pub fn count_approvals<'a, I>(review_states: I) -> u32
where
    I: IntoIterator<Item = &'a str>,
{
    review_states
        .into_iter()
        .filter(|state| *state == APPROVED_REVIEW_STATE)
        .count() as u32
}

pub fn sort_by_approvals(records: &mut [PullRequestRecord]) {
    records.sort_by_key(|record| record.approvals);
}
