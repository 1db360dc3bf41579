use chrono::Utc;
use log::info;
use thiserror::Error;

use crate::{
    aggregate::collect_records,
    gh_client::{GithubClient, GithubClientError},
    sink::PersistenceSink,
    store::StoreError,
};

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Github(#[from] GithubClientError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, PartialEq, Eq)]
pub struct RefreshSummary {
    pub count: usize,
    pub warnings: Vec<String>,
}

pub async fn run_refresh(
    organization: &str,
    github_client: &GithubClient,
    sink: &PersistenceSink,
) -> Result<RefreshSummary, RefreshError> {
    info!("Refreshing pull requests of {organization}");

    let aggregation = collect_records(github_client, organization).await?;
    let count = aggregation.records.len();

    for outcome in sink.upsert_records(&aggregation.records).await {
        outcome?;
    }

    sink.write_metadata(Utc::now(), count).await?;
    info!("Refreshed {count} pull requests of {organization}");

    Ok(RefreshSummary {
        count,
        warnings: aggregation.warnings,
    })
}
