use log::{debug, warn};
use prboard_core::{count_approvals, record_id, sort_by_approvals, PullRequestRecord};

use crate::gh_client::{GithubClient, GithubPullRequest, Page, Result};

#[derive(Debug, Default)]
pub struct Aggregation {
    pub records: Vec<PullRequestRecord>,
    pub warnings: Vec<String>,
}

impl Aggregation {
    fn flag_if_full<T>(&mut self, page: &Page<T>, what: impl FnOnce() -> String) {
        if page.is_full() {
            let warning = format!(
                "{} returned a full page of {} items, anything past it was not fetched",
                what(),
                page.page_size
            );
            warn!("{warning}");
            self.warnings.push(warning);
        }
    }
}

pub async fn collect_records(
    github_client: &GithubClient,
    organization: &str,
) -> Result<Aggregation> {
    let mut aggregation = Aggregation::default();

    let repositories = github_client.list_repositories(organization).await?;
    aggregation.flag_if_full(&repositories, || format!("Repository list of {organization}"));

    for repository in repositories.items.iter() {
        let pull_requests = github_client
            .list_open_pull_requests(organization, &repository.name)
            .await?;
        aggregation.flag_if_full(&pull_requests, || {
            format!("Open pull requests of {organization}/{}", repository.name)
        });
        debug!(
            "{} open pull requests in {organization}/{}",
            pull_requests.items.len(),
            repository.name
        );

        for pull_request in pull_requests.items.into_iter().filter(|pr| !pr.draft) {
            let reviews = github_client
                .list_reviews(organization, &repository.name, pull_request.number)
                .await?;
            aggregation.flag_if_full(&reviews, || {
                format!(
                    "Reviews of {organization}/{}#{}",
                    repository.name, pull_request.number
                )
            });

            let approvals =
                count_approvals(reviews.items.iter().map(|review| review.state.as_str()));
            aggregation.records.push(to_record(
                organization,
                &repository.name,
                pull_request,
                approvals,
            ));
        }
    }

    sort_by_approvals(&mut aggregation.records);

    Ok(aggregation)
}

fn to_record(
    organization: &str,
    repository: &str,
    pull_request: GithubPullRequest,
    approvals: u32,
) -> PullRequestRecord {
    let GithubPullRequest {
        number,
        title,
        draft: _,
        html_url,
        updated_at,
        user,
    } = pull_request;

    PullRequestRecord {
        id: record_id(repository, number),
        title,
        repo: format!("{organization}/{repository}"),
        author: user.login,
        url: html_url,
        updated_at,
        approvals,
    }
}
