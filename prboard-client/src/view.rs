use std::cmp::Ordering;

use chrono::{DateTime, Local};
use clap::ValueEnum;
use prboard_core::PullRequestRecord;
use tabled::{Table, Tabled};

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Approvals,
    Updated,
    Title,
    Repo,
    Author,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    List,
    #[default]
    Grid,
}

#[derive(Clone, Debug, Default)]
pub struct Filter {
    pub repo: Option<String>,
    pub author: Option<String>,
    pub max_approvals: Option<u32>,
}

impl Filter {
    fn matches(&self, record: &PullRequestRecord) -> bool {
        let repo_matches = self
            .repo
            .as_ref()
            .map(|repo| record.repo.to_lowercase().contains(&repo.to_lowercase()))
            .unwrap_or(true);
        let author_matches = self
            .author
            .as_ref()
            .map(|author| record.author.eq_ignore_ascii_case(author))
            .unwrap_or(true);
        let approvals_match = self
            .max_approvals
            .map(|max| record.approvals <= max)
            .unwrap_or(true);

        repo_matches && author_matches && approvals_match
    }
}

fn compare(sort: SortKey, a: &PullRequestRecord, b: &PullRequestRecord) -> Ordering {
    match sort {
        SortKey::Approvals => a.approvals.cmp(&b.approvals),
        SortKey::Updated => a.updated_at.cmp(&b.updated_at),
        SortKey::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortKey::Repo => a.repo.to_lowercase().cmp(&b.repo.to_lowercase()),
        SortKey::Author => a.author.to_lowercase().cmp(&b.author.to_lowercase()),
    }
}

pub fn arrange(
    records: Vec<PullRequestRecord>,
    filter: &Filter,
    sort: SortKey,
    descending: bool,
) -> Vec<PullRequestRecord> {
    let mut records: Vec<_> = records.into_iter().filter(|r| filter.matches(r)).collect();

    records.sort_by(|a, b| {
        let ordering = compare(sort, a, b);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });

    records
}

#[derive(Clone, Debug, Tabled)]
struct PrettyPullRequest {
    pub num: usize,
    pub approvals: u32,
    pub title: String,
    pub repo: String,
    pub author: String,
    pub updated: DateTime<Local>,
}

fn prettyify_prs(records: &[PullRequestRecord]) -> Vec<PrettyPullRequest> {
    records
        .iter()
        .enumerate()
        .map(|(num, record)| PrettyPullRequest {
            num,
            approvals: record.approvals,
            title: format!("{:.40}", record.title),
            repo: record.repo.clone(),
            author: record.author.clone(),
            updated: record.updated_at.into(),
        })
        .collect()
}

pub fn render(records: &[PullRequestRecord], mode: ViewMode) -> String {
    match mode {
        ViewMode::Grid => Table::new(prettyify_prs(records)).to_string(),
        ViewMode::List => records
            .iter()
            .map(|record| {
                format!(
                    "[{}] {} ({}) by {}\n    {}",
                    record.approvals, record.title, record.repo, record.author, record.url
                )
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
