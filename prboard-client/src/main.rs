mod view;

use std::time::Duration;

use anyhow::{bail, Context};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use prboard_core::{PullRequestRecord, RefreshMetadata, RefreshResponse};
use reqwest::{blocking::Response, StatusCode};
use view::{arrange, render, Filter, SortKey, ViewMode};

#[derive(Subcommand, Debug)]
enum Command {
    #[clap(alias = "l", about = "lists open pull requests, fewest approvals first; aliased to 'l'")]
    List {
        #[arg(long, value_enum, default_value_t = SortKey::Approvals)]
        sort: SortKey,
        #[arg(long, default_value_t = false, help = "reverse the sort order")]
        desc: bool,
        #[arg(long, value_enum, default_value_t = ViewMode::Grid)]
        view: ViewMode,
        #[arg(long, help = "only show repositories containing this text")]
        repo: Option<String>,
        #[arg(long, help = "only show pull requests opened by this login")]
        author: Option<String>,
        #[arg(long, help = "only show pull requests with at most this many approvals")]
        max_approvals: Option<u32>,
    },
    #[clap(alias = "r", about = "refetches pull requests from GitHub; aliased to 'r'")]
    Refresh {},
    #[clap(alias = "c", about = "counts stored pull requests; aliased to 'c'")]
    Count {},
    #[clap(alias = "s", about = "shows when the last refresh happened; aliased to 's'")]
    Status {},
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 7192)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

fn fetch_pull_requests(server_url: &str) -> anyhow::Result<Vec<PullRequestRecord>> {
    let response = reqwest::blocking::get(format!("{server_url}/pull-requests"))
        .context("could not reach prboardd")?;

    Ok(response
        .error_for_status()
        .and_then(
            |response: Response| -> Result<Vec<PullRequestRecord>, reqwest::Error> { response.json() },
        )?)
}

fn fetch_metadata(server_url: &str) -> anyhow::Result<Option<RefreshMetadata>> {
    let response = reqwest::blocking::get(format!("{server_url}/metadata"))
        .context("could not reach prboardd")?;

    if response.status() == StatusCode::NOT_FOUND {
        return Ok(None);
    }

    Ok(Some(response.error_for_status()?.json()?))
}

fn trigger_refresh(server_url: &str) -> anyhow::Result<RefreshResponse> {
    let client = reqwest::blocking::Client::builder().timeout(None::<Duration>).build()?;
    let response = client
        .post(format!("{server_url}/refresh"))
        .send()
        .context("could not reach prboardd")?;

    // Failed refreshes still carry a RefreshResponse body.
    response.json().context("unexpected refresh response")
}

fn describe_metadata(metadata: Option<&RefreshMetadata>) -> String {
    match metadata {
        Some(metadata) => {
            let last_refresh: DateTime<Local> = metadata.last_refresh.into();
            format!(
                "Last refresh {} ({} pull requests)",
                last_refresh.format("%Y-%m-%d %H:%M:%S"),
                metadata.last_refresh_count
            )
        }
        None => "Never refreshed".to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let server_url = format!("http://{}:{}", args.host, args.port);

    match args.command {
        Command::List {
            sort,
            desc,
            view,
            repo,
            author,
            max_approvals,
        } => {
            let metadata = fetch_metadata(&server_url)?;
            let filter = Filter {
                repo,
                author,
                max_approvals,
            };
            let prs = arrange(fetch_pull_requests(&server_url)?, &filter, sort, desc);

            println!("{}", describe_metadata(metadata.as_ref()));
            if prs.is_empty() {
                println!("> No prs <");
            } else {
                println!("{}", render(&prs, view));
            }
        }
        Command::Refresh {} => {
            let response = trigger_refresh(&server_url)?;
            for warning in &response.warnings {
                eprintln!("warning: {warning}");
            }

            if !response.success {
                bail!(
                    "Refresh failed: {}",
                    response.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }
            println!("Refreshed {} pull requests", response.count.unwrap_or_default());
        }
        Command::Count {} => {
            println!("{}", fetch_pull_requests(&server_url)?.len())
        }
        Command::Status {} => {
            println!("{}", describe_metadata(fetch_metadata(&server_url)?.as_ref()))
        }
    };

    Ok(())
}
