use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use log::{error, info};
use prboard_core::{sort_by_approvals, PullRequestRecord, RefreshMetadata, RefreshResponse};

use crate::{config::Config, gh_client::GithubClient, refresh::run_refresh, sink::PersistenceSink};

pub struct AppState {
    pub config: Config,
    pub github_client: GithubClient,
    pub sink: PersistenceSink,
}

type HandlerAppState = State<Arc<AppState>>;

#[axum::debug_handler]
pub async fn refresh(State(state): State<Arc<AppState>>) -> (StatusCode, Json<RefreshResponse>) {
    let organization = &state.config.github.organization;

    match run_refresh(organization, &state.github_client, &state.sink).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(RefreshResponse::succeeded(summary.count, summary.warnings)),
        ),
        Err(e) => {
            error!("Refresh of {organization} failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RefreshResponse::failed(e.to_string())),
            )
        }
    }
}

pub async fn pull_requests(
    State(state): HandlerAppState,
) -> Result<Json<Vec<PullRequestRecord>>, (StatusCode, String)> {
    let mut records = state.sink.records().await.map_err(|e| {
        error!("Could not read pull requests: {e}");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    sort_by_approvals(&mut records);

    info!("Serving {} pull requests", records.len());
    Ok(Json(records))
}

pub async fn metadata(
    State(state): HandlerAppState,
) -> Result<Json<RefreshMetadata>, (StatusCode, String)> {
    match state.sink.metadata().await {
        Ok(Some(metadata)) => Ok(Json(metadata)),
        Ok(None) => Err((StatusCode::NOT_FOUND, "No refresh has completed yet".to_string())),
        Err(e) => {
            error!("Could not read refresh metadata: {e}");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GithubConfig, DEFAULT_HOST, DEFAULT_PORT};
    use crate::gh_client::tests::{client_for, pull_request_json};
    use crate::store::MemoryStore;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn state_for(server: &MockServer) -> Arc<AppState> {
        Arc::new(AppState {
            config: Config {
                github: GithubConfig {
                    organization: "acme".to_string(),
                    token: "test-token".to_string(),
                    api_url: server.uri(),
                },
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                store_file: None,
            },
            github_client: client_for(server),
            sink: PersistenceSink::new(Arc::new(MemoryStore::new())),
        })
    }

    async fn mount_json(server: &MockServer, route: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn refresh_then_read_back_records_and_metadata() {
        let server = MockServer::start().await;
        mount_json(&server, "/orgs/acme/repos", json!([{"name": "web"}])).await;
        mount_json(
            &server,
            "/repos/acme/web/pulls",
            json!([pull_request_json(1, false), pull_request_json(2, false)]),
        )
        .await;
        mount_json(
            &server,
            "/repos/acme/web/pulls/1/reviews",
            json!([{"state": "APPROVED"}, {"state": "APPROVED"}]),
        )
        .await;
        mount_json(&server, "/repos/acme/web/pulls/2/reviews", json!([])).await;
        let state = state_for(&server);

        let (status, Json(response)) = refresh(State(state.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, RefreshResponse::succeeded(2, vec![]));

        let Json(records) = pull_requests(State(state.clone())).await.unwrap();
        let approvals: Vec<_> = records.iter().map(|r| (r.id.as_str(), r.approvals)).collect();
        assert_eq!(approvals, [("web-2", 0), ("web-1", 2)]);

        let Json(refresh_metadata) = metadata(State(state)).await.unwrap();
        assert_eq!(refresh_metadata.last_refresh_count, 2);
    }

    #[tokio::test]
    async fn failed_refresh_is_reported_as_server_error() {
        let server = MockServer::start().await;
        Mock::given(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;
        let state = state_for(&server);

        let (status, Json(response)) = refresh(State(state.clone())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!response.success);
        assert!(response.error.unwrap().contains("403"));
        assert!(response.count.is_none());
        assert_eq!(
            metadata(State(state)).await.unwrap_err().0,
            StatusCode::NOT_FOUND
        );
    }
}
