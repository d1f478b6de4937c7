use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use crate::server::Server;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use warp::{self, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

// region session

#[derive(Debug, Serialize)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub user_id: Option<UserId>,
}

pub async fn session_status(
    validator: Arc<dyn SessionValidator>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let authenticated = validator.is_authenticated().await;
    let user_id = if authenticated {
        validator.current_user().await
    } else {
        None
    };
    Ok(warp::reply::json(&ApiResponse::ok(SessionStatus {
        authenticated,
        user_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignInResponse {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

pub async fn sign_in(
    body: SignInRequest,
    server: Arc<Server>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let input = SignInInput {
        email: body.email,
        password: body.password,
    };
    let session = server
        .sign_in(input)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(SignInResponse {
        user_id: session.user_id,
        expires_at: session.expires_at,
    })))
}

pub async fn sign_out(server: Arc<Server>) -> Result<impl warp::Reply, warp::Rejection> {
    server.sign_out().await;
    Ok(warp::reply::json(&ApiResponse::ok(())))
}

// endregion

// region bookmarks

#[derive(Debug, Default, Deserialize)]
pub struct FetchQuery {
    pub force: Option<bool>,
    pub timeout_ms: Option<u64>,
}

impl From<FetchQuery> for FetchOptions {
    fn from(query: FetchQuery) -> Self {
        FetchOptions {
            force: query.force.unwrap_or(false),
            timeout: query.timeout_ms.map(Duration::from_millis),
        }
    }
}

pub async fn list_bookmarks(
    query: FetchQuery,
    service: Arc<dyn BookmarkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = service.fetch_membership_with(query.into()).await;
    Ok(warp::reply::json(&ApiResponse::ok(result)))
}

#[derive(Debug, Serialize)]
pub struct RecordsPage {
    pub items: Vec<BookmarkedTool>,
    pub has_more: bool,
    pub total: usize,
    pub error: Option<String>,
    pub stale: bool,
}

fn records_page(
    result: FetchResult<Vec<BookmarkedTool>>,
    service: &dyn BookmarkService,
) -> RecordsPage {
    let items = service.displayed_records();
    let total = result.value.len();
    RecordsPage {
        has_more: items.len() < total,
        items,
        total,
        error: result.error,
        stale: result.stale,
    }
}

pub async fn list_records(
    query: FetchQuery,
    service: Arc<dyn BookmarkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = service.fetch_full_records_with(query.into()).await;
    let page = records_page(result, service.as_ref());
    Ok(warp::reply::json(&ApiResponse::ok(page)))
}

pub async fn refresh_bookmarks(
    service: Arc<dyn BookmarkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let result = service.refresh_membership().await;
    let page = records_page(result, service.as_ref());
    Ok(warp::reply::json(&ApiResponse::ok(page)))
}

pub async fn load_more(
    service: Arc<dyn BookmarkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(service.load_more())))
}

#[derive(Debug, Serialize)]
pub struct ToggleResponse {
    pub outcome: ToggleOutcome,
    pub is_member: bool,
}

pub async fn toggle_bookmark(
    item_id: String,
    service: Arc<dyn BookmarkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    let item_id = ItemId::new(item_id);
    let outcome = service
        .toggle_membership(&item_id)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(ToggleResponse {
        outcome,
        is_member: service.is_member(&item_id),
    })))
}

#[derive(Debug, Deserialize)]
pub struct ClearRequest {
    #[serde(default)]
    pub confirm: bool,
}

pub async fn clear_bookmarks(
    body: ClearRequest,
    service: Arc<dyn BookmarkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    service
        .clear_all_membership(body.confirm)
        .await
        .map_err(ApiErrorCode::from)
        .map_err(reject::custom)?;
    Ok(warp::reply::json(&ApiResponse::ok(())))
}

pub async fn bookmark_snapshot(
    service: Arc<dyn BookmarkService>,
) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::json(&ApiResponse::ok(service.snapshot())))
}

pub fn membership_events(service: Arc<dyn BookmarkService>) -> impl warp::Reply {
    let rx = service.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let data = match serde_json::to_string(&event) {
                        Ok(data) => data,
                        Err(e) => {
                            error!("failed to serialize membership event: {}", e);
                            continue;
                        }
                    };
                    let sse = warp::sse::Event::default().event(event.name()).data(data);
                    return Some((Ok::<_, Infallible>(sse), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("event subscriber lagged, {} event(s) skipped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });
    warp::sse::reply(warp::sse::keep_alive().stream(stream))
}

// endregion
