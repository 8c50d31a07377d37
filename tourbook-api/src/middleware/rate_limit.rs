use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::net::SocketAddr;

use crate::state::AppState;

/// Fixed-window limit per client address. Fails open when Redis is down.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    // Missing under `oneshot`, where there is no socket.
    let subject = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    match redis
        .check_rate_limit(&subject, state.rate_limit.requests, state.rate_limit.window_seconds)
        .await
    {
        Ok(decision) if decision.allowed => next.run(req).await,
        Ok(decision) => {
            tracing::warn!(%subject, count = decision.count, "Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limit exceeded", "limit": decision.limit })),
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!("Rate limiter unavailable, allowing request: {}", e);
            next.run(req).await
        }
    }
}
