use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use db::models::user::User;
use url::form_urlencoded;
use utils::response::ApiResponse;

use crate::AppState;

fn parse_authorization_bearer(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let (prefix, rest) = trimmed.split_once(' ')?;
    if !prefix.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

fn extract_query_token(req: &Request) -> Option<String> {
    let query = req.uri().query()?;
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if key == "token" {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return None;
            }
            return Some(trimmed.to_string());
        }
    }
    None
}

fn is_websocket_request(req: &Request) -> bool {
    req.headers()
        .get(header::UPGRADE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"))
}

fn extract_request_token(req: &Request) -> Option<String> {
    if let Some(value) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_authorization_bearer)
    {
        return Some(value.to_string());
    }

    // Browsers cannot set headers on WebSocket upgrades, so those may carry
    // the token as a query param instead.
    if is_websocket_request(req) {
        return extract_query_token(req);
    }

    None
}

fn unauthorized() -> Response {
    let response = ApiResponse::<()>::error("Unauthorized. Please sign in again.");
    (StatusCode::UNAUTHORIZED, Json(response)).into_response()
}

/// Resolves the bearer token to a `User` and stores it as a request
/// extension for the handlers behind this middleware.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    let Some(token) = extract_request_token(&req) else {
        return unauthorized();
    };
    let claims = match state.tokens().verify(&token) {
        Ok(claims) => claims,
        Err(_) => return unauthorized(),
    };
    match User::find_by_id(&state.db().pool, claims.sub).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => unauthorized(),
        Err(err) => {
            tracing::error!("failed to resolve session user: {err}");
            let response = ApiResponse::<()>::error("failed to resolve session");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}
