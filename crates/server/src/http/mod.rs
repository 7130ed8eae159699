use axum::{Router, middleware::from_fn_with_state, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{AppState, routes};

mod auth;

pub fn router(state: AppState) -> Router {
    let session_routes = Router::new()
        .merge(routes::auth::protected_router())
        .merge(routes::workspaces::router())
        .merge(routes::projects::router(&state))
        .merge(routes::boards::router(&state))
        .merge(routes::columns::router(&state))
        .merge(routes::tasks::router(&state))
        .merge(routes::events::router())
        .layer(from_fn_with_state(state.clone(), auth::require_session));

    let api_routes = Router::new()
        .merge(routes::auth::public_router())
        .merge(session_routes);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use auth::TokenService;
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use chrono::Duration;
    use db::DBService;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn setup_app() -> Router {
        let db = DBService::new("sqlite::memory:").await.unwrap();
        let tokens = TokenService::new("test-secret", Duration::hours(1));
        super::router(crate::AppState::new(db, tokens))
    }

    fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn register(app: &Router, name: &str, email: &str) -> String {
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": name, "email": email, "password": "hunter2-hunter2" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        body["data"]["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = setup_app().await;
        let response = app
            .oneshot(request("GET", "/health", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn api_requires_a_session() {
        let app = setup_app().await;
        let response = app
            .oneshot(request("GET", "/api/workspaces", None, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn register_login_me_roundtrip() {
        let app = setup_app().await;
        register(&app, "Ada", "ada@example.com").await;

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "hunter2-hunter2" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let token = body["data"]["token"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request("GET", "/api/auth/me", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["email"], "ada@example.com");

        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "ada@example.com", "password": "wrong-password" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let app = setup_app().await;
        register(&app, "Ada", "ada@example.com").await;

        let response = app
            .oneshot(request(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": "Imposter", "email": "ada@example.com", "password": "hunter2-hunter2" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn registration_seeds_a_default_board() {
        let app = setup_app().await;
        let token = register(&app, "Ada", "ada@example.com").await;

        let response = app
            .clone()
            .oneshot(request("GET", "/api/workspaces", Some(&token), None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let workspaces = body["data"].as_array().unwrap();
        assert_eq!(workspaces.len(), 1);
        assert_eq!(workspaces[0]["name"], "Ada — Workspace");
        let boards = workspaces[0]["boards"].as_array().unwrap();
        assert_eq!(boards.len(), 1);
        let board_id = boards[0]["id"].as_str().unwrap();

        let response = app
            .oneshot(request(
                "GET",
                &format!("/api/boards/{board_id}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let columns = body["data"]["columns"].as_array().unwrap();
        let titles: Vec<&str> = columns
            .iter()
            .map(|c| c["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Backlog", "In Progress", "Done"]);
        assert_eq!(columns[0]["tasks"].as_array().unwrap().len(), 1);
        assert_eq!(columns[1]["tasks"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn move_task_endpoint_renumbers_columns() {
        let app = setup_app().await;
        let token = register(&app, "Ada", "ada@example.com").await;

        let response = app
            .clone()
            .oneshot(request("GET", "/api/workspaces", Some(&token), None))
            .await
            .unwrap();
        let body = body_json(response).await;
        let board_id = body["data"][0]["boards"][0]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(
                "GET",
                &format!("/api/boards/{board_id}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        let columns = body["data"]["columns"].as_array().unwrap().clone();
        let task_id = columns[0]["tasks"][0]["id"].as_str().unwrap().to_string();
        let done_id = columns[2]["id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/tasks/{task_id}/move"),
                Some(&token),
                Some(json!({ "column_id": done_id, "position": 0 })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["column_id"], done_id.as_str());
        assert_eq!(body["data"]["position"], 0);

        let response = app
            .oneshot(request(
                "GET",
                &format!("/api/boards/{board_id}"),
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        let columns = body["data"]["columns"].as_array().unwrap();
        assert_eq!(columns[0]["tasks"].as_array().unwrap().len(), 0);
        assert_eq!(columns[2]["tasks"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn foreign_boards_are_forbidden() {
        let app = setup_app().await;
        let owner_token = register(&app, "Ada", "ada@example.com").await;
        let outsider_token = register(&app, "Eve", "eve@example.com").await;

        let response = app
            .clone()
            .oneshot(request("GET", "/api/workspaces", Some(&owner_token), None))
            .await
            .unwrap();
        let body = body_json(response).await;
        let board_id = body["data"][0]["boards"][0]["id"].as_str().unwrap().to_string();

        let response = app
            .oneshot(request(
                "GET",
                &format!("/api/boards/{board_id}"),
                Some(&outsider_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests() {
        let app = setup_app().await;
        let token = register(&app, "Ada", "ada@example.com").await;

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/projects",
                Some(&token),
                Some(json!({ "name": "x" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(request(
                "GET",
                "/api/boards/not-a-uuid",
                Some(&token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn member_management_flow() {
        let app = setup_app().await;
        let owner_token = register(&app, "Ada", "ada@example.com").await;
        let member_token = register(&app, "Bob", "bob@example.com").await;

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                "/api/projects",
                Some(&owner_token),
                Some(json!({ "name": "Team project" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let project_id = body["data"]["id"].as_str().unwrap().to_string();

        // Only the owner can add members.
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/projects/{project_id}/members"),
                Some(&member_token),
                Some(json!({ "email": "bob@example.com" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/projects/{project_id}/members"),
                Some(&owner_token),
                Some(json!({ "email": "bob@example.com" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        let member_id = body["data"]["id"].as_str().unwrap().to_string();

        // Duplicate membership conflicts; unknown email is a 404.
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/projects/{project_id}/members"),
                Some(&owner_token),
                Some(json!({ "email": "bob@example.com" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let response = app
            .clone()
            .oneshot(request(
                "POST",
                &format!("/api/projects/{project_id}/members"),
                Some(&owner_token),
                Some(json!({ "email": "ghost@example.com" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // The member now sees the project.
        let response = app
            .clone()
            .oneshot(request("GET", "/api/projects", Some(&member_token), None))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let response = app
            .oneshot(request(
                "DELETE",
                &format!("/api/project-members/{member_id}"),
                Some(&owner_token),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
