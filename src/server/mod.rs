//! HTTP surface of the shop editor.
//!
//! Every route lives under `/api`. Handlers are thin wrappers over
//! [`ShopStore`]; failures come back as `{ "error": kind, "message": ... }`.

mod error;
mod routes;

use axum::routing::{get, post};
use axum::Router;
use shopdesk_core::ShopStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub use error::{shop_error_status, ApiError};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ShopStore>,
}

impl AppState {
    pub fn new(store: ShopStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health))
        .route("/servers", get(routes::list_servers))
        .route("/currencies", get(routes::list_currencies))
        .route(
            "/servers/{server_id}/shops",
            get(routes::list_shops).post(routes::create_shop),
        )
        .route(
            "/servers/{server_id}/shops/{shop_id}",
            get(routes::get_shop)
                .post(routes::save_shop)
                .put(routes::save_shop)
                .delete(routes::delete_shop),
        )
        .route(
            "/servers/{server_id}/shops/{shop_id}/backups",
            get(routes::list_backups),
        )
        .route(
            "/servers/{server_id}/shops/{shop_id}/restore",
            post(routes::restore_latest),
        )
        .route(
            "/servers/{server_id}/shops/{shop_id}/restore/{backup}",
            post(routes::restore_named),
        )
        .route(
            "/servers/{server_id}/shops/{shop_id}/grid",
            get(routes::shop_grid),
        );

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use shopdesk_core::{
        Catalog, Credentials, Currency, MemoryRemote, RemoteCall, RemoteError, ServerProfile,
    };
    use tower::ServiceExt;

    fn setup() -> (Router, MemoryRemote) {
        let remote = MemoryRemote::new();
        remote.create_dir_all("/shops");
        let catalog = Catalog::new(
            vec![ServerProfile {
                id: "main".into(),
                name: "Main".into(),
                host: "sftp.example.com".into(),
                port: 22,
                base_path: "/shops".into(),
            }],
            vec![Currency::new("gold", None, "E")],
        );
        let store = ShopStore::new(
            Arc::new(catalog),
            Arc::new(remote.clone()),
            Credentials::default(),
        );
        (router(AppState::new(store)), remote)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup();
        let (status, body) = send(app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_servers_and_currencies() {
        let (app, _) = setup();
        let (_, servers) = send(app.clone(), "GET", "/api/servers", None).await;
        assert_eq!(servers, json!([{"id": "main", "name": "Main"}]));

        let (_, currencies) = send(app, "GET", "/api/currencies", None).await;
        assert_eq!(
            currencies,
            json!([{"id": "gold", "name": "gold", "economy": "E"}])
        );
    }

    #[tokio::test]
    async fn test_unknown_server_is_404() {
        let (app, _) = setup();
        let (status, body) = send(app, "GET", "/api/servers/nope/shops", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "server_not_found");
    }

    #[tokio::test]
    async fn test_create_requires_shop_id() {
        let (app, remote) = setup();
        let (status, body) =
            send(app, "POST", "/api/servers/main/shops", Some(json!({"title": "T"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "shopId is required");
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_then_conflict() {
        let (app, _) = setup();
        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/servers/main/shops",
            Some(json!({"shopId": "s1"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "created", "shopId": "s1"}));

        let (status, body) = send(
            app,
            "POST",
            "/api/servers/main/shops",
            Some(json!({"shopId": "s1"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "already_exists");
    }

    #[tokio::test]
    async fn test_save_load_delete_restore() {
        let (app, remote) = setup();
        remote.insert_file("/shops/s1.json", r#"{"title":"Old","entries":{}}"#);

        let doc = json!({"title": "New", "entries": {"a": {"item": "x", "slot": 0}}});
        let (status, body) = send(
            app.clone(),
            "PUT",
            "/api/servers/main/shops/s1",
            Some(doc.clone()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "saved");
        assert!(body["backup"].as_str().unwrap().starts_with("s1.bak."));

        let (_, loaded) = send(app.clone(), "GET", "/api/servers/main/shops/s1", None).await;
        assert_eq!(loaded, doc);

        let (_, backups) = send(
            app.clone(),
            "GET",
            "/api/servers/main/shops/s1/backups",
            None,
        )
        .await;
        assert_eq!(backups.as_array().unwrap().len(), 1);

        let (status, body) =
            send(app.clone(), "DELETE", "/api/servers/main/shops/s1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "deleted");

        let (status, _) = send(app.clone(), "GET", "/api/servers/main/shops/s1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            app,
            "POST",
            "/api/servers/main/shops/s1/restore",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "restored");
        let restored: Value =
            serde_json::from_slice(&remote.read("/shops/s1.json").unwrap()).unwrap();
        assert_eq!(restored, doc);
    }

    #[tokio::test]
    async fn test_restore_errors() {
        let (app, _) = setup();
        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/servers/main/shops/s1/restore",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no_backups_found");

        let (status, body) = send(
            app,
            "POST",
            "/api/servers/main/shops/s1/restore/s1.bak.missing",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "backup_not_found");
    }

    #[tokio::test]
    async fn test_malformed_and_transfer_errors() {
        let (app, remote) = setup();
        remote.insert_file("/shops/bad.json", "not json");
        let (status, body) = send(app.clone(), "GET", "/api/servers/main/shops/bad", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "malformed_document");

        remote.fail(
            RemoteCall::List("/shops".into()),
            RemoteError::Other("permission denied".into()),
        );
        let (status, body) = send(app, "GET", "/api/servers/main/shops", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "transfer_error");
        assert_eq!(remote.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_invalid_shop_id_is_400() {
        let (app, _) = setup();
        let (status, body) = send(app, "GET", "/api/servers/main/shops/..secret", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_shop_id");
    }

    #[tokio::test]
    async fn test_grid_reports_conflicts() {
        let (app, remote) = setup();
        remote.insert_file(
            "/shops/s1.json",
            json!({"title": "T", "entries": {
                "e1": {"item": "sword", "slot": 5, "page": [1]},
                "e2": {"item": "bow", "slot": 5, "page": [1, 2]}
            }})
            .to_string(),
        );
        let (status, body) = send(
            app,
            "GET",
            "/api/servers/main/shops/s1/grid?page=1&filter=bow",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["pages"], json!([1, 2]));
        assert_eq!(body["nextPage"], 3);
        assert_eq!(body["buckets"][5], json!(["e1", "e2"]));
        assert_eq!(body["conflicts"], json!([{"slot": 5, "ids": ["e1", "e2"]}]));
        assert_eq!(body["stats"]["filled"], 1);
        assert_eq!(body["matches"], json!(["e2"]));
    }
}
