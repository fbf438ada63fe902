//! HTTP route wiring and server lifecycle.

use std::sync::Arc;

use axum::{
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use super::auth;
use super::logging;
use super::secrets;
use super::types::HealthResponse;
use crate::config::Config;
use crate::gate::AuthGate;
use crate::pgp::{GpgCli, OpenPgp};
use crate::store::PasswordStore;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// The opened store, read-only for the process lifetime
    pub store: Arc<PasswordStore>,
    pub gate: AuthGate,
    /// Used to encrypt listings for callers that sent a public key
    pub pgp: Arc<dyn OpenPgp>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<PasswordStore>, pgp: Arc<dyn OpenPgp>) -> Self {
        let gate = AuthGate::new(Arc::clone(&store), Arc::clone(&pgp));
        Self {
            config,
            store,
            gate,
            pgp,
        }
    }
}

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/secrets", post(secrets::list_secrets))
        .route("/secret", post(secrets::get_secret))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            auth::require_key,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(protected_routes)
        .layer(middleware::from_fn(logging::access_log))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Open the store and start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(PasswordStore::open(&config.store_dir, config.fs_timeout).await?);
    let pgp: Arc<dyn OpenPgp> = Arc::new(GpgCli::new(config.gpg.clone()));
    let addr = config.addr();
    let state = Arc::new(AppState::new(config, store, pgp));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

/// Health check endpoint. Unauthenticated, so it says nothing about the store.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{dearmor, Envelope};
    use crate::pgp::PgpError;
    use crate::store::{KeyId, TRUST_ANCHOR_FILE};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    const CLIENT_KEY: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/client.asc"));

    /// Real key id parsing; "encrypts" by armoring the plaintext.
    struct ArmorOnlyPgp;

    #[async_trait]
    impl OpenPgp for ArmorOnlyPgp {
        fn primary_key_id(&self, armored_key: &str) -> Result<KeyId, PgpError> {
            crate::pgp::primary_key_id(armored_key)
        }

        async fn encrypt(&self, data: &[u8], armored_keys: &[String]) -> Result<String, PgpError> {
            if armored_keys.is_empty() {
                return Err(PgpError::NoRecipients);
            }
            Ok(Envelope::build(data).armored())
        }
    }

    async fn fixture_app(max_body_bytes: usize) -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(TRUST_ANCHOR_FILE), "9ED5E44EFB91D165\n").unwrap();
        std::fs::create_dir_all(root.join("A")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        std::fs::write(root.join("A/alice.gpg"), b"alice-ciphertext").unwrap();
        std::fs::write(root.join("A/bob.gpg"), b"bob-ciphertext").unwrap();
        std::fs::write(root.join("b/carol.gpg"), b"carol-ciphertext").unwrap();
        std::fs::write(root.join("root.gpg"), b"no domain").unwrap();

        let mut config = Config::new(root.to_path_buf());
        config.fs_timeout = Duration::from_secs(5);
        config.max_body_bytes = max_body_bytes;

        let store = Arc::new(PasswordStore::open(root, config.fs_timeout).await.unwrap());
        let state = Arc::new(AppState::new(config, store, Arc::new(ArmorOnlyPgp)));
        (dir, router(state))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: String) -> (StatusCode, Value) {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap();
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
        send(app, Method::POST, uri, body.to_string()).await
    }

    fn names(secrets: &Value) -> Vec<(String, String)> {
        secrets
            .as_array()
            .unwrap()
            .iter()
            .map(|r| {
                (
                    r["domain"].as_str().unwrap().to_string(),
                    r["username"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    fn expected_names() -> Vec<(String, String)> {
        [("A", "alice"), ("A", "bob"), ("b", "carol")]
            .iter()
            .map(|(d, u)| (d.to_string(), u.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn health_needs_no_credential_and_hides_the_store() {
        let (dir, app) = fixture_app(4096).await;
        let (status, body) = send(&app, Method::GET, "/health", String::new()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}));

        let root = dir.path().canonicalize().unwrap();
        let rendered = body.to_string();
        assert!(!rendered.contains(root.to_str().unwrap()));
        assert!(!rendered.contains(dir.path().to_str().unwrap()));
    }

    #[tokio::test]
    async fn missing_credential_is_rejected() {
        let (_dir, app) = fixture_app(4096).await;
        let (status, body) = post(&app, "/secrets", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a publicKey or keyId.");

        let (status, _) = send(&app, Method::POST, "/secrets", "not json".into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn untrusted_and_malformed_key_ids_are_rejected() {
        let (_dir, app) = fixture_app(4096).await;
        let (status, body) = post(&app, "/secrets", json!({"keyId": "0123456789ABCDEF"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid publicKey.");

        let (status, body) = post(&app, "/secrets", json!({"keyId": "ABCD"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a proper keyId.");
    }

    #[tokio::test]
    async fn key_id_lists_plain_catalog() {
        let (_dir, app) = fixture_app(4096).await;
        let (status, body) = post(&app, "/secrets", json!({"keyId": "9ed5e44efb91d165"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(names(&body["secrets"]), expected_names());
        assert_eq!(body["secrets"][0]["path"], "A");
    }

    #[tokio::test]
    async fn public_key_lists_encrypted_catalog() {
        let (_dir, app) = fixture_app(16 * 1024).await;
        let (status, body) = post(&app, "/secrets", json!({"publicKey": CLIENT_KEY})).await;
        assert_eq!(status, StatusCode::OK);

        let armored = body["response"].as_str().unwrap();
        let block = dearmor(armored).unwrap();
        let catalog: Value = serde_json::from_slice(&block.data).unwrap();
        assert_eq!(names(&catalog), expected_names());
    }

    #[tokio::test]
    async fn secret_is_returned_in_checksummed_envelope() {
        let (_dir, app) = fixture_app(4096).await;
        let (status, body) = post(
            &app,
            "/secret",
            json!({"keyId": "9ED5E44EFB91D165", "path": "A", "username": "alice"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let armored = body["response"].as_str().unwrap();
        assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----\n\n"));
        assert!(armored.ends_with("-----END PGP MESSAGE-----"));
        assert_eq!(dearmor(armored).unwrap().data, b"alice-ciphertext");
    }

    #[tokio::test]
    async fn secret_request_needs_path_and_username() {
        let (_dir, app) = fixture_app(4096).await;
        for body in [
            json!({"keyId": "9ED5E44EFB91D165", "username": "alice"}),
            json!({"keyId": "9ED5E44EFB91D165", "path": "A"}),
            json!({"keyId": "9ED5E44EFB91D165", "path": 7, "username": "alice"}),
        ] {
            let (status, body) = post(&app, "/secret", body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "Invalid secret requested.");
        }
    }

    #[tokio::test]
    async fn traversal_looks_like_a_missing_secret() {
        let (_dir, app) = fixture_app(4096).await;
        for (path, username) in [("../../etc", "passwd"), (".", "../../../etc/passwd"), ("A", "nobody")] {
            let (status, body) = post(
                &app,
                "/secret",
                json!({"keyId": "9ED5E44EFB91D165", "path": path, "username": username}),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"], "No such secret exists.");
        }
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_auth() {
        let (_dir, app) = fixture_app(64).await;
        let (status, _) = post(&app, "/secrets", json!({"publicKey": CLIENT_KEY})).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn broken_body_is_a_bad_request() {
        let (_dir, app) = fixture_app(4096).await;
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
            Ok(r#"{"keyId": "9ED5"#),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let req = Request::builder()
            .method(Method::POST)
            .uri("/secrets")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from_stream(futures::stream::iter(chunks)))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Unreadable request body.");
    }
}
