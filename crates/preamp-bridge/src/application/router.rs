//! Request routing for the single HTTP listener.
//!
//! Routing is split in two:
//!
//! - [`route`] is a pure function from a parsed request to a [`Route`].  It
//!   looks only at the method, path and upgrade headers.
//! - [`dispatch`] turns a [`Route`] into a [`Reply`] using the boot context
//!   (provisioning mode, credential store, assets).
//!
//! The WebSocket upgrade check runs before any path matching, so any path
//! carrying `Upgrade: websocket` is treated as an upgrade.

use preamp_core::{HttpRequest, HttpResponse, StatusCode};

use crate::application::context::BridgeContext;
use crate::application::portal;

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Upgrade,
    Save,
    Retry,
    Clear,
    MethodNotAllowed,
    /// `GET /` or `GET /index.html`.
    Index,
    Asset {
        name: &'static str,
        content_type: &'static str,
    },
    NotFound,
}

/// What the connection task must do with the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Write the response and close.
    Response(HttpResponse),
    /// Write the response, close, then restart the bridge after the grace
    /// period.
    ResponseThenRestart(HttpResponse),
    /// Complete the WebSocket handshake and hand the socket to a session.
    Upgrade { key: String },
    /// Close without writing anything.
    Close,
}

impl Reply {
    pub fn restarts(&self) -> bool {
        matches!(self, Reply::ResponseThenRestart(_))
    }
}

/// Classifies a request.
pub fn route(req: &HttpRequest) -> Route {
    if req.is_websocket_upgrade() {
        return Route::Upgrade;
    }

    let path = req.path.split('?').next().unwrap_or_default();

    if req.method == "POST" {
        match path {
            "/save" => return Route::Save,
            "/retry" => return Route::Retry,
            "/clear" => return Route::Clear,
            _ => {}
        }
    }

    if req.method != "GET" {
        return Route::MethodNotAllowed;
    }

    match path {
        "/" | "/index.html" => Route::Index,
        "/app.js" => Route::Asset {
            name: "app.js",
            content_type: "application/javascript",
        },
        "/style.css" => Route::Asset {
            name: "style.css",
            content_type: "text/css",
        },
        _ => Route::NotFound,
    }
}

/// Produces the reply for `req` in the current boot.
pub async fn dispatch(ctx: &BridgeContext, req: &HttpRequest) -> Reply {
    match route(req) {
        Route::Upgrade => {
            if ctx.mode().is_setup() {
                return Reply::Response(HttpResponse::text(StatusCode::Forbidden, "Setup mode"));
            }
            match req.websocket_key() {
                Some(key) => Reply::Upgrade {
                    key: key.to_string(),
                },
                None => Reply::Close,
            }
        }
        Route::Save => portal::save(ctx.credentials.as_ref(), &req.form()),
        Route::Retry => portal::retry(),
        Route::Clear => portal::clear(ctx.credentials.as_ref()),
        Route::MethodNotAllowed => Reply::Response(HttpResponse::text(
            StatusCode::MethodNotAllowed,
            "Method Not Allowed",
        )),
        Route::Index if ctx.mode().is_setup() => Reply::Response(HttpResponse::html(
            StatusCode::Ok,
            &portal::setup_page(&ctx.boot.portal_ssid),
        )),
        Route::Index => Reply::Response(
            portal::serve_asset(ctx.assets.as_ref(), "index.html", "text/html").await,
        ),
        Route::Asset { name, content_type } => {
            Reply::Response(portal::serve_asset(ctx.assets.as_ref(), name, content_type).await)
        }
        Route::NotFound => Reply::Response(portal::not_found()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    use async_trait::async_trait;
    use tokio::sync::{mpsc, Notify};

    use super::*;
    use crate::application::broadcast::BroadcastHub;
    use crate::application::portal::{AssetError, AssetStore};
    use crate::application::provisioning::{BootReport, MockCredentialStore};
    use crate::application::serial_bridge::SerialBridge;
    use crate::domain::{BridgeConfig, LinkKind, ProvisioningMode};

    // ── Test doubles ──────────────────────────────────────────────────────────

    #[derive(Default)]
    struct MemoryAssets {
        files: HashMap<String, Vec<u8>>,
    }

    impl MemoryAssets {
        fn with(name: &str, body: &str) -> Self {
            let mut files = HashMap::new();
            files.insert(name.to_string(), body.as_bytes().to_vec());
            Self { files }
        }
    }

    #[async_trait]
    impl AssetStore for MemoryAssets {
        async fn load(&self, name: &str) -> Result<Vec<u8>, AssetError> {
            self.files
                .get(name)
                .cloned()
                .ok_or_else(|| AssetError::Unavailable {
                    name: name.to_string(),
                    source: std::io::ErrorKind::NotFound.into(),
                })
        }
    }

    fn request(method: &str, path: &str) -> HttpRequest {
        HttpRequest::from_request_line(&format!("{method} {path} HTTP/1.1"))
    }

    fn upgrade_request(key: Option<&str>) -> HttpRequest {
        let mut req = request("GET", "/ws");
        req.headers.insert("Upgrade", "websocket");
        if let Some(key) = key {
            req.headers.insert("Sec-WebSocket-Key", key);
        }
        req
    }

    fn context(mode: ProvisioningMode, store: MockCredentialStore, assets: MemoryAssets) -> BridgeContext {
        let (tx, _rx) = mpsc::channel(4);
        let boot = BootReport {
            mode,
            link: LinkKind::Station,
            address: Ipv4Addr::LOCALHOST,
            portal_ssid: "HomeNet".to_string(),
            transitions: vec![ProvisioningMode::AwaitingCredentials, mode],
        };
        BridgeContext::new(
            BridgeConfig::default(),
            boot,
            SerialBridge::new(Arc::new(BroadcastHub::new())),
            tx,
            Arc::new(store),
            Arc::new(assets),
            Arc::new(Notify::new()),
        )
    }

    // ── route ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_route_static_paths() {
        assert_eq!(route(&request("GET", "/")), Route::Index);
        assert_eq!(route(&request("GET", "/index.html")), Route::Index);
        assert_eq!(
            route(&request("GET", "/app.js")),
            Route::Asset {
                name: "app.js",
                content_type: "application/javascript"
            }
        );
        assert_eq!(
            route(&request("GET", "/style.css")),
            Route::Asset {
                name: "style.css",
                content_type: "text/css"
            }
        );
        assert_eq!(route(&request("GET", "/missing")), Route::NotFound);
    }

    #[test]
    fn test_route_ignores_query_string() {
        assert_eq!(route(&request("GET", "/?lang=en")), Route::Index);
    }

    #[test]
    fn test_route_portal_actions_require_post() {
        assert_eq!(route(&request("POST", "/save")), Route::Save);
        assert_eq!(route(&request("POST", "/retry")), Route::Retry);
        assert_eq!(route(&request("POST", "/clear")), Route::Clear);
        assert_eq!(route(&request("GET", "/save")), Route::NotFound);
    }

    #[test]
    fn test_route_other_methods_are_405() {
        assert_eq!(route(&request("POST", "/")), Route::MethodNotAllowed);
        assert_eq!(route(&request("PUT", "/save")), Route::MethodNotAllowed);
        assert_eq!(route(&request("", "")), Route::MethodNotAllowed);
    }

    #[test]
    fn test_route_upgrade_wins_over_path() {
        let mut req = request("GET", "/anything");
        req.headers.insert("Upgrade", "WebSocket");
        assert_eq!(route(&req), Route::Upgrade);
    }

    // ── dispatch ──────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_upgrade_in_setup_mode_is_403() {
        // Arrange
        let ctx = context(
            ProvisioningMode::SetupFallback,
            MockCredentialStore::new(),
            MemoryAssets::default(),
        );

        // Act
        let reply = dispatch(&ctx, &upgrade_request(Some("dGhlIHNhbXBsZSBub25jZQ=="))).await;

        // Assert
        assert_eq!(
            reply,
            Reply::Response(HttpResponse::text(StatusCode::Forbidden, "Setup mode"))
        );
    }

    #[tokio::test]
    async fn test_upgrade_when_connected_carries_key() {
        let ctx = context(
            ProvisioningMode::Connected,
            MockCredentialStore::new(),
            MemoryAssets::default(),
        );

        let reply = dispatch(&ctx, &upgrade_request(Some("abc=="))).await;

        assert_eq!(
            reply,
            Reply::Upgrade {
                key: "abc==".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_upgrade_without_key_closes_silently() {
        let ctx = context(
            ProvisioningMode::Connected,
            MockCredentialStore::new(),
            MemoryAssets::default(),
        );

        assert_eq!(dispatch(&ctx, &upgrade_request(None)).await, Reply::Close);
    }

    #[tokio::test]
    async fn test_index_in_setup_mode_is_setup_page() {
        let ctx = context(
            ProvisioningMode::SetupFallback,
            MockCredentialStore::new(),
            MemoryAssets::with("index.html", "controller"),
        );

        let Reply::Response(resp) = dispatch(&ctx, &request("GET", "/")).await else {
            panic!("expected a plain response");
        };

        assert_eq!(resp.status, StatusCode::Ok);
        assert_eq!(resp.content_type, "text/html");
        let body = String::from_utf8(resp.body).unwrap();
        assert!(body.contains("Preamp Bridge Setup"));
        assert!(body.contains(r#"value="HomeNet""#));
    }

    #[tokio::test]
    async fn test_index_when_connected_serves_controller_ui() {
        let ctx = context(
            ProvisioningMode::Connected,
            MockCredentialStore::new(),
            MemoryAssets::with("index.html", "controller"),
        );

        let reply = dispatch(&ctx, &request("GET", "/index.html")).await;

        assert_eq!(
            reply,
            Reply::Response(HttpResponse::new(StatusCode::Ok, "text/html", "controller"))
        );
    }

    #[tokio::test]
    async fn test_missing_asset_is_404() {
        let ctx = context(
            ProvisioningMode::Connected,
            MockCredentialStore::new(),
            MemoryAssets::default(),
        );

        let reply = dispatch(&ctx, &request("GET", "/app.js")).await;

        assert_eq!(reply, Reply::Response(portal::not_found()));
    }

    #[tokio::test]
    async fn test_save_route_reads_form_body() {
        // Arrange
        let mut store = MockCredentialStore::new();
        store
            .expect_save()
            .withf(|c| c.ssid == "My Net" && c.password == "p&w")
            .times(1)
            .returning(|_| Ok(()));
        let ctx = context(ProvisioningMode::SetupFallback, store, MemoryAssets::default());
        let mut req = request("POST", "/save");
        req.body = b"ssid=My+Net&password=p%26w".to_vec();

        // Act
        let reply = dispatch(&ctx, &req).await;

        // Assert
        assert!(reply.restarts());
    }

    #[tokio::test]
    async fn test_unknown_method_is_405() {
        let ctx = context(
            ProvisioningMode::Connected,
            MockCredentialStore::new(),
            MemoryAssets::default(),
        );

        let reply = dispatch(&ctx, &request("DELETE", "/")).await;

        assert_eq!(
            reply,
            Reply::Response(HttpResponse::text(
                StatusCode::MethodNotAllowed,
                "Method Not Allowed"
            ))
        );
    }
}
