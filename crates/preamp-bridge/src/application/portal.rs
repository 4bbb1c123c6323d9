//! Captive-portal actions and static UI assets.
//!
//! While in setup mode `GET /` serves [`setup_page`] instead of the controller
//! UI.  The three forms on that page post to `/save`, `/retry` and `/clear`;
//! each successful action answers with a short HTML notice and asks for a
//! restart.

use std::collections::HashMap;

use async_trait::async_trait;
use preamp_core::{HttpResponse, StatusCode};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::provisioning::CredentialStore;
use crate::application::router::Reply;
use crate::domain::WifiCredentials;

pub const SAVED_PAGE: &str = "<html><body><h3>Saved. Rebooting...</h3></body></html>";
pub const RETRY_PAGE: &str = "<html><body><h3>Retrying. Rebooting...</h3></body></html>";
pub const CLEARED_PAGE: &str = "<html><body><h3>Cleared. Rebooting...</h3></body></html>";

const SETUP_PAGE_TEMPLATE: &str = r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Preamp Bridge Setup</title>
    <style>
      body { font-family: system-ui, sans-serif; background: #f4f1ec; color: #26211c; margin: 0; padding: 24px; }
      main { max-width: 440px; margin: 0 auto; background: #fffdf9; border: 1px solid #ddd3c6; border-radius: 14px; padding: 20px; }
      label { display: block; margin: 14px 0 6px; font-weight: 600; }
      input { box-sizing: border-box; width: 100%; padding: 10px; border: 1px solid #cfc2b2; border-radius: 8px; font-size: 1rem; }
      button { margin-top: 14px; padding: 10px 14px; border: 0; border-radius: 8px; background: #21665d; color: #fff; font-weight: 600; }
      button.secondary { background: #7a6e62; }
      p { color: #6a5f55; font-size: 0.9rem; }
    </style>
  </head>
  <body>
    <main>
      <h1>Wi-Fi Setup</h1>
      <form method="post" action="/save">
        <label for="ssid">Network name</label>
        <input id="ssid" name="ssid" value="{ssid}" required />
        <label for="password">Password</label>
        <input id="password" name="password" type="password" />
        <button type="submit">Save &amp; Restart</button>
      </form>
      <form method="post" action="/retry">
        <button type="submit" class="secondary">Retry Stored Network</button>
      </form>
      <form method="post" action="/clear" onsubmit="return confirm('Forget the stored network?');">
        <button type="submit" class="secondary">Forget Stored Network</button>
      </form>
      <p>The bridge restarts after saving and joins the selected network.</p>
    </main>
  </body>
</html>
"#;

// ── Assets ────────────────────────────────────────────────────────────────────

/// Error type for static asset loading.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset '{name}' unavailable: {source}")]
    Unavailable {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read-only storage of the controller UI files.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Returns the bytes of the asset called `name` (e.g. `"app.js"`).
    async fn load(&self, name: &str) -> Result<Vec<u8>, AssetError>;
}

/// Serves one asset, or `404 Not Found` if it cannot be loaded.
pub async fn serve_asset(assets: &dyn AssetStore, name: &str, content_type: &str) -> HttpResponse {
    match assets.load(name).await {
        Ok(body) => HttpResponse::new(StatusCode::Ok, content_type, body),
        Err(e) => {
            warn!("{e}");
            not_found()
        }
    }
}

pub fn not_found() -> HttpResponse {
    HttpResponse::text(StatusCode::NotFound, "Not Found")
}

// ── Setup page ────────────────────────────────────────────────────────────────

/// Renders the provisioning page with `ssid` pre-filled.
pub fn setup_page(ssid: &str) -> String {
    SETUP_PAGE_TEMPLATE.replace("{ssid}", &html_escape(ssid))
}

fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

// ── Actions ───────────────────────────────────────────────────────────────────

/// `POST /save`: stores `{ssid, password}` from the form and restarts.
///
/// An empty or missing `ssid` is rejected with `400` and changes nothing.
pub fn save(store: &dyn CredentialStore, form: &HashMap<String, String>) -> Reply {
    let ssid = form.get("ssid").map(String::as_str).unwrap_or_default();
    if ssid.is_empty() {
        return Reply::Response(HttpResponse::text(StatusCode::BadRequest, "Missing SSID"));
    }
    let password = form.get("password").map(String::as_str).unwrap_or_default();

    match store.save(&WifiCredentials::new(ssid, password)) {
        Ok(()) => {
            info!("saved Wi-Fi credentials for '{ssid}'");
            Reply::ResponseThenRestart(HttpResponse::html(StatusCode::Ok, SAVED_PAGE))
        }
        Err(e) => {
            error!("failed to save Wi-Fi credentials: {e}");
            Reply::Response(storage_failure())
        }
    }
}

/// `POST /retry`: restarts and tries the stored network again.
pub fn retry() -> Reply {
    info!("retry requested from setup page");
    Reply::ResponseThenRestart(HttpResponse::html(StatusCode::Ok, RETRY_PAGE))
}

/// `POST /clear`: forgets the stored network and restarts.
pub fn clear(store: &dyn CredentialStore) -> Reply {
    match store.clear() {
        Ok(()) => {
            info!("cleared stored Wi-Fi credentials");
            Reply::ResponseThenRestart(HttpResponse::html(StatusCode::Ok, CLEARED_PAGE))
        }
        Err(e) => {
            error!("failed to clear Wi-Fi credentials: {e}");
            Reply::Response(storage_failure())
        }
    }
}

fn storage_failure() -> HttpResponse {
    HttpResponse::text(StatusCode::InternalServerError, "Storage error")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
