use axum::response::{IntoResponse, Response};
use http::StatusCode;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::credentials::CredentialRotator;
use crate::relay::CompletionRelay;
use crate::relay_config::RelayConfig;

/// Initialize dotenv and structured tracing based on RUST_LOG.
/// - Supports explicit env file paths via ENV_FILE, DOTENV_PATH
/// - Falls back to default .env discovery
/// - Never overwrites variables already present in the process environment
/// - Logs the source used
pub fn init_tracing() {
    let mut env_source: String = "none".into();
    for key in ["ENV_FILE", "DOTENV_PATH"] {
        if let Ok(p) = std::env::var(key) {
            let p = p.trim();
            if !p.is_empty()
                && std::path::Path::new(p).is_file()
                && dotenvy::from_filename(p).is_ok()
            {
                env_source = format!("{p} ({key})");
                break;
            }
        }
    }

    if env_source == "none" {
        if let Ok(path) = dotenvy::dotenv() {
            env_source = path.display().to_string();
        }
    }

    // Initialize tracing (respects RUST_LOG potentially provided by the env file)
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=info".into());
    let subscriber = fmt().with_env_filter(EnvFilter::new(filter)).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("Environment loaded from: {}", env_source);
}

/// Listen address: BIND_ADDR if set, else 0.0.0.0 on PORT (default 3000).
pub fn env_bind_addr() -> String {
    bind_addr_from(
        std::env::var("BIND_ADDR").ok(),
        std::env::var("PORT").ok(),
    )
}

fn bind_addr_from(bind_addr: Option<String>, port: Option<String>) -> String {
    if let Some(addr) = bind_addr.map(|a| a.trim().to_string()).filter(|a| !a.is_empty()) {
        return addr;
    }
    let port = port
        .and_then(|p| p.trim().parse::<u16>().ok())
        .unwrap_or(3000);
    format!("0.0.0.0:{port}")
}

/// Directory holding the chat page assets (CHATRELAY_STATIC_DIR, default "public").
pub fn env_static_dir() -> PathBuf {
    std::env::var("CHATRELAY_STATIC_DIR")
        .ok()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| "public".into())
        .into()
}

/// Shared application state used by the HTTP server and handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<CompletionRelay>,
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(relay: CompletionRelay, static_dir: impl Into<PathBuf>) -> Self {
        Self {
            relay: Arc::new(relay),
            static_dir: static_dir.into(),
        }
    }

    /// Build state from the process environment: credentials, upstream config and HTTP client.
    pub fn from_env(config: RelayConfig) -> Self {
        let credentials = Arc::new(CredentialRotator::from_env());
        if credentials.is_empty() {
            tracing::warn!(
                "No OpenAI API keys configured; every chat request will receive the fallback reply"
            );
        }
        let relay = CompletionRelay::new(build_http_client_from_env(), credentials, config);
        Self::new(relay, env_static_dir())
    }
}

/// Build an HTTP client honoring proxy and timeout environment variables.
///
/// Environment:
/// - CHATRELAY_NO_PROXY = 1|true|yes|on  -> disable all proxies
/// - CHATRELAY_PROXY_URL = <url>         -> proxy for all schemes
/// - HTTP_PROXY / http_proxy             -> HTTP proxy
/// - HTTPS_PROXY / https_proxy           -> HTTPS proxy
/// - CHATRELAY_HTTP_TIMEOUT_SECONDS      -> overall request timeout (u64); unset means none
pub fn build_http_client_from_env() -> reqwest::Client {
    let mut builder = reqwest::Client::builder();

    if let Ok(secs) = std::env::var("CHATRELAY_HTTP_TIMEOUT_SECONDS") {
        if let Ok(n) = secs.trim().parse::<u64>() {
            builder = builder.timeout(std::time::Duration::from_secs(n));
        }
    }

    let no_proxy = std::env::var("CHATRELAY_NO_PROXY")
        .map(|v| is_truthy(&v))
        .unwrap_or(false);

    if no_proxy {
        builder = builder.no_proxy();
    } else {
        let proxies = [
            env_proxy(&["CHATRELAY_PROXY_URL"], reqwest::Proxy::all),
            env_proxy(&["HTTP_PROXY", "http_proxy"], reqwest::Proxy::http),
            env_proxy(&["HTTPS_PROXY", "https_proxy"], reqwest::Proxy::https),
        ];
        for proxy in proxies.into_iter().flatten() {
            builder = builder.proxy(proxy);
        }
    }

    builder = builder.user_agent(format!("chatrelay/{}", env!("CARGO_PKG_VERSION")));

    builder.build().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "HTTP client configuration rejected; using defaults");
        reqwest::Client::new()
    })
}

/// Proxy from the first non-empty variable in `keys`; invalid URLs are logged and skipped.
fn env_proxy(
    keys: &[&str],
    build: fn(String) -> reqwest::Result<reqwest::Proxy>,
) -> Option<reqwest::Proxy> {
    let (key, url) = keys.iter().find_map(|k| {
        let v = std::env::var(k).ok()?;
        let v = v.trim().to_string();
        (!v.is_empty()).then_some((*k, v))
    })?;
    match build(url) {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(var = key, error = %e, "ignoring invalid proxy URL");
            None
        }
    }
}

/// 1, true, yes, on (case-insensitive).
fn is_truthy(v: &str) -> bool {
    matches!(
        v.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Build a JSON error response: `{ "error": "<msg>" }`.
pub fn error_response(status: StatusCode, msg: &str) -> Response {
    let body = serde_json::json!({ "error": msg });
    (status, axum::Json(body)).into_response()
}

/// Build a CORS layer from environment variables.
///
/// Environment variables:
/// - CORS_ALLOWED_ORIGINS: "*" or comma-separated origins (e.g., "https://a.com, https://b.com")
/// - CORS_ALLOWED_METHODS: "*" or comma-separated methods (e.g., "GET,POST,OPTIONS")
/// - CORS_ALLOWED_HEADERS: "*" or comma-separated request header names
/// - CORS_ALLOW_CREDENTIALS: enable with 1,true,yes,on
/// - CORS_MAX_AGE: max age in seconds (u64)
///
/// Defaults are permissive (Any).
pub fn cors_layer_from_env() -> tower_http::cors::CorsLayer {
    use std::time::Duration;
    use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};

    let mut layer = CorsLayer::new();

    let origins = env_list("CORS_ALLOWED_ORIGINS", |p| http::HeaderValue::from_str(p).ok());
    let mut explicit = origins.is_some();
    layer = match origins {
        Some(vals) => layer.allow_origin(AllowOrigin::list(vals)),
        None => layer.allow_origin(Any),
    };

    let methods = env_list("CORS_ALLOWED_METHODS", |p| {
        http::Method::from_bytes(p.to_ascii_uppercase().as_bytes()).ok()
    });
    explicit &= methods.is_some();
    layer = match methods {
        Some(vals) => layer.allow_methods(AllowMethods::list(vals)),
        None => layer.allow_methods(Any),
    };

    let headers = env_list("CORS_ALLOWED_HEADERS", |p| {
        http::header::HeaderName::try_from(p).ok()
    });
    explicit &= headers.is_some();
    layer = match headers {
        Some(vals) => layer.allow_headers(AllowHeaders::list(vals)),
        None => layer.allow_headers(Any),
    };

    // Credentials cannot be combined with any wildcard.
    if std::env::var("CORS_ALLOW_CREDENTIALS")
        .map(|v| is_truthy(&v))
        .unwrap_or(false)
    {
        if explicit {
            layer = layer.allow_credentials(true);
        } else {
            tracing::warn!("CORS_ALLOW_CREDENTIALS ignored: requires explicit origins, methods and headers");
        }
    }

    if let Ok(secs) = std::env::var("CORS_MAX_AGE") {
        if let Ok(n) = secs.trim().parse::<u64>() {
            layer = layer.max_age(Duration::from_secs(n));
        }
    }

    layer
}

/// Parse a comma-separated env list. `None` means "any": unset, "*", or nothing parseable.
fn env_list<T>(key: &str, parse: impl Fn(&str) -> Option<T>) -> Option<Vec<T>> {
    let raw = std::env::var(key).ok()?;
    let s = raw.trim();
    if s == "*" {
        return None;
    }
    let vals: Vec<T> = s
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(parse)
        .collect();
    if vals.is_empty() {
        None
    } else {
        Some(vals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_defaults_to_port_3000() {
        assert_eq!(bind_addr_from(None, None), "0.0.0.0:3000");
    }

    #[test]
    fn bind_addr_uses_port() {
        assert_eq!(bind_addr_from(None, Some("8080".into())), "0.0.0.0:8080");
        assert_eq!(bind_addr_from(None, Some("abc".into())), "0.0.0.0:3000");
    }

    #[test]
    fn bind_addr_override_wins() {
        assert_eq!(
            bind_addr_from(Some("127.0.0.1:4000".into()), Some("8080".into())),
            "127.0.0.1:4000"
        );
        assert_eq!(bind_addr_from(Some(" ".into()), None), "0.0.0.0:3000");
    }

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "YES", " on "] {
            assert!(is_truthy(v), "{v}");
        }
        for v in ["0", "false", "", "off"] {
            assert!(!is_truthy(v), "{v}");
        }
    }

    #[test]
    fn env_list_parses_and_wildcards() {
        temp_env::with_vars(
            [
                ("CHATRELAY_TEST_LIST", Some("GET, post ,,")),
                ("CHATRELAY_TEST_STAR", Some("*")),
            ],
            || {
                let methods = env_list("CHATRELAY_TEST_LIST", |p| {
                    http::Method::from_bytes(p.to_ascii_uppercase().as_bytes()).ok()
                });
                assert_eq!(methods, Some(vec![http::Method::GET, http::Method::POST]));
                let star = env_list("CHATRELAY_TEST_STAR", |p| Some(p.to_string()));
                assert_eq!(star, None);
                let unset = env_list("CHATRELAY_TEST_UNSET", |p| Some(p.to_string()));
                assert_eq!(unset, None);
            },
        );
    }

    #[test]
    fn env_proxy_takes_first_non_empty_variable() {
        temp_env::with_vars(
            [
                ("CHATRELAY_TEST_PROXY_A", Some("  ")),
                ("CHATRELAY_TEST_PROXY_B", Some("http://127.0.0.1:3128")),
                ("CHATRELAY_TEST_PROXY_BAD", Some("not a url")),
            ],
            || {
                assert!(env_proxy(
                    &["CHATRELAY_TEST_PROXY_A", "CHATRELAY_TEST_PROXY_B"],
                    reqwest::Proxy::http
                )
                .is_some());
                assert!(env_proxy(&["CHATRELAY_TEST_PROXY_A"], reqwest::Proxy::http).is_none());
                assert!(env_proxy(&["CHATRELAY_TEST_PROXY_UNSET"], reqwest::Proxy::all).is_none());
                assert!(env_proxy(&["CHATRELAY_TEST_PROXY_BAD"], reqwest::Proxy::all).is_none());
            },
        );
    }

    #[test]
    fn error_response_shape() {
        let resp = error_response(StatusCode::BAD_REQUEST, "Message is required");
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
