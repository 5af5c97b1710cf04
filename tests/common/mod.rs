#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chatrelay::credentials::CredentialRotator;
use chatrelay::relay::CompletionRelay;
use chatrelay::relay_config::RelayConfig;
use chatrelay::server::build_router;
use chatrelay::util::AppState;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use wiremock::MockServer;

/// Discard port; connections are refused, so any request fails fast.
pub const UNREACHABLE_ENDPOINT: &str = "http://127.0.0.1:9/v1/chat/completions";

/// The application router bound to an ephemeral local port.
pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    join: JoinHandle<()>,
    client: reqwest::Client,
}

impl TestServer {
    fn make_client() -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed building reqwest client")
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
    }

    pub async fn post_json<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.join.abort();
    }
}

/// Chat Completions URL of a wiremock upstream.
pub fn mock_endpoint(upstream: &MockServer) -> String {
    format!("{}/v1/chat/completions", upstream.uri())
}

/// Relay with the given keys posting to `endpoint`, default model and token budget.
pub fn relay_for(endpoint: &str, keys: &[&str]) -> CompletionRelay {
    CompletionRelay::new(
        reqwest::Client::new(),
        Arc::new(CredentialRotator::new(
            keys.iter().map(|k| k.to_string()).collect(),
        )),
        RelayConfig {
            endpoint: endpoint.to_string(),
            ..RelayConfig::default()
        },
    )
}

/// Spawn the full router around `relay`, serving this crate's `public/` directory.
pub async fn spawn_app(relay: CompletionRelay) -> TestServer {
    let state = AppState::new(relay, concat!(env!("CARGO_MANIFEST_DIR"), "/public"));
    let app = build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    let base_url = format!("http://{}", addr);
    let server = axum::serve(listener, app);

    let join = tokio::spawn(async move {
        if let Err(e) = server.await {
            eprintln!("Test server error: {e:?}");
        }
    });

    TestServer {
        base_url,
        addr,
        join,
        client: TestServer::make_client(),
    }
}

/// A Chat Completions success body with a single choice.
pub fn completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "model": "gpt-3.5-turbo-1106",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 5, "completion_tokens": 7, "total_tokens": 12}
    })
}
