use axum::{
    extract::{rejection::JsonRejection, State},
    http::{Request, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::any::Any;
use tower_http::{
    catch_panic::CatchPanicLayer,
    services::ServeDir,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::util::{cors_layer_from_env, error_response, AppState};

const INDEX_HTML: &str = include_str!("../public/index.html");

/// Body of `POST /getChatbotResponse`.
///
/// `userMessage` is kept as raw JSON so that "missing" can follow JavaScript
/// truthiness rather than serde's type rules.
#[derive(Debug, Default, Deserialize)]
pub struct ChatbotRequest {
    #[serde(rename = "userMessage", default)]
    pub user_message: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatbotResponse {
    #[serde(rename = "chatbotResponse")]
    pub chatbot_response: String,
}

/// Build the Axum router: chat page, `/getChatbotResponse`, `/status` and static assets.
pub fn build_router(state: AppState) -> Router {
    let assets = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/getChatbotResponse", post(get_chatbot_response))
        .fallback_service(assets)
        .with_state(state)
        .layer(CatchPanicLayer::custom(internal_error_for_panic))
        .layer(cors_layer_from_env())
        .layer(trace_layer())
}

/// Request/response events at INFO, inside a span carrying a fresh request id.
fn trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    fn(&Request<axum::body::Body>) -> tracing::Span,
> {
    TraceLayer::new_for_http()
        .make_span_with(request_span as fn(&Request<axum::body::Body>) -> tracing::Span)
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

fn request_span(req: &Request<axum::body::Body>) -> tracing::Span {
    tracing::info_span!(
        "http_request",
        request_id = %uuid::Uuid::new_v4(),
        method = %req.method(),
        uri = %req.uri(),
    )
}

/// Serve the chat interface.
async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Service status: version, model and how many keys are in rotation (never the keys).
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let routes = vec!["/", "/status", "/getChatbotResponse"];
    Json(serde_json::json!({
        "name": "chatrelay",
        "version": env!("CARGO_PKG_VERSION"),
        "credentials_configured": state.relay.credentials().len(),
        "model": state.relay.config().model,
        "routes": routes
    }))
}

/// Relay one user message and wrap the reply as `{ "chatbotResponse": ... }`.
///
/// An unreadable body is treated like an empty one.
async fn get_chatbot_response(
    State(state): State<AppState>,
    payload: Result<Json<ChatbotRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable chat request body");
            ChatbotRequest::default()
        }
    };

    let Some(message) = req.user_message.as_ref().and_then(message_text) else {
        return error_response(StatusCode::BAD_REQUEST, "Message is required");
    };

    let reply = state.relay.generate_response(&message, &[]).await;
    Json(ChatbotResponse {
        chatbot_response: reply,
    })
    .into_response()
}

/// Text to relay for a `userMessage` value, or `None` when the value is falsy
/// (`null`, `false`, `0`, `""`). Other non-string values are sent as their JSON text.
fn message_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        other => Some(other.to_string()),
    }
}

fn internal_error_for_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Error processing request");
    error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
}
