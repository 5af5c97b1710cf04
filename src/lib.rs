#![forbid(unsafe_code)]
#![doc = r#"
Chatrelay

Minimal web chat front-end that relays a user's message to an OpenAI Chat Completions
endpoint and returns the reply as plain text.

Crate highlights
- Credential rotation: `CredentialRotator` hands out API keys round-robin.
- Relay: `CompletionRelay::generate_response` performs one upstream call and always returns
  a display string; failures collapse into two fixed fallback replies.
- HTTP server (in `server`): `GET /`, `POST /getChatbotResponse`, `GET /status`, static assets.

Modules
- `credentials`: key discovery from the environment and rotation.
- `relay`: the upstream request/response cycle.
- `relay_config`: upstream endpoint, model and token budget.
- `error`: typed errors and the failure-to-reply mapping.
- `models`: Chat Completions request/response subset.
- `server`: Axum router/handlers.
- `util`: Shared helpers (tracing, env, HTTP client, CORS, app state).
"#]

pub mod credentials;
pub mod error;
pub mod models;
pub mod relay;
pub mod relay_config;
pub mod server;
pub mod util;

pub use crate::credentials::CredentialRotator;
pub use crate::error::{render_outcome, CredentialError, FallbackReply, RelayError};
pub use crate::relay::CompletionRelay;
pub use crate::relay_config::RelayConfig;

// Re-export the chat model namespace for convenience (`use chatrelay::chat`).
pub use crate::models::chat;
