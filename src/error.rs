use reqwest::StatusCode;
use thiserror::Error;

/// Reply shown when the provider answered with a payload the relay could not read.
pub const NOT_UNDERSTOOD_REPLY: &str = "Sorry, I couldn't understand that.";

/// Reply shown for every other failure (no credentials, transport, HTTP status, decode).
pub const FAILED_REPLY: &str = "An error occurred while processing your request.";

/// Errors raised by the credential rotator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("No OpenAI API keys configured")]
    NoCredentialsConfigured,
}

/// Errors that can occur during one relay round trip.
///
/// None of these cross the relay's public boundary; see [`FallbackReply`].
#[derive(Error, Debug)]
pub enum RelayError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// Network error occurred during request
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream answered with a non-success status
    #[error("HTTP error! status: {0}")]
    UpstreamStatus(StatusCode),

    /// Body was not valid JSON
    #[error("JSON decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Valid JSON without a readable first choice
    #[error("No valid response from OpenAI API")]
    MalformedProviderResponse,
}

/// The two user-facing strings every relay failure collapses into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReply {
    NotUnderstood,
    Failed,
}

impl FallbackReply {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReply::NotUnderstood => NOT_UNDERSTOOD_REPLY,
            FallbackReply::Failed => FAILED_REPLY,
        }
    }
}

impl RelayError {
    /// Which fallback string this failure is shown as.
    pub fn fallback(&self) -> FallbackReply {
        match self {
            RelayError::MalformedProviderResponse => FallbackReply::NotUnderstood,
            _ => FallbackReply::Failed,
        }
    }
}

/// Map a relay outcome to the string handed back to the caller.
pub fn render_outcome(outcome: Result<String, RelayError>) -> String {
    match outcome {
        Ok(text) => text,
        Err(err) => err.fallback().as_str().to_string(),
    }
}
