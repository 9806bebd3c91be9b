use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Google API key not configured")]
    MissingApiKey,

    #[error("Unknown AI backend: {0}")]
    UnknownBackend(String),

    #[error("Google AI API error: {status} {body}")]
    Api { status: u16, body: String },

    #[error("No response from Google AI API")]
    EmptyResponse,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Failed to parse model output: {source}\n  output: {output}")]
    Parse {
        output: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Process error: {0}")]
    Process(String),

    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },
}
