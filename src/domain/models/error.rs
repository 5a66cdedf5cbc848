use thiserror::Error;

/// Failure taxonomy for the pipeline. Every gateway-backed step funnels its
/// failures through here so callers can tell a retryable condition from an
/// operator problem.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0} is required")]
    MissingInput(&'static str),

    #[error("API key not configured")]
    MissingCredential,

    #[error("gateway request failed with status {status}")]
    Upstream { status: u16, body: String },

    #[error("gateway returned invalid JSON")]
    MalformedReply { details: String },

    #[error("gateway reply had no content")]
    EmptyReply,

    /// The model answered with text instead of image data. Recoverable, a
    /// different image model may succeed where this one failed.
    #[error("no image in response")]
    NoImageReturned { text_response: Option<String> },

    #[error("structural inventory could not be parsed from the reply")]
    MalformedInventory { details: String },

    #[error("gateway is not reachable: {0}")]
    Transport(String),

    /// A driver sent an event the current pipeline state does not accept.
    #[error("event {event} is not valid in the current state")]
    InvalidTransition { event: &'static str },
}

impl PipelineError {
    pub fn transport(err: reqwest::Error) -> PipelineError {
        return PipelineError::Transport(err.to_string());
    }

    /// True when retrying with different inputs (another model, another
    /// prompt) is a sensible reaction, as opposed to fixing configuration.
    pub fn is_recoverable(&self) -> bool {
        return matches!(
            self,
            PipelineError::NoImageReturned { .. }
                | PipelineError::EmptyReply
                | PipelineError::Upstream { .. }
                | PipelineError::Transport(_)
        );
    }
}
