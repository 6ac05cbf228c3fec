use serde::Serialize;

/// Failure of a single history fetch. No partial pages are ever returned alongside it.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Access token was rejected by Spotify: {message}")]
    Unauthorized { message: String },
    #[error("Spotify returned an error ({status}): {message}")]
    RemoteError { status: u16, message: String },
    #[error("Failed to reach Spotify: {0}")]
    NetworkError(#[source] reqwest::Error),
    #[error("Unexpected response from Spotify: {reason}")]
    MalformedResponse { reason: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Unauthorized { .. } => FetchErrorKind::Unauthorized,
            FetchError::RemoteError { .. } => FetchErrorKind::RemoteError,
            FetchError::NetworkError(_) => FetchErrorKind::NetworkError,
            FetchError::MalformedResponse { .. } => FetchErrorKind::MalformedResponse,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        FetchError::MalformedResponse {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FetchErrorKind {
    Unauthorized,
    RemoteError,
    NetworkError,
    MalformedResponse,
}

/// Error surfaced to the presentation layer, e.g. as a dismissible alert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorNotice {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl ErrorNotice {
    /// Whether the user has to log in again before anything else can succeed.
    pub fn requires_login(&self) -> bool {
        self.kind == FetchErrorKind::Unauthorized
    }
}

impl From<&FetchError> for ErrorNotice {
    fn from(error: &FetchError) -> Self {
        Self {
            kind: error.kind(),
            message: format!("Failed to fetch Spotify history: {error}"),
        }
    }
}
