use std::fmt;

use rand::Rng;
use url::Url;

pub const SPOTIFY_AUTH_URL: &str = "https://accounts.spotify.com/authorize";

pub const DEFAULT_SCOPES: [&str; 1] = ["user-read-recently-played"];

/// Bearer credential for the Spotify Web API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Result<Self, AuthError> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        Ok(Self(token.to_string()))
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("No access token was provided")]
    MissingToken,
    #[error("Spotify denied the authorization request: {0}")]
    Denied(String),
    #[error("State parameter did not match the one sent with the authorization request")]
    StateMismatch,
    #[error("Invalid redirect URL: {0}")]
    InvalidRedirect(#[from] url::ParseError),
}

/// Token captured from an implicit-grant redirect.
#[derive(Debug, Clone)]
pub struct ImplicitGrant {
    pub access_token: AccessToken,
    pub token_type: Option<String>,
    pub expires_in: Option<u64>,
}

/// Generate a random state parameter for CSRF protection
pub fn generate_state() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::rng();
    (0..16)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect()
}

/// Build the URL the user has to open to grant access.
///
/// Uses the implicit grant (`response_type=token`), so the token comes back in the
/// fragment of the redirect URL and no client secret is involved.
pub fn authorize_url(
    client_id: &str,
    redirect_uri: &str,
    scopes: &[String],
    state: &str,
    show_dialog: bool,
) -> String {
    format!(
        "{}?client_id={}&response_type=token&redirect_uri={}&scope={}&state={}&show_dialog={}",
        SPOTIFY_AUTH_URL,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&scopes.join(" ")),
        urlencoding::encode(state),
        show_dialog
    )
}

/// Extract the token from the URL Spotify redirected the browser to.
///
/// Parameters are read from the fragment, falling back to the query string.
pub fn parse_redirect(
    redirect: &str,
    expected_state: Option<&str>,
) -> Result<ImplicitGrant, AuthError> {
    let url = Url::parse(redirect.trim())?;
    let params = match url.fragment() {
        Some(fragment) if !fragment.is_empty() => url::form_urlencoded::parse(fragment.as_bytes())
            .into_owned()
            .collect::<Vec<_>>(),
        _ => url.query_pairs().into_owned().collect::<Vec<_>>(),
    };
    let param = |name: &str| {
        params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };

    if let Some(error) = param("error") {
        return Err(AuthError::Denied(error));
    }

    if let Some(expected) = expected_state {
        if param("state").as_deref() != Some(expected) {
            return Err(AuthError::StateMismatch);
        }
    }

    let access_token = AccessToken::new(param("access_token").unwrap_or_default())?;

    Ok(ImplicitGrant {
        access_token,
        token_type: param("token_type"),
        expires_in: param("expires_in").and_then(|value| value.parse().ok()),
    })
}
