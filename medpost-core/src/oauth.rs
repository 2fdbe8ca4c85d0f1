//! OAuth 2.0 authorization-code flow primitives.
//!
//! This module provides:
//! - [`ClientCredentials`] - Application credentials registered with Medium
//! - [`AuthorizationRequest`] - The parameters of the user-facing authorization URL
//! - [`build_authorization_url`] - Deterministic URL construction
//!
//! Medium expects scopes joined by commas rather than the space-separated
//! form of RFC 6749, so the URL is assembled here instead of by a generic
//! OAuth client.

use url::Url;

use crate::store::Secret;

/// Production authorization endpoint.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://medium.com/m/oauth/authorize";

/// Scopes requested when the configuration does not name any.
pub const DEFAULT_SCOPES: &[&str] = &["basicProfile", "publishPost", "listPublications"];

/// Application credentials, loaded once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    /// Client ID issued when registering the application.
    pub client_id: String,

    /// Client secret issued when registering the application.
    pub client_secret: Secret,

    /// Redirect URL registered with the application.
    pub redirect_url: String,

    /// Opaque value echoed back on the redirect.
    pub state: String,
}

/// Parameters of an authorization URL. Used once, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub client_id: String,
    pub scopes: Vec<String>,
    pub state: String,
    pub redirect_url: String,
}

impl AuthorizationRequest {
    /// The only response type Medium supports.
    pub const RESPONSE_TYPE: &'static str = "code";

    /// Build a request for `credentials` asking for `scopes`.
    pub fn new(credentials: &ClientCredentials, scopes: &[String]) -> Self {
        Self {
            client_id: credentials.client_id.clone(),
            scopes: scopes.to_vec(),
            state: credentials.state.clone(),
            redirect_url: credentials.redirect_url.clone(),
        }
    }
}

/// Build the URL a user visits to authorize the application.
///
/// Scopes are joined by commas in the order given, without reordering or
/// deduplication.
pub fn build_authorization_url(authorize_url: &Url, request: &AuthorizationRequest) -> Url {
    let mut url = authorize_url.clone();
    url.query_pairs_mut()
        .clear()
        .append_pair("client_id", &request.client_id)
        .append_pair("scope", &request.scopes.join(","))
        .append_pair("state", &request.state)
        .append_pair("response_type", AuthorizationRequest::RESPONSE_TYPE)
        .append_pair("redirect_uri", &request.redirect_url);
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    fn request(scopes: &[&str]) -> AuthorizationRequest {
        AuthorizationRequest {
            client_id: "abc123".to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            state: "canBeAnything".to_string(),
            redirect_url: "http://192.0.2.1/callback?x=1&y=2".to_string(),
        }
    }

    #[test]
    fn test_authorization_url_parameters() {
        let base = Url::parse(DEFAULT_AUTHORIZE_URL).unwrap();
        let url = build_authorization_url(&base, &request(DEFAULT_SCOPES));

        assert_eq!(url.host_str(), Some("medium.com"));
        assert_eq!(url.path(), "/m/oauth/authorize");
        assert_eq!(
            query(&url),
            vec![
                ("client_id".to_string(), "abc123".to_string()),
                (
                    "scope".to_string(),
                    "basicProfile,publishPost,listPublications".to_string()
                ),
                ("state".to_string(), "canBeAnything".to_string()),
                ("response_type".to_string(), "code".to_string()),
                (
                    "redirect_uri".to_string(),
                    "http://192.0.2.1/callback?x=1&y=2".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_scopes_keep_caller_order_and_duplicates() {
        let base = Url::parse(DEFAULT_AUTHORIZE_URL).unwrap();
        let url = build_authorization_url(&base, &request(&["publishPost", "basicProfile", "publishPost"]));

        let scope = url
            .query_pairs()
            .find(|(k, _)| k == "scope")
            .map(|(_, v)| v.into_owned());
        assert_eq!(scope.as_deref(), Some("publishPost,basicProfile,publishPost"));
    }

    #[test]
    fn test_authorization_url_is_deterministic() {
        let base = Url::parse(DEFAULT_AUTHORIZE_URL).unwrap();
        let req = request(DEFAULT_SCOPES);
        assert_eq!(
            build_authorization_url(&base, &req),
            build_authorization_url(&base, &req)
        );
    }

    #[test]
    fn test_request_from_credentials() {
        let credentials = ClientCredentials {
            client_id: "id".to_string(),
            client_secret: Secret::new("secret"),
            redirect_url: "http://localhost/cb".to_string(),
            state: "s".to_string(),
        };
        let req = AuthorizationRequest::new(&credentials, &["basicProfile".to_string()]);

        assert_eq!(req.client_id, "id");
        assert_eq!(req.redirect_url, "http://localhost/cb");
        assert_eq!(req.scopes, vec!["basicProfile"]);
    }
}
