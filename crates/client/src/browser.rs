//! Browser/router seam.
//!
//! The session flow needs four things from its host environment: the
//! currently requested URL, a silent history replacement (no reload), a
//! full terminal navigation, and a small stash that survives the login
//! redirect (the sessionStorage analog carrying the PKCE verifier).

use url::Url;

/// Host-environment operations the session flow depends on
pub trait Browser: Send + Sync {
    /// The URL the page is currently on, including query and fragment
    fn current_url(&self) -> Url;

    /// Scheme + host (+port) prefix used to build absolute redirect URIs
    fn origin(&self) -> String;

    /// Silently replace the visible URL without reloading the page
    fn replace_url(&self, url: &str);

    /// Navigate away. Terminal for the current page lifetime.
    fn navigate(&self, url: &str);

    /// Store a value that survives the login redirect
    fn stash(&self, key: &str, value: &str);

    /// Remove and return a previously stashed value
    fn take_stash(&self, key: &str) -> Option<String>;
}

/// Parameters extracted from an authorization callback URL
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// True when the URL carries authorization-callback markers.
///
/// Literal substring match for `code=` or `error=` in the query string or
/// fragment, the standard redirect markers of an authorization-code
/// handshake.
pub fn has_callback_markers(url: &Url) -> bool {
    let in_part = |part: Option<&str>| {
        part.map(|p| p.contains("code=") || p.contains("error="))
            .unwrap_or(false)
    };
    in_part(url.query()) || in_part(url.fragment())
}

/// Extract callback parameters from the query string, falling back to the
/// fragment (providers differ in where they place them).
pub fn parse_callback(url: &Url) -> CallbackParams {
    let mut params = CallbackParams::default();
    absorb_pairs(&mut params, url.query_pairs());
    if let Some(fragment) = url.fragment() {
        absorb_pairs(&mut params, url::form_urlencoded::parse(fragment.as_bytes()));
    }
    params
}

fn absorb_pairs(params: &mut CallbackParams, pairs: url::form_urlencoded::Parse<'_>) {
    for (key, value) in pairs {
        match key.as_ref() {
            "code" if params.code.is_none() => params.code = Some(value.into_owned()),
            "state" if params.state.is_none() => params.state = Some(value.into_owned()),
            "error" if params.error.is_none() => params.error = Some(value.into_owned()),
            _ => {}
        }
    }
}

/// The path of `url` with query and fragment removed, for the post-handshake
/// history replacement.
pub fn stripped(url: &Url) -> String {
    url.path().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_detection_in_query() {
        let url = Url::parse("https://app.example.com/positions?code=abc&state=xyz").unwrap();
        assert!(has_callback_markers(&url));

        let url = Url::parse("https://app.example.com/positions?error=access_denied").unwrap();
        assert!(has_callback_markers(&url));
    }

    #[test]
    fn test_marker_detection_in_fragment() {
        let url = Url::parse("https://app.example.com/#code=abc&state=xyz").unwrap();
        assert!(has_callback_markers(&url));
    }

    #[test]
    fn test_plain_urls_have_no_markers() {
        let url = Url::parse("https://app.example.com/positions").unwrap();
        assert!(!has_callback_markers(&url));

        // A query that merely mentions other parameters
        let url = Url::parse("https://app.example.com/positions?page=2").unwrap();
        assert!(!has_callback_markers(&url));
    }

    #[test]
    fn test_parse_callback_query_and_fragment() {
        let url = Url::parse("https://app.example.com/positions?code=abc&state=xyz").unwrap();
        let params = parse_callback(&url);
        assert_eq!(params.code.as_deref(), Some("abc"));
        assert_eq!(params.state.as_deref(), Some("xyz"));
        assert!(params.error.is_none());

        let url = Url::parse("https://app.example.com/#error=login_required").unwrap();
        let params = parse_callback(&url);
        assert_eq!(params.error.as_deref(), Some("login_required"));
        assert!(params.code.is_none());
    }

    #[test]
    fn test_stripped_drops_query_and_fragment() {
        let url = Url::parse("https://app.example.com/positions?code=abc#state=1").unwrap();
        assert_eq!(stripped(&url), "/positions");
    }
}
