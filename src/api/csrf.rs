use std::fmt;

pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_COOKIE: &str = "csrftoken";

/// Anti-forgery token sent with every mutating request.
#[derive(Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CsrfToken(***)")
    }
}

impl CsrfToken {
    pub fn new(value: &str) -> Option<Self> {
        let value = value.trim();
        (!value.is_empty()).then(|| Self(value.to_string()))
    }

    /// Read the token from a `Cookie` header value.
    pub fn from_cookie_header(header: &str) -> Option<Self> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == CSRF_COOKIE)
            .and_then(|(_, value)| Self::new(value.trim_matches('"')))
    }

    /// Form value first, cookie as fallback.
    pub fn resolve(form_value: Option<&str>, cookie_header: Option<&str>) -> Option<Self> {
        form_value
            .and_then(Self::new)
            .or_else(|| cookie_header.and_then(Self::from_cookie_header))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
