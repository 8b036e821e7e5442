//! Outgoing request model.
//!
//! Mirrors the parts of a browser `Request` that the fallback chain and the
//! offline cache care about: the cross-origin mode, the credentials policy and
//! the HTTP cache directive. Everything else about a fetch is left to the
//! concrete [`Fetcher`](crate::Fetcher).

use derive_more::Display;
use reqwest::Url;

/// HTTP method. Only `GET` is ever cached.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    #[default]
    #[display("GET")]
    Get,
    #[display("HEAD")]
    Head,
}
impl Method {
    /// Parse the [`Display`] form back into a method.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "GET" => Some(Self::Get),
            "HEAD" => Some(Self::Head),
            _ => None,
        }
    }
}

/// Cross-origin mode of a request.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RequestMode {
    /// Cross-origin reads are allowed when the server opts in.
    #[default]
    #[display("cors")]
    Cors,
    /// Cross-origin responses come back opaque: no status, no body.
    #[display("no-cors")]
    NoCors,
    /// Cross-origin requests are refused before hitting the network.
    #[display("same-origin")]
    SameOrigin,
}

/// Whether cookies and authorization travel with the request.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Credentials {
    #[display("omit")]
    Omit,
    #[default]
    #[display("same-origin")]
    SameOrigin,
    #[display("include")]
    Include,
}

/// HTTP cache directive of a request.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CacheDirective {
    #[default]
    #[display("default")]
    Default,
    #[display("no-store")]
    NoStore,
    #[display("reload")]
    Reload,
    #[display("no-cache")]
    NoCache,
    /// Use any stored response regardless of its age.
    #[display("force-cache")]
    ForceCache,
    #[display("only-if-cached")]
    OnlyIfCached,
}
impl CacheDirective {
    /// The `Cache-Control` request header value that best expresses this
    /// directive to an HTTP intermediary, if any.
    pub fn cache_control(&self) -> Option<&'static str> {
        match self {
            Self::Default => None,
            Self::NoStore | Self::Reload | Self::NoCache => Some("no-cache"),
            Self::ForceCache | Self::OnlyIfCached => Some("max-stale"),
        }
    }
}

/// A fetch request.
///
/// Built with [`Request::get`] and refined through the `with_*` builders:
///
/// ```
/// use lectern_fetch::{CacheDirective, Credentials, Request, RequestMode, Url};
///
/// let url = Url::parse("https://docs.example/pdfs/04A/Sujet04A.pdf").unwrap();
/// let request = Request::get(url)
///     .with_mode(RequestMode::NoCors)
///     .with_credentials(Credentials::Omit)
///     .with_cache(CacheDirective::ForceCache)
///     .with_header("Accept", "application/pdf");
/// assert!(request.is_pdf());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub mode: RequestMode,
    pub credentials: Credentials,
    pub cache: CacheDirective,
    pub headers: Vec<(String, String)>,
}
impl Request {
    /// A `GET` with the browser's default fetch semantics.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::Get,
            mode: RequestMode::default(),
            credentials: Credentials::default(),
            cache: CacheDirective::default(),
            headers: Vec::new(),
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_cache(mut self, cache: CacheDirective) -> Self {
        self.cache = cache;
        self
    }

    /// Appends a header, replacing any previous value for the same
    /// (case-insensitive) name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// Whether this request targets a PDF document.
    ///
    /// Matches `.pdf` anywhere in the URL, the same loose test the site has
    /// always used; query-string variants like `view?file=a.pdf` count too.
    pub fn is_pdf(&self) -> bool {
        self.url.as_str().to_ascii_lowercase().contains(".pdf")
    }

    /// Whether the request URL shares its origin with `base`.
    pub fn is_same_origin(&self, base: &Url) -> bool {
        self.url.origin() == base.origin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_defaults_match_browser_fetch() {
        let request = Request::get(url("https://docs.example/index.html"));
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.mode, RequestMode::Cors);
        assert_eq!(request.credentials, Credentials::SameOrigin);
        assert_eq!(request.cache, CacheDirective::Default);
        assert!(request.headers.is_empty());
    }

    #[rstest]
    #[case("https://docs.example/pdfs/04A/Sujet04A.pdf", true)]
    #[case("https://docs.example/pdfs/04A/SUJET.PDF", true)]
    #[case("https://docs.example/viewer?file=a.pdf", true)]
    #[case("https://docs.example/projet_04A.html", false)]
    #[case("https://docs.example/style.css", false)]
    fn test_is_pdf(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(Request::get(url(input)).is_pdf(), expected);
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let request = Request::get(url("https://docs.example/"))
            .with_header("accept", "text/html")
            .with_header("Accept", "application/pdf");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("ACCEPT"), Some("application/pdf"));
    }

    #[test]
    fn test_same_origin() {
        let base = url("https://docs.example/projet_04A.html");
        assert!(Request::get(url("https://docs.example/pdfs/a.pdf")).is_same_origin(&base));
        assert!(!Request::get(url("https://cdn.example/pdfs/a.pdf")).is_same_origin(&base));
        assert!(!Request::get(url("http://docs.example/pdfs/a.pdf")).is_same_origin(&base));
    }

    #[rstest]
    #[case(CacheDirective::Default, None)]
    #[case(CacheDirective::ForceCache, Some("max-stale"))]
    #[case(CacheDirective::Reload, Some("no-cache"))]
    fn test_cache_control(#[case] directive: CacheDirective, #[case] expected: Option<&str>) {
        assert_eq!(directive.cache_control(), expected);
    }
}
