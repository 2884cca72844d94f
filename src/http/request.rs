//! The request value handed between transport, gate and loader.

use crate::base::neterror::NetError;
use bytes::Bytes;
use http::header::{
    AUTHORIZATION, CONTENT_ENCODING, CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_LOCATION,
    CONTENT_TYPE,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use url::Url;

/// Headers describing a request body. Dropped when a redirect turns the
/// request into a bodiless GET.
static REQUEST_BODY_HEADERS: [HeaderName; 5] = [
    CONTENT_TYPE,
    CONTENT_LENGTH,
    CONTENT_ENCODING,
    CONTENT_LANGUAGE,
    CONTENT_LOCATION,
];

/// An immutable description of the resource to fetch.
///
/// Builder methods consume `self` and return a new value; a redirect or a
/// policy rewrite never mutates a request in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    url: Url,
    method: Method,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl LoadRequest {
    /// Create a GET request for `url`.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Parse `url_str` and create a GET request for it.
    pub fn parse(url_str: &str) -> Result<Self, NetError> {
        let url = Url::parse(url_str).map_err(|_| NetError::InvalidUrl)?;
        Ok(Self::new(url))
    }

    /// Create a POST request carrying `body`.
    pub fn post(url: Url, body: impl Into<Bytes>) -> Self {
        Self::new(url).with_method(Method::POST).with_body(body)
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    /// Add a header. Fails with `InvalidArgument` if the name or value is invalid.
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, NetError> {
        let name = HeaderName::try_from(name).map_err(|_| NetError::InvalidArgument)?;
        let value = HeaderValue::try_from(value).map_err(|_| NetError::InvalidArgument)?;
        self.headers.append(name, value);
        Ok(self)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_post(&self) -> bool {
        self.method == Method::POST
    }

    /// Build the request that follows a redirect with `status` to `target`.
    pub fn redirected(&self, target: Url, status: StatusCode) -> LoadRequest {
        self.follow_redirect(self.clone().with_url(target), status)
    }

    /// Adjust `proposed`, the transport's follow-up request, for a redirect
    /// of `self` with `status`.
    ///
    /// URL and headers come from `proposed`. 303 turns anything but HEAD into
    /// GET; 301 and 302 turn POST into GET. Otherwise method and body carry
    /// over from `self`. Credentials never cross origins.
    pub fn follow_redirect(&self, proposed: LoadRequest, status: StatusCode) -> LoadRequest {
        let rewrite_to_get = match status {
            StatusCode::SEE_OTHER => self.method != Method::HEAD,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => self.method == Method::POST,
            _ => false,
        };

        let mut next = proposed;
        if rewrite_to_get {
            next.method = Method::GET;
            next.body = None;
            for name in REQUEST_BODY_HEADERS.iter() {
                next.headers.remove(name);
            }
        } else {
            next.method = self.method.clone();
            next.body = self.body.clone();
            for name in REQUEST_BODY_HEADERS.iter() {
                if next.headers.contains_key(name) {
                    continue;
                }
                for value in self.headers.get_all(name) {
                    next.headers.append(name.clone(), value.clone());
                }
            }
        }
        if next.url.origin() != self.url.origin() {
            next.headers.remove(AUTHORIZATION);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_parse_invalid_url() {
        assert_eq!(LoadRequest::parse("not-a-url"), Err(NetError::InvalidUrl));
    }

    #[test]
    fn test_see_other_rewrites_post() {
        let req = LoadRequest::post(url("https://a.test/form"), "x=1")
            .with_header("Content-Type", "application/x-www-form-urlencoded")
            .unwrap();
        let next = req.redirected(url("https://a.test/done"), StatusCode::SEE_OTHER);

        assert_eq!(next.method(), Method::GET);
        assert!(next.body().is_none());
        assert!(next.headers().get(CONTENT_TYPE).is_none());
        assert_eq!(next.url().path(), "/done");
    }

    #[test]
    fn test_temporary_redirect_keeps_post() {
        let req = LoadRequest::post(url("https://a.test/form"), "x=1");
        let next = req.redirected(url("https://a.test/again"), StatusCode::TEMPORARY_REDIRECT);

        assert!(next.is_post());
        assert_eq!(next.body().map(|b| b.as_ref()), Some(&b"x=1"[..]));
    }

    #[test]
    fn test_found_keeps_get() {
        let req = LoadRequest::new(url("https://a.test/"));
        let next = req.redirected(url("https://a.test/b"), StatusCode::FOUND);
        assert_eq!(next.method(), Method::GET);
    }

    #[test]
    fn test_cross_origin_strips_authorization() {
        let req = LoadRequest::new(url("https://a.test/"))
            .with_header("Authorization", "Basic Zm9vOmJhcg==")
            .unwrap();

        let same = req.redirected(url("https://a.test/other"), StatusCode::FOUND);
        assert!(same.headers().contains_key(AUTHORIZATION));

        let cross = req.redirected(url("https://b.test/"), StatusCode::FOUND);
        assert!(!cross.headers().contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_follow_redirect_keeps_proposed_headers() {
        let req = LoadRequest::post(url("https://a.test/form"), "x=1")
            .with_header("Content-Type", "text/plain")
            .unwrap();
        let proposed = LoadRequest::new(url("https://a.test/next"))
            .with_header("Referer", "https://a.test/form")
            .unwrap();

        let next = req.follow_redirect(proposed, StatusCode::PERMANENT_REDIRECT);

        assert!(next.is_post());
        assert_eq!(next.url().path(), "/next");
        assert_eq!(next.headers()["referer"], "https://a.test/form");
        assert_eq!(next.headers()[CONTENT_TYPE], "text/plain");
    }

    #[test]
    fn test_follow_redirect_strips_proposed_credentials_cross_origin() {
        let req = LoadRequest::new(url("https://a.test/"));
        let proposed = LoadRequest::new(url("https://b.test/"))
            .with_header("Authorization", "Bearer t")
            .unwrap()
            .with_header("Cookie", "b=1")
            .unwrap();

        let next = req.follow_redirect(proposed, StatusCode::FOUND);

        assert!(!next.headers().contains_key(AUTHORIZATION));
        assert!(next.headers().contains_key("cookie"));
    }

    #[test]
    fn test_invalid_header() {
        let res = LoadRequest::new(url("https://a.test/")).with_header("bad header", "v");
        assert_eq!(res, Err(NetError::InvalidArgument));
    }
}
