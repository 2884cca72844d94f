//! Response metadata as seen by the loader.

use crate::base::neterror::NetError;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use url::Url;

/// MIME type of a multipart response whose parts replace one another.
pub const MULTIPART_MIXED_REPLACE: &str = "multipart/x-mixed-replace";

/// Metadata about an arrived response (or one part of a multipart response).
///
/// Carries no body; bytes travel separately through the data callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadResponse {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    mime_type: String,
    params: Vec<(String, String)>,
}

impl LoadResponse {
    /// Create a response with no headers.
    pub fn new(url: Url, status: StatusCode) -> Self {
        Self::from_parts(url, status, HeaderMap::new())
    }

    /// Create a response, deriving the content type from `headers`.
    pub fn from_parts(url: Url, status: StatusCode, headers: HeaderMap) -> Self {
        let (mime_type, params) = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(parse_content_type)
            .unwrap_or_default();
        Self {
            url,
            status,
            headers,
            mime_type,
            params,
        }
    }

    /// Add a header, re-deriving the content type when it changes.
    pub fn with_header(self, name: &str, value: &str) -> Result<Self, NetError> {
        let name = HeaderName::try_from(name).map_err(|_| NetError::InvalidResponse)?;
        let value = HeaderValue::try_from(value).map_err(|_| NetError::InvalidResponse)?;
        let mut headers = self.headers;
        headers.append(name, value);
        Ok(Self::from_parts(self.url, self.status, headers))
    }

    /// Shorthand for a 200 response with the given `Content-Type`.
    pub fn ok_with_type(url: Url, content_type: &str) -> Result<Self, NetError> {
        Self::new(url, StatusCode::OK).with_header("content-type", content_type)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Lowercased MIME essence (`type/subtype`), empty if none was sent.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// A `Content-Type` parameter, matched case-insensitively.
    pub fn content_type_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn charset(&self) -> Option<&str> {
        self.content_type_param("charset")
    }

    /// Whether this response's body is a stream of replacing parts.
    pub fn is_multipart(&self) -> bool {
        self.mime_type == MULTIPART_MIXED_REPLACE
    }

    /// The multipart `boundary` parameter, as sent.
    ///
    /// Dashes are part of the boundary; see [`MultipartParser::new`] for
    /// servers that repeat the delimiter's `--` here.
    ///
    /// [`MultipartParser::new`]: crate::http::multipart::MultipartParser::new
    pub fn multipart_boundary(&self) -> Option<&str> {
        if !self.is_multipart() {
            return None;
        }
        self.content_type_param("boundary").filter(|b| !b.is_empty())
    }

    /// `Content-Length`, if present and well-formed.
    pub fn expected_content_length(&self) -> Option<u64> {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok())
    }

    /// The resolved `Location` target of a redirect response.
    ///
    /// Returns `None` for non-redirect statuses and missing locations.
    pub fn redirect_target(&self) -> Option<Url> {
        if !self.status.is_redirection() {
            return None;
        }
        let location = self.headers.get(LOCATION)?.to_str().ok()?;
        // Resolve potentially relative URL
        self.url.join(location).ok()
    }
}

/// Split a `Content-Type` value into a lowercased essence and its parameters.
pub(crate) fn parse_content_type(value: &str) -> (String, Vec<(String, String)>) {
    let mut segments = split_unquoted(value, ';').into_iter();
    let essence = segments
        .next()
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();

    let params = segments
        .filter_map(|segment| {
            let (name, value) = segment.split_once('=')?;
            let name = name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return None;
            }
            Some((name, unquote(value.trim())))
        })
        .collect();

    (essence, params)
}

fn split_unquoted(value: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in value.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                out.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&value[start..]);
    out
}

fn unquote(value: &str) -> String {
    match value.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c == '\\' {
                    if let Some(next) = chars.next() {
                        out.push(next);
                    }
                } else {
                    out.push(c);
                }
            }
            out
        }
        None => value.to_string(),
    }
}
