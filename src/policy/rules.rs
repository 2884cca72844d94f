//! A stock answer for policy checks.
//!
//! Embedders with no UI in the loop can run checks through [`DefaultPolicy`]:
//! every navigation proceeds, renderable content is shown, attachments and
//! unknown types are downloaded, and bodiless responses are ignored.

use crate::policy::{PolicyDecision, PolicySubject};
use http::header::CONTENT_DISPOSITION;
use http::StatusCode;

/// MIME types shown in the frame in addition to `text/*` and `image/*`.
const RENDERABLE_TYPES: &[&str] = &[
    "application/xhtml+xml",
    "application/xml",
    "application/json",
    "application/javascript",
    "application/pdf",
    "multipart/x-mixed-replace",
];

/// Decides navigation and content policy without asking anyone.
#[derive(Debug, Clone, Default)]
pub struct DefaultPolicy {
    extra_renderable: Vec<String>,
}

impl DefaultPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat `mime_type` as renderable.
    pub fn allow_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.extra_renderable
            .push(mime_type.into().to_ascii_lowercase());
        self
    }

    /// Whether a frame can display content of `mime_type`.
    pub fn can_show_mime_type(&self, mime_type: &str) -> bool {
        mime_type.starts_with("text/")
            || mime_type.starts_with("image/")
            || RENDERABLE_TYPES.contains(&mime_type)
            || self.extra_renderable.iter().any(|m| m == mime_type)
    }

    pub fn decide(&self, subject: &PolicySubject) -> PolicyDecision {
        match subject {
            PolicySubject::Navigation(_) => PolicyDecision::Continue,
            PolicySubject::Content {
                mime_type,
                response,
            } => {
                // 204 and 205 leave the current document in place.
                if matches!(
                    response.status(),
                    StatusCode::NO_CONTENT | StatusCode::RESET_CONTENT
                ) {
                    return PolicyDecision::Ignore;
                }
                let attachment = response
                    .headers()
                    .get(CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| {
                        v.trim_start()
                            .get(..10)
                            .is_some_and(|p| p.eq_ignore_ascii_case("attachment"))
                    })
                    .unwrap_or(false);
                if attachment || !self.can_show_mime_type(mime_type) {
                    PolicyDecision::Download
                } else {
                    PolicyDecision::Continue
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{LoadRequest, LoadResponse};
    use url::Url;

    fn content(response: LoadResponse) -> PolicySubject {
        PolicySubject::Content {
            mime_type: response.mime_type().to_string(),
            response,
        }
    }

    fn url() -> Url {
        Url::parse("https://example.com/file").unwrap()
    }

    #[test]
    fn test_navigation_continues() {
        let subject = PolicySubject::Navigation(LoadRequest::new(url()));
        assert_eq!(DefaultPolicy::new().decide(&subject), PolicyDecision::Continue);
    }

    #[test]
    fn test_html_is_shown() {
        let resp = LoadResponse::ok_with_type(url(), "text/html").unwrap();
        assert_eq!(DefaultPolicy::new().decide(&content(resp)), PolicyDecision::Continue);
    }

    #[test]
    fn test_unknown_type_downloads() {
        let resp = LoadResponse::ok_with_type(url(), "application/zip").unwrap();
        let policy = DefaultPolicy::new();
        assert_eq!(policy.decide(&content(resp.clone())), PolicyDecision::Download);

        let policy = policy.allow_mime_type("Application/Zip");
        assert_eq!(policy.decide(&content(resp)), PolicyDecision::Continue);
    }

    #[test]
    fn test_attachment_downloads() {
        let resp = LoadResponse::ok_with_type(url(), "text/plain")
            .unwrap()
            .with_header("content-disposition", "Attachment; filename=\"a.txt\"")
            .unwrap();
        assert_eq!(DefaultPolicy::new().decide(&content(resp)), PolicyDecision::Download);
    }

    #[test]
    fn test_no_content_ignored() {
        let resp = LoadResponse::new(url(), StatusCode::NO_CONTENT);
        assert_eq!(DefaultPolicy::new().decide(&content(resp)), PolicyDecision::Ignore);
    }
}
