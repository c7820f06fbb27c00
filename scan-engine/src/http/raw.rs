//! Raw HTTP request text parsing

use crate::error::{EngineError, EngineResult};
use url::Url;

/// A rendered raw request split into its parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawRequest {
    /// Parse `METHOD target HTTP/x`, header lines, a blank line and the body
    pub fn parse(text: &str) -> EngineResult<Self> {
        let (head, body) = match text.split_once("\r\n\r\n") {
            Some((head, body)) => (head, body),
            None => (text.trim_end_matches("\r\n"), ""),
        };

        let mut lines = head.split("\r\n");
        let request_line = lines
            .next()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .ok_or_else(|| EngineError::configuration("raw request", "missing request line"))?;

        let mut parts = request_line.split_whitespace();
        let (method, path) = match (parts.next(), parts.next()) {
            (Some(method), Some(path)) => (method.to_string(), path.to_string()),
            _ => {
                return Err(EngineError::configuration(
                    "raw request",
                    &format!("malformed request line '{}'", request_line),
                ))
            }
        };

        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect();

        Ok(Self {
            method,
            path,
            headers,
            body: body.to_string(),
        })
    }

    /// Absolute URL against the target; the Host header plays no part
    pub fn url(&self, base: &Url) -> EngineResult<String> {
        if self.path.starts_with("http://") || self.path.starts_with("https://") {
            return Ok(self.path.clone());
        }
        let mut url = base.clone();
        let (path, query) = match self.path.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (self.path.as_str(), None),
        };
        let base_path = base.path().trim_end_matches('/');
        let under_base = path == base_path || path.starts_with(&format!("{}/", base_path));
        if path.starts_with('/') && !base_path.is_empty() && !under_base {
            url.set_path(&format!("{}{}", base_path, path));
        } else {
            url.set_path(path);
        }
        url.set_query(query);
        Ok(url.to_string())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_request() {
        let raw = RawRequest::parse(
            "POST /login?next=/ HTTP/1.1\r\nHost: example.com\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nuser=admin&pass=x",
        )
        .unwrap();
        assert_eq!(raw.method, "POST");
        assert_eq!(raw.path, "/login?next=/");
        assert_eq!(raw.header("content-type"), Some("application/x-www-form-urlencoded"));
        assert_eq!(raw.body, "user=admin&pass=x");
    }

    #[test]
    fn test_parse_without_body() {
        let raw = RawRequest::parse("GET / HTTP/1.1\r\nHost: x\r\n").unwrap();
        assert_eq!(raw.headers.len(), 1);
        assert!(raw.body.is_empty());
    }

    #[test]
    fn test_malformed_request_line() {
        assert!(RawRequest::parse("GARBAGE").is_err());
        assert!(RawRequest::parse("").is_err());
    }

    #[test]
    fn test_url_ignores_host_header() {
        let raw = RawRequest::parse("GET /admin?x=1 HTTP/1.1\r\nHost: other.example\r\n\r\n").unwrap();
        let base = Url::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(raw.url(&base).unwrap(), "http://127.0.0.1:8080/admin?x=1");
    }

    #[test]
    fn test_url_keeps_base_path() {
        let raw = RawRequest::parse("GET /login HTTP/1.1\r\n\r\n").unwrap();
        let base = Url::parse("http://127.0.0.1:8080/app/").unwrap();
        assert_eq!(raw.url(&base).unwrap(), "http://127.0.0.1:8080/app/login");
    }

    #[test]
    fn test_url_base_prefix_compares_segments() {
        let base = Url::parse("http://127.0.0.1:8080/app/").unwrap();

        let raw = RawRequest::parse("GET /application HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(raw.url(&base).unwrap(), "http://127.0.0.1:8080/app/application");

        let raw = RawRequest::parse("GET /app/login HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(raw.url(&base).unwrap(), "http://127.0.0.1:8080/app/login");

        let raw = RawRequest::parse("GET /app HTTP/1.1\r\n\r\n").unwrap();
        assert_eq!(raw.url(&base).unwrap(), "http://127.0.0.1:8080/app");
    }
}
