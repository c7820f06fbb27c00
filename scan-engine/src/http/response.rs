//! Normalization of an HTTP response into an internal event

use crate::error::EngineResult;
use crate::types::{InternalEvent, ProtocolType};
use std::collections::BTreeMap;

/// Request-side facts copied into the event
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    pub host: &'a str,
    pub url: &'a str,
    pub template_id: &'a str,
    /// Body bytes kept at most; zero keeps everything
    pub max_size: usize,
}

/// Read the response fully and flatten it into event fields.
///
/// The response is consumed here, so the body is released exactly once.
pub async fn response_to_event(mut response: reqwest::Response, ctx: &RequestContext<'_>) -> EngineResult<InternalEvent> {
    let status = response.status().as_u16();
    let ip = response
        .remote_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default();

    let mut all_headers = String::new();
    let mut mirrored: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        all_headers.push_str(&format!("{}: {}\r\n", canonical_header_name(name.as_str()), value));
        mirrored
            .entry(name.as_str().trim().to_lowercase().replace('-', "_"))
            .or_default()
            .push(value);
    }
    let content_length = response.content_length();
    let cookies: Vec<(String, String)> = response
        .cookies()
        .map(|cookie| (cookie.name().to_lowercase(), cookie.value().to_string()))
        .collect();

    let mut body: Vec<u8> = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        body.extend_from_slice(&chunk);
        if ctx.max_size > 0 && body.len() >= ctx.max_size {
            body.truncate(ctx.max_size);
            break;
        }
    }
    drop(response);

    let mut event = InternalEvent::new();
    event.insert("host", ctx.host);
    event.insert("url", ctx.url);
    event.insert("matched", ctx.url);
    event.insert("ip", ip);
    event.insert("template-id", ctx.template_id);
    event.insert("type", ProtocolType::Http.as_str());
    event.insert("status_code", status.to_string());
    event.insert(
        "content_length",
        content_length.unwrap_or(body.len() as u64).to_string(),
    );
    event.insert("body", String::from_utf8_lossy(&body).into_owned());
    event.insert("all_headers", all_headers);
    for (name, value) in cookies {
        event.insert(name, value);
    }
    for (name, values) in mirrored {
        event.insert(name, values.join(" "));
    }
    Ok(event)
}

/// `content-type` to `Content-Type`
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::header, response::IntoResponse, routing::get, Router};

    async fn spawn_server() -> String {
        let app = Router::new().route(
            "/",
            get(|| async {
                (
                    [
                        (header::SERVER, "test-server"),
                        (header::SET_COOKIE, "SessionID=abc123; Path=/"),
                    ],
                    "hello from the body",
                )
                    .into_response()
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[test]
    fn test_canonical_header_name() {
        assert_eq!(canonical_header_name("content-type"), "Content-Type");
        assert_eq!(canonical_header_name("x-powered-by"), "X-Powered-By");
        assert_eq!(canonical_header_name("server"), "Server");
    }

    #[tokio::test]
    async fn test_response_fields() {
        let url = spawn_server().await;
        let response = reqwest::get(&url).await.unwrap();
        let ctx = RequestContext {
            host: "127.0.0.1",
            url: &url,
            template_id: "t",
            max_size: 0,
        };
        let event = response_to_event(response, &ctx).await.unwrap();

        assert_eq!(event.get("status_code"), Some("200"));
        assert_eq!(event.get("body"), Some("hello from the body"));
        assert_eq!(event.get("content_length"), Some("19"));
        assert_eq!(event.get("server"), Some("test-server"));
        assert_eq!(event.get("sessionid"), Some("abc123"));
        assert!(event.get("all_headers").unwrap().contains("Server: test-server\r\n"));
        assert_eq!(event.get("ip"), Some("127.0.0.1"));
    }

    #[tokio::test]
    async fn test_max_size_truncates_body() {
        let url = spawn_server().await;
        let response = reqwest::get(&url).await.unwrap();
        let ctx = RequestContext {
            host: "127.0.0.1",
            url: &url,
            template_id: "t",
            max_size: 5,
        };
        let event = response_to_event(response, &ctx).await.unwrap();
        assert_eq!(event.get("body"), Some("hello"));
    }
}
