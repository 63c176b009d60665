use std::sync::Arc;

use http_wire::{Method, Request, Response, Version};

use crate::date::rfc1123_now;
use crate::resource::ResourceHost;

const SERVER_HEADER: &str = "httpserver/1.0";
const ALLOW_HEADER: &str = "HEAD, GET, OPTIONS, TRACE";

/// Parse, resolve, dispatch. Returns the fully framed response bytes and
/// whether the connection must be closed once they drain. Never fails:
/// a malformed request or unknown host becomes a response, not an error.
pub fn handle_request(
    raw: &[u8],
    resolve_host: impl FnOnce(&Request) -> Option<Arc<ResourceHost>>,
) -> (Vec<u8>, bool) {
    let req = match Request::parse(raw) {
        Ok(req) => req,
        // No parsed request to echo a version from; default to HTTP/1.1.
        Err(e) => return status_response(Version::Http11, 400, Some(&e.to_string())),
    };

    let host = match resolve_host(&req) {
        Some(host) => host,
        None => return status_response(req.version(), 400, Some("Invalid/No Host specified")),
    };

    match req.method() {
        Method::Get => get_or_head(&req, &host, false),
        Method::Head => get_or_head(&req, &host, true),
        Method::Options => options_response(&req),
        Method::Trace => trace_response(&req),
        Method::Other(_) => status_response(req.version(), 501, None),
    }
}

fn wants_close(req: &Request) -> bool {
    req.version() == Version::Http10
        || req
            .header("connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("close"))
}

fn get_or_head(req: &Request, host: &ResourceHost, is_head: bool) -> (Vec<u8>, bool) {
    let disconnect = wants_close(req);
    match host.get_resource(req.uri()) {
        Some(resource) => {
            let response = Response::new(200)
                .version(req.version())
                .header("Content-Type", resource.mime_type)
                .body(resource.body)
                .omit_body(is_head);
            (finish(response, disconnect), disconnect)
        }
        // Resolver miss follows the same disconnect rule as a hit, not the
        // unconditional close used by status_response.
        None => {
            let body = http_wire::status_text(404).to_string().into_bytes();
            let response = Response::new(404)
                .version(req.version())
                .header("Content-Type", "text/plain")
                .body(body);
            (finish(response, disconnect), disconnect)
        }
    }
}

fn options_response(req: &Request) -> (Vec<u8>, bool) {
    let response = Response::new(200)
        .version(req.version())
        .header("Allow", ALLOW_HEADER)
        .body(Vec::new());
    (finish(response, true), true)
}

fn trace_response(req: &Request) -> (Vec<u8>, bool) {
    let response = Response::new(200)
        .version(req.version())
        .header("Content-Type", "message/http")
        .body(req.raw_bytes().to_vec());
    (finish(response, true), true)
}

/// 400/501 and any other status-only helper response. Always disconnects —
/// the client is in a state we can't trust enough to keep parsing from.
fn status_response(version: Version, code: u16, msg: Option<&str>) -> (Vec<u8>, bool) {
    let reason = http_wire::status_text(code);
    let text = match msg {
        Some(m) => format!("{reason}: {m}"),
        None => reason.to_string(),
    };
    let response = Response::new(code)
        .version(version)
        .header("Content-Type", "text/plain")
        .body(text.into_bytes());
    (finish(response, true), true)
}

/// Injects the headers every response carries regardless of handler:
/// `Server`, `Date`, and (when the connection is closing) `Connection: close`.
fn finish(response: Response, disconnect: bool) -> Vec<u8> {
    let mut response = response
        .header("Server", SERVER_HEADER)
        .header("Date", rfc1123_now());
    if disconnect {
        response = response.header("Connection", "close");
    }
    response.serialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn host_with(files: &[(&str, &[u8])]) -> ResourceHost {
        let dir = std::env::temp_dir().join(format!(
            "httpserver_handlers_test_{}",
            files.len() * 7919 + files.first().map(|f| f.0.len()).unwrap_or(0)
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        for (name, body) in files {
            fs::write(dir.join(name), body).unwrap();
        }
        ResourceHost::new(dir)
    }

    #[test]
    fn get_hit_returns_200_with_body() {
        let host = host_with(&[("index.html", b"hi")]);
        let (bytes, disconnect) =
            handle_request(b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n", |_| {
                Some(Arc::new(host))
            });
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2"));
        assert!(text.ends_with("hi"));
        assert!(!disconnect);
    }

    #[test]
    fn get_miss_returns_404_and_stays_open_on_http11() {
        let host = host_with(&[]);
        let (bytes, disconnect) =
            handle_request(b"GET /nope HTTP/1.1\r\nHost: x\r\n\r\n", |_| Some(Arc::new(host)));
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 404"));
        assert!(!disconnect);
    }

    #[test]
    fn http10_always_disconnects() {
        let host = host_with(&[("index.html", b"hi")]);
        let (bytes, disconnect) = handle_request(b"GET / HTTP/1.0\r\n\r\n", |_| Some(Arc::new(host)));
        assert!(disconnect);
        assert!(String::from_utf8(bytes).unwrap().contains("Connection: close"));
    }

    #[test]
    fn head_omits_body_but_keeps_length() {
        let host = host_with(&[("index.html", b"hello")]);
        let (bytes, _) = handle_request(b"HEAD /index.html HTTP/1.1\r\nHost: x\r\n\r\n", |_| {
            Some(Arc::new(host))
        });
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Length: 5"));
        assert!(!text.ends_with("hello"));
    }

    #[test]
    fn options_always_closes() {
        let (bytes, disconnect) = handle_request(b"OPTIONS * HTTP/1.1\r\nHost: x\r\n\r\n", |_| {
            Some(Arc::new(host_with(&[])))
        });
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Allow: HEAD, GET, OPTIONS, TRACE"));
        assert!(text.contains("Content-Length: 0"));
        assert!(disconnect);
    }

    #[test]
    fn trace_echoes_raw_request() {
        let raw: &[u8] = b"TRACE / HTTP/1.1\r\nHost: x\r\n\r\n";
        let (bytes, disconnect) = handle_request(raw, |_| Some(Arc::new(host_with(&[]))));
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("Content-Type: message/http"));
        assert!(text.ends_with(&String::from_utf8_lossy(raw).to_string()));
        assert!(disconnect);
    }

    #[test]
    fn unsupported_method_is_501() {
        let (bytes, disconnect) = handle_request(b"POST / HTTP/1.1\r\nHost: x\r\n\r\n", |_| {
            Some(Arc::new(host_with(&[])))
        });
        assert!(String::from_utf8(bytes).unwrap().starts_with("HTTP/1.1 501"));
        assert!(disconnect);
    }

    #[test]
    fn unsupported_method_echoes_request_version() {
        let (bytes, _) = handle_request(b"POST / HTTP/1.0\r\n\r\n", |_| {
            Some(Arc::new(host_with(&[])))
        });
        assert!(String::from_utf8(bytes).unwrap().starts_with("HTTP/1.0 501"));
    }

    #[test]
    fn get_miss_body_is_bare_reason_phrase() {
        let host = host_with(&[]);
        let (bytes, _) =
            handle_request(b"GET /nope HTTP/1.1\r\nHost: x\r\n\r\n", |_| Some(Arc::new(host)));
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.ends_with("Not Found"));
        assert!(!text.ends_with("Not Found: Not Found"));
    }

    #[test]
    fn missing_host_is_400() {
        let (bytes, disconnect) = handle_request(b"GET / HTTP/1.1\r\n\r\n", |_| None);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("HTTP/1.1 400"));
        assert!(text.contains("Invalid/No Host specified"));
        assert!(disconnect);
    }

    #[test]
    fn malformed_request_is_400() {
        let (bytes, disconnect) = handle_request(b"not a request at all", |_| None);
        assert!(String::from_utf8(bytes).unwrap().starts_with("HTTP/1.1 400"));
        assert!(disconnect);
    }
}
