//! Blocking HTTP transport used by the provider backends.
//!
//! Backends only see [`HttpTransport`]; the production implementation wraps a
//! `ureq` agent with a global timeout, and tests substitute an in-memory fake.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// A JSON POST request. Header values may carry credentials and are never logged.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

/// Status and raw body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before any HTTP status was received (DNS, connect, TLS, timeout).
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

pub trait HttpTransport {
    fn post_json(&self, request: &HttpRequest) -> Result<HttpReply, TransportError>;
}

/// Production transport backed by `ureq`.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl HttpTransport for UreqTransport {
    fn post_json(&self, request: &HttpRequest) -> Result<HttpReply, TransportError> {
        let mut builder = self.agent.post(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        let mut response = builder
            .send_json(&request.body)
            .map_err(|err| TransportError(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| TransportError(format!("read response body: {err}")))?;
        Ok(HttpReply { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer one request on loopback with a canned reply. The join handle
    /// yields the request head and body as received.
    fn serve_once(
        status_line: &'static str,
        body: &'static str,
    ) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut received = String::new();
            let mut content_length = 0usize;
            let mut chunked = false;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read header line");
                if line.is_empty() || line == "\r\n" {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().expect("content-length");
                    }
                    if name.eq_ignore_ascii_case("transfer-encoding") {
                        chunked = value.trim().eq_ignore_ascii_case("chunked");
                    }
                }
                received.push_str(&line);
            }
            let request_body = if chunked {
                read_chunked(&mut reader)
            } else {
                let mut buf = vec![0u8; content_length];
                reader.read_exact(&mut buf).expect("read body");
                buf
            };
            received.push_str(&String::from_utf8_lossy(&request_body));

            let reply = format!(
                "HTTP/1.1 {status_line}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            reader
                .get_mut()
                .write_all(reply.as_bytes())
                .expect("write reply");
            received
        });
        (format!("http://{addr}"), handle)
    }

    fn read_chunked(reader: &mut impl BufRead) -> Vec<u8> {
        let mut body = Vec::new();
        loop {
            let mut size_line = String::new();
            reader.read_line(&mut size_line).expect("chunk size");
            let size = usize::from_str_radix(size_line.trim(), 16).expect("hex chunk size");
            let mut chunk = vec![0u8; size + 2];
            reader.read_exact(&mut chunk).expect("chunk");
            if size == 0 {
                return body;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    fn request(url: String) -> HttpRequest {
        HttpRequest {
            url,
            headers: vec![("x-api-key", "loopback-key".to_string())],
            body: json!({"model": "m"}),
        }
    }

    #[test]
    fn error_status_comes_back_as_a_reply() {
        let (base, server) = serve_once("401 Unauthorized", r#"{"error":"bad key"}"#);
        let transport = UreqTransport::new(Duration::from_secs(5));

        let reply = transport
            .post_json(&request(format!("{base}/v1/messages")))
            .expect("an HTTP status is not a transport failure");

        assert_eq!(
            reply,
            HttpReply {
                status: 401,
                body: r#"{"error":"bad key"}"#.to_string(),
            }
        );
        assert!(!reply.is_success());

        let received = server.join().expect("server thread");
        assert!(received.starts_with("POST /v1/messages "), "{received}");
        assert!(
            received.to_ascii_lowercase().contains("x-api-key: loopback-key"),
            "{received}"
        );
        assert!(received.ends_with(r#"{"model":"m"}"#), "{received}");
    }

    #[test]
    fn success_status_returns_body() {
        let (base, server) = serve_once("200 OK", r#"{"ok":true}"#);
        let transport = UreqTransport::new(Duration::from_secs(5));

        let reply = transport.post_json(&request(base)).expect("reply");

        assert!(reply.is_success());
        assert_eq!(reply.body, r#"{"ok":true}"#);
        server.join().expect("server thread");
    }

    #[test]
    fn closed_port_is_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        let transport = UreqTransport::new(Duration::from_secs(5));

        let result = transport.post_json(&request(format!("http://{addr}")));

        assert!(result.is_err(), "{result:?}");
    }

    #[test]
    fn silent_server_times_out_as_a_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        thread::spawn(move || {
            if let Ok((stream, _)) = listener.accept() {
                thread::sleep(Duration::from_secs(3));
                drop(stream);
            }
        });
        let transport = UreqTransport::new(Duration::from_millis(300));

        let result = transport.post_json(&request(format!("http://{addr}")));

        assert!(result.is_err(), "{result:?}");
    }
}
