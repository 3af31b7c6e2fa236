//! Embedder trait and implementations for the vector rerank
//!
//! - HttpEmbedder: OpenAI-compatible `/embeddings` endpoint, one blocking call
//!   per text, fixed timeout, no retry
//! - DisabledEmbedder: the default; never touches the network
//!
//! Failures are values, not errors: callers get [`Embedding::Unavailable`] and
//! carry on without a vector.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::core::config::EmbeddingConfig;

/// What the text is being embedded for; selects truncation and timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedPurpose {
    Document,
    Query,
}

/// Outcome of a single embedding call
#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Value(Vec<f32>),
    Unavailable(Unavailable),
}

/// Why no vector was produced
#[derive(Debug, Clone, PartialEq)]
pub enum Unavailable {
    /// Semantic feature switched off; not a failure
    Disabled,
    Timeout,
    Connection(String),
    Status(u16),
    Malformed(String),
}

impl Unavailable {
    /// Everything except `Disabled` counts as a failed call
    pub fn is_failure(&self) -> bool {
        !matches!(self, Unavailable::Disabled)
    }
}

impl fmt::Display for Unavailable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Disabled => write!(f, "embeddings disabled"),
            Unavailable::Timeout => write!(f, "embedding request timed out"),
            Unavailable::Connection(e) => write!(f, "embedding request failed: {}", e),
            Unavailable::Status(code) => write!(f, "embedding endpoint returned HTTP {}", code),
            Unavailable::Malformed(e) => write!(f, "invalid embedding response: {}", e),
        }
    }
}

/// Embedding provider abstraction
pub trait Embedder: Send + Sync {
    /// Embed one text. Never panics, never returns an error.
    fn embed(&self, text: &str, purpose: EmbedPurpose) -> Embedding;

    /// Whether calls can produce vectors at all
    fn is_enabled(&self) -> bool;

    /// Model name/identifier
    fn name(&self) -> &str;
}

// ============================================================================
// Disabled Embedder
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEmbedder;

impl Embedder for DisabledEmbedder {
    fn embed(&self, _text: &str, _purpose: EmbedPurpose) -> Embedding {
        Embedding::Unavailable(Unavailable::Disabled)
    }

    fn is_enabled(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "disabled"
    }
}

// ============================================================================
// HTTP Embedder
// ============================================================================

/// Per-purpose limits for the HTTP embedder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallLimits {
    pub timeout: Duration,
    pub max_chars: usize,
}

/// Blocking client for OpenAI-compatible embedding endpoints.
///
/// `reqwest::blocking` drives each request on its own runtime thread and
/// waits on the result, so callers see a plain synchronous call.
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    document: CallLimits,
    query: CallLimits,
}

impl HttpEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        document: CallLimits,
        query: CallLimits,
    ) -> reqwest::Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            document,
            query,
        })
    }

    pub fn from_config(config: &EmbeddingConfig) -> reqwest::Result<Self> {
        Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            CallLimits {
                timeout: Duration::from_secs(config.document_timeout_secs),
                max_chars: config.document_max_chars,
            },
            CallLimits {
                timeout: Duration::from_secs(config.query_timeout_secs),
                max_chars: config.query_max_chars,
            },
        )
    }

    fn limits(&self, purpose: EmbedPurpose) -> CallLimits {
        match purpose {
            EmbedPurpose::Document => self.document,
            EmbedPurpose::Query => self.query,
        }
    }

    fn request(&self, text: &str, limits: CallLimits) -> Result<Vec<f32>, Unavailable> {
        let input: String = text.chars().take(limits.max_chars).collect();
        let body = EmbeddingRequest {
            input: &input,
            model: &self.model,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(limits.timeout)
            .json(&body)
            .send()
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Unavailable::Status(status.as_u16()));
        }

        let bytes = response.bytes().map_err(classify_error)?;
        parse_embedding_response(&bytes)
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, text: &str, purpose: EmbedPurpose) -> Embedding {
        match self.request(text, self.limits(purpose)) {
            Ok(vector) => Embedding::Value(vector),
            Err(reason) => {
                tracing::debug!("{:?} embedding unavailable: {}", purpose, reason);
                Embedding::Unavailable(reason)
            }
        }
    }

    fn is_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        &self.model
    }
}

fn classify_error(err: reqwest::Error) -> Unavailable {
    if err.is_timeout() {
        Unavailable::Timeout
    } else if err.is_decode() || err.is_body() {
        Unavailable::Malformed(err.to_string())
    } else {
        Unavailable::Connection(err.to_string())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Pull `data[0].embedding` out of a response body
pub(crate) fn parse_embedding_response(body: &[u8]) -> Result<Vec<f32>, Unavailable> {
    let parsed: EmbeddingResponse =
        serde_json::from_slice(body).map_err(|e| Unavailable::Malformed(e.to_string()))?;
    let first = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| Unavailable::Malformed("response contained no embeddings".into()))?;
    if first.embedding.is_empty() {
        return Err(Unavailable::Malformed("embedding vector is empty".into()));
    }
    Ok(first.embedding)
}

// ============================================================================
// Factory function
// ============================================================================

/// Create embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Box<dyn Embedder> {
    if !config.enabled {
        return Box::new(DisabledEmbedder);
    }
    match HttpEmbedder::from_config(config) {
        Ok(embedder) => Box::new(embedder),
        Err(e) => {
            tracing::warn!("failed to build embedding client, continuing without vectors: {}", e);
            Box::new(DisabledEmbedder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// One-shot HTTP server: captures the request body, replies with `reply`
    fn serve_once(status: &'static str, reply: &'static str, delay: Duration) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/v1/embeddings", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            thread::sleep(delay);
            let mut stream = stream;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reply.len(),
                reply
            );
            let _ = stream.write_all(response.as_bytes());
            String::from_utf8(body).unwrap()
        });

        (url, handle)
    }

    fn limits(ms: u64, max_chars: usize) -> CallLimits {
        CallLimits {
            timeout: Duration::from_millis(ms),
            max_chars,
        }
    }

    #[test]
    fn test_disabled_embedder() {
        let embedder = DisabledEmbedder;
        assert!(!embedder.is_enabled());
        assert_eq!(
            embedder.embed("anything", EmbedPurpose::Query),
            Embedding::Unavailable(Unavailable::Disabled)
        );
        assert!(!Unavailable::Disabled.is_failure());
    }

    #[test]
    fn test_create_embedder_disabled_by_default() {
        let embedder = create_embedder(&EmbeddingConfig::default());
        assert!(!embedder.is_enabled());
        assert_eq!(embedder.name(), "disabled");
    }

    #[test]
    fn test_parse_embedding_response() {
        let ok = br#"{"data":[{"embedding":[0.5,-1.25,2.0],"index":0}],"model":"m"}"#;
        assert_eq!(parse_embedding_response(ok).unwrap(), vec![0.5, -1.25, 2.0]);

        let empty = br#"{"data":[]}"#;
        assert!(matches!(parse_embedding_response(empty), Err(Unavailable::Malformed(_))));

        let wrong_shape = br#"{"embedding":[1.0]}"#;
        assert!(matches!(parse_embedding_response(wrong_shape), Err(Unavailable::Malformed(_))));

        let not_json = b"<html>bad gateway</html>";
        assert!(matches!(parse_embedding_response(not_json), Err(Unavailable::Malformed(_))));
    }

    #[test]
    fn test_http_embed_success_truncates_input() {
        let (url, handle) = serve_once(
            "200 OK",
            r#"{"data":[{"embedding":[0.1,0.2,0.3]}]}"#,
            Duration::ZERO,
        );
        let embedder = HttpEmbedder::new(url, "test-model", limits(5000, 8000), limits(5000, 4)).unwrap();

        let result = embedder.embed("abcdefgh", EmbedPurpose::Query);
        assert_eq!(result, Embedding::Value(vec![0.1, 0.2, 0.3]));

        let body: serde_json::Value = serde_json::from_str(&handle.join().unwrap()).unwrap();
        assert_eq!(body["input"], "abcd");
        assert_eq!(body["model"], "test-model");
    }

    #[test]
    fn test_http_embed_malformed_response() {
        let (url, handle) = serve_once("200 OK", r#"{"result":"nope"}"#, Duration::ZERO);
        let embedder = HttpEmbedder::new(url, "m", limits(5000, 100), limits(5000, 100)).unwrap();

        let result = embedder.embed("text", EmbedPurpose::Document);
        assert!(matches!(result, Embedding::Unavailable(Unavailable::Malformed(_))));
        handle.join().unwrap();
    }

    #[test]
    fn test_http_embed_error_status() {
        let (url, handle) = serve_once("503 Service Unavailable", "{}", Duration::ZERO);
        let embedder = HttpEmbedder::new(url, "m", limits(5000, 100), limits(5000, 100)).unwrap();

        let result = embedder.embed("text", EmbedPurpose::Document);
        assert_eq!(result, Embedding::Unavailable(Unavailable::Status(503)));
        handle.join().unwrap();
    }

    #[test]
    fn test_http_embed_timeout() {
        let (url, handle) = serve_once(
            "200 OK",
            r#"{"data":[{"embedding":[1.0]}]}"#,
            Duration::from_millis(1500),
        );
        let embedder = HttpEmbedder::new(url, "m", limits(5000, 100), limits(200, 100)).unwrap();

        let result = embedder.embed("text", EmbedPurpose::Query);
        assert_eq!(result, Embedding::Unavailable(Unavailable::Timeout));
        handle.join().unwrap();
    }

    #[test]
    fn test_http_embed_connection_refused() {
        let url = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}/v1/embeddings", listener.local_addr().unwrap())
        };
        let embedder = HttpEmbedder::new(url, "m", limits(2000, 100), limits(2000, 100)).unwrap();

        let result = embedder.embed("text", EmbedPurpose::Document);
        assert!(matches!(result, Embedding::Unavailable(Unavailable::Connection(_))));
    }
}
