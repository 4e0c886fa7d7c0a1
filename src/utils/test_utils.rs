//! In-process HTTP server for exercising the streaming adapters.
//!
//! Every accepted connection gets the same canned response, written with
//! chunked transfer encoding so tests control exactly where the body is split.

use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::core::adapters::{Attribution, ChatClient};

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Path and query from the request line.
    pub fn target(&self) -> &str {
        self.request_line.split(' ').nth(1).unwrap_or_default()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    content_type: &'static str,
    chunks: Vec<Vec<u8>>,
    delay: Duration,
    hold_open: bool,
    truncate: bool,
}

impl MockResponse {
    /// An event stream whose body chunks are exactly `chunks`.
    pub fn sse<S: AsRef<str>>(chunks: &[S]) -> Self {
        Self {
            status: 200,
            content_type: "text/event-stream",
            chunks: chunks.iter().map(|c| c.as_ref().as_bytes().to_vec()).collect(),
            delay: Duration::ZERO,
            hold_open: false,
            truncate: false,
        }
    }

    pub fn error(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            chunks: vec![body.as_bytes().to_vec()],
            delay: Duration::ZERO,
            hold_open: false,
            truncate: false,
        }
    }

    /// Pause between chunks.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Never terminate the body; the client has to hang up.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Hang up without the terminating chunk, so the client sees a broken body.
    pub fn truncated(mut self) -> Self {
        self.truncate = true;
        self
    }
}

pub struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub async fn start(response: MockResponse) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let addr = listener.local_addr().expect("local addr should resolve");
        let requests = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&requests);

        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let response = response.clone();
                let captured = Arc::clone(&captured);
                tokio::spawn(async move {
                    let _ = serve_connection(stream, response, captured).await;
                });
            }
        });

        Self {
            base_url: format!("http://{addr}"),
            requests,
            handle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().await.clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A client that never routes through an environment proxy.
pub fn test_client() -> ChatClient {
    let http = reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("client should build");
    ChatClient::new(http, Attribution::default())
}

async fn serve_connection(
    mut stream: TcpStream,
    response: MockResponse,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
) -> Result<(), String> {
    let request = read_http_request(&mut stream).await?;
    captured.lock().await.push(request);

    let head = format!(
        "HTTP/1.1 {} Mock\r\ncontent-type: {}\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
        response.status, response.content_type
    );
    stream
        .write_all(head.as_bytes())
        .await
        .map_err(|err| err.to_string())?;

    for chunk in &response.chunks {
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        if chunk.is_empty() {
            continue;
        }
        let mut frame = format!("{:x}\r\n", chunk.len()).into_bytes();
        frame.extend_from_slice(chunk);
        frame.extend_from_slice(b"\r\n");
        stream.write_all(&frame).await.map_err(|err| err.to_string())?;
        stream.flush().await.map_err(|err| err.to_string())?;
    }

    if response.hold_open {
        // Park until the client disconnects.
        let mut sink = [0_u8; 64];
        loop {
            match stream.read(&mut sink).await {
                Ok(0) | Err(_) => return Ok(()),
                Ok(_) => {}
            }
        }
    }

    if response.truncate {
        return stream.shutdown().await.map_err(|err| err.to_string());
    }

    stream
        .write_all(b"0\r\n\r\n")
        .await
        .map_err(|err| err.to_string())?;
    stream.shutdown().await.map_err(|err| err.to_string())
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.unwrap_or(buffer.len());
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..read]);
    }

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
