//! Server-sent events over HTTP.

use std::collections::VecDeque;

use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use reqwest::{header::ACCEPT, Client};
use shared::{error::ApiError, protocol::DONE_EVENT};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    error::ClientError,
    source::{EventSource, InboundEvent},
};

const DEFAULT_EVENT: &str = "message";
/// Longest line the decoder buffers before giving up on the stream.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SseError {
    #[error("line exceeds {limit} bytes without a terminator")]
    LineTooLong { limit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Incremental `text/event-stream` parser. Bytes may arrive split at any
/// point, including inside a CRLF pair or a multi-byte character.
#[derive(Debug)]
pub struct SseDecoder {
    line: Vec<u8>,
    line_limit: usize,
    skip_lf: bool,
    event: Option<String>,
    data: Vec<String>,
    last_event_id: Option<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::with_line_limit(MAX_LINE_BYTES)
    }

    pub fn with_line_limit(line_limit: usize) -> Self {
        Self {
            line: Vec::new(),
            line_limit,
            skip_lf: false,
            event: None,
            data: Vec::new(),
            last_event_id: None,
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseFrame>, SseError> {
        let mut frames = Vec::new();
        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.finish_line(&mut frames),
                b'\r' => {
                    self.finish_line(&mut frames);
                    self.skip_lf = true;
                }
                _ => {
                    if self.line.len() >= self.line_limit {
                        self.line.clear();
                        return Err(SseError::LineTooLong {
                            limit: self.line_limit,
                        });
                    }
                    self.line.push(byte);
                }
            }
        }
        Ok(frames)
    }

    fn finish_line(&mut self, frames: &mut Vec<SseFrame>) {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        if line.is_empty() {
            if let Some(frame) = self.dispatch() {
                frames.push(frame);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" if !value.contains('\0') => self.last_event_id = Some(value.to_string()),
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let data = self.data.join("\n");
        self.data.clear();
        if data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event: event
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data,
            id: self.last_event_id.clone(),
        })
    }
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

type BodyStream = BoxStream<'static, reqwest::Result<Vec<u8>>>;

/// Findings subscription over `GET` + `text/event-stream`. The request is
/// issued on the first poll so connection failures surface as a transport
/// event of the cycle rather than an error from the caller.
pub struct HttpEventSource {
    http: Client,
    url: Url,
    body: Option<BodyStream>,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    opened: bool,
    finished: bool,
}

impl HttpEventSource {
    pub fn new(http: Client, url: Url) -> Self {
        Self {
            http,
            url,
            body: None,
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            opened: false,
            finished: false,
        }
    }

    async fn open(http: Client, url: Url) -> Result<BodyStream, ClientError> {
        let response = http
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_body(status.as_u16(), &body).into());
        }
        info!(url = %url, "sse: findings subscription opened");
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed())
    }

    /// Caps how much of one unterminated line is buffered.
    pub fn with_line_limit(mut self, limit: usize) -> Self {
        self.decoder = SseDecoder::with_line_limit(limit);
        self
    }

    fn fail(&mut self, reason: String) -> InboundEvent {
        self.body = None;
        self.finished = true;
        InboundEvent::TransportError(reason)
    }
}

#[async_trait]
impl EventSource for HttpEventSource {
    async fn next_event(&mut self) -> InboundEvent {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                match frame.event.as_str() {
                    DONE_EVENT => {
                        self.pending.clear();
                        self.finished = true;
                        return InboundEvent::Completed;
                    }
                    DEFAULT_EVENT => return InboundEvent::Message(frame.data),
                    other => {
                        debug!(event = other, "sse: ignoring unhandled named event");
                        continue;
                    }
                }
            }
            if self.finished {
                return InboundEvent::TransportError("findings subscription is closed".to_string());
            }

            let mut body = match self.body.take() {
                Some(body) => body,
                None if self.opened => return self.fail("findings subscription is closed".into()),
                None => {
                    self.opened = true;
                    match Self::open(self.http.clone(), self.url.clone()).await {
                        Ok(body) => body,
                        Err(err) => {
                            warn!(url = %self.url, error = %err, "sse: failed to open findings subscription");
                            return self.fail(format!("failed to open findings stream: {err}"));
                        }
                    }
                }
            };

            match body.next().await {
                Some(Ok(chunk)) => match self.decoder.feed(&chunk) {
                    Ok(frames) => {
                        self.pending.extend(frames);
                        self.body = Some(body);
                    }
                    Err(err) => {
                        warn!(url = %self.url, error = %err, "sse: findings stream rejected");
                        return self.fail(format!("findings stream rejected: {err}"));
                    }
                },
                Some(Err(err)) => return self.fail(format!("findings stream read failed: {err}")),
                None => return self.fail("findings stream ended before completion".into()),
            }
        }
    }

    async fn close(&mut self) {
        if self.body.take().is_some() {
            debug!(url = %self.url, "sse: findings subscription closed");
        }
        self.pending.clear();
        self.finished = true;
    }
}

#[cfg(test)]
#[path = "tests/sse_tests.rs"]
mod tests;
