//! Server-Sent Events transport for the push channel.
//!
//! The push endpoint streams one JSON envelope per `data:` frame. The
//! listener task keeps the stream open, reconnecting after a fixed delay
//! whenever it ends, and hands every frame to the [`PushHub`].

use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{NetError, Result};
use crate::push::PushHub;

/// Incremental decoder turning raw SSE bytes into `data` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the payloads of every frame it completed.
    ///
    /// Multiple `data:` lines in one frame are joined with `\n`. Comment
    /// lines (`:keep-alive`) and other fields are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some((end, sep_len)) = find_frame_end(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..end + sep_len).collect();
            let text = String::from_utf8_lossy(&frame[..end]);

            let data: Vec<&str> = text
                .lines()
                .filter_map(|line| line.strip_prefix("data:"))
                .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
                .collect();

            if !data.is_empty() {
                payloads.push(data.join("\n"));
            }
        }
        payloads
    }
}

/// Position and length of the first blank-line separator.
fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| (i, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

/// Handle to the background listener. Aborts the task on drop.
#[derive(Debug)]
pub struct PushListener {
    task: JoinHandle<()>,
}

impl PushListener {
    pub fn shutdown(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PushListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A client suited to long-lived streams: connection attempts time out,
/// the stream itself never does.
pub fn stream_client(connect_timeout: Duration) -> Result<Client> {
    Ok(Client::builder().connect_timeout(connect_timeout).build()?)
}

/// Spawn the task that keeps the push stream at `url` connected.
///
/// `http` must not carry a request timeout: it would cut the stream. See
/// [`stream_client`].
pub fn spawn_push_listener(
    http: Client,
    url: String,
    api_token: Option<String>,
    hub: PushHub,
    reconnect_delay: Duration,
) -> PushListener {
    let task = tokio::spawn(async move {
        info!(url = %url, "Push listener started");
        loop {
            match stream_once(&http, &url, api_token.as_deref(), &hub).await {
                Ok(frames) => info!(frames, "Push stream ended"),
                Err(e) => warn!(error = %e, "Push stream failed"),
            }
            tokio::time::sleep(reconnect_delay).await;
            debug!(url = %url, "Reconnecting push stream");
        }
    });
    PushListener { task }
}

/// Consume one connection until the server closes it. Returns frames seen.
async fn stream_once(
    http: &Client,
    url: &str,
    api_token: Option<&str>,
    hub: &PushHub,
) -> Result<usize> {
    let mut rb = http
        .get(url)
        .header(reqwest::header::ACCEPT, "text/event-stream");
    if let Some(token) = api_token {
        rb = rb.bearer_auth(token);
    }

    let resp = rb.send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(NetError::Status {
            status: status.as_u16(),
            body: resp.text().await.unwrap_or_default(),
        });
    }

    let mut decoder = SseDecoder::new();
    let mut frames = 0usize;
    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk: bytes::Bytes = chunk?;
        for payload in decoder.push(&chunk) {
            frames += 1;
            let delivered = hub.dispatch_raw(&payload);
            debug!(delivered, "Push frame dispatched");
        }
    }
    Ok(frames)
}
