//! Buffered, non-blocking InfluxDB v2 writer
//!
//! Points are handed to an actor task over a bounded mpsc channel. The actor
//! encodes them to line protocol and flushes a batch over HTTP whenever the
//! batch fills up or the flush interval elapses, whichever comes first.
//! Failed writes are logged and dropped; nothing is retried.

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::point::Point;
use super::trait_def::MetricsWriter;
use crate::config::{TrackerConfig, WriterConfig};
use crate::error::{TrackerError, TrackerResult};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("request to InfluxDB failed")]
    Request(#[from] reqwest::Error),
    #[error("InfluxDB rejected write with status {status}: {body}")]
    Rejected { status: StatusCode, body: String },
}

/// Thin client for the `/api/v2/write` endpoint
#[derive(Clone)]
pub struct WriteClient {
    http: Client,
    write_url: Url,
    auth_header: String,
}

impl WriteClient {
    pub fn new(config: &TrackerConfig, request_timeout: Duration) -> TrackerResult<Self> {
        config.validate()?;

        let base = config.influxdb_url.trim_end_matches('/');
        let mut write_url = Url::parse(&format!("{}/api/v2/write", base)).map_err(|e| {
            TrackerError::InvalidUrl {
                url: config.influxdb_url.clone(),
                reason: e.to_string(),
            }
        })?;
        write_url
            .query_pairs_mut()
            .append_pair("org", &config.influxdb_org)
            .append_pair("bucket", &config.influxdb_bucket)
            .append_pair("precision", "ns");

        let http = Client::builder()
            .user_agent(concat!("visitor-tracker/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(TrackerError::HttpClient)?;

        Ok(Self {
            http,
            write_url,
            auth_header: format!("Token {}", config.influxdb_token),
        })
    }

    pub fn write_url(&self) -> &Url {
        &self.write_url
    }

    /// POST a newline-separated line protocol body.
    pub async fn write(&self, body: String) -> Result<(), WriteError> {
        let response = self
            .http
            .post(self.write_url.clone())
            .header(header::AUTHORIZATION, &self.auth_header)
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(WriteError::Rejected { status, body })
    }
}

/// Message types for the WriterActor
enum WriterMessage {
    Point(Point),
    /// Flush everything and stop; the sender is notified once done
    Close(oneshot::Sender<()>),
}

struct WriterActor {
    receiver: mpsc::Receiver<WriterMessage>,
    client: WriteClient,
    /// Encoded lines awaiting the next flush
    batch: Vec<String>,
    batch_size: usize,
    flush_interval: Duration,
}

impl WriterActor {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.flush_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        // Skip the first tick which fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                msg = self.receiver.recv() => match msg {
                    Some(WriterMessage::Point(point)) => {
                        self.batch.push(point.to_line_protocol());
                        if self.batch.len() >= self.batch_size {
                            self.flush().await;
                        }
                    }
                    Some(WriterMessage::Close(done)) => {
                        info!("InfluxDB writer closing, flushing {} buffered points", self.batch.len());
                        self.flush().await;
                        let _ = done.send(());
                        break;
                    }
                    None => {
                        warn!("InfluxDB writer channel closed unexpectedly, flushing...");
                        self.flush().await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }
    }

    async fn flush(&mut self) {
        if self.batch.is_empty() {
            return;
        }

        let lines = std::mem::take(&mut self.batch);
        let count = lines.len();

        match self.client.write(lines.join("\n")).await {
            Ok(()) => debug!(points = count, "Flushed visitor points to InfluxDB"),
            Err(e) => error!(points = count, error = %e, "Failed to write visitor points to InfluxDB"),
        }
    }
}

/// Process-wide handle to the writer actor. Cheap to share behind an `Arc`;
/// submission only touches the channel.
pub struct InfluxWriter {
    sender: mpsc::Sender<WriterMessage>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl InfluxWriter {
    /// Validate credentials and spawn the writer actor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &TrackerConfig, writer: &WriterConfig) -> TrackerResult<Self> {
        let client = WriteClient::new(config, Duration::from_secs(writer.request_timeout_secs))?;
        Ok(Self::with_client(client, writer))
    }

    pub fn with_client(client: WriteClient, writer: &WriterConfig) -> Self {
        let (sender, receiver) = mpsc::channel(writer.buffer_capacity.max(1));

        let actor = WriterActor {
            receiver,
            client,
            batch: Vec::with_capacity(writer.batch_size.min(1024)),
            batch_size: writer.batch_size.max(1),
            flush_interval: Duration::from_millis(writer.flush_interval_ms.max(1)),
        };

        let task = tokio::spawn(async move {
            actor.run().await;
        });

        Self {
            sender,
            task: Mutex::new(Some(task)),
        }
    }
}

#[async_trait]
impl MetricsWriter for InfluxWriter {
    fn write_point(&self, point: Point) {
        match self.sender.try_send(WriterMessage::Point(point)) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Visitor point buffer full, dropping point");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("InfluxDB writer is closed, dropping point");
            }
        }
    }

    async fn close(&self) {
        let Some(task) = self.task.lock().await.take() else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(WriterMessage::Close(done_tx)).await.is_ok() {
            let _ = done_rx.await;
        }

        if let Err(e) = task.await {
            error!("InfluxDB writer task ended abnormally: {}", e);
        }
    }
}
