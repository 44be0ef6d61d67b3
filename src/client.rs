use crate::config::{ClientConfig, Protocol};
use crate::error::{Result, WriteError};
use crate::point::Point;
use crate::timestamp::Precision;
use crate::transport::{HttpTransport, Transport, WriteRequest};
use log::{debug, trace, warn};
use reqwest::Url;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Outcome of a successful flush or single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flushed {
    /// Nothing was buffered; no request was made.
    Empty,
    /// One request carrying `points` records was accepted with `status`.
    Written { points: usize, status: u16 },
}

/// Batching line protocol writer for one database.
///
/// Points are buffered by [`Client::prepare`] and sent as a single request by
/// [`Client::flush`]. Flushing is fire-and-forget with respect to the buffer:
/// the buffer is drained before the request is issued and a failed flush does
/// not restore its points, so an undelivered batch is lost. The error is still
/// returned to the caller.
///
/// Flushes never overlap. A flush started while another is in flight waits
/// for it to finish and then sends whatever is buffered at that moment.
pub struct Client<T: Transport = HttpTransport> {
    config: RwLock<ClientConfig>,
    transport: T,
    pending: Mutex<Vec<Point>>,
    flush_lock: tokio::sync::Mutex<()>,
}

impl Client<HttpTransport> {
    pub fn new(config: ClientConfig) -> Self {
        Client::with_transport(config, HttpTransport::default())
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Self {
        Client {
            config: RwLock::new(config),
            transport,
            pending: Mutex::new(Vec::new()),
            flush_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> ClientConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update_config(&self, update: impl FnOnce(&mut ClientConfig)) {
        let mut config = self.config.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut config);
    }

    pub fn set_protocol(&self, protocol: Protocol) {
        self.update_config(|config| config.protocol = protocol);
    }

    pub fn set_server(&self, server: impl Into<String>) {
        let server = server.into();
        self.update_config(|config| config.server = server);
    }

    /// `None` leaves the port out of the endpoint URL.
    pub fn set_port(&self, port: Option<u16>) {
        self.update_config(|config| config.port = port);
    }

    pub fn set_database(&self, database: impl Into<String>) {
        let database = database.into();
        self.update_config(|config| config.database = database);
    }

    pub fn set_precision(&self, precision: Precision) {
        self.update_config(|config| config.precision = precision);
    }

    pub fn set_request_timeout(&self, timeout: Duration) {
        self.update_config(|config| config.request_timeout = timeout);
    }

    pub fn build_endpoint(&self) -> Result<Url> {
        self.config().build_endpoint()
    }

    /// Queues a point for the next flush. Nothing is encoded yet.
    pub fn prepare(&self, point: Point) {
        self.lock_pending().push(point);
    }

    pub fn pending_len(&self) -> usize {
        self.lock_pending().len()
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<Point>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_pending(&self) -> Vec<Point> {
        std::mem::take(&mut *self.lock_pending())
    }

    /// Sends every buffered point in one request.
    ///
    /// The buffer is emptied whatever the outcome; see the type documentation.
    #[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
    pub async fn flush(&self) -> Result<Flushed> {
        let _in_flight = self.flush_lock.lock().await;

        let function_start = Instant::now();
        let batch = self.take_pending();
        if batch.is_empty() {
            trace!("flush skipped, no pending points");
            return Ok(Flushed::Empty);
        }

        let config = self.config();
        let result = self.write_batch(&config, &batch).await;
        match &result {
            Ok(_) => debug!("flushed {} points to {}", batch.len(), config.database),
            Err(error) => warn!(
                "dropping {} points after failed flush to {}: {}",
                batch.len(),
                config.database,
                error
            ),
        }
        trace!("flush duration: {:?}", function_start.elapsed());
        result
    }

    /// Writes one point immediately, without touching the buffer. The record
    /// is stamped with the current time; an explicit timestamp on the point
    /// is ignored.
    #[tracing::instrument(skip_all, level = tracing::Level::TRACE)]
    pub async fn write_single(&self, point: &Point) -> Result<Flushed> {
        let function_start = Instant::now();
        let config = self.config();
        let result = match point.to_line_now(config.precision) {
            Ok(body) => self.send(&config, body, 1).await,
            Err(error) => Err(error),
        };
        if let Err(error) = &result {
            warn!("single write to {} failed: {}", config.database, error);
        }
        trace!("write_single duration: {:?}", function_start.elapsed());
        result
    }

    async fn write_batch(&self, config: &ClientConfig, batch: &[Point]) -> Result<Flushed> {
        config.build_endpoint()?;
        let body = encode_batch(batch, config.precision)?;
        self.send(config, body, batch.len()).await
    }

    async fn send(&self, config: &ClientConfig, body: String, points: usize) -> Result<Flushed> {
        let url = config.build_endpoint()?;
        let request = WriteRequest {
            url,
            body,
            timeout: config.request_timeout,
        };

        let response = self.transport.post(request).await?;
        if (200..300).contains(&response.status) {
            Ok(Flushed::Written {
                points,
                status: response.status,
            })
        } else {
            Err(WriteError::Server {
                status: response.status,
                body: response.body,
            })
        }
    }
}

impl<T: Transport + 'static> Client<T> {
    /// Runs [`Client::flush`] on a tokio task. The receiver gets exactly one
    /// result.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_flush(self: &Arc<Self>) -> oneshot::Receiver<Result<Flushed>> {
        let (sender, receiver) = oneshot::channel();
        let client = Arc::clone(self);
        tokio::spawn(async move {
            // The caller may have stopped listening
            let _ = sender.send(client.flush().await);
        });
        receiver
    }

    /// Runs [`Client::write_single`] on a tokio task. The receiver gets
    /// exactly one result.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn_write_single(self: &Arc<Self>, point: Point) -> oneshot::Receiver<Result<Flushed>> {
        let (sender, receiver) = oneshot::channel();
        let client = Arc::clone(self);
        tokio::spawn(async move {
            let _ = sender.send(client.write_single(&point).await);
        });
        receiver
    }
}

/// Request body for `batch`: one record per line, no trailing newline.
pub fn encode_batch(batch: &[Point], precision: Precision) -> Result<String> {
    let lines = batch
        .iter()
        .map(|point| point.to_line(precision))
        .collect::<Result<Vec<String>>>()?;
    Ok(lines.join("\n"))
}
