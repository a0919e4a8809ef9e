//! The hardest subsystem: one TCP connection per Feature, a bounded
//! outbound queue, batching, non-blocking connect with timeout, send
//! timeout, response demultiplexing, reconnect cool-down, and
//! bytes-per-second accounting.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, Notify, RwLock as AsyncRwLock};
use tokio::task::JoinHandle;

use crate::wire::{ClientResponse, CLIENT_RESPONSE_SIZE, LEGACY_CLIENT_RESPONSE_SIZE};

/// Outbound queue depth at which the channel sheds load.
pub const MAX_QUEUE_DEPTH: usize = 100;
/// Frames drained into one send buffer at most.
pub const MAX_BATCH_SIZE: usize = 20;
/// Maximum time a frame waits in the queue before a send is forced.
pub const MAX_BATCH_DELAY: Duration = Duration::from_millis(250);
/// Deadline for establishing a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(2000);
/// Deadline for a single send to complete.
pub const SEND_TIMEOUT: Duration = Duration::from_millis(3000);
/// Minimum spacing between connect attempts to the same host.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(1000);
/// Worker idle wait between iterations; bounds `Stop()` latency.
const IDLE_SLEEP: Duration = Duration::from_millis(1);
/// Window over which bytes-per-second is measured.
const BPS_WINDOW: Duration = Duration::from_secs(3);

/// Connection lifecycle state, reported to the REST layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Connected,
    Failed,
    Stopped,
}

/// Owns a TCP connection to one client, its outbound queue, and the
/// response stream. Shared state (queue, stats, last response) is exposed
/// through `&self` methods so the REST layer can read it without touching
/// the worker's socket. The socket itself is owned exclusively by the
/// worker task spawned in `spawn`.
pub struct SocketChannel {
    host: String,
    port: u16,
    friendly_name: String,

    queue: AsyncMutex<VecDeque<Bytes>>,
    notify: Notify,

    running: AtomicBool,
    connected: AtomicBool,
    close_requested: AtomicBool,
    state: StdMutex<ChannelState>,

    reconnect_count: AtomicU64,
    bytes_sent_window: AtomicU64,
    window_start: AsyncMutex<Instant>,

    last_client_response: AsyncRwLock<Option<ClientResponse>>,
    last_connection_attempt: AsyncMutex<Option<Instant>>,
    last_send_time: AsyncMutex<Instant>,

    join_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl SocketChannel {
    /// Constructs and starts a channel's worker task, returning a shared
    /// handle. The worker begins in `Idle` and attempts its first connect
    /// on the first loop iteration.
    pub fn spawn(host: impl Into<String>, friendly_name: impl Into<String>, port: u16) -> std::sync::Arc<SocketChannel> {
        let channel = std::sync::Arc::new(SocketChannel {
            host: host.into(),
            port,
            friendly_name: friendly_name.into(),
            queue: AsyncMutex::new(VecDeque::new()),
            notify: Notify::new(),
            running: AtomicBool::new(true),
            connected: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            state: StdMutex::new(ChannelState::Idle),
            reconnect_count: AtomicU64::new(0),
            bytes_sent_window: AtomicU64::new(0),
            window_start: AsyncMutex::new(Instant::now()),
            last_client_response: AsyncRwLock::new(None),
            last_connection_attempt: AsyncMutex::new(None),
            last_send_time: AsyncMutex::new(Instant::now() - MAX_BATCH_DELAY),
            join_handle: StdMutex::new(None),
        });

        let worker = channel.clone();
        let handle = tokio::spawn(async move { worker.run().await });
        *channel.join_handle.lock().unwrap() = Some(handle);
        channel
    }

    pub fn host_name(&self) -> &str {
        &self.host
    }

    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }

    pub async fn last_client_response(&self) -> Option<ClientResponse> {
        *self.last_client_response.read().await
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn bytes_per_second(&self) -> f64 {
        let mut window_start = self.window_start.lock().await;
        let elapsed = window_start.elapsed().as_secs_f64();
        let bytes = self.bytes_sent_window.load(Ordering::Relaxed);
        let bps = if elapsed > 0.0 { bytes as f64 / elapsed } else { 0.0 };
        if elapsed >= BPS_WINDOW.as_secs_f64() {
            self.bytes_sent_window.store(0, Ordering::Relaxed);
            *window_start = Instant::now();
        }
        bps
    }

    /// Non-blocking. If the queue is at `MAX_QUEUE_DEPTH`, drops the
    /// incoming frame, drains the queue, and force-closes the socket
    /// (forcing reconnect on the next send), returning `false`. Otherwise
    /// pushes the frame and wakes the worker, returning `true`.
    pub async fn enqueue(&self, frame: Bytes) -> bool {
        let mut queue = self.queue.lock().await;
        if queue.len() >= MAX_QUEUE_DEPTH {
            queue.clear();
            drop(queue);
            let overflow = crate::error::Error::Overflow(format!(
                "{}:{} queue reached {MAX_QUEUE_DEPTH} frames, dropping incoming frame and forcing reconnect",
                self.host, self.port
            ));
            log::warn!("{overflow}");
            self.force_close();
            return false;
        }
        queue.push_back(frame);
        drop(queue);
        self.notify.notify_one();
        true
    }

    /// Requests that the worker close its socket on its next iteration.
    /// Does not touch the queue mutex — callers that detect overflow must
    /// already have released it, per the deadlock-avoidance rule.
    fn force_close(&self) {
        self.close_requested.store(true, Ordering::Release);
        self.connected.store(false, Ordering::Release);
        self.notify.notify_one();
    }

    /// Idempotent. Safe to call from another task; returns only after the
    /// worker has exited, leaving `is_connected() == false`.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.notify.notify_one();
        let handle = self.join_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.connected.store(false, Ordering::Release);
        *self.state.lock().unwrap() = ChannelState::Stopped;
    }

    async fn run(self: std::sync::Arc<Self>) {
        let mut socket: Option<TcpStream> = None;

        loop {
            if !self.running.load(Ordering::Acquire) {
                break;
            }

            if self.close_requested.swap(false, Ordering::AcqRel) {
                if let Some(mut s) = socket.take() {
                    let _ = s.shutdown().await;
                }
            }

            if socket.is_none() {
                *self.state.lock().unwrap() = ChannelState::Connecting;
                socket = self.try_connect().await;
                if socket.is_none() {
                    *self.state.lock().unwrap() = ChannelState::Failed;
                    if !self.running.load(Ordering::Acquire) {
                        break;
                    }
                    continue;
                }
                *self.state.lock().unwrap() = ChannelState::Connected;
            }

            let last_send = *self.last_send_time.lock().await;
            let time_to_send = last_send.elapsed() >= MAX_BATCH_DELAY;
            let queue_len = self.queue.lock().await.len();

            if queue_len > 0 && (queue_len >= MAX_BATCH_SIZE || time_to_send) {
                let batch = self.drain_batch().await;
                if !batch.is_empty() {
                    self.send_batch(&mut socket, batch).await;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(IDLE_SLEEP) => {}
                _ = self.notify.notified() => {}
            }
        }

        if let Some(mut s) = socket.take() {
            let _ = s.shutdown().await;
        }
        self.connected.store(false, Ordering::Release);
        self.queue.lock().await.clear();
    }

    async fn try_connect(&self) -> Option<TcpStream> {
        {
            let mut last_attempt = self.last_connection_attempt.lock().await;
            if let Some(prev) = *last_attempt {
                let elapsed = prev.elapsed();
                if elapsed < RECONNECT_DELAY {
                    tokio::time::sleep(RECONNECT_DELAY - elapsed).await;
                }
            }
            *last_attempt = Some(Instant::now());
        }

        let addr = format!("{}:{}", self.host, self.port);
        match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                let _ = stream.set_nodelay(true);
                self.connected.store(true, Ordering::Release);
                self.reconnect_count.fetch_add(1, Ordering::Relaxed);
                log::debug!("connected to {addr}");
                Some(stream)
            }
            Ok(Err(e)) => {
                log::debug!("connect to {addr} failed: {e}");
                self.connected.store(false, Ordering::Release);
                None
            }
            Err(_) => {
                log::debug!("connect to {addr} timed out after {CONNECT_TIMEOUT:?}");
                self.connected.store(false, Ordering::Release);
                None
            }
        }
    }

    async fn drain_batch(&self) -> Vec<Bytes> {
        let mut queue = self.queue.lock().await;
        let n = queue.len().min(MAX_BATCH_SIZE);
        queue.drain(..n).collect()
    }

    async fn send_batch(&self, socket: &mut Option<TcpStream>, batch: Vec<Bytes>) {
        let mut combined = BytesMut::new();
        for frame in &batch {
            combined.extend_from_slice(frame);
        }

        let stream = match socket.as_mut() {
            Some(s) => s,
            None => return,
        };

        match tokio::time::timeout(SEND_TIMEOUT, stream.write_all(&combined)).await {
            Ok(Ok(())) => {
                self.bytes_sent_window.fetch_add(combined.len() as u64, Ordering::Relaxed);
                *self.last_send_time.lock().await = Instant::now();
                self.drain_responses(stream).await;
            }
            Ok(Err(e)) => {
                log::debug!("send to {}:{} failed: {e}", self.host, self.port);
                *socket = None;
                self.connected.store(false, Ordering::Release);
            }
            Err(_) => {
                log::debug!("send to {}:{} timed out after {SEND_TIMEOUT:?}", self.host, self.port);
                *socket = None;
                self.connected.store(false, Ordering::Release);
            }
        }
    }

    /// Repeatedly attempts to read response frames with a zero-timeout
    /// readiness poll. Keeps only the last successfully decoded response.
    async fn drain_responses(&self, stream: &mut TcpStream) {
        loop {
            match tokio::time::timeout(Duration::from_millis(0), stream.readable()).await {
                Ok(Ok(())) => {}
                _ => break,
            }

            let mut peek_buf = [0u8; 1];
            let len_byte = match stream.peek(&mut peek_buf).await {
                Ok(0) => break,
                Ok(_) => peek_buf[0] as usize,
                Err(_) => break,
            };

            if len_byte == CLIENT_RESPONSE_SIZE {
                let mut buf = [0u8; CLIENT_RESPONSE_SIZE];
                if stream.read_exact(&mut buf).await.is_err() {
                    break;
                }
                if let Some(response) = ClientResponse::decode(&buf) {
                    *self.last_client_response.write().await = Some(response);
                }
            } else if len_byte == LEGACY_CLIENT_RESPONSE_SIZE {
                let mut buf = [0u8; LEGACY_CLIENT_RESPONSE_SIZE];
                if stream.read_exact(&mut buf).await.is_err() {
                    break;
                }
                if let Some(response) = ClientResponse::decode_legacy(&buf) {
                    *self.last_client_response.write().await = Some(response);
                }
            } else {
                // Protocol desync: consume and discard the stray bytes.
                let discard_len = len_byte.max(1);
                let mut discard = vec![0u8; discard_len];
                if stream.read_exact(&mut discard).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn queue_sheds_load_at_capacity() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections but never read, so the queue backs up.
        tokio::spawn(async move {
            loop {
                let _ = listener.accept().await;
            }
        });

        let channel = SocketChannel::spawn(addr.ip().to_string(), "test", addr.port());
        // Fill the queue directly to avoid racing the worker's own drains.
        {
            let mut queue = channel.queue.lock().await;
            for _ in 0..MAX_QUEUE_DEPTH {
                queue.push_back(Bytes::from_static(b"frame"));
            }
        }
        let accepted = channel.enqueue(Bytes::from_static(b"overflow")).await;
        assert!(!accepted);
        assert_eq!(channel.queue_len().await, 0);

        channel.stop().await;
    }

    #[tokio::test]
    async fn stop_leaves_disconnected() {
        let channel = SocketChannel::spawn("127.0.0.1", "test", 1); // unroutable port, stays disconnected
        channel.stop().await;
        assert!(!channel.is_connected());
    }
}
