//! Stream Module
//!
//! WebSocket reader for the device's sample stream. The connection is
//! dialed and read on a background task; decoded samples and the first
//! fatal error are handed to the consumer over separate channels.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::sample::{Sample, Schema};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Default capacity of the sample handoff channel
pub const DEFAULT_BUFFER: usize = 32;

/// Upper bound on sending the final close frame
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Fatal stream errors
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("failed to connect to {url}")]
    Connect {
        url: String,
        #[source]
        source: tungstenite::Error,
    },
    #[error("stream read failed")]
    Read(#[source] tungstenite::Error),
    #[error("failed to send close frame")]
    Close(#[source] tungstenite::Error),
    #[error("close frame not sent within {0:?}")]
    CloseTimeout(Duration),
}

/// Reader settings
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub schema: Schema,
    /// Capacity of the sample channel; the reader blocks when it is full.
    pub buffer: usize,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>, schema: Schema) -> Self {
        StreamConfig {
            url: url.into(),
            schema,
            buffer: DEFAULT_BUFFER,
        }
    }
}

/// Consumer side of a running sample stream
pub struct SampleStream {
    pub samples: mpsc::Receiver<Sample>,
    pub errors: mpsc::Receiver<StreamError>,
    pub closer: Closer,
}

/// Sends the final close frame on behalf of the consumer.
///
/// The write half of the socket is parked here once the reader has
/// connected and removed again when the reader exits, so closing before
/// connect or after the stream ended is a no-op.
#[derive(Clone, Default)]
pub struct Closer {
    sink: Arc<Mutex<Option<WsSink>>>,
}

impl Closer {
    /// Send a normal-closure close frame without waiting for the peer's reply.
    ///
    /// Gives up after [`CLOSE_TIMEOUT`] so a stalled socket cannot hold up
    /// shutdown.
    pub async fn close(&self) -> Result<(), StreamError> {
        let send = async {
            let mut slot = self.sink.lock().await;
            match slot.as_mut() {
                Some(sink) => {
                    let frame = CloseFrame {
                        code: CloseCode::Normal,
                        reason: "".into(),
                    };
                    sink.send(Message::Close(Some(frame)))
                        .await
                        .map_err(StreamError::Close)
                }
                None => {
                    tracing::debug!("close requested but no connection is open");
                    Ok(())
                }
            }
        };

        match tokio::time::timeout(CLOSE_TIMEOUT, send).await {
            Ok(result) => result,
            Err(_) => Err(StreamError::CloseTimeout(CLOSE_TIMEOUT)),
        }
    }
}

/// Dial `config.url` on a background task and start streaming samples.
///
/// Must be called from within a tokio runtime.
pub fn stream_samples(config: StreamConfig) -> SampleStream {
    let (samples_tx, samples) = mpsc::channel(config.buffer.max(1));
    let (errors_tx, errors) = mpsc::channel(1);
    let closer = Closer::default();

    tokio::spawn(read_loop(config, samples_tx, errors_tx, closer.clone()));

    SampleStream {
        samples,
        errors,
        closer,
    }
}

async fn read_loop(
    config: StreamConfig,
    samples: mpsc::Sender<Sample>,
    errors: mpsc::Sender<StreamError>,
    closer: Closer,
) {
    let ws = match connect_async(config.url.as_str()).await {
        Ok((ws, _response)) => ws,
        Err(source) => {
            let _ = errors
                .send(StreamError::Connect {
                    url: config.url,
                    source,
                })
                .await;
            return;
        }
    };
    tracing::info!(url = %config.url, "connected");

    let (write, mut read) = ws.split();
    *closer.sink.lock().await = Some(write);

    loop {
        let message = match read.next().await {
            Some(Ok(message)) => message,
            // Close handshake already completed
            Some(Err(tungstenite::Error::ConnectionClosed)) | None => break,
            Some(Err(e)) => {
                let _ = errors.send(StreamError::Read(e)).await;
                break;
            }
        };

        let payload = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            // Keep reading so tungstenite flushes its close reply; the stream
            // ends with `ConnectionClosed` once the handshake is done.
            Message::Close(frame) => {
                tracing::debug!(?frame, "peer closed the stream");
                continue;
            }
            _ => continue,
        };

        match config.schema.decode(&payload) {
            Ok(sample) => {
                if samples.send(sample).await.is_err() {
                    tracing::debug!("sample consumer dropped, stopping reader");
                    break;
                }
            }
            Err(e) => tracing::warn!("dropping frame: {}", e),
        }
    }

    // Releasing the write half drops the connection together with `read`.
    closer.sink.lock().await.take();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        assert!(Closer::default().close().await.is_ok());
    }

    #[tokio::test]
    async fn test_close_gives_up_when_socket_is_busy() {
        let closer = Closer::default();
        let _held = closer.sink.lock().await;

        let started = std::time::Instant::now();
        let err = closer.close().await.unwrap_err();

        assert!(matches!(err, StreamError::CloseTimeout(t) if t == CLOSE_TIMEOUT));
        assert!(started.elapsed() < CLOSE_TIMEOUT * 3);
    }
}
