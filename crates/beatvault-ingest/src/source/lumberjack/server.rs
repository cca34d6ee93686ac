//! Lumberjack TCP listener.

use super::codec::{FrameReader, encode_ack};
use crate::source::{Acknowledger, Batch};
use crate::{Error, Result};
use crossbeam_channel::Sender;
use metrics::{counter, gauge};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

/// Configuration for the Lumberjack listener.
#[derive(Debug, Clone)]
pub struct LumberjackConfig {
    /// Address to listen on.
    pub bind: String,

    /// Interval between keepalive ACKs while a batch is being persisted.
    /// `None` disables keepalives.
    pub keepalive: Option<Duration>,

    /// Largest accepted frame payload, compressed or inflated.
    pub max_payload_bytes: usize,
}

impl Default for LumberjackConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:27044".to_string(),
            keepalive: Some(Duration::from_secs(10)),
            max_payload_bytes: 32 * 1024 * 1024, // 32 MiB
        }
    }
}

/// Accepts shipper connections and forwards decoded batches.
pub struct LumberjackServer {
    listener: TcpListener,
    config: LumberjackConfig,
}

impl LumberjackServer {
    /// Bind the listening socket.
    pub async fn bind(config: LumberjackConfig) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind).await.map_err(|e| {
            Error::Config(format!("couldn't listen on {}: {}", config.bind, e))
        })?;
        Ok(Self { listener, config })
    }

    /// Address actually bound (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections forever.
    ///
    /// Each connection is served by its own task; batches from all
    /// connections are interleaved on `sender`.
    pub async fn serve(self, sender: Sender<Batch>) -> Result<()> {
        tracing::info!(
            "Lumberjack listener accepting connections on {}",
            self.local_addr()?
        );

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("Failed to accept connection: {}", e);
                    continue;
                }
            };

            let sender = sender.clone();
            let config = self.config.clone();
            tokio::spawn(async move {
                gauge!("lumberjack_connections").increment(1.0);
                tracing::debug!("Shipper connected from {}", peer);

                match handle_connection(stream, sender, &config).await {
                    Ok(()) => tracing::debug!("Shipper {} disconnected", peer),
                    Err(e) => {
                        if matches!(e, Error::Protocol(_) | Error::Json(_)) {
                            counter!("lumberjack_protocol_errors_total").increment(1);
                        }
                        tracing::warn!("Closing connection from {}: {}", peer, e);
                    }
                }

                gauge!("lumberjack_connections").decrement(1.0);
            });
        }
    }
}

/// Serve one shipper: read a window, hand it to the pipeline, wait for the
/// commit, ACK, repeat.
async fn handle_connection(
    stream: TcpStream,
    sender: Sender<Batch>,
    config: &LumberjackConfig,
) -> Result<()> {
    stream.set_nodelay(true)?;
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FrameReader::new(BufReader::new(read_half), config.max_payload_bytes);

    while let Some(wire) = frames.read_batch().await? {
        let events = wire.events.len();
        counter!("lumberjack_batches_received_total").increment(1);
        tracing::trace!(
            "Received window of {} events (last seq {})",
            events,
            wire.last_sequence
        );

        let (ack_tx, mut ack_rx) = oneshot::channel::<()>();
        let ack = Acknowledger::new(move || {
            // The connection may be gone already; nothing to report then
            let _ = ack_tx.send(());
        });

        if sender.send(Batch::new(wire.events, ack)).is_err() {
            tracing::info!("Pipeline stopped, dropping batch of {} events", events);
            return Ok(());
        }

        let acked = match config.keepalive {
            Some(period) => {
                let mut keepalive = tokio::time::interval(period);
                keepalive.tick().await;
                loop {
                    tokio::select! {
                        result = &mut ack_rx => break result.is_ok(),
                        _ = keepalive.tick() => {
                            write_half.write_all(&encode_ack(0)).await?;
                        }
                    }
                }
            }
            None => ack_rx.await.is_ok(),
        };

        if !acked {
            // Not committed: close without ACK so the shipper resends
            tracing::warn!(
                "Batch of {} events was not stored, closing connection",
                events
            );
            return Ok(());
        }

        write_half.write_all(&encode_ack(wire.last_sequence)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::lumberjack::codec::client;
    use crossbeam_channel::Receiver;
    use serde_json::json;
    use tokio::io::AsyncReadExt;

    async fn start(keepalive: Option<Duration>) -> (SocketAddr, Receiver<Batch>) {
        let server = LumberjackServer::bind(LumberjackConfig {
            bind: "127.0.0.1:0".to_string(),
            keepalive,
            max_payload_bytes: 1024 * 1024,
        })
        .await
        .unwrap();
        let addr = server.local_addr().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        tokio::spawn(server.serve(tx));
        (addr, rx)
    }

    async fn next_batch(rx: &Receiver<Batch>) -> Batch {
        let rx = rx.clone();
        tokio::task::spawn_blocking(move || rx.recv_timeout(Duration::from_secs(5)))
            .await
            .unwrap()
            .expect("batch not received")
    }

    async fn read_ack(stream: &mut TcpStream) -> u32 {
        let mut frame = [0u8; 6];
        stream.read_exact(&mut frame).await.unwrap();
        assert_eq!(&frame[..2], b"2A");
        u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]])
    }

    fn window_of(n: u32) -> Vec<u8> {
        let mut bytes = client::window(n);
        for seq in 1..=n {
            bytes.extend(client::json(
                seq,
                &json!({"source": "/var/log/a.log", "beat": {"name": "h1"}, "seq": seq}),
            ));
        }
        bytes
    }

    #[tokio::test]
    async fn test_ack_sent_after_acknowledger_fires() {
        let (addr, rx) = start(None).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&window_of(2)).await.unwrap();

        let batch = next_batch(&rx).await;
        assert_eq!(batch.events.len(), 2);
        assert_eq!(batch.events[0]["seq"], 1);

        // Nothing is acked before the pipeline says so
        let mut probe = [0u8; 1];
        let early = tokio::time::timeout(Duration::from_millis(100), stream.peek(&mut probe)).await;
        assert!(early.is_err());

        batch.ack.ack();
        assert_eq!(read_ack(&mut stream).await, 2);
    }

    #[tokio::test]
    async fn test_dropped_acknowledger_closes_connection() {
        let (addr, rx) = start(None).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&window_of(1)).await.unwrap();

        drop(next_batch(&rx).await);

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn test_keepalive_while_waiting() {
        let (addr, rx) = start(Some(Duration::from_millis(20))).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(&window_of(3)).await.unwrap();

        let batch = next_batch(&rx).await;
        assert_eq!(read_ack(&mut stream).await, 0);

        batch.ack.ack();
        let mut seq = 0;
        while seq == 0 {
            seq = read_ack(&mut stream).await;
        }
        assert_eq!(seq, 3);
    }

    #[tokio::test]
    async fn test_sequential_windows_on_one_connection() {
        let (addr, rx) = start(None).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();

        for n in [1u32, 2] {
            stream.write_all(&window_of(n)).await.unwrap();
            let batch = next_batch(&rx).await;
            assert_eq!(batch.events.len(), n as usize);
            batch.ack.ack();
            assert_eq!(read_ack(&mut stream).await, n);
        }
    }

    #[tokio::test]
    async fn test_protocol_error_closes_connection() {
        let (addr, rx) = start(None).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"1W\x00\x00\x00\x01").await.unwrap();

        // Unread bytes may turn the close into a reset
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf).await;
        assert!(buf.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
