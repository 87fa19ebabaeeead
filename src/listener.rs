//! UDP receive loop
use crate::processor::SnapshotProcessor;
use std::future::Future;
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::UdpSocket;

/// Largest snapshot datagram accepted.
pub const BUFFER_SIZE: usize = 65536;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind UDP port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

pub struct Listener {
    socket: UdpSocket,
}

impl Listener {
    pub async fn bind(port: u16) -> Result<Self, ListenerError> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(|source| ListenerError::Bind { port, source })?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives until `shutdown` resolves. Bad datagrams and receive errors are
    /// counted and logged; neither ends the loop.
    pub async fn run<F>(self, processor: SnapshotProcessor, shutdown: F)
    where
        F: Future,
    {
        tokio::pin!(shutdown);
        let mut buffer = vec![0u8; BUFFER_SIZE];

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    log::info!("Shutdown requested, stopping listener");
                    break;
                }

                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) => {
                            if let Err(e) = processor.process_datagram(&buffer[..len]).await {
                                log::warn!("Discarded {} byte datagram from {}: {}", len, addr, e);
                            }
                        }
                        Err(e) => {
                            log::warn!("UDP receive failed: {}", e);
                            processor.record_receive_error().await;
                        }
                    }
                }
            }
        }
    }
}
