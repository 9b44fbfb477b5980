// ── Reply transmission ──
//
// One explicit `send_to` per reply, to the address the request came from.
// Sending goes through `DatagramSocket` so the pipeline can be driven
// without a network.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::CoreError;

/// The one socket operation replies need.
#[async_trait]
pub trait DatagramSocket: Send + Sync {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize>;
}

#[async_trait]
impl DatagramSocket for UdpSocket {
    async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
        UdpSocket::send_to(self, buf, target).await
    }
}

#[derive(Clone)]
pub struct Transmitter {
    socket: Arc<dyn DatagramSocket>,
}

impl Transmitter {
    pub fn new(socket: Arc<dyn DatagramSocket>) -> Self {
        Self { socket }
    }

    /// Send one encoded reply. A short write counts as a failure.
    pub async fn send(&self, bytes: &[u8], destination: SocketAddr) -> Result<(), CoreError> {
        match self.socket.send_to(bytes, destination).await {
            Ok(sent) if sent == bytes.len() => {
                trace!(%destination, bytes = sent, "reply sent");
                Ok(())
            }
            Ok(sent) => Err(CoreError::Transmit {
                destination,
                reason: format!("short send: {sent} of {} bytes", bytes.len()),
            }),
            Err(e) => Err(CoreError::Transmit {
                destination,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every datagram instead of sending it.
    #[derive(Default)]
    pub(crate) struct RecordingSocket {
        pub(crate) sent: Mutex<Vec<(Vec<u8>, SocketAddr)>>,
        pub(crate) fail: bool,
        pub(crate) truncate: bool,
    }

    impl RecordingSocket {
        pub(crate) fn sent(&self) -> Vec<(Vec<u8>, SocketAddr)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DatagramSocket for RecordingSocket {
        async fn send_to(&self, buf: &[u8], target: SocketAddr) -> io::Result<usize> {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::HostUnreachable, "no route"));
            }
            self.sent.lock().unwrap().push((buf.to_vec(), target));
            Ok(if self.truncate { buf.len() / 2 } else { buf.len() })
        }
    }

    fn dest() -> SocketAddr {
        "10.0.0.2:50000".parse().unwrap()
    }

    #[tokio::test]
    async fn sends_to_the_given_destination() {
        let socket = Arc::new(RecordingSocket::default());
        let tx = Transmitter::new(socket.clone());
        tx.send(b"reply", dest()).await.unwrap();
        assert_eq!(socket.sent(), vec![(b"reply".to_vec(), dest())]);
    }

    #[tokio::test]
    async fn socket_errors_surface_as_transmit_errors() {
        let socket = Arc::new(RecordingSocket { fail: true, ..Default::default() });
        let err = Transmitter::new(socket).send(b"reply", dest()).await.unwrap_err();
        assert!(matches!(err, CoreError::Transmit { destination, .. } if destination == dest()));
    }

    #[tokio::test]
    async fn short_send_is_an_error() {
        let socket = Arc::new(RecordingSocket { truncate: true, ..Default::default() });
        let err = Transmitter::new(socket).send(b"reply", dest()).await.unwrap_err();
        assert_eq!(err.to_string(), "Send to 10.0.0.2:50000 failed: short send: 2 of 5 bytes");
    }

    #[tokio::test]
    async fn real_udp_socket_delivers() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        Transmitter::new(sender)
            .send(b"ping", receiver.local_addr().unwrap())
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"ping");
    }
}
