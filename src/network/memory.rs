//! In-memory transport
//!
//! Connects two controllers inside one process. Every message still goes
//! through the frame codec so both ends see exactly what the wire would
//! deliver, minus the socket.

use bytes::BytesMut;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::sync::mpsc;

use super::Transport;
use crate::protocol::{FailureKind, Frame, FrameDecoder, FrameEncoder, Message, NetFailure};

/// One end of an in-memory connection
pub struct MemoryTransport {
    peer: mpsc::UnboundedSender<Frame>,
    own: mpsc::UnboundedSender<Frame>,
    inbound: mpsc::UnboundedReceiver<Frame>,
    encoder: FrameEncoder,
    failed: bool,
    closed: bool,
}

impl MemoryTransport {
    /// Two connected ends, each already holding its `Connect` event
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = Self::new(b_tx.clone(), a_tx.clone(), a_rx);
        let b = Self::new(a_tx, b_tx, b_rx);

        a.inject(Frame::Message(Message::Connect {
            remote: Self::address(2),
        }));
        b.inject(Frame::Message(Message::Connect {
            remote: Self::address(1),
        }));
        (a, b)
    }

    fn new(
        peer: mpsc::UnboundedSender<Frame>,
        own: mpsc::UnboundedSender<Frame>,
        inbound: mpsc::UnboundedReceiver<Frame>,
    ) -> Self {
        Self {
            peer,
            own,
            inbound,
            encoder: FrameEncoder::new(),
            failed: false,
            closed: false,
        }
    }

    fn address(host: u8) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::new(127, 0, 0, host), 0))
    }

    /// Push a frame into this end's inbound queue as if it had arrived
    pub fn inject(&self, frame: Frame) {
        let _ = self.own.send(frame);
    }

    /// Whether `close` has been called on this end
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn transmit(&self, message: &Message) {
        let mut buf = BytesMut::new();
        let decoded = self
            .encoder
            .encode(message, &mut buf)
            .and_then(|()| FrameDecoder::new().decode(&mut buf));

        match decoded {
            Ok(Some(frame)) => {
                let _ = self.peer.send(frame);
            }
            Ok(None) => {
                tracing::warn!("Incomplete in-memory frame for {:?}", message.opcode());
            }
            Err(e) => {
                let failure = NetFailure::new(FailureKind::Malformed, format!("Networking crashed: {}", e));
                self.inject(Frame::Message(Message::Err(failure)));
            }
        }
    }
}

impl Transport for MemoryTransport {
    fn send(&self, message: Message) {
        if self.closed {
            tracing::debug!("Dropping {:?} sent after close", message.opcode());
            return;
        }
        if matches!(message, Message::Connect { .. } | Message::Err(_)) {
            tracing::warn!("Not sending local-only event {:?}", message.opcode());
            return;
        }
        self.transmit(&message);
    }

    fn try_receive(&mut self) -> Option<Frame> {
        if self.failed {
            return None;
        }
        let frame = self.inbound.try_recv().ok()?;
        if matches!(frame, Frame::Message(Message::Err(_))) {
            self.failed = true;
        }
        Some(frame)
    }

    fn close(&mut self) {
        if !self.closed {
            self.transmit(&Message::Disconnect);
            self.closed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_connect_then_messages() {
        let (mut a, mut b) = MemoryTransport::pair();
        assert!(matches!(
            a.try_receive(),
            Some(Frame::Message(Message::Connect { .. }))
        ));
        assert!(matches!(
            b.try_receive(),
            Some(Frame::Message(Message::Connect { .. }))
        ));

        a.send(Message::Start);
        a.send(Message::EndGame { outcome: None });
        assert_eq!(b.try_receive(), Some(Frame::Message(Message::Start)));
        assert_eq!(
            b.try_receive(),
            Some(Frame::Message(Message::EndGame { outcome: None }))
        );
        assert!(b.try_receive().is_none());
        assert!(a.try_receive().is_none());
    }

    #[test]
    fn test_error_latches() {
        let (mut a, _b) = MemoryTransport::pair();
        a.try_receive();

        let failure = NetFailure::new(FailureKind::Transport, "Network error: reset");
        a.inject(Frame::Message(Message::Err(failure)));
        a.inject(Frame::Message(Message::Start));

        assert!(matches!(a.try_receive(), Some(Frame::Message(Message::Err(_)))));
        assert!(a.try_receive().is_none());
    }

    #[test]
    fn test_close_says_goodbye_once() {
        let (mut a, mut b) = MemoryTransport::pair();
        b.try_receive();

        a.close();
        a.close();
        a.send(Message::Start);
        assert!(a.is_closed());

        assert_eq!(b.try_receive(), Some(Frame::Message(Message::Disconnect)));
        assert!(b.try_receive().is_none());
    }

    #[test]
    fn test_local_only_events_stay_local() {
        let (a, mut b) = MemoryTransport::pair();
        b.try_receive();

        a.send(Message::Connect {
            remote: SocketAddr::from(([127, 0, 0, 1], 1)),
        });
        assert!(b.try_receive().is_none());
    }
}
