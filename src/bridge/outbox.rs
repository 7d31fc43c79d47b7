use tokio::sync::mpsc;

use crate::domain::OutboundFrame;

/// Cloneable handle for queuing frames to the browser shell. A single writer
/// task owns stdout and drains the receiving side.
#[derive(Debug, Clone)]
pub struct Outbox {
    sender: mpsc::UnboundedSender<OutboundFrame>,
}

impl Outbox {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn send(&self, frame: OutboundFrame) {
        if self.sender.send(frame).is_err() {
            tracing::debug!(target: "bridge", "outbound writer gone; frame dropped");
        }
    }
}
