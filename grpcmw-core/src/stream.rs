//! Bidirectional stream handles for streaming calls.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::call::Message;
use crate::status::Status;

/// One end of a bidirectional message stream.
///
/// The RPC framework supplies the real implementation. Interceptors may wrap
/// it (see [`StreamCall::map_stream`](crate::StreamCall::map_stream)) to
/// observe or rewrite traffic.
#[async_trait]
pub trait MessageStream: Send {
    /// Receive the next message; `Ok(None)` once the peer has finished sending.
    async fn recv(&mut self) -> Result<Option<Message>, Status>;

    /// Send a message to the peer.
    async fn send(&mut self, message: Message) -> Result<(), Status>;
}

#[async_trait]
impl MessageStream for Box<dyn MessageStream> {
    async fn recv(&mut self) -> Result<Option<Message>, Status> {
        (**self).recv().await
    }

    async fn send(&mut self, message: Message) -> Result<(), Status> {
        (**self).send(message).await
    }
}

/// In-memory stream backed by a pair of tokio channels.
#[derive(Debug)]
pub struct ChannelStream {
    inbound: mpsc::Receiver<Message>,
    outbound: mpsc::Sender<Message>,
}

impl ChannelStream {
    /// Create two connected ends. What one end sends, the other receives.
    pub fn pair(buffer: usize) -> (ChannelStream, ChannelStream) {
        let (a_tx, a_rx) = mpsc::channel(buffer);
        let (b_tx, b_rx) = mpsc::channel(buffer);
        (
            ChannelStream {
                inbound: b_rx,
                outbound: a_tx,
            },
            ChannelStream {
                inbound: a_rx,
                outbound: b_tx,
            },
        )
    }

    /// Split into the raw receiving and sending halves.
    pub fn into_parts(self) -> (mpsc::Receiver<Message>, mpsc::Sender<Message>) {
        (self.inbound, self.outbound)
    }
}

#[async_trait]
impl MessageStream for ChannelStream {
    async fn recv(&mut self) -> Result<Option<Message>, Status> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, message: Message) -> Result<(), Status> {
        self.outbound
            .send(message)
            .await
            .map_err(|_| Status::unavailable("stream peer closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;
    use serde_json::json;

    #[tokio::test]
    async fn test_channel_pair_round_trip() {
        let (mut client, mut server) = ChannelStream::pair(4);

        client.send(json!("ping")).await.unwrap();
        assert_eq!(server.recv().await.unwrap(), Some(json!("ping")));

        server.send(json!("pong")).await.unwrap();
        assert_eq!(client.recv().await.unwrap(), Some(json!("pong")));
    }

    #[tokio::test]
    async fn test_closed_peer() {
        let (mut client, server) = ChannelStream::pair(1);
        drop(server);

        assert_eq!(client.recv().await.unwrap(), None);
        let err = client.send(json!(1)).await.unwrap_err();
        assert_eq!(err.code(), Code::Unavailable);
    }
}
