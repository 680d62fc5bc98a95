//! Channel subscriptions over dedicated pub/sub connections.

use futures::stream::{self, BoxStream, StreamExt};
use redis::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{RedisConfig, RedisError, Result};

/// Messages buffered between the connection reader and the subscriber.
const BUFFER: usize = 256;

/// A message received on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: String,
    pub payload: String,
}

/// A live subscription to one channel.
///
/// [`recv`](Subscription::recv) returns `None` once the connection is gone.
/// There is no automatic reconnect: subscribe again to resume. Dropping the
/// subscription closes its connection.
pub struct Subscription {
    channel: String,
    messages: mpsc::Receiver<Message>,
    reader: JoinHandle<()>,
}

impl Subscription {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.messages.recv().await
    }

    /// Turn the subscription into a stream that ends with the connection.
    pub fn into_stream(self) -> BoxStream<'static, Message> {
        stream::unfold(self, |mut sub| async move {
            let message = sub.recv().await?;
            Some((message, sub))
        })
        .boxed()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Opens subscriptions against the configured server.
pub struct PubSub {
    client: Client,
    connect_timeout: Duration,
}

impl PubSub {
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.connection_url()?)
            .map_err(|e| RedisError::Connection(e.to_string()))?;
        Ok(Self {
            client,
            connect_timeout: config.connection_timeout,
        })
    }

    /// Subscribe to `channel` on a new connection.
    ///
    /// Connecting and subscribing together are bounded by the configured
    /// connection timeout.
    pub async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let connect = async {
            let mut conn = self
                .client
                .get_async_pubsub()
                .await
                .map_err(|e| RedisError::Connection(e.to_string()))?;
            conn.subscribe(channel)
                .await
                .map_err(|e| RedisError::PubSub(e.to_string()))?;
            Ok::<_, RedisError>(conn)
        };
        let conn = tokio::time::timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| RedisError::Timeout)??;

        info!(channel = %channel, "Subscribed to Redis channel");

        let (tx, rx) = mpsc::channel(BUFFER);
        let name = channel.to_string();
        let reader = tokio::spawn(async move {
            let mut incoming = conn.into_on_message();
            while let Some(msg) = incoming.next().await {
                let channel = msg.get_channel_name().to_string();
                let payload = match msg.get_payload::<String>() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!(channel = %channel, error = %e, "Dropping non-text pub/sub payload");
                        continue;
                    }
                };
                if tx.send(Message { channel, payload }).await.is_err() {
                    return;
                }
            }
            debug!(channel = %name, "Pub/sub connection closed");
        });

        Ok(Subscription {
            channel: channel.to_string(),
            messages: rx,
            reader,
        })
    }
}
