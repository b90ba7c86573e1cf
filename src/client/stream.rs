use crate::error::ChatError;
use crate::models::websocket::{ StreamEvent, StreamFrame };
use futures::{ SinkExt, StreamExt };
use log::{ debug, info, warn, error };
use std::fmt;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::{ mpsc, oneshot };
use tokio_tungstenite::{ connect_async, tungstenite::protocol::Message, WebSocketStream };

const EVENT_BUFFER: usize = 256;
const MAX_FRAME_SIZE: usize = 1 * 1024 * 1024;

pub type EventResult = Result<StreamEvent, ChatError>;

/// Handle on one open push channel. Events come out in arrival order;
/// `close` (or dropping the handle) tears the channel down.
pub struct Subscription {
    session_id: i64,
    events: mpsc::Receiver<EventResult>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// Producer side of a [`Subscription`], held by whatever reads the socket.
pub struct EventFeed {
    session_id: i64,
    tx: mpsc::Sender<EventResult>,
    shutdown: oneshot::Receiver<()>,
}

impl Subscription {
    pub fn channel(session_id: i64) -> (Subscription, EventFeed) {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let subscription = Subscription {
            session_id,
            events: rx,
            shutdown: Some(shutdown_tx),
        };
        let feed = EventFeed {
            session_id,
            tx,
            shutdown: shutdown_rx,
        };
        (subscription, feed)
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }

    /// Next event, or `None` once the channel is closed or the producer
    /// has gone away.
    pub async fn next_event(&mut self) -> Option<EventResult> {
        if self.is_closed() {
            return None;
        }
        self.events.recv().await
    }

    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            debug!("Closing stream subscription for chat {}", self.session_id);
            let _ = shutdown.send(());
            self.events.close();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("session_id", &self.session_id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl EventFeed {
    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Queues an item for the subscriber. Returns false when the subscriber
    /// has closed.
    pub async fn send(&self, item: EventResult) -> bool {
        self.tx.send(item).await.is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the subscriber asks for teardown or drops its handle.
    pub async fn shutdown_requested(&mut self) {
        let _ = (&mut self.shutdown).await;
    }
}

/// Opens `/ws/chat/{id}` and starts a reader task feeding the returned
/// subscription.
pub async fn connect(url: &str, session_id: i64) -> Result<Subscription, ChatError> {
    info!("Opening stream for chat {}: {}", session_id, url);
    let (websocket, _) = connect_async(url).await.map_err(|e| {
        error!("Stream connection to {} failed: {}", url, e);
        ChatError::ConnectionFailed(e.to_string())
    })?;

    let (subscription, feed) = Subscription::channel(session_id);
    tokio::spawn(pump(websocket, feed));
    Ok(subscription)
}

/// Reads frames until a terminal event, a socket fault, or a shutdown
/// request. Terminal events and faults end the task.
pub async fn pump<S>(websocket: WebSocketStream<S>, mut feed: EventFeed)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let session_id = feed.session_id();
    let (mut tx, mut rx) = websocket.split();

    loop {
        tokio::select! {
            _ = feed.shutdown_requested() => {
                debug!("Stream for chat {} closed by subscriber", session_id);
                let _ = tx.send(Message::Close(None)).await;
                break;
            }
            msg = rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > MAX_FRAME_SIZE {
                            warn!("Dropping oversized frame ({} bytes) on chat {}", text.len(), session_id);
                            continue;
                        }
                        let frame = match serde_json::from_str::<StreamFrame>(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                warn!("Ignoring undecodable frame on chat {}: {}", session_id, e);
                                continue;
                            }
                        };
                        let Some(event) = StreamEvent::from_frame(frame) else {
                            continue;
                        };
                        let terminal = event.is_terminal();
                        if !feed.send(Ok(event)).await {
                            break;
                        }
                        if terminal {
                            let _ = tx.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if tx.send(Message::Pong(data)).await.is_err() {
                            warn!("Failed to answer ping on chat {}", session_id);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!("Stream for chat {} ended by server", session_id);
                        feed.send(
                            Err(ChatError::ConnectionFailed("stream closed before the reply completed".into()))
                        ).await;
                        break;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!("Ignoring binary frame on chat {}", session_id);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("Stream error on chat {}: {}", session_id, e);
                        feed.send(Err(ChatError::ConnectionFailed(e.to_string()))).await;
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_arrive_in_order() {
        let (mut sub, feed) = Subscription::channel(3);
        for text in ["a", "b", "c"] {
            assert!(feed.send(Ok(StreamEvent::Chunk(text.into()))).await);
        }
        for text in ["a", "b", "c"] {
            match sub.next_event().await {
                Some(Ok(StreamEvent::Chunk(t))) => assert_eq!(t, text),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn close_is_visible_to_the_producer() {
        let (mut sub, mut feed) = Subscription::channel(1);
        assert!(!feed.is_closed());
        sub.close();
        sub.close();
        assert!(sub.is_closed());
        assert!(feed.is_closed());
        feed.shutdown_requested().await;
        assert!(!feed.send(Ok(StreamEvent::Complete)).await);
        assert!(sub.next_event().await.is_none());
    }

    #[test]
    fn debug_shows_session_and_state() {
        let (mut sub, _feed) = Subscription::channel(4);
        assert_eq!(format!("{:?}", sub), "Subscription { session_id: 4, closed: false }");
        sub.close();
        assert_eq!(format!("{:?}", sub), "Subscription { session_id: 4, closed: true }");
    }

    #[tokio::test]
    async fn dropping_the_handle_closes_it() {
        let (sub, feed) = Subscription::channel(1);
        drop(sub);
        assert!(feed.is_closed());
    }
}
