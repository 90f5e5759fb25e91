use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use super::frames::PushFrame;
use super::{apply_and_log, ChannelExit, RemoteApplier, RemoteUpdate, UpdateChannel};
use crate::backend::BackendError;
use crate::sync::backoff::{Backoff, ReconnectPolicy};
use crate::sync::state::SequenceMarker;
use crate::utils::text::preview;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum SessionEnd {
    Cancelled,
    Disconnected(String),
}

/// Long-lived WebSocket subscription to the user's clipboard updates.
pub struct PushChannel {
    endpoint: Url,
    client_id: String,
    policy: ReconnectPolicy,
    connect_timeout: Duration,
}

impl PushChannel {
    /// `base` is the ws/wss root; the channel connects to `{base}/ws/{username}`.
    pub fn new(
        base: Url,
        username: &str,
        token: &str,
        client_id: Uuid,
        policy: ReconnectPolicy,
        connect_timeout: Duration,
    ) -> Result<Self, BackendError> {
        let mut endpoint = base.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| BackendError::Endpoint(format!("'{base}' cannot be a base URL")))?
            .pop_if_empty()
            .extend(["ws", username]);

        let client_id = client_id.to_string();
        {
            let mut query = endpoint.query_pairs_mut();
            if !token.is_empty() {
                query.append_pair("token", token);
            }
            query.append_pair("client_id", &client_id);
        }

        Ok(Self {
            endpoint,
            client_id,
            policy,
            connect_timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Endpoint without the query string, safe to log.
    fn display_endpoint(&self) -> String {
        let mut url = self.endpoint.clone();
        url.set_query(None);
        url.to_string()
    }

    async fn connect(&self) -> Result<Socket, BackendError> {
        let attempt = connect_async(self.endpoint.as_str());
        match tokio::time::timeout(self.connect_timeout, attempt).await {
            Ok(Ok((socket, _response))) => Ok(socket),
            Ok(Err(e)) => Err(BackendError::Network(e.to_string())),
            Err(_) => Err(BackendError::Timeout(format!(
                "no handshake after {}s",
                self.connect_timeout.as_secs_f32()
            ))),
        }
    }

    async fn session(&self, socket: Socket, applier: &mut RemoteApplier, cancel: &CancellationToken) -> SessionEnd {
        let (mut write, mut read) = socket.split();

        loop {
            let message = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return SessionEnd::Cancelled;
                }
                message = read.next() => message,
            };

            match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = self.handle_frame(text.as_str(), applier).await
                        && let Err(e) = write.send(Message::Text(reply.into())).await
                    {
                        return SessionEnd::Disconnected(e.to_string());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.as_str().to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "closed by server".to_string());
                    return SessionEnd::Disconnected(reason);
                }
                // Protocol pings are answered by tungstenite itself.
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Disconnected(e.to_string()),
                None => return SessionEnd::Disconnected("stream ended".to_string()),
            }
        }
    }

    /// Act on one text frame; returns a reply to send back, if any.
    async fn handle_frame(&self, raw: &str, applier: &mut RemoteApplier) -> Option<String> {
        let frame = match PushFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, frame = %preview(raw, 80), "Ignoring unrecognized push frame");
                return None;
            }
        };

        match frame {
            PushFrame::Copy(value) | PushFrame::ClipboardUpdate(value) => {
                if value.origin.as_deref() == Some(self.client_id.as_str()) {
                    debug!("Ignoring update submitted by this device");
                    return None;
                }
                let update = RemoteUpdate {
                    marker: value.seq.map(SequenceMarker::new),
                    text: value.text,
                };
                apply_and_log(applier, update, self.name()).await;
                None
            }
            PushFrame::Delete { text } => {
                if applier.release(text.as_deref()) {
                    debug!("Remote value deleted, echo guard released");
                }
                None
            }
            PushFrame::Clear => {
                if applier.release(None) {
                    debug!("Remote history cleared, echo guard released");
                }
                None
            }
            PushFrame::Ping => Some(PushFrame::Pong.to_json()),
            PushFrame::Pong => None,
        }
    }
}

#[async_trait]
impl UpdateChannel for PushChannel {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn run(&mut self, applier: &mut RemoteApplier, cancel: &CancellationToken) -> ChannelExit {
        let mut backoff = Backoff::new(self.policy);
        let endpoint = self.display_endpoint();

        loop {
            let connected = tokio::select! {
                _ = cancel.cancelled() => return ChannelExit::Cancelled,
                connected = self.connect() => connected,
            };

            let delay = match connected {
                Ok(socket) => {
                    info!(url = %endpoint, "Push channel connected");
                    let started = Instant::now();
                    match self.session(socket, applier, cancel).await {
                        SessionEnd::Cancelled => return ChannelExit::Cancelled,
                        SessionEnd::Disconnected(reason) => {
                            let lived = started.elapsed();
                            warn!(
                                url = %endpoint,
                                reason = %reason,
                                lived_ms = lived.as_millis() as u64,
                                "Push channel disconnected"
                            );
                            if lived >= self.policy.min_session {
                                backoff.reset();
                                Some(self.policy.initial)
                            } else {
                                backoff.next_delay()
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %endpoint, error = %e, attempt = backoff.failures() + 1, "Push channel connect failed");
                    backoff.next_delay()
                }
            };

            let Some(delay) = delay else {
                warn!(attempts = backoff.failures(), "Giving up on push channel");
                return ChannelExit::GaveUp;
            };

            info!(backoff_secs = delay.as_secs_f64(), "Reconnecting push channel");
            tokio::select! {
                _ = cancel.cancelled() => return ChannelExit::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
