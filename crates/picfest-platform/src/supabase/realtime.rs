use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use uuid::Uuid;

use picfest_types::events::MediaChange;
use picfest_types::models::Media;

use super::SupabaseClient;
use crate::{ChangeFeed, MediaSubscription, PlatformResult};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const SUBSCRIBER_BUFFER: usize = 64;

/// Phoenix channel frame.
#[derive(Debug, Serialize, Deserialize)]
struct PhoenixMessage {
    topic: String,
    event: String,
    payload: Value,
    #[serde(rename = "ref", default)]
    reference: Option<String>,
}

impl PhoenixMessage {
    fn to_frame(&self) -> anyhow::Result<Message> {
        Ok(Message::Text(serde_json::to_string(self)?.into()))
    }
}

/// Row changes on `midias` pushed over the realtime websocket, one channel
/// per subscribed event.
pub struct RealtimeFeed {
    client: Arc<SupabaseClient>,
}

impl RealtimeFeed {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    fn socket_url(&self) -> String {
        let base = self.client.base_url();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base,
            self.client.key()
        )
    }
}

fn join_message(event_id: Uuid, access_token: &str) -> PhoenixMessage {
    PhoenixMessage {
        topic: format!("realtime:media_changes_{}", event_id),
        event: "phx_join".into(),
        payload: json!({
            "config": {
                "broadcast": { "self": false },
                "presence": { "key": "" },
                "postgres_changes": [{
                    "event": "*",
                    "schema": "public",
                    "table": "midias",
                    "filter": format!("evento_id=eq.{}", event_id),
                }],
            },
            "access_token": access_token,
        }),
        reference: Some("1".into()),
    }
}

/// Decode a `postgres_changes` payload. Rows that do not parse are skipped.
fn parse_change(payload: &Value) -> Option<MediaChange> {
    let data = payload.get("data")?;
    let record = || -> Option<Media> {
        let raw = data.get("record")?.clone();
        serde_json::from_value(raw)
            .map_err(|e| warn!("Unreadable media record in change feed: {}", e))
            .ok()
    };
    match data.get("type")?.as_str()? {
        "INSERT" => record().map(MediaChange::Insert),
        "UPDATE" => record().map(MediaChange::Update),
        "DELETE" => {
            let id = data.get("old_record")?.get("id")?.as_str()?.parse().ok()?;
            Some(MediaChange::Delete { id })
        }
        other => {
            debug!("Ignoring change of type {}", other);
            None
        }
    }
}

/// One websocket session. `Ok` when the subscriber went away or the server
/// closed cleanly.
async fn run_session(
    url: &str,
    join: &PhoenixMessage,
    tx: &mpsc::Sender<MediaChange>,
) -> anyhow::Result<()> {
    let (ws, _) = tokio_tungstenite::connect_async(url).await?;
    let (mut sink, mut stream) = ws.split();
    sink.send(join.to_frame()?).await?;

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;
    let mut next_ref: u64 = 2;

    loop {
        tokio::select! {
            _ = heartbeat.tick() => {
                let beat = PhoenixMessage {
                    topic: "phoenix".into(),
                    event: "heartbeat".into(),
                    payload: json!({}),
                    reference: Some(next_ref.to_string()),
                };
                next_ref += 1;
                sink.send(beat.to_frame()?).await?;
            }

            _ = tx.closed() => {
                let _ = sink.send(Message::Close(None)).await;
                return Ok(());
            }

            msg = stream.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Ping(data))) => {
                        sink.send(Message::Pong(data)).await?;
                        continue;
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                };

                let frame: PhoenixMessage = match serde_json::from_str(text.as_str()) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!("Unreadable realtime frame: {}", e);
                        continue;
                    }
                };

                match frame.event.as_str() {
                    "postgres_changes" => {
                        if let Some(change) = parse_change(&frame.payload) {
                            if tx.send(change).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    "phx_reply" if frame.topic == join.topic => {
                        let status = frame.payload.get("status").and_then(Value::as_str);
                        if status == Some("error") {
                            anyhow::bail!("Channel join rejected: {}", frame.payload);
                        }
                        debug!("Joined {}", join.topic);
                    }
                    "phx_error" | "phx_close" if frame.topic == join.topic => {
                        anyhow::bail!("Channel {} closed by server", join.topic);
                    }
                    "system" => {
                        if frame.payload.get("status").and_then(Value::as_str) == Some("error") {
                            warn!("Realtime reported: {}", frame.payload);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe_media(&self, event_id: Uuid) -> PlatformResult<MediaSubscription> {
        let url = self.socket_url();
        let join = join_message(event_id, self.client.key());
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let task = tokio::spawn(async move {
            let mut backoff = Duration::from_secs(1);
            loop {
                match run_session(&url, &join, &tx).await {
                    Ok(()) => backoff = Duration::from_secs(1),
                    Err(e) => warn!("Realtime channel for event {} dropped: {}", event_id, e),
                }
                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
                info!("Reconnecting realtime channel for event {}", event_id);
            }
        });

        Ok(MediaSubscription::new(rx, task))
    }
}
