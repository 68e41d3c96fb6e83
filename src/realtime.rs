// Realtime change-feed plumbing.
//
// The hosted store pushes row changes as JSON text frames over a WebSocket.
// This module parses those frames into [`ChangeEvent`]s and pumps any
// message stream into a subscription channel. The pump is generic over the
// stream type so the logic is unit-testable without opening sockets.
//
// The feed does not replay: after any disconnect the consumer must refetch
// full state (picks + status) before resubscribing.

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use crate::model::{DraftPick, DraftStatus};
use crate::store::ChangeEvent;

/// Wire form of a single feed frame.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChangeMessage {
    PickInserted { record: DraftPick },
    StatusUpdated { record: DraftStatus },
    Heartbeat,
    #[serde(other)]
    Unknown,
}

/// Parse one feed frame, scoped to `event_id`. Returns `None` for
/// heartbeats, frames for other events, and unparseable payloads (logged,
/// never fatal — a malformed frame must not kill the subscription).
pub fn parse_change_message(text: &str, event_id: &str) -> Option<ChangeEvent> {
    let msg: ChangeMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("Unparseable change-feed frame: {e}");
            return None;
        }
    };

    match msg {
        ChangeMessage::PickInserted { record } if record.event_id == event_id => {
            Some(ChangeEvent::PickInserted(record))
        }
        ChangeMessage::StatusUpdated { record } if record.event_id == event_id => {
            Some(ChangeEvent::StatusUpdated(record))
        }
        ChangeMessage::PickInserted { .. } | ChangeMessage::StatusUpdated { .. } => None,
        ChangeMessage::Heartbeat | ChangeMessage::Unknown => None,
    }
}

/// Pump WebSocket messages from `stream` into `tx` as change events until
/// the stream ends, the peer closes, or a transport error occurs. Returns
/// `Err(())` only when the receiving side is gone (subscription dropped),
/// signalling the caller to stop entirely.
pub async fn pump_change_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<ChangeEvent>,
    event_id: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if let Some(event) = parse_change_message(&text, event_id) {
                    if tx.send(event).await.is_err() {
                        return Err(());
                    }
                }
            }
            Ok(Message::Close(_)) => {
                info!("Change feed sent close frame");
                break;
            }
            Err(e) => {
                warn!("Change feed transport error: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tokio_tungstenite::tungstenite::Error as WsError;

    fn pick_frame(event_id: &str, pick_id: &str, number: u32) -> String {
        format!(
            r#"{{"type":"pick_inserted","record":{{"id":"{pick_id}","event_id":"{event_id}","team_id":"t1","player_id":"p1","pick_number":{number},"round":1,"notes":null,"traded":false,"created_by":null,"created_at":"2026-03-01T19:00:00Z"}}}}"#
        )
    }

    fn status_frame(event_id: &str, current_pick: u32, paused: bool) -> String {
        format!(
            r#"{{"type":"status_updated","record":{{"event_id":"{event_id}","current_pick":{current_pick},"paused":{paused},"updated_at":"2026-03-01T19:00:00Z"}}}}"#
        )
    }

    fn mock_stream(
        messages: Vec<Result<Message, WsError>>,
    ) -> impl Stream<Item = Result<Message, WsError>> + Unpin {
        stream::iter(messages)
    }

    #[tokio::test]
    async fn pick_frame_becomes_change_event() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![Ok(Message::Text(pick_frame("e1", "pick_1", 1).into()))];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ChangeEvent::PickInserted(pick) => {
                assert_eq!(pick.id, "pick_1");
                assert_eq!(pick.pick_number, 1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_frame_becomes_change_event() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![Ok(Message::Text(status_frame("e1", 4, false).into()))];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ChangeEvent::StatusUpdated(status) => {
                assert_eq!(status.current_pick, 4);
                assert!(!status.paused);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn frames_for_other_events_are_dropped() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![
            Ok(Message::Text(pick_frame("other", "pick_9", 1).into())),
            Ok(Message::Text(pick_frame("e1", "pick_1", 1).into())),
        ];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            ChangeEvent::PickInserted(pick) => assert_eq!(pick.id, "pick_1"),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn heartbeats_and_unknown_types_are_ignored() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![
            Ok(Message::Text(r#"{"type":"heartbeat"}"#.into())),
            Ok(Message::Text(r#"{"type":"presence_sync"}"#.into())),
            Ok(Message::Text(status_frame("e1", 2, true).into())),
        ];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChangeEvent::StatusUpdated(_)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn malformed_frame_does_not_kill_the_feed() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![
            Ok(Message::Text("this is not json".into())),
            Ok(Message::Text(status_frame("e1", 2, true).into())),
        ];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChangeEvent::StatusUpdated(_)
        ));
    }

    #[tokio::test]
    async fn close_frame_stops_processing() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![
            Ok(Message::Text(status_frame("e1", 2, true).into())),
            Ok(Message::Close(None)),
            Ok(Message::Text(status_frame("e1", 3, true).into())),
        ];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChangeEvent::StatusUpdated(_)
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn transport_error_stops_processing() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![
            Err(WsError::ConnectionClosed),
            Ok(Message::Text(status_frame("e1", 2, true).into())),
        ];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn returns_err_when_subscription_dropped() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);

        let messages = vec![Ok(Message::Text(status_frame("e1", 2, true).into()))];
        let result = pump_change_stream(mock_stream(messages), &tx, "e1").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn binary_and_ping_frames_are_ignored() {
        let (tx, mut rx) = mpsc::channel(16);
        let messages = vec![
            Ok(Message::Binary(vec![1, 2, 3].into())),
            Ok(Message::Ping(vec![].into())),
            Ok(Message::Text(status_frame("e1", 2, true).into())),
        ];

        pump_change_stream(mock_stream(messages), &tx, "e1")
            .await
            .unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            ChangeEvent::StatusUpdated(_)
        ));
        assert!(rx.try_recv().is_err());
    }
}
