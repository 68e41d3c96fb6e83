// Local WebSocket control endpoint for board UIs.
//
// Any number of clients may connect: each sends intents as JSON text
// frames and receives every board update pushed to the shared broadcast
// channel. Intents from all clients funnel into one mpsc sender, so the
// application loop stays the single point of serialization.

use futures_util::stream::Stream;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{info, warn};

use crate::protocol::Intent;

/// Run the control server on `127.0.0.1:{port}`, spawning a handler per
/// connection. Runs until the listener fails or the task is cancelled.
pub async fn run(
    port: u16,
    intent_tx: mpsc::Sender<Intent>,
    updates: broadcast::Sender<String>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    let local_addr = listener.local_addr()?;
    info!("Control server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted control connection from {addr_str}");

        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake failed for {addr_str}: {e}");
                continue;
            }
        };

        tokio::spawn(handle_client(
            ws_stream,
            addr_str,
            intent_tx.clone(),
            updates.subscribe(),
        ));
    }
}

/// Serve one client: fan updates out to it while folding its intents in.
async fn handle_client<S>(
    ws_stream: WebSocketStream<S>,
    addr: String,
    intent_tx: mpsc::Sender<Intent>,
    mut updates: broadcast::Receiver<String>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, read) = ws_stream.split();

    let writer_addr = addr.clone();
    let writer = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(json) => {
                    if write.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // A slow client misses intermediate snapshots; the next
                    // one it receives is complete, so nothing is lost.
                    warn!("Client {writer_addr} lagged, skipped {n} updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let _ = process_intent_stream(read, &intent_tx, &addr).await;
    writer.abort();
    info!("Control client {addr} disconnected");
}

/// Parse intents out of raw WebSocket messages from any [`Stream`] and
/// forward them through `tx`. Malformed frames are logged and skipped; a
/// bad client must not crash the board. Returns `Err(())` only when the
/// intent channel is closed (application shutting down).
///
/// Generic over the stream type so it can be tested with in-memory streams
/// without opening TCP ports.
pub async fn process_intent_stream<St>(
    mut stream: St,
    tx: &mpsc::Sender<Intent>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<Intent>(&text) {
                Ok(intent) => {
                    if tx.send(intent).await.is_err() {
                        return Err(());
                    }
                }
                Err(e) => {
                    warn!("Unparseable intent from {addr}: {e}");
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}
