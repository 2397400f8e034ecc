use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, instrument};

use crate::presence;
use crate::protocol::ClientEvent;
use crate::relay::HubHandle;

#[instrument(skip_all, level = "debug")]
pub async fn websocket(ws: WebSocketUpgrade, State(hub): State<HubHandle>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, hub))
}

/// Drive one client socket until either side goes away.
///
/// The writer half drains the connection's outbox; the reader half forwards
/// `message` events to the hub. The session guard is dropped on the way out,
/// which queues the disconnect.
async fn run_session(socket: WebSocket, hub: HubHandle) {
    let (outbox, mut inbox) = presence::outbox();
    let session = match hub.open(outbox) {
        Ok(session) => session,
        Err(err) => {
            error!(err = %err, "Could not register connection");
            return;
        }
    };
    let connection_id = session.connection_id();
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    error!(%connection_id, err = %err, "Failed encoding outbound event");
                    continue;
                }
            };
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Message::Text(text)) => match ClientEvent::parse(&text) {
                    Some(ClientEvent::Message(payload)) => {
                        if session.submit(payload).is_err() {
                            break;
                        }
                    }
                    None => debug!(%connection_id, "Dropping unrecognised frame"),
                },
                Ok(Message::Binary(_)) => debug!(%connection_id, "Dropping binary frame"),
                Ok(Message::Close(_)) => break,
                // ping/pong are answered by the transport
                Ok(_) => {}
                Err(err) => {
                    debug!(%connection_id, err = %err, "WebSocket read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {}
        _ = &mut writer => {}
    }
    drop(session);
    writer.abort();
}
