use crate::interface_adapters::protocol::decode_update;
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::next_conn_id;
use crate::use_cases::{ClientId, HubHandle, Submission};

use axum::{
    Error,
    extract::{
        State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{Instrument, debug, error, info, info_span, warn};

// Connection lifecycle failures; every variant ends only this connection.
#[derive(Debug, thiserror::Error)]
enum NetError {
    #[error("websocket error: {0}")]
    Ws(#[from] axum::Error),
    #[error("hub is no longer running")]
    HubClosed,
    #[error("frame write timed out")]
    WriteTimeout,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
// Upper bound for a single frame write; a peer that stalls longer is disconnected.
const WRITE_TIMEOUT: Duration = Duration::from_secs(2);

type WsSink = SplitSink<WebSocket, Message>;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: HubHandle<Utf8Bytes>) {
    let client_id = ClientId(next_conn_id());
    let span = info_span!("conn", conn_id = client_id.0);

    async move {
        if let Err(e) = run_connection(socket, client_id, hub).await {
            warn!(error = %e, "connection exited with error");
        }
    }
    .instrument(span)
    .await
}

struct ReadStats {
    msgs_in: u64,
    bytes_in: u64,
    invalid: u32,
    last_invalid_log: Instant,
}

struct WriterExit {
    sink: WsSink,
    error: Option<NetError>,
    msgs_out: u64,
    bytes_out: u64,
}

enum LoopControl {
    Continue,
    Disconnect(Option<CloseFrame>),
}

async fn run_connection(
    socket: WebSocket,
    client_id: ClientId,
    hub: HubHandle<Utf8Bytes>,
) -> Result<(), NetError> {
    let (mut sink, mut stream) = socket.split();

    let outbound_rx = match hub.register(client_id).await {
        Ok(rx) => rx,
        Err(_) => {
            let frame = CloseFrame {
                code: close_code::AGAIN,
                reason: "server unavailable".into(),
            };
            close_sink(&mut sink, Some(frame)).await;
            return Err(NetError::HubClosed);
        }
    };
    info!("client connected");

    let mut writer = tokio::spawn(write_loop(sink, outbound_rx).in_current_span());
    let mut writer_exit = None;
    let mut fatal: Option<NetError> = None;
    let mut stats = ReadStats {
        msgs_in: 0,
        bytes_in: 0,
        invalid: 0,
        last_invalid_log: Instant::now() - LOG_THROTTLE,
    };

    let close_frame = loop {
        tokio::select! {
            // Incoming Message from Client
            incoming = stream.next() => {
                match handle_incoming(incoming, client_id, &hub, &mut stats).await {
                    Ok(LoopControl::Continue) => {}
                    Ok(LoopControl::Disconnect(frame)) => break frame,
                    Err(e) => {
                        fatal = Some(e);
                        break None;
                    }
                }
            }

            // Writer finished first: write failure, timeout, or eviction by the hub.
            exit = &mut writer => {
                writer_exit = Some(exit);
                break None;
            }
        }
    };

    // Unregistering drops the hub's side of the queue, which is what stops the writer.
    if hub.unregister(client_id).await.is_err() && fatal.is_none() {
        fatal = Some(NetError::HubClosed);
    }

    let exit = match writer_exit {
        Some(exit) => exit,
        None => writer.await,
    };
    match exit {
        Ok(WriterExit {
            mut sink,
            error,
            msgs_out,
            bytes_out,
        }) => {
            if fatal.is_none() {
                fatal = error;
            }
            close_sink(&mut sink, close_frame).await;
            debug!(
                msgs_in = stats.msgs_in,
                bytes_in = stats.bytes_in,
                invalid = stats.invalid,
                msgs_out,
                bytes_out,
                "connection stats"
            );
        }
        Err(e) => {
            error!(error = %e, "writer task failed");
        }
    }

    info!("client disconnected");
    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Drains the client's outbound queue onto the socket, one pre-serialized snapshot per frame.
async fn write_loop(mut sink: WsSink, mut outbound_rx: mpsc::Receiver<Utf8Bytes>) -> WriterExit {
    let mut error = None;
    let mut msgs_out = 0;
    let mut bytes_out = 0;

    while let Some(frame) = outbound_rx.recv().await {
        // The hub dropped our queue (eviction or unregister); stale snapshots are not flushed.
        if outbound_rx.is_closed() {
            debug!("outbound queue closed by hub");
            break;
        }

        let len = frame.len() as u64;
        match timeout(WRITE_TIMEOUT, sink.send(Message::Text(frame))).await {
            Ok(Ok(())) => {
                msgs_out += 1;
                bytes_out += len;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to send snapshot");
                error = Some(NetError::from(e));
                break;
            }
            Err(_) => {
                warn!(timeout_ms = WRITE_TIMEOUT.as_millis() as u64, "snapshot write timed out");
                error = Some(NetError::WriteTimeout);
                break;
            }
        }
    }

    WriterExit {
        sink,
        error,
        msgs_out,
        bytes_out,
    }
}

async fn close_sink(sink: &mut WsSink, frame: Option<CloseFrame>) {
    if let Some(frame) = frame {
        match timeout(WRITE_TIMEOUT, sink.send(Message::Close(Some(frame)))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "failed to send close frame"),
            Err(_) => debug!("close frame timed out"),
        }
    }
    match timeout(WRITE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "socket close error"),
        Err(_) => debug!("socket close timed out"),
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn handle_incoming(
    incoming: Option<Result<Message, Error>>,
    client_id: ClientId,
    hub: &HubHandle<Utf8Bytes>,
    stats: &mut ReadStats,
) -> Result<LoopControl, NetError> {
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                stats.msgs_in += 1;
                stats.bytes_in += text.len() as u64;

                match decode_update(&text) {
                    Ok(update) => {
                        // Awaiting here is the back-pressure path when the hub falls behind.
                        hub.submit(Submission { client_id, update })
                            .await
                            .map_err(|_| NetError::HubClosed)?;
                        Ok(LoopControl::Continue)
                    }
                    Err(e) if e.closes_connection() => {
                        warn!(error = %e, "protocol violation; closing connection");
                        Ok(LoopControl::Disconnect(Some(CloseFrame {
                            code: close_code::POLICY,
                            reason: "unsupported action".into(),
                        })))
                    }
                    Err(e) => {
                        stats.invalid += 1;
                        if should_log(&mut stats.last_invalid_log) {
                            warn!(
                                bytes = text.len(),
                                error = %e,
                                invalid = stats.invalid,
                                "dropping invalid update request"
                            );
                        }
                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => Ok(LoopControl::Disconnect(Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            }))),
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect(None)),
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            Ok(LoopControl::Disconnect(None))
        }
        None => {
            info!("websocket closed");
            Ok(LoopControl::Disconnect(None))
        }
    }
}
