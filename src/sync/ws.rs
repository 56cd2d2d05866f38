//! WebSocket session handler: request/response calls, best-effort element
//! relays, and document-lifecycle broadcasts.
//!
//! Each connection runs one select loop. Incoming calls are handled on
//! spawned tasks and answered through the session's outbound queue, so any
//! number of calls from one session can be in flight concurrently — the
//! correlation token, not arrival order, pairs responses with requests.

use crate::board::{codec, ProjectType};
use crate::error::StoreError;
use crate::events::BoardEvent;
use crate::sync::protocol::{Request, Response};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{debug, warn};
use uuid::Uuid;

/// Bound for metadata calls (save/load/list/delete/deleteFile).
const METADATA_TIMEOUT: Duration = Duration::from_secs(10);
/// Bound for file uploads.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
/// Keepalive ping period.
const PING_PERIOD: Duration = Duration::from_secs(30);
/// Outbound queue depth per session.
const OUTBOUND_QUEUE: usize = 64;

/// WebSocket upgrade handler for `/ws`.
pub async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

/// Run one connected session until it disconnects.
async fn handle_session(socket: WebSocket, state: AppState) {
    let session_id = Uuid::new_v4();
    state.registry.register(session_id);
    debug!(%session_id, sessions = state.registry.len(), "session connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut event_rx = state.bus.subscribe();
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);

    let mut ping_interval = interval(PING_PERIOD);
    // Skip the first immediate tick
    ping_interval.tick().await;

    loop {
        tokio::select! {
            // Responses from in-flight call tasks
            Some(msg) = out_rx.recv() => {
                if ws_sender.send(msg).await.is_err() {
                    debug!(%session_id, "send failed, client disconnected");
                    break;
                }
            }

            // Fan-out of document-change events
            result = event_rx.recv() => {
                match result {
                    Ok(envelope) => {
                        if !envelope.delivers_to(session_id) {
                            continue;
                        }
                        match serde_json::to_string(&envelope.event) {
                            Ok(json) => {
                                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                                    debug!(%session_id, "send failed, client disconnected");
                                    break;
                                }
                            }
                            Err(e) => warn!("failed to serialize board event: {e}"),
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!(%session_id, skipped = n, "session lagged, skipping events");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("event bus closed, shutting down session");
                        break;
                    }
                }
            }

            // Periodic pings to detect dead clients
            _ = ping_interval.tick() => {
                if ws_sender.send(Message::Ping(vec![].into())).await.is_err() {
                    debug!(%session_id, "ping failed, client disconnected");
                    break;
                }
            }

            // Incoming frames from the client
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&state, session_id, &text, &out_tx);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Client is alive
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%session_id, "client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        debug!(%session_id, "socket error: {e}");
                        break;
                    }
                    _ => {
                        // Binary frames are not part of the protocol
                    }
                }
            }
        }
    }

    state.registry.remove(session_id);
    debug!(%session_id, sessions = state.registry.len(), "session closed");
}

/// Parse one text frame and route it.
fn dispatch_frame(state: &AppState, session_id: Uuid, text: &str, out_tx: &mpsc::Sender<Message>) {
    let request = match serde_json::from_str::<Request>(text) {
        Ok(request) => request,
        Err(e) => {
            // Echo the token back if one is recoverable, so the caller's
            // pending call fails instead of hanging until timeout.
            let token = serde_json::from_str::<Value>(text)
                .ok()
                .and_then(|v| v.get("token").and_then(Value::as_str).map(str::to_string));
            match token {
                Some(token) => {
                    send_response(out_tx, Response::err(token, format!("malformed request: {e}")));
                }
                None => debug!(%session_id, "ignoring malformed frame: {e}"),
            }
            return;
        }
    };

    match request {
        // Identity attaches in-loop; it touches no storage.
        Request::Identify { token, user_name } => {
            state.registry.identify(session_id, &user_name);
            debug!(%session_id, user = %user_name, "session identified");
            send_response(out_tx, Response::ok_empty(token));
        }
        // Fire-and-forget relay: no response, at-most-once, skips origin.
        Request::ElementUpdate {
            element,
            project_id,
            grid_id,
        } => {
            state.bus.emit_from(
                session_id,
                BoardEvent::ElementUpdate {
                    element,
                    project_id,
                    grid_id,
                },
            );
        }
        // Store calls run on their own task so slow I/O never blocks the
        // session loop or other in-flight calls.
        other => {
            let state = state.clone();
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                let response = handle_call(&state, session_id, other).await;
                send_response(&out_tx, response);
            });
        }
    }
}

fn send_response(out_tx: &mpsc::Sender<Message>, response: Response) {
    match serde_json::to_string(&response) {
        Ok(json) => {
            let out_tx = out_tx.clone();
            tokio::spawn(async move {
                // Receiver gone means the session closed; nothing to do.
                let _ = out_tx.send(Message::Text(json.into())).await;
            });
        }
        Err(e) => warn!("failed to serialize response: {e}"),
    }
}

/// Execute one store-backed call and build its response frame.
async fn handle_call(state: &AppState, session_id: Uuid, request: Request) -> Response {
    match request {
        Request::SaveProject { token, project } => {
            match save_project(state, session_id, project).await {
                Ok(stamp) => Response::ok(token, json!({ "lastModified": stamp })),
                Err(e) => Response::err(token, e.to_string()),
            }
        }

        Request::LoadProject {
            token,
            name,
            project_type,
        } => {
            let result = with_timeout(METADATA_TIMEOUT, state.store.load(&name, project_type)).await;
            match result {
                Ok(project) => Response::ok(token, json!({ "project": codec::encode_project(&project) })),
                Err(e) => Response::err(token, e.to_string()),
            }
        }

        Request::ListProjects {
            token,
            project_type,
        } => {
            let result = with_timeout(METADATA_TIMEOUT, state.store.list(project_type)).await;
            match result {
                Ok(projects) => Response::ok(token, json!({ "projects": projects })),
                Err(e) => Response::err(token, e.to_string()),
            }
        }

        Request::DeleteProject {
            token,
            name,
            project_type,
        } => {
            let result = with_timeout(METADATA_TIMEOUT, state.store.delete(&name, project_type)).await;
            match result {
                Ok(report) => {
                    if project_type == ProjectType::Hosted {
                        state.bus.emit_from(
                            session_id,
                            BoardEvent::HostedProjectDeleted {
                                project_name: name.clone(),
                            },
                        );
                    }
                    let mut data = json!({ "assetsRemoved": report.assets_removed });
                    if let Some(warning) = report.warning {
                        data["warning"] = Value::String(warning);
                    }
                    Response::ok(token, data)
                }
                Err(e) => Response::err(token, e.to_string()),
            }
        }

        Request::UploadFile {
            token,
            name,
            project_type,
            file_name,
            data,
        } => {
            let bytes = match base64::engine::general_purpose::STANDARD.decode(data.as_bytes()) {
                Ok(bytes) => bytes,
                Err(e) => return Response::err(token, format!("invalid base64 payload: {e}")),
            };
            let result = with_timeout(
                UPLOAD_TIMEOUT,
                state.store.store_asset(&name, project_type, &file_name, &bytes),
            )
            .await;
            match result {
                Ok(url) => Response::ok(token, json!({ "url": url })),
                Err(e) => Response::err(token, e.to_string()),
            }
        }

        Request::DeleteFile {
            token,
            name,
            project_type,
            file_name,
        } => {
            let result = with_timeout(
                METADATA_TIMEOUT,
                state.store.delete_asset(&name, project_type, &file_name),
            )
            .await;
            match result {
                Ok(()) => Response::ok_empty(token),
                Err(e) => Response::err(token, e.to_string()),
            }
        }

        // The session loop answers identify and relays elementUpdate before
        // spawning; a stray arrival here is acknowledged as a no-op.
        Request::Identify { token, .. } => Response::ok_empty(token),
        Request::ElementUpdate { .. } => Response::ok_empty(String::new()),
    }
}

/// Decode, persist, and (for hosted projects) broadcast a save.
async fn save_project(
    state: &AppState,
    session_id: Uuid,
    document: Value,
) -> Result<String, StoreError> {
    let project_type = document
        .get("project_type")
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<ProjectType>().ok())
        .ok_or_else(|| StoreError::Validation("missing or invalid project_type".into()))?;

    let project = codec::decode_project(document, project_type)?;
    let stamp = with_timeout(METADATA_TIMEOUT, state.store.save(&project)).await?;

    debug!(
        %session_id,
        user = state.registry.user_name(session_id).as_deref().unwrap_or("<anonymous>"),
        project = %project.name,
        "project saved"
    );

    if project.project_type == ProjectType::Hosted {
        state.bus.emit_from(
            session_id,
            BoardEvent::HostedProjectUpdated {
                project_name: project.name.clone(),
            },
        );
    }
    Ok(stamp)
}

/// Bound a store operation; expiry surfaces as `StoreError::Timeout` so the
/// caller observes a typed error rather than a hang.
async fn with_timeout<T>(
    limit: Duration,
    operation: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_passthrough() {
        let result: Result<u32, StoreError> =
            with_timeout(Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_with_timeout_expiry() {
        let result: Result<(), StoreError> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_with_timeout_propagates_errors() {
        let result: Result<(), StoreError> = with_timeout(Duration::from_secs(1), async {
            Err(StoreError::NotFound("x".into()))
        })
        .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
