use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::backend::BackendError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::session::submit::{CommitTrigger, SubmitOutcome};
use crate::session::{monitor, score, AppState, Session, SessionGate};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub user: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let conn_id = ulid::Ulid::new().to_string();

    let Some(user_id) = params.user else {
        let _ = send_json(
            &mut sender,
            &ServerMessage::Error {
                code: "USER_REQUIRED".to_string(),
                msg: "Connect with ?user=<id>".to_string(),
            },
        )
        .await;
        return;
    };

    tracing::info!(conn_id, user_id, "WebSocket connected");

    if send_json(
        &mut sender,
        &ServerMessage::Welcome {
            protocol: "1.0".to_string(),
            server_now: chrono::Utc::now(),
        },
    )
    .await
    .is_err()
    {
        return;
    }

    let mut session: Option<Arc<Session>> = None;
    let mut events_rx: Option<tokio::sync::broadcast::Receiver<ServerMessage>> = None;

    loop {
        tokio::select! {
            // Engine-originated events (ticks, warnings, submission results)
            event = async {
                match &mut events_rx {
                    Some(rx) => rx.recv().await.ok(),
                    // Not joined yet: wait forever
                    None => std::future::pending::<Option<ServerMessage>>().await,
                }
            } => {
                if let Some(msg) = event {
                    if send_json(&mut sender, &msg).await.is_err() {
                        break;
                    }
                }
            }

            // Client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(ClientMessage::Join { contest_id, access_code }) => {
                                let reply = match state
                                    .open_session(&contest_id, &user_id, access_code.as_deref())
                                    .await
                                {
                                    Ok(SessionGate::Active(s)) => {
                                        events_rx = Some(s.events.subscribe());
                                        let ready = s.ready_message().await;
                                        session = Some(s);
                                        ready
                                    }
                                    Ok(SessionGate::AlreadySubmitted { participation_id }) => {
                                        ServerMessage::AlreadySubmitted { participation_id }
                                    }
                                    Err(e) => ServerMessage::Error {
                                        code: "JOIN_REJECTED".to_string(),
                                        msg: e,
                                    },
                                };
                                if send_json(&mut sender, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Ok(msg) => {
                                if let Some(response) =
                                    handle_message(msg, session.as_ref(), &state, &user_id).await
                                {
                                    if send_json(&mut sender, &response).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Err(e) => {
                                let error = ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                };
                                if send_json(&mut sender, &error).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(conn_id, error = %e, "WebSocket error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    tracing::info!(conn_id, user_id, "WebSocket connection closed");
}

/// Dispatch one post-join client message.
pub async fn handle_message(
    msg: ClientMessage,
    session: Option<&Arc<Session>>,
    state: &Arc<AppState>,
    user_id: &str,
) -> Option<ServerMessage> {
    // Result fetching works without a live session.
    if let ClientMessage::FetchResult { contest_id } = &msg {
        return Some(fetch_result(state, session, user_id, contest_id).await);
    }

    let Some(session) = session else {
        return Some(ServerMessage::Error {
            code: "NOT_JOINED".to_string(),
            msg: "Join a contest first".to_string(),
        });
    };

    match msg {
        ClientMessage::SelectAnswer {
            question_id,
            selection,
        } => reply_answer_state(session, session.set_answer(&question_id, &selection).await).await,

        ClientMessage::MarkVisited { index } => {
            reply_answer_state(session, session.mark_visited(index).await).await
        }

        ClientMessage::ToggleReview { index } => {
            reply_answer_state(session, session.toggle_review(index).await).await
        }

        ClientMessage::Page { event } => {
            // Warnings and forced-submit notices arrive via the session's
            // broadcast channel; nothing to answer directly.
            monitor::report_page_event(session, event).await;
            None
        }

        ClientMessage::Submit => match session.submit(CommitTrigger::Manual).await {
            // Success and failure both land on the broadcast channel.
            SubmitOutcome::Committed(_)
            | SubmitOutcome::RetryableError(_)
            | SubmitOutcome::InFlight => None,
            SubmitOutcome::AlreadySubmitted => Some(ServerMessage::AlreadySubmitted {
                participation_id: Some(session.participation.id.clone()),
            }),
        },

        // Handled above.
        ClientMessage::Join { .. } | ClientMessage::FetchResult { .. } => None,
    }
}

async fn reply_answer_state(
    session: &Arc<Session>,
    result: Result<(), String>,
) -> Option<ServerMessage> {
    match result {
        Ok(()) => {
            let (records, current_index) = session.snapshot().await;
            Some(ServerMessage::AnswerState {
                records,
                current_index,
            })
        }
        Err(msg) => Some(ServerMessage::Error {
            code: "REJECTED".to_string(),
            msg,
        }),
    }
}

/// Resolve the results view, with or without a live session.
async fn fetch_result(
    state: &Arc<AppState>,
    session: Option<&Arc<Session>>,
    user_id: &str,
    contest_id: &str,
) -> ServerMessage {
    let contest = match session.filter(|s| s.contest.id == contest_id) {
        Some(s) => s.contest.clone(),
        None => match state.backend.fetch_contest(contest_id).await {
            Ok(contest) => contest,
            Err(e) => {
                return ServerMessage::Error {
                    code: "RESULT_UNAVAILABLE".to_string(),
                    msg: e.to_string(),
                }
            }
        },
    };

    let participation_id = match session.filter(|s| s.contest.id == contest_id) {
        Some(s) => s.participation.id.clone(),
        None => {
            match state
                .backend
                .participation_status(contest_id, user_id)
                .await
            {
                Ok(status) => match status.participation_id {
                    Some(pid) => pid,
                    None => {
                        return ServerMessage::Error {
                            code: "RESULT_UNAVAILABLE".to_string(),
                            msg: "No participation for this contest".to_string(),
                        }
                    }
                },
                Err(e) => {
                    return ServerMessage::Error {
                        code: "RESULT_UNAVAILABLE".to_string(),
                        msg: e.to_string(),
                    }
                }
            }
        }
    };

    match state.backend.result(contest_id, &participation_id).await {
        Ok(result) => {
            let summary = score::summarize(&contest, &result.receipt);
            let rank = score::rank_of(&result.scores, summary.final_score);
            ServerMessage::ResultReady {
                summary,
                rank,
                details: result.receipt.details,
            }
        }
        // Not an error: show a countdown and come back at contest end.
        Err(BackendError::ContestRunning) => ServerMessage::ResultPending {
            ends_at: contest.end_time,
        },
        Err(e) => ServerMessage::Error {
            code: "RESULT_UNAVAILABLE".to_string(),
            msg: e.to_string(),
        },
    }
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
