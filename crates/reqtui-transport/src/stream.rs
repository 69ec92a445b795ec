//! The Stream Runner (spec §4.5): drives SSE frame parsing and the
//! WebSocket declarative script, racing cancellation at every suspension
//! point so a mid-stream cancel leaves whatever was captured so far intact.

use std::path::PathBuf;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use eventsource_stream::Eventsource;
use futures_util::{SinkExt, StreamExt};
use reqtui_model::{CancelToken, ErrKind, StreamEventRecord, StreamInfo};
use tokio_tungstenite::tungstenite::Message as WsMessage;

/// One step of a WebSocket script (spec §4.4: "dial and run the declared
/// script of send/receive directives... until terminal state or
/// cancellation").
#[derive(Debug, Clone)]
pub enum WsDirective {
    Send(String),
    SendJson(serde_json::Value),
    SendBase64(String),
    SendFile(PathBuf),
    Ping,
    Pong,
    Wait(Duration),
    Close,
}

/// Runs an SSE stream against an already-established HTTP response body,
/// parsing `data:`/`event:`/`id:` frames flushed on a blank line.
pub async fn run_sse(
    response: reqwest::Response,
    info: &mut StreamInfo,
    cancel: CancelToken,
) -> Result<(), ErrKind> {
    let mut events = response.bytes_stream().eventsource();
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.canceled() => return Err(ErrKind::Canceled),
            next = events.next() => next,
        };

        let Some(event) = next else {
            info.terminal = true;
            return Ok(());
        };

        let event = event.map_err(|e| ErrKind::Stream(e.to_string()))?;
        let json = serde_json::from_str(&event.data).ok();
        info.push_received(StreamEventRecord {
            event_type: if event.event.is_empty() {
                None
            } else {
                Some(event.event)
            },
            id: if event.id.is_empty() { None } else { Some(event.id) },
            data: event.data,
            json,
            sent: false,
        });
    }
}

/// Runs a WebSocket connection and its declarative script (spec §4.4,
/// §4.5). Each directive races cancellation independently so a cancel
/// between steps still leaves prior sends/receives captured.
pub async fn run_ws(
    url: &str,
    script: &[WsDirective],
    info: &mut StreamInfo,
    cancel: CancelToken,
) -> Result<(), ErrKind> {
    let (ws, _response) = tokio::select! {
        biased;
        _ = cancel.canceled() => return Err(ErrKind::Canceled),
        result = tokio_tungstenite::connect_async(url) => {
            result.map_err(|e| ErrKind::Transport(e.to_string()))?
        }
    };
    let (mut write, mut read) = ws.split();

    for directive in script {
        if cancel.is_canceled() {
            return Err(ErrKind::Canceled);
        }
        match directive {
            WsDirective::Send(text) => {
                send_text(&mut write, text.clone(), info, &cancel).await?;
            }
            WsDirective::SendJson(value) => {
                let text = serde_json::to_string(value).map_err(|e| ErrKind::Stream(e.to_string()))?;
                send_text(&mut write, text, info, &cancel).await?;
            }
            WsDirective::SendBase64(encoded) => {
                let bytes = BASE64
                    .decode(encoded)
                    .map_err(|e| ErrKind::Stream(e.to_string()))?;
                send_message(&mut write, WsMessage::Binary(bytes.into()), &cancel).await?;
                info.push_sent(StreamEventRecord {
                    event_type: None,
                    id: None,
                    data: encoded.clone(),
                    json: None,
                    sent: true,
                });
            }
            WsDirective::SendFile(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|e| ErrKind::Stream(format!("{}: {e}", path.display())))?;
                let encoded = BASE64.encode(&bytes);
                send_message(&mut write, WsMessage::Binary(bytes.into()), &cancel).await?;
                info.push_sent(StreamEventRecord {
                    event_type: None,
                    id: None,
                    data: encoded,
                    json: None,
                    sent: true,
                });
            }
            WsDirective::Ping => {
                send_message(&mut write, WsMessage::Ping(Vec::new().into()), &cancel).await?;
            }
            WsDirective::Pong => {
                send_message(&mut write, WsMessage::Pong(Vec::new().into()), &cancel).await?;
            }
            WsDirective::Wait(duration) => {
                tokio::select! {
                    biased;
                    _ = cancel.canceled() => return Err(ErrKind::Canceled),
                    _ = tokio::time::sleep(*duration) => {}
                }
            }
            WsDirective::Close => {
                let _ = write.send(WsMessage::Close(None)).await;
                info.terminal = true;
                return Ok(());
            }
        }
    }

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.canceled() => return Err(ErrKind::Canceled),
            next = read.next() => next,
        };
        match next {
            Some(frame) => record_incoming(info, frame)?,
            None => {
                info.terminal = true;
                return Ok(());
            }
        }
    }
}

fn record_incoming(
    info: &mut StreamInfo,
    frame: Result<WsMessage, tokio_tungstenite::tungstenite::Error>,
) -> Result<(), ErrKind> {
    let frame = frame.map_err(|e| ErrKind::Stream(e.to_string()))?;
    match frame {
        WsMessage::Text(text) => {
            let json = serde_json::from_str(&text).ok();
            info.push_received(StreamEventRecord {
                event_type: None,
                id: None,
                data: text.to_string(),
                json,
                sent: false,
            });
        }
        WsMessage::Binary(bytes) => {
            info.push_received(StreamEventRecord {
                event_type: None,
                id: None,
                data: BASE64.encode(&bytes),
                json: None,
                sent: false,
            });
        }
        WsMessage::Close(_) => {
            info.terminal = true;
        }
        _ => {}
    }
    Ok(())
}

async fn send_text(
    write: &mut (impl futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
              + Unpin),
    text: String,
    info: &mut StreamInfo,
    cancel: &CancelToken,
) -> Result<(), ErrKind> {
    let json = serde_json::from_str(&text).ok();
    send_message(write, WsMessage::Text(text.clone().into()), cancel).await?;
    info.push_sent(StreamEventRecord {
        event_type: None,
        id: None,
        data: text,
        json,
        sent: true,
    });
    Ok(())
}

async fn send_message(
    write: &mut (impl futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error>
              + Unpin),
    message: WsMessage,
    cancel: &CancelToken,
) -> Result<(), ErrKind> {
    tokio::select! {
        biased;
        _ = cancel.canceled() => Err(ErrKind::Canceled),
        result = write.send(message) => result.map_err(|e| ErrKind::Transport(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqtui_model::StreamKind;

    #[test]
    fn directives_cover_the_declared_script_shapes() {
        let script = vec![
            WsDirective::Send("hi".into()),
            WsDirective::SendJson(serde_json::json!({"a": 1})),
            WsDirective::Ping,
            WsDirective::Wait(Duration::from_millis(10)),
            WsDirective::Close,
        ];
        assert_eq!(script.len(), 5);
    }

    #[test]
    fn stream_info_starts_non_terminal() {
        let info = StreamInfo::new(StreamKind::WebSocket);
        assert!(!info.terminal);
    }
}
