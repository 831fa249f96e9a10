//! WebSocket connector backed by tokio-tungstenite.

use crate::errors::{LinkError, LinkResult};
use crate::traits::{Connector, WireConnection, WireFrame};
use async_trait::async_trait;
use futures_util::{future, SinkExt, StreamExt};
use log::debug;
use tokio_tungstenite::tungstenite::{self, Message};

#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> LinkResult<WireConnection> {
        let (socket, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| LinkError::Connect(format!("{}: {}", url, e)))?;
        debug!(
            "WebSocket handshake completed: url={}, status={}",
            url,
            response.status()
        );

        let (sink, stream) = socket.split();
        let sink = sink
            .sink_map_err(LinkError::from)
            .with(|frame: WireFrame| future::ready(Ok::<_, LinkError>(into_message(frame))));
        let stream = stream.filter_map(|message| future::ready(into_frame(message)));

        Ok(WireConnection {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}

fn into_message(frame: WireFrame) -> Message {
    match frame {
        WireFrame::Text(text) => Message::Text(text),
        WireFrame::Binary(bytes) => Message::Binary(bytes),
        WireFrame::Close => Message::Close(None),
    }
}

fn into_frame(message: Result<Message, tungstenite::Error>) -> Option<LinkResult<WireFrame>> {
    match message {
        Ok(Message::Text(text)) => Some(Ok(WireFrame::Text(text))),
        Ok(Message::Binary(bytes)) => Some(Ok(WireFrame::Binary(bytes))),
        Ok(Message::Close(frame)) => {
            if let Some(frame) = frame {
                debug!(
                    "WebSocket closed by peer: code={}, reason={}",
                    frame.code, frame.reason
                );
            }
            Some(Ok(WireFrame::Close))
        }
        // tungstenite answers pings itself
        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => None,
        Err(e) => Some(Err(LinkError::from(e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_frames_are_filtered() {
        assert!(into_frame(Ok(Message::Ping(vec![1]))).is_none());
        assert!(into_frame(Ok(Message::Pong(vec![]))).is_none());
        assert!(matches!(
            into_frame(Ok(Message::Text("{}".to_string()))),
            Some(Ok(WireFrame::Text(_)))
        ));
        assert!(matches!(
            into_frame(Err(tungstenite::Error::ConnectionClosed)),
            Some(Err(LinkError::Closed))
        ));
    }

    #[test]
    fn close_maps_to_close_message() {
        assert_eq!(into_message(WireFrame::Close), Message::Close(None));
        assert_eq!(
            into_message(WireFrame::Text("hi".to_string())),
            Message::Text("hi".to_string())
        );
    }
}
