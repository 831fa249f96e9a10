//! Transport seam between the connection manager and the socket library.

use crate::errors::{LinkError, LinkResult};
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::Sink;
use std::pin::Pin;

/// Frame as seen by the connection manager. Ping/pong control frames are
/// handled inside the adapter and never surface here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

pub type FrameSink = Pin<Box<dyn Sink<WireFrame, Error = LinkError> + Send>>;
pub type FrameStream = BoxStream<'static, LinkResult<WireFrame>>;

/// An established connection split into its write and read halves.
pub struct WireConnection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections. One call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> LinkResult<WireConnection>;
}
