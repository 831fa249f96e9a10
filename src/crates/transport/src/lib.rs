pub mod adapters;
pub mod codec;
pub mod config;
pub mod connection;
pub mod errors;
pub mod event_bus;
pub mod identity;
pub mod scheduler;
/// Office Link Transport Layer
///
/// Realtime event delivery between the agent office backend and its
/// consumers:
/// - one reconnecting WebSocket connection per client session
/// - JSON envelope codec tolerant of malformed frames
/// - in-order event bus with per-subscriber fault isolation
pub mod traits;

pub use adapters::WebSocketConnector;
pub use codec::Outbound;
pub use config::LinkConfig;
pub use connection::ConnectionManager;
pub use errors::{LinkError, LinkResult};
pub use event_bus::{DispatchReport, EventBus, EventTag, SubscriberFailure, SubscriptionId};
pub use identity::ClientId;
pub use scheduler::{ManualScheduler, ScheduleHandle, ScheduledTask, Scheduler, TokioScheduler};
pub use traits::{Connector, FrameSink, FrameStream, WireConnection, WireFrame};

pub use office_core_types as types;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
