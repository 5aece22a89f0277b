// Live collections of bids and customers.

pub mod connection;
pub mod event;
pub mod liveness;
pub mod store;
pub mod sync;
pub mod transport;

pub use connection::{connection_status_for, ConnectionStatus, TransportSignal};
pub use event::{parse_message, Change, EventKind, Heartbeat, Inbound, MalformedEvent, StoreEvent, WireMessage};
pub use liveness::{Liveness, LivenessGuard};
pub use store::{Applied, Collection, RealtimeStore, Snapshot};
pub use sync::{RealtimeSync, StoreReader, SyncCommand, SyncExit, SyncHandle};
pub use transport::{
    reconnect_delays, EventTransport, TransportError, TransportFrame, TransportSettings,
    WebSocketTransport,
};
