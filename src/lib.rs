// bidflow library - bid workflow engine and realtime dashboard store
// This exposes the core components for testing and integration

pub mod api;
pub mod cli;
pub mod config;
pub mod model;
pub mod realtime;
pub mod telemetry;
pub mod workflow;

// Re-export key types for easy access
pub use api::{ApiError, BidApi, BidApiClient, BidQuery, Page};
pub use config::{config, init_config, BidflowConfig};
pub use model::{Bid, Customer, Entity, EntityId, EntityKind};
pub use realtime::{
    ConnectionStatus, EventTransport, Liveness, MalformedEvent, RealtimeStore, RealtimeSync,
    Snapshot, StoreEvent, StoreReader, SyncHandle, TransportFrame, TransportSignal,
    WebSocketTransport,
};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
pub use workflow::{
    can_transition, next_states, request_transition, BidDetailView, BidStatus, CommitOutcome,
    TransitionSession, WorkflowError,
};
