use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection indicator shown next to live data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Lifecycle signal raised by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportSignal {
    /// A connect (or reconnect) attempt is starting
    Connecting,
    Open,
    Close { clean: bool },
    Error,
}

/// Next connection status after `signal`.
///
/// Pairs that make no sense (a close while already disconnected, an error
/// before any attempt) leave the status where it is.
pub fn connection_status_for(
    current: ConnectionStatus,
    signal: TransportSignal,
) -> ConnectionStatus {
    use ConnectionStatus::*;

    match (current, signal) {
        (Disconnected | Error, TransportSignal::Connecting) => Connecting,
        (_, TransportSignal::Open) => Connected,
        (Connecting | Connected, TransportSignal::Error) => Error,
        (Connecting | Connected, TransportSignal::Close { .. }) => Disconnected,
        (unchanged, _) => unchanged,
    }
}
