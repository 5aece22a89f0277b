// The single writer of the realtime store.
//
// One task owns the store. It seeds it from REST, then folds transport
// frames and view commands into it in the order they arrive. Everyone else
// reads through a `StoreReader`.

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn, Instrument};

use super::connection::ConnectionStatus;
use super::event::{parse_message, Inbound, StoreEvent};
use super::liveness::Liveness;
use super::store::{Applied, RealtimeStore, Snapshot};
use super::transport::{EventTransport, TransportFrame};
use crate::api::{fetch_all_bids, fetch_all_customers, BidApi, BidQuery, DEFAULT_PAGE_SIZE};
use crate::telemetry::create_sync_span;

const FRAME_BUFFER: usize = 256;

/// Read-only view of the store with change notification.
#[derive(Debug, Clone)]
pub struct StoreReader {
    rx: watch::Receiver<RealtimeStore>,
}

impl StoreReader {
    /// Borrow the current store. Do not hold across an await.
    pub fn current(&self) -> watch::Ref<'_, RealtimeStore> {
        self.rx.borrow()
    }

    pub fn snapshot(&self) -> RealtimeStore {
        self.rx.borrow().clone()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.rx.borrow().connection_status()
    }

    /// Wait for the next write. `false` once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SyncCommand {
    /// Fold a locally produced result, e.g. a committed status change
    Apply(StoreEvent),
    /// Reload both snapshots before handling anything queued after this
    Refresh,
}

/// Sends commands to a running [`RealtimeSync`].
#[derive(Debug, Clone)]
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
}

impl SyncHandle {
    /// Returns false when the sync loop has stopped.
    pub fn apply(&self, event: StoreEvent) -> bool {
        self.commands.send(SyncCommand::Apply(event)).is_ok()
    }

    pub fn refresh(&self) -> bool {
        self.commands.send(SyncCommand::Refresh).is_ok()
    }
}

/// Why [`RealtimeSync::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncExit {
    /// The transport gave up or was closed by the server
    FeedEnded,
    TornDown,
}

pub struct RealtimeSync<A, T> {
    api: A,
    transport: T,
    store: watch::Sender<RealtimeStore>,
    commands: mpsc::UnboundedReceiver<SyncCommand>,
    liveness: Liveness,
    page_size: u32,
}

impl<A, T> RealtimeSync<A, T>
where
    A: BidApi,
    T: EventTransport + 'static,
{
    pub fn new(api: A, transport: T, liveness: Liveness) -> (Self, StoreReader, SyncHandle) {
        let (store, rx) = watch::channel(RealtimeStore::new());
        let (tx, commands) = mpsc::unbounded_channel();

        let sync = Self {
            api,
            transport,
            store,
            commands,
            liveness,
            page_size: DEFAULT_PAGE_SIZE,
        };
        (sync, StoreReader { rx }, SyncHandle { commands: tx })
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub async fn run(self) -> SyncExit {
        let span = create_sync_span("realtime_sync");
        self.run_inner().instrument(span).await
    }

    async fn run_inner(self) -> SyncExit {
        let Self {
            api,
            transport,
            store,
            mut commands,
            liveness,
            page_size,
        } = self;
        let writer = Writer {
            store,
            liveness: liveness.clone(),
        };

        writer.load_snapshots(&api, page_size).await;

        let (frame_tx, mut frames) = mpsc::channel(FRAME_BUFFER);
        let pump = tokio::spawn(pump_frames(transport, frame_tx));
        let mut commands_open = true;

        let exit = loop {
            if !liveness.is_alive() {
                break SyncExit::TornDown;
            }

            tokio::select! {
                _ = liveness.dead() => break SyncExit::TornDown,
                frame = frames.recv() => match frame {
                    Some(frame) => writer.apply_frame(&api, frame).await,
                    None => {
                        info!("Event feed ended");
                        break SyncExit::FeedEnded;
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(SyncCommand::Apply(event)) => writer.apply_event(event),
                    Some(SyncCommand::Refresh) => writer.load_snapshots(&api, page_size).await,
                    None => {
                        debug!("All sync handles dropped");
                        commands_open = false;
                    }
                },
            }
        };

        drop(frames);
        if let Err(err) = pump.await {
            warn!(error = %err, "Frame pump panicked");
        }
        info!(exit = ?exit, "Realtime sync stopped");
        exit
    }
}

struct Writer {
    store: watch::Sender<RealtimeStore>,
    liveness: Liveness,
}

impl Writer {
    /// Run `mutate` unless the owner is gone. Readers are only woken when
    /// it reports a change.
    fn write(&self, mutate: impl FnOnce(&mut RealtimeStore) -> bool) {
        if !self.liveness.is_alive() {
            debug!("Discarding write after teardown");
            return;
        }
        self.store.send_if_modified(mutate);
    }

    async fn load_snapshots<A: BidApi>(&self, api: &A, page_size: u32) {
        let query = BidQuery::new().with_page_size(page_size);

        match fetch_all_bids(api, query.clone()).await {
            Ok(bids) => self.write(|store| {
                store.apply_snapshot(Snapshot::Bids(bids));
                true
            }),
            Err(err) => warn!(error = %err, "Failed to load bid snapshot"),
        }

        match fetch_all_customers(api, query).await {
            Ok(customers) => self.write(|store| {
                store.apply_snapshot(Snapshot::Customers(customers));
                true
            }),
            Err(err) => warn!(error = %err, "Failed to load customer snapshot"),
        }
    }

    /// Fold one transport frame. A pushed bid change also drops the API
    /// client's cached copy so the next detail read goes to the server.
    async fn apply_frame<A: BidApi>(&self, api: &A, frame: TransportFrame) {
        match frame {
            TransportFrame::Signal(signal) => self.write(|store| {
                let before = store.connection_status();
                store.apply_signal(signal) != before
            }),
            TransportFrame::Text(text) => match parse_message(&text) {
                Ok(Inbound::Event(event)) => {
                    let pushed_bid =
                        matches!(event, StoreEvent::Bid(_)).then(|| event.id().clone());
                    self.apply_event(event);
                    if let Some(id) = pushed_bid {
                        api.invalidate(&id).await;
                    }
                }
                Ok(Inbound::Heartbeat(beat)) => debug!(heartbeat = ?beat, "Heartbeat received"),
                Err(err) => warn!(error = %err, "Dropping malformed event"),
            },
        }
    }

    fn apply_event(&self, event: StoreEvent) {
        self.write(|store| store.apply_event(event) != Applied::Unchanged);
    }
}

/// Move frames from the transport into `frames` until either side stops.
async fn pump_frames<T: EventTransport>(mut transport: T, frames: mpsc::Sender<TransportFrame>) {
    loop {
        tokio::select! {
            _ = frames.closed() => break,
            frame = transport.next_frame() => match frame {
                Some(frame) => {
                    if frames.send(frame).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    transport.close().await;
}
