//! In-memory collections fed by a REST snapshot and the event feed.
//!
//! Every reducer here is idempotent and order tolerant: a duplicate create
//! overwrites, an update for an unknown id inserts, a delete for an unknown
//! id does nothing. The feed offers no replay, so gaps and duplicates have
//! to be absorbed rather than reported.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::connection::{connection_status_for, ConnectionStatus, TransportSignal};
use super::event::{parse_message, Change, Inbound, MalformedEvent, StoreEvent};
use crate::model::{Bid, Customer, Entity, EntityId, EntityKind};
use crate::workflow::BidStatus;

/// Records of one kind keyed by id. Iteration order carries no meaning.
#[derive(Debug, Clone, PartialEq)]
pub struct Collection<E> {
    records: HashMap<EntityId, E>,
}

impl<E> Default for Collection<E> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<E: Entity> Collection<E> {
    /// Drop everything and key `records` by id. A later duplicate id in the
    /// input wins.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = E>) {
        self.records = records
            .into_iter()
            .map(|record| (record.id().clone(), record))
            .collect();
    }

    /// Insert or overwrite, returning the record that was there before.
    pub fn upsert(&mut self, record: E) -> Option<E> {
        self.records.insert(record.id().clone(), record)
    }

    pub fn remove(&mut self, id: &EntityId) -> Option<E> {
        self.records.remove(id)
    }

    pub fn get(&self, id: &EntityId) -> Option<&E> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = &E> {
        self.records.values()
    }
}

/// A full listing for one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Bids(Vec<Bid>),
    Customers(Vec<Customer>),
}

impl Snapshot {
    pub fn kind(&self) -> EntityKind {
        match self {
            Snapshot::Bids(_) => EntityKind::Bid,
            Snapshot::Customers(_) => EntityKind::Customer,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Snapshot::Bids(records) => records.len(),
            Snapshot::Customers(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What an event did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Inserted,
    /// Overwrote an existing record. For bids whose status moved, the old
    /// status is reported.
    Replaced { previous_status: Option<BidStatus> },
    Removed,
    /// Delete for an id that was not present
    Unchanged,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RealtimeStore {
    bids: Collection<Bid>,
    customers: Collection<Customer>,
    connection: ConnectionStatus,
}

impl RealtimeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection of the snapshot's kind. Nothing from a
    /// previous snapshot or earlier events survives for that kind.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
        let kind = snapshot.kind();
        let count = snapshot.len();
        match snapshot {
            Snapshot::Bids(records) => self.bids.replace_all(records),
            Snapshot::Customers(records) => self.customers.replace_all(records),
        }
        info!(kind = %kind, records = count, "Applied snapshot");
    }

    pub fn apply_event(&mut self, event: StoreEvent) -> Applied {
        let kind = event.entity_kind();
        let event_kind = event.kind();
        let id = event.id().clone();

        let applied = match event {
            StoreEvent::Bid(change) => {
                let (applied, previous) = apply_change(&mut self.bids, change);
                match (applied, previous) {
                    (Applied::Replaced { .. }, Some(previous)) => {
                        // look at the record that is now stored
                        let current = self.bids.get(&id).map(|bid| bid.status);
                        let previous_status =
                            (current != Some(previous.status)).then_some(previous.status);
                        if let (Some(from), Some(to)) = (previous_status, current) {
                            info!(bid_id = %id, from = %from, to = %to, "Bid status changed");
                        }
                        Applied::Replaced { previous_status }
                    }
                    (applied, _) => applied,
                }
            }
            StoreEvent::Customer(change) => apply_change(&mut self.customers, change).0,
        };

        debug!(
            kind = %kind,
            event = event_kind.as_str(),
            id = %id,
            applied = ?applied,
            "Applied event"
        );
        applied
    }

    /// Parse and apply one text frame. Malformed frames are logged and
    /// handed back; the store is left untouched. Heartbeats yield `None`.
    pub fn apply_message(&mut self, text: &str) -> Result<Option<Applied>, MalformedEvent> {
        match parse_message(text) {
            Ok(Inbound::Event(event)) => Ok(Some(self.apply_event(event))),
            Ok(Inbound::Heartbeat(beat)) => {
                debug!(heartbeat = ?beat, "Heartbeat received");
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "Dropping malformed event");
                Err(err)
            }
        }
    }

    /// Track a transport lifecycle signal. Cached records are kept whatever
    /// the connection does.
    pub fn apply_signal(&mut self, signal: TransportSignal) -> ConnectionStatus {
        let next = connection_status_for(self.connection, signal);
        if next != self.connection {
            info!(from = %self.connection, to = %next, signal = ?signal, "Connection status changed");
        }
        self.connection = next;
        next
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection
    }

    pub fn bids(&self) -> &Collection<Bid> {
        &self.bids
    }

    pub fn customers(&self) -> &Collection<Customer> {
        &self.customers
    }

    pub fn bid(&self, id: &EntityId) -> Option<&Bid> {
        self.bids.get(id)
    }

    pub fn customer(&self, id: &EntityId) -> Option<&Customer> {
        self.customers.get(id)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Bid => self.bids.len(),
            EntityKind::Customer => self.customers.len(),
        }
    }

    /// Number of bids per status, for the dashboard summary.
    pub fn status_distribution(&self) -> BTreeMap<BidStatus, usize> {
        let mut distribution = BTreeMap::new();
        for bid in self.bids.values() {
            *distribution.entry(bid.status).or_insert(0) += 1;
        }
        distribution
    }

    pub fn active_bid_count(&self) -> usize {
        self.bids.values().filter(|bid| bid.status.is_active()).count()
    }
}

fn apply_change<E: Entity>(
    collection: &mut Collection<E>,
    change: Change<E>,
) -> (Applied, Option<E>) {
    match change {
        // a create for a known id is treated exactly like an update
        Change::Created(record) | Change::Updated(record) => match collection.upsert(record) {
            Some(previous) => (
                Applied::Replaced {
                    previous_status: None,
                },
                Some(previous),
            ),
            None => (Applied::Inserted, None),
        },
        Change::Deleted(id) => match collection.remove(&id) {
            Some(previous) => (Applied::Removed, Some(previous)),
            None => (Applied::Unchanged, None),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bid(id: u64, status: BidStatus) -> Bid {
        Bid::new(id, status)
    }

    #[test]
    fn test_snapshot_then_update() {
        let mut store = RealtimeStore::new();
        store.apply_snapshot(Snapshot::Bids(vec![bid(1, BidStatus::Draft)]));

        let applied = store
            .apply_message(r#"{"type":"bid_updated","payload":{"id":1,"status":"submitted"}}"#)
            .unwrap();

        assert_eq!(
            applied,
            Some(Applied::Replaced {
                previous_status: Some(BidStatus::Draft)
            })
        );
        assert_eq!(store.bids().len(), 1);
        assert_eq!(
            store.bid(&EntityId::from(1)).map(|b| b.status),
            Some(BidStatus::Submitted)
        );
    }

    #[test]
    fn test_update_without_status_change_reports_none() {
        let mut store = RealtimeStore::new();
        store.apply_event(StoreEvent::Bid(Change::Created(bid(5, BidStatus::Approved))));

        let applied = store.apply_event(StoreEvent::Bid(Change::Updated(
            bid(5, BidStatus::Approved).with_field("title", "Renamed"),
        )));

        assert_eq!(
            applied,
            Applied::Replaced {
                previous_status: None
            }
        );
    }

    #[test]
    fn test_update_for_unknown_id_inserts() {
        let mut store = RealtimeStore::new();
        let applied = store.apply_event(StoreEvent::Bid(Change::Updated(bid(8, BidStatus::Won))));
        assert_eq!(applied, Applied::Inserted);
        assert!(store.bids().contains(&EntityId::from(8)));
    }

    #[test]
    fn test_delete_unknown_id_is_noop() {
        let mut store = RealtimeStore::new();
        store.apply_snapshot(Snapshot::Bids(vec![bid(1, BidStatus::Draft)]));
        let before = store.clone();

        let applied = store.apply_event(StoreEvent::Bid(Change::Deleted(EntityId::from(99))));

        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(store, before);
    }

    #[test]
    fn test_malformed_message_leaves_store_untouched() {
        let mut store = RealtimeStore::new();
        store.apply_snapshot(Snapshot::Bids(vec![bid(1, BidStatus::Draft)]));
        let before = store.clone();

        assert!(store.apply_message(r#"{"type":"bid_updated","payload":{}}"#).is_err());
        assert!(store.apply_message("{").is_err());
        assert_eq!(store, before);

        // and the next good event still applies
        store
            .apply_message(r#"{"type":"bid_deleted","payload":{"id":1}}"#)
            .unwrap();
        assert!(store.bids().is_empty());
    }

    #[test]
    fn test_heartbeat_is_not_an_event() {
        let mut store = RealtimeStore::new();
        assert_eq!(store.apply_message(r#"{"type":"pong"}"#), Ok(None));
    }

    #[test]
    fn test_customer_and_bid_collections_are_independent() {
        let mut store = RealtimeStore::new();
        store.apply_snapshot(Snapshot::Bids(vec![bid(1, BidStatus::Draft)]));
        store.apply_snapshot(Snapshot::Customers(vec![Customer::new(1, "Acme")]));
        store.apply_event(StoreEvent::Customer(Change::Deleted(EntityId::from(1))));

        assert_eq!(store.len(EntityKind::Bid), 1);
        assert_eq!(store.len(EntityKind::Customer), 0);
    }

    #[test]
    fn test_disconnect_keeps_data() {
        let mut store = RealtimeStore::new();
        store.apply_signal(TransportSignal::Connecting);
        store.apply_signal(TransportSignal::Open);
        store.apply_snapshot(Snapshot::Bids(vec![bid(1, BidStatus::Draft)]));

        store.apply_signal(TransportSignal::Close { clean: false });

        assert_eq!(store.connection_status(), ConnectionStatus::Disconnected);
        assert_eq!(store.bids().len(), 1);
    }

    #[test]
    fn test_status_distribution() {
        let mut store = RealtimeStore::new();
        store.apply_snapshot(Snapshot::Bids(vec![
            bid(1, BidStatus::Draft),
            bid(2, BidStatus::Draft),
            bid(3, BidStatus::Won),
            bid(4, BidStatus::Cancelled),
        ]));

        let distribution = store.status_distribution();
        assert_eq!(distribution.get(&BidStatus::Draft), Some(&2));
        assert_eq!(distribution.get(&BidStatus::Won), Some(&1));
        assert_eq!(distribution.get(&BidStatus::Submitted), None);
        assert_eq!(store.active_bid_count(), 2);
    }
}
