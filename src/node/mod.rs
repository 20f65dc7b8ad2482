pub mod contact;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use time::Duration;

use self::contact::Contact;
use crate::error::Error;
use crate::key::Key;
use crate::protocol::{Pinger, Request, RequestPayload, Response, ResponsePayload};
use crate::routing::bucket::InsertOutcome;
use crate::routing::RoutingTable;
use crate::storage::{Storage, Value};
use crate::{BUCKET_REFRESH_INTERVAL, CONCURRENCY_PARAM, REPLICATION_PARAM};

/// Runtime settings of a [`Dht`].
#[derive(Clone, Debug)]
pub struct DhtConfig {
    /// The local key. A random key is generated when `None`.
    pub id: Option<Key>,
    /// The address the transport is reachable at, reported as the receiver of responses.
    pub addr: SocketAddr,
    /// The number of contacts answered to `FIND_NODE` and `FIND_VALUE`.
    pub replication: usize,
    /// The number of contacts handed to one round of an iterative lookup.
    pub alpha: usize,
    /// How long a bucket may go without updates before it needs a refresh.
    pub bucket_refresh_interval: Duration,
}

impl Default for DhtConfig {
    fn default() -> Self {
        DhtConfig {
            id: None,
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            replication: REPLICATION_PARAM,
            alpha: CONCURRENCY_PARAM,
            bucket_refresh_interval: Duration::seconds(BUCKET_REFRESH_INTERVAL),
        }
    }
}

/// The answer to a `FIND_VALUE` query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FindValue {
    /// The value is stored locally.
    Value(Value),
    /// The value is unknown; these are the closest contacts to ask next.
    Nodes(Vec<Contact>),
}

/// The local view of a Kademlia DHT: a routing table and a value store.
///
/// `Dht` is cheap to clone and every clone shares the same state. The routing table is guarded by
/// a single lock which is held for the whole of each table operation and never across a ping.
#[derive(Clone)]
pub struct Dht {
    id: Key,
    config: DhtConfig,
    routing_table: Arc<Mutex<RoutingTable>>,
    storage: Arc<Mutex<Storage>>,
}

impl Dht {
    /// Constructs a `Dht` with a random key and the default settings.
    pub fn new() -> Self {
        Dht::from_config(DhtConfig::default())
    }

    pub fn from_config(config: DhtConfig) -> Self {
        let id = config.id.unwrap_or_else(Key::rand);
        Dht::with_routing_table(RoutingTable::new(id), config)
    }

    /// Constructs a `Dht` around an existing routing table. The table's key wins over
    /// `config.id`.
    pub fn with_routing_table(routing_table: RoutingTable, config: DhtConfig) -> Self {
        let id = routing_table.id();
        info!("{:?} - Starting DHT", id);
        Dht {
            id,
            config: DhtConfig {
                id: Some(id),
                ..config
            },
            routing_table: Arc::new(Mutex::new(routing_table)),
            storage: Arc::new(Mutex::new(Storage::new())),
        }
    }

    /// Returns the local key.
    pub fn id(&self) -> Key {
        self.id
    }

    /// Returns the contact describing the local node.
    pub fn contact(&self) -> Contact {
        Contact::new(self.id, self.config.addr.ip(), self.config.addr.port())
    }

    pub fn config(&self) -> &DhtConfig {
        &self.config
    }

    /// Locks the routing table. A poisoned lock is recovered since every table operation leaves
    /// the table consistent.
    pub fn routing_table(&self) -> MutexGuard<'_, RoutingTable> {
        match self.routing_table.lock() {
            Ok(routing_table) => routing_table,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn storage(&self) -> MutexGuard<'_, Storage> {
        match self.storage.lock() {
            Ok(storage) => storage,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Stores the address of the holder of `key`.
    pub fn store(&self, key: Key, host: IpAddr, port: u16) {
        self.storage().insert(key, Value { host, port });
    }

    /// Returns the value stored under `key`, or the closest known contacts to it.
    pub fn find_value(&self, key: &Key) -> FindValue {
        if let Some(value) = self.storage().get(key) {
            return FindValue::Value(*value);
        }
        FindValue::Nodes(self.find_node(key))
    }

    /// Returns the `replication` closest known contacts to `id`.
    pub fn find_node(&self, id: &Key) -> Vec<Contact> {
        self.routing_table().closest(self.config.replication, id)
    }

    /// Returns the `alpha` closest known contacts to `id`.
    pub fn alpha_nodes(&self, id: &Key) -> Vec<Contact> {
        self.routing_table().alpha_nodes(self.config.alpha, id)
    }

    /// Adds a contact to the routing table.
    pub fn bootstrap(&self, contact: Contact) -> Result<(InsertOutcome, usize), Error> {
        self.routing_table().add(contact)
    }

    /// Records that `contact` was seen, settling a full bucket with `pinger`.
    ///
    /// When the bucket of `contact` is full its head is pinged with the lock released. A head
    /// that answers is moved to the tail and `contact` is dropped; a head that does not is removed
    /// and `contact` is added in its place. Returns the final outcome of adding `contact`.
    pub fn update_routing_table<P: Pinger>(
        &self,
        contact: Contact,
        pinger: &P,
    ) -> Result<InsertOutcome, Error> {
        debug!("{:?} - Updating {:?}", self.id, contact);
        let (outcome, _) = self.routing_table().add(contact.clone())?;
        let head = match outcome {
            InsertOutcome::BucketFull { head } => head,
            outcome => return Ok(outcome),
        };

        if pinger.is_alive(&head) {
            self.routing_table().refresh(&head.id);
            return Ok(InsertOutcome::BucketFull { head });
        }

        let mut routing_table = self.routing_table();
        if routing_table.remove(&head.id).is_some() {
            info!("{:?} - Evicted unresponsive {:?}", self.id, head);
        }
        routing_table.add(contact).map(|(outcome, _)| outcome)
    }

    /// Returns the keys to look up to refresh the buckets that went stale.
    pub fn refresh_targets(&self) -> Vec<Key> {
        self.routing_table()
            .stale_indexes(self.config.bucket_refresh_interval)
            .into_iter()
            .map(|index| self.id.rand_in_bucket(index))
            .collect()
    }

    /// Answers a request RPC. The sender is added to the routing table first.
    pub fn handle_request(&self, request: &Request) -> Response {
        info!(
            "{:?} - Receiving request from {:?} {:?}",
            self.id, request.sender, request.payload,
        );
        match self.bootstrap(request.sender.clone()) {
            Ok((InsertOutcome::BucketFull { head }, index)) => {
                debug!("{:?} - Bucket {} full, head is {:?}", self.id, index, head)
            },
            Ok(_) => {},
            Err(err) => warn!("{:?} - Ignoring sender {:?}: {}", self.id, request.sender, err),
        }

        let payload = match &request.payload {
            RequestPayload::Ping => ResponsePayload::Pong,
            RequestPayload::Store(key, value) => {
                self.store(*key, value.host, value.port);
                ResponsePayload::Pong
            },
            RequestPayload::FindNode(key) => ResponsePayload::Nodes(self.find_node(key)),
            RequestPayload::FindValue(key) => match self.find_value(key) {
                FindValue::Value(value) => ResponsePayload::Value(value),
                FindValue::Nodes(nodes) => ResponsePayload::Nodes(nodes),
            },
        };

        Response {
            request: request.clone(),
            receiver: self.contact(),
            payload,
        }
    }
}

impl Default for Dht {
    fn default() -> Self {
        Dht::new()
    }
}
