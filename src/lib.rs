extern crate bincode;
extern crate hex;
#[macro_use]
extern crate log;
extern crate rand;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate thiserror;
extern crate time;

mod error;
mod key;
mod node;
mod protocol;
mod routing;
mod storage;

pub use self::error::Error;
pub use self::key::{BitString, Distance, Key};
pub use self::node::contact::Contact;
pub use self::node::{Dht, DhtConfig, FindValue};
pub use self::protocol::{Message, Pinger, Request, RequestPayload, Response, ResponsePayload};
pub use self::routing::bucket::{InsertOutcome, KBucket};
pub use self::routing::RoutingTable;
pub use self::storage::{Storage, Value};

/// The number of bytes in a key.
pub const KEY_LENGTH: usize = 20;

/// The maximum length of an encoded message in bytes.
pub const MESSAGE_LENGTH: usize = 8196;

/// The number of k-buckets in the routing table.
pub const ROUTING_TABLE_SIZE: usize = KEY_LENGTH * 8;

/// The maximum number of entries in a k-bucket.
pub const REPLICATION_PARAM: usize = 20;

/// The default number of contacts handed to a round of an iterative lookup.
pub const CONCURRENCY_PARAM: usize = 3;

/// Bucket refresh interval in seconds
pub const BUCKET_REFRESH_INTERVAL: i64 = 3600;
