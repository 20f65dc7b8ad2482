pub mod bucket;

use time::Duration;

use self::bucket::{InsertOutcome, KBucket};
use crate::error::Error;
use crate::key::{BitString, Key};
use crate::node::contact::Contact;
use crate::ROUTING_TABLE_SIZE;

/// A node's routing table.
///
/// `RoutingTable` is a fixed array of `ROUTING_TABLE_SIZE` k-buckets. Bucket `i` holds the
/// contacts whose distance to the local key has its first set bit at position
/// `ROUTING_TABLE_SIZE - 1 - i`, so bucket `0` covers the closest contacts and bucket `159` the
/// half of the key space that differs in the top bit. Buckets are never split.
#[derive(Clone, Debug)]
pub struct RoutingTable {
    id: Key,
    buckets: Vec<KBucket>,
}

impl RoutingTable {
    /// Constructs a new `RoutingTable` of empty buckets for the local key `id`.
    pub fn new(id: Key) -> Self {
        RoutingTable {
            id,
            buckets: (0..ROUTING_TABLE_SIZE).map(|_| KBucket::new()).collect(),
        }
    }

    /// Returns the local key.
    pub fn id(&self) -> Key {
        self.id
    }

    /// Returns the bucket that a distance belongs to. A zero distance maps to bucket `0`.
    pub fn bucket_index_for<B: BitString>(delta: &B) -> usize {
        (0..ROUTING_TABLE_SIZE)
            .find(|&i| delta.bit_at(i))
            .map_or(0, |i| ROUTING_TABLE_SIZE - 1 - i)
    }

    /// Returns the bucket that `id` belongs to.
    pub fn bucket_index(&self, id: &Key) -> usize {
        RoutingTable::bucket_index_for(&self.id.distance_to(id))
    }

    /// Determines the order in which buckets are visited to find the contacts closest to a key at
    /// distance `delta` from the local key.
    ///
    /// Every set bit of `delta`, from the most significant down, contributes its bucket first.
    /// The buckets of the zero bits follow, least significant bit first. For example if the local
    /// key is `1001110110000101` and the target is `1001111110100001`, the delta is
    /// `0000001000100100`: the closest contacts live in bucket 9, then 5, then 2, and after those
    /// the remaining buckets are visited in ascending order starting with bucket 0.
    ///
    /// Any contact in an earlier bucket is strictly closer to the target than any contact in a
    /// later bucket.
    pub fn visit_order<B: BitString>(delta: &B) -> Vec<usize> {
        let mut near = Vec::with_capacity(ROUTING_TABLE_SIZE);
        let mut far = Vec::with_capacity(ROUTING_TABLE_SIZE);

        for i in 0..ROUTING_TABLE_SIZE {
            let index = ROUTING_TABLE_SIZE - 1 - i;
            if delta.bit_at(i) {
                near.push(index);
            } else {
                far.push(index);
            }
        }

        near.extend(far.into_iter().rev());
        near
    }

    /// Offers a contact to the bucket it belongs to, returning the bucket's outcome together with
    /// the index of the bucket.
    pub fn add(&mut self, contact: Contact) -> Result<(InsertOutcome, usize), Error> {
        if contact.id == self.id {
            warn!("{:?} - Refusing to add the local key", self.id);
            return Err(Error::LocalContact);
        }

        let index = self.bucket_index(&contact.id);
        let outcome = self.buckets[index].insert(contact);
        debug!("{:?} - Bucket {}: {:?}", self.id, index, outcome);
        Ok((outcome, index))
    }

    /// Returns the `count` contacts closest to `id`, closest first.
    pub fn closest(&self, count: usize, id: &Key) -> Vec<Contact> {
        let mut ret = Vec::with_capacity(count);

        for index in RoutingTable::visit_order(&self.id.distance_to(id)) {
            if ret.len() >= count {
                break;
            }
            ret.extend(self.buckets[index].closest(count, id));
        }

        ret.truncate(count);
        ret
    }

    /// Returns the `alpha` contacts closest to `id`; the starting points of one round of an
    /// iterative lookup.
    pub fn alpha_nodes(&self, alpha: usize, id: &Key) -> Vec<Contact> {
        self.closest(alpha, id)
    }

    /// Moves the contact with `id` to the tail of its bucket. Returns `false` if it is unknown.
    pub fn refresh(&mut self, id: &Key) -> bool {
        let index = self.bucket_index(id);
        let bucket = &mut self.buckets[index];
        match bucket.position(id) {
            Some(position) => bucket.move_to_tail(position).is_ok(),
            None => false,
        }
    }

    /// Removes the contact with `id` from the routing table.
    pub fn remove(&mut self, id: &Key) -> Option<Contact> {
        let index = self.bucket_index(id);
        self.buckets[index].remove(id)
    }

    /// Returns the bucket at `index`.
    pub fn bucket(&self, index: usize) -> Option<&KBucket> {
        self.buckets.get(index)
    }

    /// Returns the indexes of the non-empty buckets that have not been updated within `interval`.
    pub fn stale_indexes(&self, interval: Duration) -> Vec<usize> {
        self.buckets
            .iter()
            .enumerate()
            .filter(|(_, bucket)| !bucket.is_empty() && bucket.is_stale(interval))
            .map(|(i, _)| i)
            .collect()
    }

    /// Returns the number of contacts in the routing table.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(KBucket::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(KBucket::is_empty)
    }
}
