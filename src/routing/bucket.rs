use time::{Duration, OffsetDateTime};

use crate::error::Error;
use crate::key::Key;
use crate::node::contact::Contact;
use crate::REPLICATION_PARAM;

/// The result of offering a contact to a k-bucket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The contact was appended to the tail of the bucket.
    Inserted(Contact),
    /// A contact with the same id was already present and has been moved to the tail. Nothing was
    /// added.
    Refreshed(Contact),
    /// The bucket is full and nothing changed. The caller should ping `head`: if it answers it is
    /// refreshed, otherwise it is removed and the new contact is inserted in its place.
    BucketFull { head: Contact },
}

impl InsertOutcome {
    /// Returns the contact carried by the outcome: the offered contact, or the head to ping when
    /// the bucket is full.
    pub fn contact(&self) -> &Contact {
        match self {
            InsertOutcome::Inserted(contact) | InsertOutcome::Refreshed(contact) => contact,
            InsertOutcome::BucketFull { head } => head,
        }
    }
}

/// A k-bucket in a node's routing table that has a maximum capacity of `REPLICATION_PARAM`.
///
/// The contacts in the k-bucket are sorted by the time of the most recent communication with
/// those which have been most recently communicated at the end of the list.
#[derive(Clone, Debug)]
pub struct KBucket {
    contacts: Vec<Contact>,
    last_update_time: OffsetDateTime,
}

impl KBucket {
    /// Constructs a new, empty `KBucket`.
    pub fn new() -> Self {
        KBucket {
            contacts: Vec::with_capacity(REPLICATION_PARAM),
            last_update_time: OffsetDateTime::now_utc(),
        }
    }

    /// Offers a contact to the bucket.
    ///
    /// A known contact is moved to the tail. An unknown contact is appended if there is room.
    /// Otherwise the bucket is left untouched and the least recently seen contact is returned so
    /// that the caller can check whether it is still alive.
    pub fn insert(&mut self, contact: Contact) -> InsertOutcome {
        if let Some(index) = self.position(&contact.id) {
            self.reorder(index);
            return InsertOutcome::Refreshed(contact);
        }

        if self.contacts.len() < REPLICATION_PARAM {
            self.last_update_time = OffsetDateTime::now_utc();
            self.contacts.push(contact.clone());
            return InsertOutcome::Inserted(contact);
        }

        InsertOutcome::BucketFull {
            head: self.contacts[0].clone(),
        }
    }

    /// Moves the contact at `index` (`0` being the head) to the tail, keeping the order of the
    /// others.
    pub fn move_to_tail(&mut self, index: usize) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::NoHeadFound);
        }
        if index >= self.len() {
            return Err(Error::BucketIndexOutOfBounds {
                index,
                size: self.len(),
            });
        }
        self.reorder(index);
        Ok(())
    }

    fn reorder(&mut self, index: usize) {
        self.last_update_time = OffsetDateTime::now_utc();
        let contact = self.contacts.remove(index);
        self.contacts.push(contact);
    }

    /// Returns up to `count` contacts ordered by their distance to `target`.
    pub fn closest(&self, count: usize, target: &Key) -> Vec<Contact> {
        let mut ret = self.contacts.clone();
        ret.sort_by_key(|contact| contact.id.distance_to(target));
        ret.truncate(count);
        ret
    }

    /// Removes the contact with `id` from the bucket.
    pub fn remove(&mut self, id: &Key) -> Option<Contact> {
        let index = self.position(id)?;
        self.last_update_time = OffsetDateTime::now_utc();
        Some(self.contacts.remove(index))
    }

    /// Returns the index of the contact with `id`.
    pub fn position(&self, id: &Key) -> Option<usize> {
        self.contacts.iter().position(|contact| contact.id == *id)
    }

    /// Returns `true` if a contact with `id` exists in the bucket.
    pub fn contains(&self, id: &Key) -> bool {
        self.position(id).is_some()
    }

    /// Returns `true` if the bucket has not been updated within `interval`.
    pub fn is_stale(&self, interval: Duration) -> bool {
        OffsetDateTime::now_utc() - self.last_update_time >= interval
    }

    /// Returns the least recently seen contact.
    pub fn head(&self) -> Option<&Contact> {
        self.contacts.first()
    }

    /// Returns the most recently seen contact.
    pub fn tail(&self) -> Option<&Contact> {
        self.contacts.last()
    }

    /// Returns the contacts from least to most recently seen.
    pub fn contacts(&self) -> &[Contact] {
        self.contacts.as_slice()
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }
}

impl Default for KBucket {
    fn default() -> Self {
        KBucket::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{InsertOutcome, KBucket};
    use crate::error::Error;
    use crate::key::Key;
    use crate::node::contact::Contact;
    use crate::REPLICATION_PARAM;
    use std::net::{IpAddr, Ipv4Addr};
    use time::Duration;

    fn random_contact() -> Contact {
        Contact::new(Key::rand(), IpAddr::V4(Ipv4Addr::LOCALHOST), 3000)
    }

    fn contact_from(hex: &str) -> Contact {
        Contact::new(Key::from_hex(hex).unwrap(), IpAddr::V4(Ipv4Addr::LOCALHOST), 3000)
    }

    fn preset_bucket() -> (KBucket, Vec<Contact>) {
        let mut bucket = KBucket::new();
        let contacts: Vec<Contact> = (0..4).map(|_| random_contact()).collect();
        for contact in &contacts {
            assert_eq!(
                bucket.insert(contact.clone()),
                InsertOutcome::Inserted(contact.clone())
            );
        }
        (bucket, contacts)
    }

    fn ids(bucket: &KBucket) -> Vec<Key> {
        bucket.contacts().iter().map(|contact| contact.id).collect()
    }

    #[test]
    fn test_insert_keeps_order() {
        let (bucket, contacts) = preset_bucket();
        assert_eq!(bucket.len(), 4);
        assert_eq!(bucket.head(), Some(&contacts[0]));
        assert_eq!(bucket.tail(), Some(&contacts[3]));
        assert_eq!(ids(&bucket), contacts.iter().map(|c| c.id).collect::<Vec<_>>());
    }

    #[test]
    fn test_reinsert_refreshes() {
        let (mut bucket, contacts) = preset_bucket();
        let mut observed = contacts[1].clone();
        observed.port = 4000;

        assert_eq!(
            bucket.insert(observed.clone()),
            InsertOutcome::Refreshed(observed)
        );
        assert_eq!(bucket.len(), 4);
        assert_eq!(
            ids(&bucket),
            vec![contacts[0].id, contacts[2].id, contacts[3].id, contacts[1].id]
        );
    }

    #[test]
    fn test_full_bucket_reports_head() {
        let mut bucket = KBucket::new();
        let contacts: Vec<Contact> = (0..REPLICATION_PARAM).map(|_| random_contact()).collect();
        for contact in &contacts {
            bucket.insert(contact.clone());
        }
        let before = ids(&bucket);

        let outcome = bucket.insert(random_contact());
        assert_eq!(
            outcome,
            InsertOutcome::BucketFull {
                head: contacts[0].clone()
            }
        );
        assert_eq!(outcome.contact(), &contacts[0]);
        assert_eq!(ids(&bucket), before);

        // a known contact is still refreshed when the bucket is full
        assert_eq!(
            bucket.insert(contacts[0].clone()),
            InsertOutcome::Refreshed(contacts[0].clone())
        );
        assert_eq!(bucket.tail(), Some(&contacts[0]));
        assert_eq!(bucket.len(), REPLICATION_PARAM);
    }

    #[test]
    fn test_move_head_to_tail() {
        let (mut bucket, contacts) = preset_bucket();
        bucket.move_to_tail(0).unwrap();
        assert_eq!(bucket.tail(), Some(&contacts[0]));
        assert_eq!(bucket.head(), Some(&contacts[1]));
    }

    #[test]
    fn test_move_n_to_tail() {
        let (mut bucket, contacts) = preset_bucket();
        bucket.move_to_tail(2).unwrap();
        assert_eq!(bucket.tail(), Some(&contacts[2]));
        assert_eq!(bucket.head(), Some(&contacts[0]));
        assert_eq!(
            ids(&bucket),
            vec![contacts[0].id, contacts[1].id, contacts[3].id, contacts[2].id]
        );
    }

    #[test]
    fn test_move_to_tail_errors() {
        let mut empty = KBucket::new();
        match empty.move_to_tail(0) {
            Err(Error::NoHeadFound) => {},
            other => panic!("expected NoHeadFound, got {:?}", other),
        }

        let (mut bucket, _) = preset_bucket();
        match bucket.move_to_tail(4) {
            Err(Error::BucketIndexOutOfBounds { index: 4, size: 4 }) => {},
            other => panic!("expected BucketIndexOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_bucket() {
        let bucket = KBucket::new();
        assert!(bucket.is_empty());
        assert_eq!(bucket.head(), None);
        assert_eq!(bucket.tail(), None);
        assert!(bucket.closest(3, &Key::rand()).is_empty());
    }

    #[test]
    fn test_closest() {
        let mut bucket = KBucket::new();
        let c1 = contact_from("D80F741BC1B397C54A54858E4E2A8840B2BC766B");
        let c2 = contact_from("F70F741BC1B397C54A54858E4E2A8840B2BC766B");
        let c3 = contact_from("A70F441BC1B397C54A54858E4E2A8840B2BC766B");
        bucket.insert(c3.clone());
        bucket.insert(c1.clone());
        bucket.insert(c2.clone());

        let target = Key::from_hex("C80F741BC1B397C54A54858E4E2A8840B2BC766B").unwrap();
        assert_eq!(bucket.closest(2, &target), vec![c1.clone(), c2.clone()]);
        assert_eq!(bucket.closest(10, &target), vec![c1, c2, c3]);
    }

    #[test]
    fn test_remove() {
        let (mut bucket, contacts) = preset_bucket();
        assert_eq!(bucket.remove(&contacts[0].id), Some(contacts[0].clone()));
        assert_eq!(bucket.remove(&contacts[0].id), None);
        assert!(!bucket.contains(&contacts[0].id));
        assert_eq!(bucket.head(), Some(&contacts[1]));
    }

    #[test]
    fn test_is_stale() {
        let (bucket, _) = preset_bucket();
        assert!(bucket.is_stale(Duration::ZERO));
        assert!(!bucket.is_stale(Duration::hours(1)));
    }
}
