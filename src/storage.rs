use std::collections::HashMap;
use std::net::IpAddr;

use crate::key::Key;

/// A value published under a key: the address of the peer holding the data.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Value {
    pub host: IpAddr,
    pub port: u16,
}

/// The local key-value store. Entries are never evicted.
#[derive(Default, Debug)]
pub struct Storage {
    data: HashMap<Key, Value>,
}

impl Storage {
    pub fn new() -> Self {
        Storage {
            data: HashMap::new(),
        }
    }

    /// Stores `value` under `key`, returning the value it replaced.
    pub fn insert(&mut self, key: Key, value: Value) -> Option<Value> {
        info!("Stored {:?} at {}:{}", key, value.host, value.port);
        self.data.insert(key, value)
    }

    pub fn get(&self, key: &Key) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Storage, Value};
    use crate::key::Key;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn test_insert_replaces() {
        let mut storage = Storage::new();
        let key = Key::rand();
        let first = Value {
            host: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            port: 80,
        };
        let second = Value { port: 8080, ..first };

        assert_eq!(storage.insert(key, first), None);
        assert_eq!(storage.insert(key, second), Some(first));
        assert_eq!(storage.get(&key), Some(&second));
        assert_eq!(storage.get(&Key::rand()), None);
        assert_eq!(storage.len(), 1);
    }
}
