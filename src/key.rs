use rand::rngs::OsRng;
use rand::RngCore;
use std::cmp::{self, Ordering};
use std::fmt::{Debug, Display, Formatter, Result};
use std::str::FromStr;

use crate::error::Error;
use crate::{KEY_LENGTH, ROUTING_TABLE_SIZE};

/// Read access to the individual bits of a fixed-width bit string.
///
/// Bit `0` is the most significant bit of the first byte. Both [`Key`] and [`Distance`] implement
/// this so that bucket placement and traversal can be written once.
pub trait BitString {
    /// Returns the underlying bytes, most significant first.
    fn bytes(&self) -> &[u8; KEY_LENGTH];

    /// Returns the bit at `index`. Indexes past the last bit read the last bit.
    fn bit_at(&self, index: usize) -> bool {
        let index = cmp::min(index, ROUTING_TABLE_SIZE - 1);
        self.bytes()[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Returns the number of leading zero bits.
    fn leading_zeros(&self) -> usize {
        let mut ret = 0;
        for byte in self.bytes() {
            if *byte == 0 {
                ret += 8
            } else {
                return ret + byte.leading_zeros() as usize;
            }
        }
        ret
    }
}

/// A key that identifies both nodes and stored values.
///
/// Keys are 160 bits wide and render as 40 lowercase hex characters.
#[derive(Ord, PartialOrd, PartialEq, Eq, Clone, Hash, Serialize, Deserialize, Default, Copy)]
pub struct Key(pub [u8; KEY_LENGTH]);

impl Key {
    /// Constructs a new `Key` from a byte array.
    pub fn new(data: [u8; KEY_LENGTH]) -> Self {
        Key(data)
    }

    /// Constructs a new, random `Key` from the operating system's secure random source.
    pub fn rand() -> Self {
        let mut ret = Key([0; KEY_LENGTH]);
        OsRng.fill_bytes(&mut ret.0);
        ret
    }

    /// Decodes a `Key` from exactly `2 * KEY_LENGTH` hex characters.
    pub fn from_hex(hex_key: &str) -> std::result::Result<Self, Error> {
        let mut ret = Key([0; KEY_LENGTH]);
        hex::decode_to_slice(hex_key, &mut ret.0)?;
        Ok(ret)
    }

    /// Constructs a random `Key` that falls into bucket `index` of a routing table owned by
    /// `self`. Indexes past the last bucket are clamped.
    pub fn rand_in_bucket(&self, index: usize) -> Self {
        let index = cmp::min(index, ROUTING_TABLE_SIZE - 1);
        let leading_zeros = ROUTING_TABLE_SIZE - 1 - index;
        let mut distance = Key::rand();
        let bytes = leading_zeros / 8;
        let bit = leading_zeros % 8;
        for byte in distance.0.iter_mut().take(bytes) {
            *byte = 0;
        }
        distance.0[bytes] &= 0xFF >> bit;
        distance.0[bytes] |= 1 << (8 - bit - 1);
        Key(self.distance_to(&distance).0)
    }

    /// Returns the XOR distance between `self` and `key`.
    pub fn distance_to(&self, key: &Key) -> Distance {
        let mut ret = [0; KEY_LENGTH];
        for (i, byte) in ret.iter_mut().enumerate() {
            *byte = self.0[i] ^ key.0[i];
        }
        Distance(ret)
    }

    /// Decides which of `first` and `second` is closer to `self`.
    ///
    /// Returns `Ordering::Greater` if `first` is closer, `Ordering::Less` if `second` is closer and
    /// `Ordering::Equal` if both are equally far away. This is a closeness verdict, so it is the
    /// reverse of comparing the two distances.
    pub fn compare_distance_to(&self, first: &Key, second: &Key) -> Ordering {
        self.distance_to(second).cmp(&self.distance_to(first))
    }
}

impl BitString for Key {
    fn bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl FromStr for Key {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Error> {
        Key::from_hex(s)
    }
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Key {
    fn fmt(&self, f: &mut Formatter) -> Result {
        Display::fmt(self, f)
    }
}

/// The XOR distance between two keys, ordered as a big-endian unsigned integer.
#[derive(Ord, PartialOrd, PartialEq, Eq, Clone, Hash, Default, Copy)]
pub struct Distance(pub [u8; KEY_LENGTH]);

impl Distance {
    /// Returns `true` if the distance is zero, i.e. it is between a key and itself.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }
}

impl BitString for Distance {
    fn bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl Display for Distance {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Distance {
    fn fmt(&self, f: &mut Formatter) -> Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    extern crate num_bigint;
    use self::num_bigint::BigUint;

    use super::{BitString, Key};
    use crate::error::Error;
    use crate::ROUTING_TABLE_SIZE;
    use std::cmp::Ordering;

    fn key(hex: &str) -> Key {
        Key::from_hex(hex).unwrap()
    }

    #[test]
    fn test_rand_round_trip() {
        let id = Key::rand();
        let parsed: Key = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_hex_is_lowercased() {
        let id = key("C80F741BC1B397C54A54858E4E2A8840B2BC766B");
        assert_eq!(id.to_string(), "c80f741bc1b397c54a54858e4e2a8840b2bc766b");
        assert_eq!(
            key("0c204d39600fddd3f1f20ca8007e91c7d0293b1c").to_string(),
            "0c204d39600fddd3f1f20ca8007e91c7d0293b1c",
        );
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        for input in &[
            "",
            "c80f",
            "c80f741bc1b397c54a54858e4e2a8840b2bc766b00",
            "c80f741bc1b397c54a54858e4e2a8840b2bc766",
            "z80f741bc1b397c54a54858e4e2a8840b2bc766b",
        ] {
            match Key::from_hex(input) {
                Err(Error::Decode(_)) => {},
                other => panic!("expected decode error for {:?}, got {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_compare_distance_to() {
        let id1 = key("0c204d39600fddd3f1f20ca8007e91c7d0293b1c");
        let id2 = key("0c204d39600fddd3f1f20ca8007e91c7d0293b1f");
        let id3 = key("0c204d39600fddd3f1f20fa8007e91c7d0293b1c");

        assert_eq!(id1.compare_distance_to(&id2, &id3), Ordering::Greater);
        assert_eq!(id1.compare_distance_to(&id3, &id2), Ordering::Less);
        assert_eq!(id1.compare_distance_to(&id1, &id1), Ordering::Equal);
    }

    #[test]
    fn test_distance_is_symmetric_and_non_zero() {
        for _ in 0..100 {
            let a = Key::rand();
            let b = Key::rand();
            assert_eq!(a.distance_to(&b), b.distance_to(&a));
            assert_eq!(a == b, a.distance_to(&b).is_zero());
            assert!(a.distance_to(&a).is_zero());
        }
    }

    #[test]
    fn test_distance_orders_as_integer() {
        let base = Key::rand();
        for _ in 0..100 {
            let x = base.distance_to(&Key::rand());
            let y = base.distance_to(&Key::rand());
            let (big_x, big_y) = (BigUint::from_bytes_be(&x.0), BigUint::from_bytes_be(&y.0));
            assert_eq!(x.cmp(&y), big_x.cmp(&big_y));
        }
    }

    #[test]
    fn test_bit_at() {
        let id = key("c80f741bc1b397c54a54858e4e2a8840b2bc766b");
        let cases = [(0, true), (1, true), (2, false), (3, false), (4, true), (159, true), (160, true)];
        for &(index, bit) in &cases {
            assert_eq!(id.bit_at(index), bit, "bit {}", index);
        }

        let distance = id.distance_to(&Key::rand());
        assert_eq!(distance.bit_at(160), distance.bit_at(159));
        assert_eq!(distance.bit_at(1000), distance.bit_at(159));
    }

    #[test]
    fn test_leading_zeros() {
        let local = Key::rand();
        for i in 0..ROUTING_TABLE_SIZE {
            let distance = local.distance_to(&local.rand_in_bucket(i));
            assert_eq!(distance.leading_zeros(), ROUTING_TABLE_SIZE - 1 - i);
        }
        assert_eq!(local.distance_to(&local).leading_zeros(), ROUTING_TABLE_SIZE);
    }
}
