use std::convert::TryFrom;
use std::fmt::{Debug, Formatter, Result};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::error::Error;
use crate::key::Key;
use crate::KEY_LENGTH;

/// A peer known to the local node.
///
/// Two contacts describe the same peer when their ids match; the address is informational and may
/// change between observations.
#[derive(PartialEq, Eq, Hash, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: Key,
    pub ip: IpAddr,
    pub port: u16,
}

impl Contact {
    pub fn new(id: Key, ip: IpAddr, port: u16) -> Self {
        Contact { id, ip, port }
    }

    /// Returns the socket address of the contact.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// Encodes the contact as the id, a big-endian port and the raw IP address bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut ret = Vec::with_capacity(KEY_LENGTH + 2 + 16);
        ret.extend_from_slice(&self.id.0);
        ret.extend_from_slice(&self.port.to_be_bytes());
        match self.ip {
            IpAddr::V4(ip) => ret.extend_from_slice(&ip.octets()),
            IpAddr::V6(ip) => ret.extend_from_slice(&ip.octets()),
        }
        ret
    }

    /// Decodes a contact produced by [`Contact::to_bytes`]. The address family is implied by the
    /// length of the input.
    pub fn from_bytes(bytes: &[u8]) -> std::result::Result<Self, Error> {
        let ip_offset = KEY_LENGTH + 2;
        let ip = match bytes.len().checked_sub(ip_offset) {
            Some(4) => {
                let octets = <[u8; 4]>::try_from(&bytes[ip_offset..])
                    .map_err(|_| Error::ContactLength(bytes.len()))?;
                IpAddr::V4(Ipv4Addr::from(octets))
            },
            Some(16) => {
                let octets = <[u8; 16]>::try_from(&bytes[ip_offset..])
                    .map_err(|_| Error::ContactLength(bytes.len()))?;
                IpAddr::V6(Ipv6Addr::from(octets))
            },
            _ => return Err(Error::ContactLength(bytes.len())),
        };

        let mut id = [0; KEY_LENGTH];
        id.copy_from_slice(&bytes[..KEY_LENGTH]);
        let port = u16::from_be_bytes([bytes[KEY_LENGTH], bytes[KEY_LENGTH + 1]]);
        Ok(Contact::new(Key(id), ip, port))
    }
}

impl Debug for Contact {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "{} - {:?}", self.addr(), self.id)
    }
}
