use bincode::Options;

use crate::error::Error;
use crate::key::Key;
use crate::node::contact::Contact;
use crate::storage::Value;
use crate::MESSAGE_LENGTH;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Request {
    pub id: Key,
    pub sender: Contact,
    pub payload: RequestPayload,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum RequestPayload {
    Ping,
    Store(Key, Value),
    FindNode(Key),
    FindValue(Key),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Response {
    pub request: Request,
    pub receiver: Contact,
    pub payload: ResponsePayload,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Nodes(Vec<Contact>),
    Value(Value),
    Pong,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Message {
    Request(Request),
    Response(Response),
}

impl Message {
    /// Encodes the message. Fails if the encoding exceeds `MESSAGE_LENGTH` bytes.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        Ok(bincode::options()
            .with_limit(MESSAGE_LENGTH as u64)
            .serialize(self)?)
    }

    /// Decodes a message received from the network.
    pub fn decode(bytes: &[u8]) -> Result<Message, Error> {
        Ok(bincode::options()
            .with_limit(MESSAGE_LENGTH as u64)
            .deserialize(bytes)?)
    }
}

/// The liveness check a transport provides to the routing core.
///
/// Implementations send a `PING` and report whether the contact answered in time. They must not
/// touch the routing table.
pub trait Pinger {
    fn is_alive(&self, contact: &Contact) -> bool;
}

impl<F> Pinger for F
where
    F: Fn(&Contact) -> bool,
{
    fn is_alive(&self, contact: &Contact) -> bool {
        self(contact)
    }
}
