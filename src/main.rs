#[macro_use]
extern crate log;
extern crate kademlia_routing;
extern crate sha3;
extern crate simplelog;

use sha3::{Digest, Sha3_256};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};
use std::collections::HashSet;
use std::io::{self, BufRead};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use kademlia_routing::{
    Contact, Dht, DhtConfig, Key, Message, Request, RequestPayload, ResponsePayload, KEY_LENGTH,
    REPLICATION_PARAM,
};

/// Hashes a human readable name into a key.
fn get_key(name: &str) -> Key {
    let mut hasher = Sha3_256::new();
    hasher.update(name.as_bytes());
    let mut ret = [0; KEY_LENGTH];
    ret.copy_from_slice(&hasher.finalize()[..KEY_LENGTH]);
    Key(ret)
}

/// A set of nodes living in this process. Requests between them go through the message encoding
/// as they would on the wire.
struct Network {
    nodes: Vec<Dht>,
    dead: HashSet<Key>,
}

impl Network {
    fn new() -> Self {
        Network {
            nodes: Vec::new(),
            dead: HashSet::new(),
        }
    }

    fn find(&self, id: &Key) -> Option<&Dht> {
        if self.dead.contains(id) {
            return None;
        }
        self.nodes.iter().find(|dht| dht.id() == *id)
    }

    fn spawn(&mut self, bootstrap: Option<usize>) -> usize {
        let port = 8900 + self.nodes.len() as u16;
        let dht = Dht::from_config(DhtConfig {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port),
            ..DhtConfig::default()
        });

        let seed = bootstrap
            .and_then(|index| self.nodes.get(index))
            .map(Dht::contact);
        self.nodes.push(dht.clone());
        if let Some(seed) = seed {
            self.join(&dht, &seed);
        }
        self.nodes.len() - 1
    }

    /// Adds `seed` to the routing table of `dht`, then looks up the own key of `dht` so that
    /// both sides learn about each other.
    fn join(&self, dht: &Dht, seed: &Contact) {
        self.observe(dht, seed.clone());
        self.lookup(dht, RequestPayload::FindNode(dht.id()));
    }

    fn observe(&self, dht: &Dht, contact: Contact) {
        let pinger = |contact: &Contact| self.find(&contact.id).is_some();
        if let Err(err) = dht.update_routing_table(contact, &pinger) {
            warn!("{:?} - {}", dht.id(), err);
        }
    }

    fn send(&self, from: &Dht, to: &Contact, payload: RequestPayload) -> Option<ResponsePayload> {
        let receiver = self.find(&to.id)?;
        let request = Message::Request(Request {
            id: Key::rand(),
            sender: from.contact(),
            payload,
        });

        let bytes = match request.encode() {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("Could not encode request: {}", err);
                return None;
            },
        };
        match Message::decode(&bytes) {
            Ok(Message::Request(request)) => {
                let response = receiver.handle_request(&request);
                self.observe(from, response.receiver.clone());
                Some(response.payload)
            },
            Ok(message) => {
                warn!("Unexpected message {:?}", message);
                None
            },
            Err(err) => {
                warn!("Could not decode request: {}", err);
                None
            },
        }
    }

    /// Iteratively queries the closest known contacts until all of them have answered or failed.
    fn lookup(&self, dht: &Dht, payload: RequestPayload) -> ResponsePayload {
        let target = match payload {
            RequestPayload::FindNode(key) | RequestPayload::FindValue(key) => key,
            _ => return ResponsePayload::Pong,
        };
        let mut queried = HashSet::new();
        queried.insert(dht.id());

        loop {
            let candidates: Vec<Contact> = dht
                .alpha_nodes(&target)
                .into_iter()
                .chain(dht.find_node(&target))
                .filter(|contact| !queried.contains(&contact.id))
                .take(dht.config().alpha)
                .collect();
            if candidates.is_empty() {
                break;
            }

            for contact in candidates {
                queried.insert(contact.id);
                match self.send(dht, &contact, payload.clone()) {
                    Some(ResponsePayload::Value(value)) => return ResponsePayload::Value(value),
                    Some(ResponsePayload::Nodes(nodes)) => {
                        for node in nodes.into_iter().filter(|node| node.id != dht.id()) {
                            self.observe(dht, node);
                        }
                    },
                    Some(ResponsePayload::Pong) => {},
                    None => {
                        debug!("{:?} - No answer from {:?}", dht.id(), contact);
                        dht.routing_table().remove(&contact.id);
                    },
                }
            }
        }

        ResponsePayload::Nodes(dht.find_node(&target))
    }

    fn store(&self, index: usize, name: &str, host: IpAddr, port: u16) {
        let dht = &self.nodes[index];
        let key = get_key(name);
        let value = kademlia_routing::Value { host, port };
        dht.store(key, host, port);
        if let ResponsePayload::Nodes(nodes) = self.lookup(dht, RequestPayload::FindNode(key)) {
            for contact in nodes.iter().take(REPLICATION_PARAM) {
                self.send(dht, contact, RequestPayload::Store(key, value));
            }
        }
    }
}

fn parse_index(network: &Network, arg: Option<&str>) -> Option<usize> {
    arg.and_then(|arg| arg.parse().ok())
        .filter(|index| *index < network.nodes.len())
}

fn main() {
    if TermLogger::init(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .is_err()
    {
        eprintln!("Could not initialize the logger");
    }

    let mut network = Network::new();
    network.spawn(None);
    for _ in 1..50 {
        network.spawn(Some(0));
    }

    let input = io::stdin();
    println!("Ready for input!");
    for line in input.lock().lines() {
        let line = match line {
            Ok(line) => line,
            Err(_) => break,
        };
        let args: Vec<&str> = line.split_whitespace().collect();
        let index = parse_index(&network, args.get(1).cloned());

        match (args.first().cloned(), index) {
            (Some("new"), Some(index)) => {
                let id = network.spawn(Some(index));
                println!("{} {:?}", id, network.nodes[id].id());
            },
            (Some("kill"), Some(index)) => {
                let id = network.nodes[index].id();
                network.dead.insert(id);
            },
            (Some("insert"), Some(index)) if args.len() == 5 => {
                match (args[3].parse::<IpAddr>(), args[4].parse::<u16>()) {
                    (Ok(host), Ok(port)) => network.store(index, args[2], host, port),
                    _ => println!("usage: insert <node> <name> <host> <port>"),
                }
            },
            (Some("get"), Some(index)) if args.len() == 3 => {
                let dht = &network.nodes[index];
                let key = get_key(args[2]);
                match network.lookup(dht, RequestPayload::FindValue(key)) {
                    ResponsePayload::Value(value) => println!("{}:{}", value.host, value.port),
                    _ => println!("not found"),
                }
            },
            (Some("closest"), Some(index)) if args.len() == 3 => {
                match args[2].parse::<Key>() {
                    Ok(key) => {
                        for contact in network.nodes[index].find_node(&key) {
                            println!("{:?}", contact);
                        }
                    },
                    Err(err) => println!("{}", err),
                }
            },
            _ => println!("commands: new <node> | kill <node> | insert <node> <name> <host> <port> | get <node> <name> | closest <node> <hex>"),
        }
    }
}
