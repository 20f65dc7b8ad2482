use thiserror::Error;

/// Errors surfaced by the routing core.
///
/// A full bucket or an already known contact are not errors; they are reported through
/// [`InsertOutcome`](crate::InsertOutcome) because callers branch on them.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid hex key: {0}")]
    Decode(#[from] hex::FromHexError),

    #[error("bucket index {index} out of bounds for bucket of size {size}")]
    BucketIndexOutOfBounds { index: usize, size: usize },

    #[error("no bucket head found")]
    NoHeadFound,

    #[error("the local node cannot be added to its own routing table")]
    LocalContact,

    #[error("invalid contact encoding of {0} bytes")]
    ContactLength(usize),

    #[error("message encoding error: {0}")]
    Message(#[from] bincode::Error),
}
