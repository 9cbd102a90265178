//! Pack payloads moving between git and the remote
//!
//! Pack bytes are opaque here: they are produced and consumed by the real `git`
//! binary, never parsed.

mod index;

use bytes::Bytes;
use futures_util::{stream, stream::BoxStream, StreamExt, TryStreamExt};

pub use index::{GitIndexPack, PackSink};

use crate::error::Result;

/// Single-consumption stream of pack bytes
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Pack input, normalised once where it enters the helper
pub enum PackPayload {
    InMemory(Bytes),
    Lazy(ByteStream),
}

impl PackPayload {
    pub fn into_stream(self) -> ByteStream {
        match self {
            PackPayload::InMemory(bytes) => stream::once(async move { Ok(bytes) }).boxed(),
            PackPayload::Lazy(stream) => stream,
        }
    }

    /// Collect the whole pack; only used where the wire format needs it in one piece
    pub async fn into_bytes(self) -> Result<Bytes> {
        match self {
            PackPayload::InMemory(bytes) => Ok(bytes),
            PackPayload::Lazy(stream) => {
                let chunks: Vec<Bytes> = stream.try_collect().await?;
                Ok(Bytes::from(chunks.concat()))
            }
        }
    }

    /// Known length, if any
    pub fn len_hint(&self) -> Option<u64> {
        match self {
            PackPayload::InMemory(bytes) => Some(bytes.len() as u64),
            PackPayload::Lazy(_) => None,
        }
    }
}

impl From<Vec<u8>> for PackPayload {
    fn from(bytes: Vec<u8>) -> Self {
        PackPayload::InMemory(Bytes::from(bytes))
    }
}
