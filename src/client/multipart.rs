//! Incremental multipart/form-data writer for push uploads
//!
//! The body is emitted as: metadata part, pack part header, the pack chunks as
//! they arrive, closing delimiter. Pack bytes are forwarded, never copied into a
//! second buffer.

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde::Serialize;

use crate::{
    error::Result,
    pack::{ByteStream, PackPayload},
};

pub struct MultipartWriter {
    boundary: String,
}

impl MultipartWriter {
    pub fn new() -> Self {
        Self::with_boundary(format!("relay-{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Everything before the first pack byte
    fn head(&self, metadata: &[u8]) -> Bytes {
        let mut head = Vec::with_capacity(metadata.len() + 256);
        head.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"metadata\"\r\n\
                 Content-Type: application/json\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        head.extend_from_slice(metadata);
        head.extend_from_slice(
            format!(
                "\r\n--{}\r\nContent-Disposition: form-data; name=\"pack\"; filename=\"pack\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        Bytes::from(head)
    }

    fn tail(&self) -> Bytes {
        Bytes::from(format!("\r\n--{}--\r\n", self.boundary))
    }

    /// Body length when the pack size is known up front
    pub fn content_length(
        &self,
        metadata: &impl Serialize,
        pack: &PackPayload,
    ) -> Result<Option<u64>> {
        let Some(pack_len) = pack.len_hint() else {
            return Ok(None);
        };
        let head = self.head(&serde_json::to_vec(metadata)?);
        Ok(Some(head.len() as u64 + pack_len + self.tail().len() as u64))
    }

    pub fn into_stream(self, metadata: &impl Serialize, pack: PackPayload) -> Result<ByteStream> {
        let head = self.head(&serde_json::to_vec(metadata)?);
        let tail = self.tail();
        Ok(stream::iter([Ok(head)])
            .chain(pack.into_stream())
            .chain(stream::iter([Ok(tail)]))
            .boxed())
    }
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}
