//! Encoded fragments collected while a session runs

use bytes::{Bytes, BytesMut};

/// Ordered, append-only list of encoded fragments
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Bytes>,
    byte_len: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment; empty fragments are skipped
    pub fn push(&mut self, chunk: Bytes) {
        if chunk.is_empty() {
            return;
        }
        self.byte_len += chunk.len();
        self.chunks.push(chunk);
    }

    /// Number of buffered fragments
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Join all fragments in arrival order and clear the buffer
    pub fn concat(&mut self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.byte_len);
        for chunk in self.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        self.byte_len = 0;
        out.freeze()
    }
}
