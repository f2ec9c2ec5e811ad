//! Gathered/buffered writes (`spec.md` §4.7.1): a client streams a large
//! write as a sequence of chunks identified by `vnid`. The first chunk
//! carries `totalLen > 0` and opens the block; later chunks carry
//! `totalLen == 0` and append. No chunk gets a reply frame — only
//! `Commit` does (`spec.md` §4.7.1: "the server replies only to `Commit`,
//! never to the individual chunks").

use std::collections::HashMap;

use crate::error::{Error, Result, Status};

/// Total size a single gathered write may declare (`spec.md` §4.7.1).
pub const MAX_WRITE_BLOCK_LEN: u64 = 10 * 1024 * 1024;

struct Block {
    start_offset: u64,
    total_len: u64,
    data: Vec<u8>,
}

/// Per-session bookkeeping of in-flight gathered writes, keyed by `vnid`.
/// At most one active block per `vnid` (`spec.md` §4.7.1). A chunk error
/// drops the block outright — the client only discovers it at `Commit`,
/// which then reports "not found" (`spec.md` §8: "a client that misses a
/// silent error on the server side learns about it only at Commit").
#[derive(Default)]
pub struct WriteBlocks {
    blocks: HashMap<u64, Block>,
}

impl WriteBlocks {
    pub fn new() -> Self {
        WriteBlocks { blocks: HashMap::new() }
    }

    /// Starts a new block at `start_offset`, declaring its total length.
    pub fn begin(&mut self, vnid: u64, start_offset: u64, total_len: u64) -> Result<()> {
        if self.blocks.contains_key(&vnid) {
            return Err(Error::Status(Status::Busy));
        }
        if total_len > MAX_WRITE_BLOCK_LEN {
            return Err(Error::Status(Status::RangeError));
        }
        self.blocks.insert(vnid, Block { start_offset, total_len, data: Vec::with_capacity(total_len as usize) });
        Ok(())
    }

    /// Appends a chunk to the block already opened for `vnid`. An
    /// over-length or out-of-order chunk drops the block rather than
    /// leaving it half-written.
    pub fn append(&mut self, vnid: u64, chunk: &[u8]) -> Result<()> {
        let over_length = match self.blocks.get(&vnid) {
            Some(block) => block.data.len() as u64 + chunk.len() as u64 > block.total_len,
            None => return Err(Error::Status(Status::NoEntry)),
        };
        if over_length {
            self.blocks.remove(&vnid);
            return Err(Error::Status(Status::RangeError));
        }
        self.blocks.get_mut(&vnid).unwrap().data.extend_from_slice(chunk);
        Ok(())
    }

    /// Removes and returns `(start_offset, data)` for `vnid`. Called on
    /// `Commit`; a missing block (never opened, already committed, or
    /// dropped after a chunk error) is "not found".
    pub fn take(&mut self, vnid: u64) -> Result<(u64, Vec<u8>)> {
        self.blocks.remove(&vnid).map(|b| (b.start_offset, b.data)).ok_or(Error::Status(Status::NoEntry))
    }

    /// Drops a block without flushing it, e.g. when the session ends.
    pub fn discard(&mut self, vnid: u64) {
        self.blocks.remove(&vnid);
    }
}
