use bytes::{Bytes, BytesMut};

use crate::{StoreError, StoreResult};

/// Where the accumulator is in the read/upload cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// Buffer holds less than one part
    Accumulating,
    /// At least one full part is buffered and must be taken before more input
    PartReady,
    /// Input ended and the remainder was handed out; terminal
    Flushed,
}

/// A part cut from the input, numbered in cut order starting at 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPart {
    pub number: u32,
    pub data: Bytes,
}

/// Cuts an in-order byte stream into fixed-size numbered parts.
///
/// Every part except the last is exactly `part_size` bytes. Input is refused
/// while a part is ready, so at most one part plus one read chunk is ever
/// buffered.
#[derive(Debug)]
pub struct ChunkAccumulator {
    part_size: usize,
    buffer: BytesMut,
    next_part: u32,
    state: ChunkState,
}

impl ChunkAccumulator {
    pub fn new(part_size: usize) -> Self {
        Self {
            part_size: part_size.max(1),
            buffer: BytesMut::new(),
            next_part: 1,
            state: ChunkState::Accumulating,
        }
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Parts handed out so far
    pub fn parts_cut(&self) -> u32 {
        self.next_part - 1
    }

    /// Append input bytes
    pub fn push(&mut self, chunk: &[u8]) -> StoreResult<()> {
        match self.state {
            ChunkState::Accumulating => {}
            ChunkState::PartReady => {
                return Err(StoreError::invalid("ready part must be taken before more input"));
            }
            ChunkState::Flushed => {
                return Err(StoreError::invalid("accumulator already flushed"));
            }
        }
        self.buffer.extend_from_slice(chunk);
        self.refresh();
        Ok(())
    }

    /// Take the next full part, if one is ready
    pub fn take_ready(&mut self) -> Option<PendingPart> {
        if self.state != ChunkState::PartReady {
            return None;
        }
        let data = self.buffer.split_to(self.part_size).freeze();
        let part = self.cut(data);
        self.refresh();
        Some(part)
    }

    /// End of input. Returns the buffered remainder as the final part.
    pub fn finish(&mut self) -> StoreResult<Option<PendingPart>> {
        match self.state {
            ChunkState::Accumulating => {}
            ChunkState::PartReady => {
                return Err(StoreError::invalid("ready part must be taken before finishing"));
            }
            ChunkState::Flushed => return Ok(None),
        }
        self.state = ChunkState::Flushed;
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let data = self.buffer.split().freeze();
        Ok(Some(self.cut(data)))
    }

    fn cut(&mut self, data: Bytes) -> PendingPart {
        let part = PendingPart {
            number: self.next_part,
            data,
        };
        self.next_part += 1;
        part
    }

    fn refresh(&mut self) {
        self.state = if self.buffer.len() >= self.part_size {
            ChunkState::PartReady
        } else {
            ChunkState::Accumulating
        };
    }
}

/// Number of parts a multipart upload of `size` bytes needs
pub fn planned_parts(size: u64, part_size: u64) -> u64 {
    if part_size == 0 {
        return 0;
    }
    size.div_ceil(part_size)
}
