// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Background chunk reads for outgoing transfers.

use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// What one background read produced.
#[derive(Debug)]
pub enum ChunkOutcome {
    /// Up to the requested number of bytes; empty at end of stream.
    Data(Vec<u8>),
    /// The transfer was stopped before the read started.
    Cancelled,
    Failed(io::Error),
}

/// Completion of a read, sent back to the protocol task.
///
/// The stream travels with the result, so only one read per transfer can
/// be in flight.
pub struct ChunkRead {
    pub transfer_id: u64,
    pub outcome: ChunkOutcome,
    pub stream: Box<dyn Read + Send>,
}

impl std::fmt::Debug for ChunkRead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkRead")
            .field("transfer_id", &self.transfer_id)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

/// Read one chunk of at most `max_len` bytes on the blocking pool.
pub fn spawn_chunk_read(
    transfer_id: u64,
    mut stream: Box<dyn Read + Send>,
    max_len: usize,
    cancel: Arc<AtomicBool>,
    done: mpsc::UnboundedSender<ChunkRead>,
) {
    tokio::task::spawn_blocking(move || {
        let outcome = if cancel.load(Ordering::Acquire) {
            ChunkOutcome::Cancelled
        } else {
            match read_chunk(&mut stream, max_len) {
                Ok(data) => ChunkOutcome::Data(data),
                Err(e) => ChunkOutcome::Failed(e),
            }
        };

        if done
            .send(ChunkRead {
                transfer_id,
                outcome,
                stream,
            })
            .is_err()
        {
            debug!("Chunk read for transfer {} finished after shutdown", transfer_id);
        }
    });
}

/// Fill up to `max_len` bytes, stopping early only at end of stream.
pub fn read_chunk(stream: &mut dyn Read, max_len: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; max_len];
    let mut filled = 0;
    while filled < max_len {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}
