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

//! State of a single file transfer.

use std::fs::File;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::blob::Blob;
use crate::address::BluetoothAddress;
use crate::events::TransferInfo;

/// Default distance between progress notifications.
pub const PROGRESS_INTERVAL: u64 = 50 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    Sending,
    Receiving,
}

/// Emits a progress update each time another interval has been crossed.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    interval: u64,
    counter: u64,
}

impl ProgressTracker {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            counter: 1,
        }
    }

    /// Whether `processed` crossed the next threshold. Several thresholds
    /// crossed at once still give a single update.
    pub fn should_report(&mut self, processed: u64) -> bool {
        if self.interval.saturating_mul(self.counter) < processed {
            self.counter = processed / self.interval + 1;
            true
        } else {
            false
        }
    }
}

/// One object being pushed or received.
pub struct FileTransferSession {
    id: u64,
    direction: TransferDirection,
    pub file_name: String,
    pub content_type: String,
    /// Declared total length.
    pub length: u64,
    bytes_transferred: u64,
    abort: Arc<AtomicBool>,
    /// Incoming: a confirmation request is outstanding.
    pub waiting_for_confirmation: bool,
    pub success: bool,
    progress: ProgressTracker,
    /// Incoming: body of the first Put, held until the user confirms.
    pub pending_body: Vec<u8>,
    /// Incoming: the Put being answered was a PutFinal.
    pub put_final: bool,
    output: Option<File>,
    blob: Option<Arc<dyn Blob>>,
    /// Outgoing: the source stream while no read is in flight.
    pub stream: Option<Box<dyn Read + Send>>,
}

impl FileTransferSession {
    pub fn outgoing(
        id: u64,
        blob: Arc<dyn Blob>,
        file_name: String,
        progress_interval: u64,
    ) -> Self {
        let content_type = blob.content_type().unwrap_or_default().to_string();
        let length = blob.size();
        Self {
            id,
            direction: TransferDirection::Sending,
            file_name,
            content_type,
            length,
            bytes_transferred: 0,
            abort: Arc::new(AtomicBool::new(false)),
            waiting_for_confirmation: false,
            success: false,
            progress: ProgressTracker::new(progress_interval),
            pending_body: Vec::new(),
            put_final: false,
            output: None,
            blob: Some(blob),
            stream: None,
        }
    }

    pub fn incoming(id: u64, progress_interval: u64) -> Self {
        Self {
            id,
            direction: TransferDirection::Receiving,
            file_name: String::new(),
            content_type: String::new(),
            length: 0,
            bytes_transferred: 0,
            abort: Arc::new(AtomicBool::new(false)),
            waiting_for_confirmation: true,
            success: false,
            progress: ProgressTracker::new(progress_interval),
            pending_body: Vec::new(),
            put_final: false,
            output: None,
            blob: None,
            stream: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn direction(&self) -> TransferDirection {
        self.direction
    }

    pub fn is_receiving(&self) -> bool {
        self.direction == TransferDirection::Receiving
    }

    pub fn blob(&self) -> Option<&Arc<dyn Blob>> {
        self.blob.as_ref()
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Account for `n` more bytes. Outgoing totals are capped at the
    /// declared length.
    pub fn record(&mut self, n: usize) {
        let total = self.bytes_transferred.saturating_add(n as u64);
        self.bytes_transferred = match self.direction {
            TransferDirection::Sending => total.min(self.length),
            TransferDirection::Receiving => total,
        };
    }

    /// Whether the next chunk of `n` bytes is the last one to send.
    pub fn is_last_chunk(&self, n: usize) -> bool {
        n == 0 || self.bytes_transferred + n as u64 >= self.length
    }

    pub fn should_report_progress(&mut self) -> bool {
        self.progress.should_report(self.bytes_transferred)
    }

    /// Flag shared with the background reader.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn request_abort(&self) {
        self.abort.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.load(Ordering::Acquire)
    }

    pub fn set_output(&mut self, file: File) {
        self.output = Some(file);
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Append to the output file and count the bytes.
    pub fn write_body(&mut self, data: &[u8]) -> io::Result<()> {
        let file = self
            .output
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no output file"))?;
        file.write_all(data)?;
        self.record(data.len());
        Ok(())
    }

    /// Flush and drop the output file.
    pub fn close_output(&mut self) {
        if let Some(mut file) = self.output.take() {
            let _ = file.flush();
        }
    }

    pub fn info(&self, address: BluetoothAddress) -> TransferInfo {
        TransferInfo {
            address,
            received: self.is_receiving(),
            file_name: self.file_name.clone(),
            file_length: self.length,
            content_type: self.content_type.clone(),
            processed_length: self.bytes_transferred,
            success: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opp::blob::MemoryBlob;

    #[test]
    fn test_progress_every_interval() {
        let mut tracker = ProgressTracker::new(100);
        assert!(!tracker.should_report(50));
        assert!(!tracker.should_report(100));
        assert!(tracker.should_report(101));
        assert!(!tracker.should_report(150));
        assert!(tracker.should_report(201));
        // Jumping over several thresholds reports once
        assert!(tracker.should_report(950));
        assert!(!tracker.should_report(999));
        assert!(tracker.should_report(1001));
    }

    #[test]
    fn test_outgoing_accounting() {
        let blob: Arc<dyn Blob> = Arc::new(
            MemoryBlob::new(vec![0u8; 1000]).with_content_type("image/png"),
        );
        let mut session = FileTransferSession::outgoing(1, blob, "a.png".into(), PROGRESS_INTERVAL);
        assert_eq!(session.length, 1000);
        assert_eq!(session.content_type, "image/png");

        assert!(!session.is_last_chunk(400));
        session.record(400);
        session.record(400);
        assert!(session.is_last_chunk(200));
        assert!(session.is_last_chunk(0));
        session.record(500);
        assert_eq!(session.bytes_transferred(), 1000);
    }

    #[test]
    fn test_abort_flag_is_shared() {
        let session = FileTransferSession::incoming(2, PROGRESS_INTERVAL);
        let flag = session.cancel_flag();
        assert!(!session.is_aborted());
        session.request_abort();
        assert!(flag.load(Ordering::Acquire));
        assert!(session.waiting_for_confirmation);
    }

    #[test]
    fn test_write_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let mut session = FileTransferSession::incoming(3, PROGRESS_INTERVAL);

        assert!(session.write_body(b"x").is_err());
        session.set_output(File::create(&path).unwrap());
        session.write_body(b"hello ").unwrap();
        session.write_body(b"world").unwrap();
        session.close_output();

        assert_eq!(session.bytes_transferred(), 11);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }
}
