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

//! Periodic `RING` while a call is incoming.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::transport::Transport;

pub const RING_INTERVAL: Duration = Duration::from_secs(3);

const RING_LINE: &[u8] = b"\r\nRING\r\n";

/// Handle to the background ring task. Dropping it stops the ringing.
#[derive(Debug)]
pub struct RingIndicator {
    interval: Duration,
    stop: Option<oneshot::Sender<()>>,
}

impl RingIndicator {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.stop.as_ref().is_some_and(|stop| !stop.is_closed())
    }

    /// Send `RING` now and every interval until stopped. A no-op while
    /// already ringing. Must be called inside a tokio runtime.
    pub fn start(&mut self, transport: Arc<dyn Transport>) {
        if self.is_running() {
            debug!("Ring already running");
            return;
        }

        let (stop_tx, mut stop_rx) = oneshot::channel();
        self.stop = Some(stop_tx);
        let period = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if let Err(e) = transport.send(RING_LINE.to_vec()) {
                            warn!("Failed to send RING: {}", e);
                            break;
                        }
                    }
                }
            }
            debug!("Ring stopped");
        });
    }

    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for RingIndicator {
    fn drop(&mut self) {
        self.stop();
    }
}
