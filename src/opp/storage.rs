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

//! Download directory for received objects.

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::blob::PLACEHOLDER_NAME;

/// Give up after this many collisions.
const MAX_UNIQUE_ATTEMPTS: u32 = 10_000;

/// Where received files land.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    root: PathBuf,
}

impl DownloadDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create a new file named after `requested`, or `name-N.ext` when that
    /// name is taken. Returns the open file and the name actually used.
    pub fn create_unique(&self, requested: &str) -> io::Result<(File, String)> {
        std::fs::create_dir_all(&self.root)?;

        let sanitized = sanitize(requested);
        let (stem, ext) = split_extension(&sanitized);

        for attempt in 0..MAX_UNIQUE_ATTEMPTS {
            let candidate = match (attempt, ext) {
                (0, _) => sanitized.clone(),
                (n, Some(ext)) => format!("{}-{}.{}", stem, n, ext),
                (n, None) => format!("{}-{}", stem, n),
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.root.join(&candidate))
            {
                Ok(file) => {
                    info!("Receiving into {}", self.root.join(&candidate).display());
                    return Ok((file, candidate));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} exists, trying next name", candidate);
                }
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free file name for {}", sanitized),
        ))
    }

    /// Remove a partially received file.
    pub fn delete(&self, name: &str) {
        let path = self.root.join(name);
        match std::fs::remove_file(&path) {
            Ok(()) => info!("Deleted incomplete file {}", path.display()),
            Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
        }
    }
}

/// Keep only the leaf name so a peer cannot write outside the directory.
fn sanitize(requested: &str) -> String {
    let leaf = requested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    match leaf {
        "" | "." | ".." => PLACEHOLDER_NAME.to_string(),
        leaf => leaf.to_string(),
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], Some(&name[dot + 1..])),
        _ => (name, None),
    }
}
