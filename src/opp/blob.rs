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

//! Objects offered for pushing.

use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name used when the object carries no usable name.
pub const PLACEHOLDER_NAME: &str = "Unknown";

/// Something that can be pushed to a remote device.
pub trait Blob: Send + Sync {
    /// The object's name as supplied, possibly with path components.
    fn name(&self) -> Option<&str>;

    fn content_type(&self) -> Option<&str>;

    fn size(&self) -> u64;

    /// Open a fresh reader positioned at the start of the object.
    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct FileBlob {
    path: PathBuf,
    name: Option<String>,
    content_type: Option<String>,
    size: u64,
}

impl FileBlob {
    /// Stat `path` and wrap it.
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let size = std::fs::metadata(&path)?.len();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Self {
            path,
            name,
            content_type: None,
            size,
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl Blob for FileBlob {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// An in-memory object.
#[derive(Debug, Clone)]
pub struct MemoryBlob {
    name: Option<String>,
    content_type: Option<String>,
    data: Arc<[u8]>,
}

impl MemoryBlob {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: None,
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl Blob for MemoryBlob {
    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

/// Primary file extension for a MIME type.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/webp" => "webp",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/amr" => "amr",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "video/webm" => "webm",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/x-vcard" | "text/vcard" => "vcf",
        "text/x-vcalendar" | "text/calendar" => "vcs",
        "application/pdf" => "pdf",
        "application/zip" => "zip",
        "application/json" => "json",
        _ => return None,
    };
    Some(ext)
}

/// Name announced to the peer for an outgoing object.
///
/// Path components are stripped. A missing name becomes
/// [`PLACEHOLDER_NAME`], and a name without an extension gets one derived
/// from the content type when the type is known.
pub fn derive_file_name(name: Option<&str>, content_type: Option<&str>) -> String {
    let leaf = name
        .and_then(|name| name.rsplit(['/', '\\']).next())
        .filter(|leaf| !leaf.is_empty())
        .unwrap_or(PLACEHOLDER_NAME);

    if leaf.contains('.') {
        return leaf.to_string();
    }
    match content_type.and_then(extension_for) {
        Some(ext) => format!("{}.{}", leaf, ext),
        None => leaf.to_string(),
    }
}
