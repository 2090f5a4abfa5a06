// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::PathBuf;
use std::time::Duration;

/// File scanner settings.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    /// Directories, relative to the library root, that are never scanned.
    /// Thumbnail and temporary caches live here.
    pub skip_dirs: Vec<PathBuf>,

    /// A directory containing a file with this name is an album.
    pub album_marker: String,

    /// Files modified more recently than this are assumed to be still
    /// copying in and are left for the next scan.
    pub settle_time: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            skip_dirs: vec![PathBuf::from("thumbnails"), PathBuf::from("tmp")],
            album_marker: String::from(".album"),
            settle_time: Duration::from_secs(2),
        }
    }
}

/// Process coordinator settings.
#[derive(Debug, Clone)]
pub struct ProcessSettings {
    /// Longest time to wait for one AI call before marking the meme as failed.
    pub call_timeout: Duration,

    /// Pause between consecutive AI calls.
    pub request_interval: Duration,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(120),
            request_interval: Duration::ZERO,
        }
    }
}

/// AI service settings.
#[derive(Debug, Clone)]
pub struct AiSettings {
    /// Base URL of an OpenAI compatible API, such as https://api.openai.com/v1
    pub base_url: String,

    pub api_key: Option<String>,

    pub model: String,

    pub temperature: f32,

    pub max_completion_tokens: u32,

    /// HTTP timeout for one request.
    pub request_timeout: Duration,

    /// Largest media payload, in bytes, sent for one file.
    pub max_upload_bytes: u64,

    /// Most album members sent in one request.
    pub max_album_parts: usize,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            base_url: String::from("https://api.openai.com/v1"),
            api_key: None,
            model: String::from("gpt-4.1-mini"),
            temperature: 1.0,
            max_completion_tokens: 2048,
            request_timeout: Duration::from_secs(90),
            max_upload_bytes: 20 * 1024 * 1024,
            max_album_parts: 4,
        }
    }
}

/// Tag reconciler settings.
#[derive(Debug, Clone)]
pub struct TagSettings {
    /// Directory names that never become path tags. Compared case-insensitively.
    pub stopwords: Vec<String>,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            stopwords: ["files", "memes", "misc", "new", "other", "unsorted"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
