// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use clap::{Args, Parser, Subcommand};
use memelet_core::meme::Status;
use memelet_core::settings::{AiSettings, ProcessSettings, ScanSettings, TagSettings};
use memelet_core::LibrarySettings;
use std::path::PathBuf;
use std::time::Duration;

/// Extra time the coordinator allows on top of the HTTP timeout, for
/// reading files and extracting video frames.
const CALL_TIMEOUT_SLACK: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "memelet")]
#[command(version)]
#[command(about = "Catalogues a directory of memes with descriptions and tags from an AI model")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct Config {
    /// Library root
    #[arg(long, env = "MEMES_DIR", default_value = "files")]
    pub memes_dir: PathBuf,

    /// SQLite database file
    #[arg(long, env = "DB_PATH", default_value = "memelet.db")]
    pub db_path: PathBuf,

    /// Run lock file (default: .memelet/process.lock inside the library root)
    #[arg(long, env = "LOCK_PATH")]
    pub lock_path: Option<PathBuf>,

    /// Base URL of an OpenAI compatible API
    #[arg(long, env = "AI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub ai_base_url: String,

    #[arg(long, env = "AI_API_KEY", hide_env_values = true)]
    pub ai_api_key: Option<String>,

    #[arg(long, env = "AI_MODEL", default_value = "gpt-4.1-mini")]
    pub ai_model: String,

    /// Seconds to wait for one AI request
    #[arg(long, env = "AI_TIMEOUT_SECS", default_value_t = 90)]
    pub ai_timeout_secs: u64,

    /// Pause between AI requests, in milliseconds
    #[arg(long, env = "AI_REQUEST_INTERVAL_MS", default_value_t = 0)]
    pub ai_request_interval_ms: u64,

    /// Largest file sent to the AI service
    #[arg(long, env = "AI_MAX_UPLOAD_BYTES", default_value_t = 20 * 1024 * 1024)]
    pub ai_max_upload_bytes: u64,

    /// Directories, relative to the library root, never scanned
    #[arg(long, env = "SKIP_DIRS", value_delimiter = ',', default_value = "thumbnails,tmp")]
    pub skip_dirs: Vec<PathBuf>,

    /// File name that marks a directory as an album
    #[arg(long, env = "ALBUM_MARKER", default_value = ".album")]
    pub album_marker: String,

    /// Directory names that never become tags
    #[arg(long, env = "TAG_STOPWORDS", value_delimiter = ',')]
    pub tag_stopwords: Option<Vec<String>>,

    /// Files modified more recently than this are left for the next scan
    #[arg(long, env = "SCAN_SETTLE_SECS", default_value_t = 2)]
    pub scan_settle_secs: u64,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Add new memes and flag memes missing from disk
    Scan,

    /// Send new memes to the AI model
    Process {
        /// Also retry memes that failed before
        #[arg(long)]
        retry_errors: bool,

        /// Process only this meme, whatever its status
        #[arg(long)]
        id: Option<i64>,
    },

    /// Scan, then process
    Run {
        #[arg(long)]
        retry_errors: bool,
    },

    /// Recompute path tags without calling the AI model
    ReconcileTags {
        #[arg(long)]
        id: Option<i64>,
    },

    /// Count memes by status
    Stats,

    /// List memes
    List {
        #[arg(long)]
        status: Option<Status>,
    },

    /// Show everything known about a meme
    Show { id: i64 },

    /// Hand edit the details of a meme
    Edit {
        id: i64,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        references: Option<String>,

        #[arg(long)]
        template: Option<String>,

        #[arg(long)]
        caption: Option<String>,

        #[arg(long)]
        meaning: Option<String>,

        #[arg(long)]
        status: Option<Status>,
    },

    /// Manage manual tags
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },

    /// Put album files in a new order
    Reorder {
        id: i64,

        /// Every album file, relative to the library root, in the new order
        #[arg(required = true)]
        members: Vec<PathBuf>,
    },

    /// Forget a meme
    Remove { id: i64 },
}

#[derive(Debug, Subcommand)]
pub enum TagAction {
    Add { id: i64, tag: String },
    Rm { id: i64, tag: String },
}

impl Config {
    pub fn library_settings(&self) -> LibrarySettings {
        LibrarySettings {
            scan: self.scan_settings(),
            process: self.process_settings(),
            tags: self.tag_settings(),
            lock_path: self.lock_path.clone(),
        }
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            skip_dirs: self.skip_dirs.clone(),
            album_marker: self.album_marker.clone(),
            settle_time: Duration::from_secs(self.scan_settle_secs),
        }
    }

    pub fn process_settings(&self) -> ProcessSettings {
        ProcessSettings {
            call_timeout: Duration::from_secs(self.ai_timeout_secs) + CALL_TIMEOUT_SLACK,
            request_interval: Duration::from_millis(self.ai_request_interval_ms),
        }
    }

    pub fn ai_settings(&self) -> AiSettings {
        AiSettings {
            base_url: self.ai_base_url.clone(),
            api_key: self.ai_api_key.clone(),
            model: self.ai_model.clone(),
            request_timeout: Duration::from_secs(self.ai_timeout_secs),
            max_upload_bytes: self.ai_max_upload_bytes,
            ..AiSettings::default()
        }
    }

    pub fn tag_settings(&self) -> TagSettings {
        match &self.tag_stopwords {
            Some(stopwords) => TagSettings {
                stopwords: stopwords.clone(),
            },
            None => TagSettings::default(),
        }
    }
}
