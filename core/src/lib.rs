// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod ai;
pub mod database;
pub mod error;
pub mod file_types;
pub mod library;
pub mod meme;
pub mod run_lock;
pub mod scanner;
pub mod settings;
pub mod tags;
pub mod tasks;

pub use error::Error;
pub use library::Library;
pub use library::LibrarySettings;
pub use meme::MemeId;
pub use meme::Repository;
pub use scanner::Scanner;
pub use tasks::ProcessOptions;
pub use tasks::ProcessOutcome;
pub use tasks::TagTarget;
