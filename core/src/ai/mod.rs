// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod client;
pub mod model;
pub mod payload;
pub mod prompt;
pub mod response;

pub use client::Analyzer;
pub use client::OpenAiClient;
pub use model::Analysis;
pub use model::AnalysisFailure;
pub use model::FailureKind;
pub use payload::FfmpegFrameExtractor;
pub use payload::FrameExtractor;
pub use payload::PayloadBuilder;
