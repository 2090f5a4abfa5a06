// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod process;
pub mod reconcile;
pub mod scan;

pub use process::{ProcessMemes, ProcessOptions, ProcessOutcome, ProcessSummary};
pub use reconcile::{ReconcileSummary, ReconcileTags, TagTarget};
pub use scan::{ScanMemes, ScanSummary};
