// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod model;
pub mod scanner;

pub use model::ScanResult;
pub use model::ScannedMeme;
pub use scanner::Scanner;
