// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod model;
pub mod repo;

pub use model::AlbumMember;
pub use model::Details;
pub use model::Layout;
pub use model::MediaType;
pub use model::MemeId;
pub use model::MemeItem;
pub use model::Stats;
pub use model::Status;
pub use model::Tag;
pub use model::TagSource;

pub use repo::Repository;
