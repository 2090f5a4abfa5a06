// SPDX-FileCopyrightText: © 2025 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use crate::meme::model::MediaType;
use std::path::Path;

const IMAGE_SUFFIXES: [&str; 9] = [
    "avif", "bmp", "heic", "jpeg", "jpg", "png", "tif", "tiff", "webp",
];

const GIF_SUFFIXES: [&str; 1] = ["gif"];

const VIDEO_SUFFIXES: [&str; 6] = ["avi", "m4v", "mkv", "mov", "mp4", "webm"];

/// Infers the media type from a file extension. None if the file is not a supported meme.
pub fn media_type(path: &Path) -> Option<MediaType> {
    let path_ext = path.extension()?;

    let matches = |suffixes: &[&str]| suffixes.iter().any(|s| path_ext.eq_ignore_ascii_case(s));

    if matches(&IMAGE_SUFFIXES) {
        Some(MediaType::Image)
    } else if matches(&GIF_SUFFIXES) {
        Some(MediaType::Gif)
    } else if matches(&VIDEO_SUFFIXES) {
        Some(MediaType::Video)
    } else {
        None
    }
}

/// MIME type to declare when sending a still image inline.
pub fn image_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|x| x.to_str())
        .map(|x| x.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("avif") => "image/avif",
        Some("heic") => "image/heic",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "image/jpeg",
    }
}
