// SPDX-FileCopyrightText: © 2024 David Bliss
//
// SPDX-License-Identifier: GPL-3.0-or-later

use super::model::AnalysisFailure;
use crate::file_types;
use crate::meme::{Layout, MediaType, MemeItem};
use anyhow::{bail, Context, Result};
use base64::prelude::*;
use image::{ImageFormat, ImageReader};
use std::fmt::Debug;
use std::io::{Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tracing::{debug, warn};

/// One image sent to the AI service.
#[derive(Debug, Clone)]
pub struct MediaPart {
    /// Path, relative to library root, the image came from.
    pub source: PathBuf,

    pub mime_type: String,

    pub bytes: Vec<u8>,
}

impl MediaPart {
    pub fn data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            BASE64_STANDARD.encode(&self.bytes)
        )
    }
}

/// Produces a representative still frame for animated or video media.
pub trait FrameExtractor: Send + Sync + Debug {
    /// PNG encoded frame.
    fn first_frame(&self, path: &Path, media_type: MediaType) -> Result<Vec<u8>>;
}

/// First frame of GIFs with image-rs, first frame of videos with ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegFrameExtractor;

impl FrameExtractor for FfmpegFrameExtractor {
    fn first_frame(&self, path: &Path, media_type: MediaType) -> Result<Vec<u8>> {
        let frame = match media_type {
            MediaType::Gif | MediaType::Image => {
                // image-rs decodes the first frame of an animation.
                ImageReader::open(path)?.with_guessed_format()?.decode()?
            }
            MediaType::Video => {
                let temporary_png_file = tempfile::Builder::new().suffix(".png").tempfile()?;

                // ffmpeg command will extract the first frame and save it as a PNG file.
                let status = Command::new("ffmpeg")
                    .arg("-loglevel")
                    .arg("error")
                    .arg("-y") // temp file will already exist, so allow overwriting
                    .arg("-i")
                    .arg(path.as_os_str())
                    .arg("-update")
                    .arg("true")
                    .arg("-vf")
                    .arg(r"select=eq(n\,0)") // select frame zero
                    .arg(temporary_png_file.path())
                    .status()
                    .context("run ffmpeg")?;

                if !status.success() {
                    bail!("ffmpeg exited with {}", status);
                }

                ImageReader::open(temporary_png_file.path())?.decode()?
            }
        };

        let mut png = Vec::new();
        frame.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        Ok(png)
    }
}

/// Turns a meme into the images sent to the AI service.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    library_base_path: PathBuf,
    max_upload_bytes: u64,
    max_album_parts: usize,
    frames: Arc<dyn FrameExtractor>,
}

impl PayloadBuilder {
    pub fn new(
        library_base_path: &Path,
        max_upload_bytes: u64,
        max_album_parts: usize,
        frames: Arc<dyn FrameExtractor>,
    ) -> Self {
        Self {
            library_base_path: PathBuf::from(library_base_path),
            max_upload_bytes,
            max_album_parts: max_album_parts.max(1),
            frames,
        }
    }

    pub fn build(&self, item: &MemeItem) -> std::result::Result<Vec<MediaPart>, AnalysisFailure> {
        match &item.layout {
            Layout::Single { path, media_type } => Ok(vec![self.part(path, *media_type)?]),
            Layout::Album { dir, members } => {
                let parts: Vec<MediaPart> = members
                    .iter()
                    .filter(|m| {
                        let exists = self.library_base_path.join(&m.path).is_file();
                        if !exists {
                            warn!("Album {} member {:?} is missing. Skipping.", item.meme_id, m.path);
                        }
                        exists
                    })
                    .take(self.max_album_parts)
                    .map(|m| self.part(&m.path, m.media_type))
                    .collect::<std::result::Result<_, _>>()?;

                if parts.is_empty() {
                    return Err(AnalysisFailure::unsupported(format!(
                        "album {:?} has no readable members",
                        dir
                    )));
                }
                Ok(parts)
            }
        }
    }

    fn part(&self, path: &Path, media_type: MediaType) -> std::result::Result<MediaPart, AnalysisFailure> {
        let full_path = self.library_base_path.join(path);

        let metadata = std::fs::metadata(&full_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AnalysisFailure::unsupported(format!("file {:?} not found", path)),
            _ => AnalysisFailure::transient(format!("read {:?}: {}", path, e)),
        })?;

        if metadata.len() > self.max_upload_bytes {
            return Err(AnalysisFailure::unsupported(format!(
                "file {:?} is {} bytes, more than the limit of {}",
                path,
                metadata.len(),
                self.max_upload_bytes
            )));
        }

        let part = match media_type {
            MediaType::Image => {
                let bytes = std::fs::read(&full_path)
                    .map_err(|e| AnalysisFailure::transient(format!("read {:?}: {}", path, e)))?;
                MediaPart {
                    source: PathBuf::from(path),
                    mime_type: file_types::image_mime_type(path).to_string(),
                    bytes,
                }
            }
            MediaType::Gif | MediaType::Video => {
                debug!("Extracting frame from {:?}", path);
                let bytes = self
                    .frames
                    .first_frame(&full_path, media_type)
                    .map_err(|e| {
                        AnalysisFailure::unsupported(format!("extract frame from {:?}: {}", path, e))
                    })?;
                MediaPart {
                    source: PathBuf::from(path),
                    mime_type: String::from("image/png"),
                    bytes,
                }
            }
        };

        Ok(part)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::FailureKind;
    use crate::meme::{AlbumMember, Details, MemeId, Status};
    use chrono::Utc;

    #[derive(Debug)]
    struct FixedFrame;

    impl FrameExtractor for FixedFrame {
        fn first_frame(&self, _path: &Path, _media_type: MediaType) -> Result<Vec<u8>> {
            Ok(vec![1, 2, 3])
        }
    }

    fn item(layout: Layout) -> MemeItem {
        MemeItem {
            meme_id: MemeId::new(1),
            layout,
            status: Status::Processing,
            details: Details::default(),
            error: None,
            tags: vec![],
            is_missing: false,
            processed_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn builder(root: &Path, max_upload_bytes: u64) -> PayloadBuilder {
        PayloadBuilder::new(root, max_upload_bytes, 2, Arc::new(FixedFrame))
    }

    #[test]
    fn single_image_is_sent_as_is() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lol.png"), b"png bytes").unwrap();

        let parts = builder(dir.path(), 1024)
            .build(&item(Layout::Single {
                path: PathBuf::from("lol.png"),
                media_type: MediaType::Image,
            }))
            .unwrap();

        assert_eq!(1, parts.len());
        assert_eq!("image/png", parts[0].mime_type);
        assert_eq!(b"png bytes".to_vec(), parts[0].bytes);
        assert!(parts[0].data_url().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn video_is_sent_as_frame() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"not really a video").unwrap();

        let parts = builder(dir.path(), 1024)
            .build(&item(Layout::Single {
                path: PathBuf::from("clip.mp4"),
                media_type: MediaType::Video,
            }))
            .unwrap();

        assert_eq!(vec![1, 2, 3], parts[0].bytes);
        assert_eq!("image/png", parts[0].mime_type);
    }

    #[test]
    fn oversized_file_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.jpg"), vec![0u8; 100]).unwrap();

        let failure = builder(dir.path(), 10)
            .build(&item(Layout::Single {
                path: PathBuf::from("big.jpg"),
                media_type: MediaType::Image,
            }))
            .unwrap_err();

        assert_eq!(FailureKind::Unsupported, failure.kind);
    }

    #[test]
    fn album_skips_missing_members_and_limits_parts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("comic")).unwrap();
        for name in ["2.jpg", "3.jpg", "4.jpg"] {
            std::fs::write(dir.path().join("comic").join(name), name.as_bytes()).unwrap();
        }

        let members = ["1.jpg", "2.jpg", "3.jpg", "4.jpg"]
            .iter()
            .map(|name| AlbumMember {
                path: PathBuf::from("comic").join(name),
                media_type: MediaType::Image,
            })
            .collect();

        let parts = builder(dir.path(), 1024)
            .build(&item(Layout::Album {
                dir: PathBuf::from("comic"),
                members,
            }))
            .unwrap();

        let sources: Vec<_> = parts.iter().map(|p| p.source.clone()).collect();
        assert_eq!(
            vec![PathBuf::from("comic/2.jpg"), PathBuf::from("comic/3.jpg")],
            sources
        );
    }

    #[test]
    fn album_without_members_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let failure = builder(dir.path(), 1024)
            .build(&item(Layout::Album {
                dir: PathBuf::from("empty"),
                members: vec![],
            }))
            .unwrap_err();
        assert_eq!(FailureKind::Unsupported, failure.kind);
    }
}
