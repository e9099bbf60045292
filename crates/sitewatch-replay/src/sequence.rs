//! Channel and frame sequence discovery, per-frame prediction lookup.
//!
//! ```text
//! <dataset root>/<sequence>/
//!   frame_0001.jpg
//!   frame_0001.txt          ground-truth UC labels (fallback)
//!   pred_person/frame_0001.txt
//!   pred_ppe/frame_0001.txt
//!   pred_uc/frame_0001.txt
//!   pred_highrisk/frame_0001.txt
//! ```

use std::path::{Path, PathBuf};

use sitewatch_models::{Detection, DetectionCategory};
use tracing::debug;

use crate::config::PredictionFolders;
use crate::error::{ReplayError, ReplayResult};
use crate::labels::{load_label_file, LabelResolver};

const FRAME_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Ordered frames of one annotated sequence.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    root: PathBuf,
    frames: Vec<PathBuf>,
}

impl FrameSequence {
    /// Discover frames in a directory, sorted by file name.
    pub fn discover(root: impl AsRef<Path>) -> ReplayResult<Self> {
        let root = root.as_ref().to_path_buf();

        let mut frames: Vec<PathBuf> = std::fs::read_dir(&root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_frame(path))
            .collect();
        frames.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if frames.is_empty() {
            return Err(ReplayError::EmptySequence(root));
        }

        debug!(root = %root.display(), frames = frames.len(), "Discovered frame sequence");
        Ok(Self { root, frames })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Path> {
        self.frames.get(index).map(PathBuf::as_path)
    }

    /// `<root>/<folder>/<stem>.txt`
    pub fn prediction_path(&self, frame: &Path, folder: &str) -> PathBuf {
        let mut name = frame.file_stem().unwrap_or_default().to_os_string();
        name.push(".txt");
        self.root.join(folder).join(name)
    }

    /// `<stem>.txt` next to the image.
    pub fn ground_truth_path(&self, frame: &Path) -> PathBuf {
        frame.with_extension("txt")
    }

    /// Load one detector family's detections for a frame.
    ///
    /// A missing prediction file is an empty observation; UC alone falls
    /// back to the ground-truth label file.
    pub fn load_detections(
        &self,
        index: usize,
        category: DetectionCategory,
        folders: &PredictionFolders,
        resolver: &LabelResolver,
    ) -> ReplayResult<Vec<Detection>> {
        let frame = self
            .frame(index)
            .ok_or_else(|| ReplayError::load_failed(format!("frame index {} out of range", index)))?;
        let (width, height) = frame_dimensions(frame)?;

        let mut path = self.prediction_path(frame, folders.for_category(category));
        if category == DetectionCategory::Uc && !path.exists() {
            path = self.ground_truth_path(frame);
        }

        load_label_file(&path, category, resolver, width, height)
    }
}

/// Sequence directories directly under a dataset root, sorted by name.
pub fn discover_channels(dataset_root: impl AsRef<Path>) -> ReplayResult<Vec<PathBuf>> {
    let dataset_root = dataset_root.as_ref();

    let mut channels: Vec<PathBuf> = std::fs::read_dir(dataset_root)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    channels.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if channels.is_empty() {
        return Err(ReplayError::NoChannels(dataset_root.to_path_buf()));
    }

    debug!(root = %dataset_root.display(), channels = channels.len(), "Discovered channels");
    Ok(channels)
}

/// Index of the channel named `preferred` (case-insensitive), else the first.
pub fn select_channel(channels: &[PathBuf], preferred: Option<&str>) -> usize {
    preferred
        .and_then(|name| {
            channels
                .iter()
                .position(|path| channel_name(path).eq_ignore_ascii_case(name))
        })
        .unwrap_or(0)
}

/// Directory name of a channel, lossy for non-UTF-8 names.
pub fn channel_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Frame width and height read from the image header.
pub fn frame_dimensions(path: &Path) -> ReplayResult<(u32, u32)> {
    Ok(image::image_dimensions(path)?)
}

fn is_frame(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| FRAME_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
        .unwrap_or(false)
}
