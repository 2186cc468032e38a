use std::path::Path;

use crate::error::{ResourceError, Result};
use crate::resource::types::{ResourceDescriptor, ResourceKind, ResourceSpec};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "webp", "tif", "tiff"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "flv", "m4v", "wmv", "mpeg", "mpg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "flac", "ogg", "oga", "m4a", "opus", "wma"];

/// Guess the kind of a file from its extension
pub fn kind_from_extension<P: AsRef<Path>>(path: P) -> Option<ResourceKind> {
    let extension = path.as_ref().extension()?.to_str()?;
    kind_for_extension(extension)
}

/// Kind for a bare extension such as `mp4` or `PNG`
pub fn kind_for_extension(extension: &str) -> Option<ResourceKind> {
    let extension = extension.to_ascii_lowercase();
    let extension = extension.as_str();

    if IMAGE_EXTENSIONS.contains(&extension) {
        Some(ResourceKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&extension) {
        Some(ResourceKind::Video)
    } else if AUDIO_EXTENSIONS.contains(&extension) {
        Some(ResourceKind::Audio)
    } else {
        None
    }
}

/// Decide the kind of a request entry
///
/// An explicit `type` wins; otherwise the extension of the resolved local file
/// decides.
pub fn classify(spec: &ResourceSpec, local_path: &Path) -> Option<ResourceKind> {
    spec.kind.or_else(|| kind_from_extension(local_path))
}

/// Fail with `NotFound` unless the resource's file is present on disk
pub fn ensure_exists(resource: &ResourceDescriptor) -> Result<()> {
    if resource.source_path.is_file() {
        Ok(())
    } else {
        Err(ResourceError::NotFound {
            path: resource.source_path.display().to_string(),
        }
        .into())
    }
}

/// A resource together with its position in the request (its encoder input index)
#[derive(Debug, Clone, Copy)]
pub struct Indexed<'a> {
    pub index: usize,
    pub resource: &'a ResourceDescriptor,
}

/// Resources split by kind, each list in original request order
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub images: Vec<Indexed<'a>>,
    pub videos: Vec<Indexed<'a>>,
    pub audios: Vec<Indexed<'a>>,
}

impl<'a> Partition<'a> {
    /// Images and videos merged back into request order
    pub fn visuals(&self) -> Vec<Indexed<'a>> {
        let mut visuals: Vec<Indexed<'a>> = self.images.iter().chain(self.videos.iter()).copied().collect();
        visuals.sort_by_key(|item| item.index);
        visuals
    }

    /// First video in request order, if any
    pub fn first_video(&self) -> Option<Indexed<'a>> {
        self.videos.first().copied()
    }
}

/// Split resources into images, videos and audios without reordering
pub fn partition(resources: &[ResourceDescriptor]) -> Partition<'_> {
    let mut partition = Partition::default();

    for (index, resource) in resources.iter().enumerate() {
        let item = Indexed { index, resource };
        match resource.kind {
            ResourceKind::Image => partition.images.push(item),
            ResourceKind::Video => partition.videos.push(item),
            ResourceKind::Audio => partition.audios.push(item),
        }
    }

    partition
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(kind_from_extension("a/b/photo.JPG"), Some(ResourceKind::Image));
        assert_eq!(kind_from_extension("clip.mkv"), Some(ResourceKind::Video));
        assert_eq!(kind_from_extension("song.flac"), Some(ResourceKind::Audio));
        assert_eq!(kind_from_extension("notes.txt"), None);
        assert_eq!(kind_from_extension("no_extension"), None);
        assert_eq!(kind_for_extension("WAV"), Some(ResourceKind::Audio));
    }

    #[test]
    fn test_explicit_kind_wins() {
        let mut spec = ResourceSpec::new("download.bin");
        assert_eq!(classify(&spec, Path::new("download.bin")), None);

        spec.kind = Some(ResourceKind::Video);
        assert_eq!(classify(&spec, Path::new("download.bin")), Some(ResourceKind::Video));
    }

    #[test]
    fn test_ensure_exists() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("present.png");
        std::fs::write(&present, b"png").unwrap();

        assert!(ensure_exists(&ResourceDescriptor::new(ResourceKind::Image, &present)).is_ok());

        let missing = ResourceDescriptor::new(ResourceKind::Image, dir.path().join("missing.png"));
        assert!(matches!(
            ensure_exists(&missing),
            Err(crate::error::ComposerError::Resource(ResourceError::NotFound { .. }))
        ));
    }

    #[test]
    fn test_partition_preserves_relative_order() {
        let resources = vec![
            ResourceDescriptor::new(ResourceKind::Audio, "music.mp3"),
            ResourceDescriptor::new(ResourceKind::Video, "b.mp4"),
            ResourceDescriptor::new(ResourceKind::Image, "a.png"),
            ResourceDescriptor::new(ResourceKind::Video, "c.mp4"),
            ResourceDescriptor::new(ResourceKind::Audio, "voice.wav"),
        ];

        let partition = partition(&resources);
        let indices = |items: &[Indexed]| items.iter().map(|i| i.index).collect::<Vec<_>>();

        assert_eq!(indices(&partition.images), vec![2]);
        assert_eq!(indices(&partition.videos), vec![1, 3]);
        assert_eq!(indices(&partition.audios), vec![0, 4]);
        assert_eq!(indices(&partition.visuals()), vec![1, 2, 3]);
        assert_eq!(partition.first_video().unwrap().resource.source_path, PathBuf::from("b.mp4"));
    }
}
