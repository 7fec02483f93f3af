//! Photo source backed by a directory tree.
//!
//! Every image file below `root` is one photo; its parent directory name is
//! the folder, its modification time stands in for the capture time.

use log::warn;
use memoir_core::service::startup_import::{ImportError, ImportedPhoto, PhotoSource};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "heic", "webp", "gif"];

pub struct FsPhotoSource {
    root: PathBuf,
}

impl FsPhotoSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PhotoSource for FsPhotoSource {
    fn query_photos(
        &self,
        folders: Option<&BTreeSet<String>>,
    ) -> Result<Vec<ImportedPhoto>, ImportError> {
        if !self.root.is_dir() {
            return Err(ImportError::Source(format!(
                "`{}` is not a directory",
                self.root.display()
            )));
        }

        let mut photos = Vec::new();
        let mut unreadable = 0usize;
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    unreadable += 1;
                    warn!(
                        "event=import_scan module=import status=skipped depth={} io_error={:?}",
                        err.depth(),
                        err.io_error().map(std::io::Error::kind)
                    );
                    continue;
                }
            };
            let path = entry.path();
            if !entry.file_type().is_file() || !is_image(path) {
                continue;
            }

            let bucket_name = path
                .parent()
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            if let Some(folders) = folders {
                if !folders.is_empty() && !folders.contains(bucket_name.trim()) {
                    continue;
                }
            }

            let absolute = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            let mut photo =
                ImportedPhoto::new(format!("file://{}", absolute.display()), bucket_name);
            photo.taken_at = modified_millis(&entry);
            photos.push(photo);
        }

        if unreadable > 0 {
            warn!("event=import_scan module=import status=partial unreadable={unreadable}");
        }

        // Newest first, like a gallery listing.
        photos.sort_by(|left, right| {
            right
                .taken_at
                .cmp(&left.taken_at)
                .then_with(|| left.content_uri.cmp(&right.content_uri))
        });
        Ok(photos)
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn modified_millis(entry: &walkdir::DirEntry) -> Option<i64> {
    let modified = entry.metadata().ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(UNIX_EPOCH).ok()?;
    i64::try_from(since_epoch.as_millis()).ok()
}

#[cfg(test)]
mod tests {
    use super::FsPhotoSource;
    use log::warn;
use memoir_core::service::startup_import::PhotoSource;
    use std::collections::BTreeSet;
    use std::fs::{self, File};

    #[test]
    fn lists_images_with_parent_folder_as_bucket() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("Camera")).unwrap();
        fs::create_dir(dir.path().join("Screenshots")).unwrap();
        File::create(dir.path().join("Camera/a.jpg")).unwrap();
        File::create(dir.path().join("Camera/notes.txt")).unwrap();
        File::create(dir.path().join("Screenshots/b.PNG")).unwrap();

        let source = FsPhotoSource::new(dir.path());
        let all = source.query_photos(None).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|photo| photo.content_uri.starts_with("file://")));
        assert!(all.iter().all(|photo| photo.taken_at.is_some()));

        let camera = BTreeSet::from(["Camera".to_string()]);
        let filtered = source.query_photos(Some(&camera)).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].bucket_name, "Camera");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_directory_does_not_abort_the_scan() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let locked = dir.path().join("Locked");
        fs::create_dir(dir.path().join("Camera")).unwrap();
        fs::create_dir(&locked).unwrap();
        File::create(dir.path().join("Camera/a.jpg")).unwrap();
        File::create(locked.join("hidden.jpg")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let photos = FsPhotoSource::new(dir.path()).query_photos(None);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let photos = photos.unwrap();
        assert!(photos.iter().any(|photo| photo.bucket_name == "Camera"));
        assert!(photos.len() <= 2);
    }

    #[test]
    fn missing_root_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FsPhotoSource::new(dir.path().join("absent"));
        assert!(source.query_photos(None).is_err());
    }
}
