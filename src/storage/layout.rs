// ABOUTME: On-disk layout shared by the filesystem-based storage drivers.
// ABOUTME: Path helpers plus blocking tree-copy and image-unpack routines.

use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::StorageError;
use crate::types::{ContainerName, ImageId};

/// Directory layout under a storage root:
///
/// ```text
/// <root>/containers/<name>/rootfs
/// <root>/snapshots/<parent>/<snap>/rootfs
/// <root>/images/<fingerprint>/rootfs
/// ```
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    image_source: PathBuf,
}

impl Layout {
    pub fn new(root: PathBuf, image_source: PathBuf) -> Self {
        Self { root, image_source }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage path of a container or snapshot.
    pub fn container_path(&self, name: &ContainerName) -> PathBuf {
        match name.snapshot_name() {
            Some(snap) => self.snapshots_dir(&name.parent()).join(snap),
            None => self.root.join("containers").join(name.as_str()),
        }
    }

    /// Directory holding every snapshot of a container.
    pub fn snapshots_dir(&self, parent: &ContainerName) -> PathBuf {
        self.root.join("snapshots").join(parent.parent().as_str())
    }

    pub fn image_path(&self, fingerprint: &ImageId) -> PathBuf {
        self.root.join("images").join(fingerprint.as_str())
    }

    pub fn image_tarball(&self, fingerprint: &ImageId) -> PathBuf {
        self.image_source
            .join(format!("{}.tar.gz", fingerprint.as_str()))
    }

    /// Root filesystem inside an unpacked image; tarballs without a `rootfs/`
    /// directory are treated as a bare root filesystem.
    pub fn image_rootfs(&self, fingerprint: &ImageId) -> PathBuf {
        let image = self.image_path(fingerprint);
        let rootfs = image.join("rootfs");
        if rootfs.is_dir() { rootfs } else { image }
    }

    /// Create the top-level directories.
    pub fn ensure(&self) -> Result<(), StorageError> {
        for dir in ["containers", "snapshots", "images"] {
            let path = self.root.join(dir);
            fs::create_dir_all(&path).map_err(|e| StorageError::io(&path, e))?;
        }
        Ok(())
    }
}

/// Recursively copy `src` into `dst`, preserving symlinks and permissions.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), StorageError> {
    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            StorageError::io(path, io::Error::other(e.to_string()))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| StorageError::io(entry.path(), io::Error::other(e.to_string())))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| StorageError::io(&target, e))?;
            let perms = entry
                .metadata()
                .map_err(|e| StorageError::io(entry.path(), io::Error::other(e.to_string())))?
                .permissions();
            fs::set_permissions(&target, perms).map_err(|e| StorageError::io(&target, e))?;
        } else if file_type.is_symlink() {
            let link = fs::read_link(entry.path()).map_err(|e| StorageError::io(entry.path(), e))?;
            std::os::unix::fs::symlink(&link, &target)
                .map_err(|e| StorageError::io(&target, e))?;
        } else {
            fs::copy(entry.path(), &target).map_err(|e| StorageError::io(&target, e))?;
        }
    }
    Ok(())
}

/// Remove a directory tree; absence is not an error.
pub fn remove_tree(path: &Path) -> Result<(), StorageError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Unpack a gzip-compressed tarball into `dest`.
pub fn unpack_tarball(tarball: &Path, dest: &Path) -> Result<(), StorageError> {
    let file = fs::File::open(tarball).map_err(|e| StorageError::io(tarball, e))?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    fs::create_dir_all(dest).map_err(|e| StorageError::io(dest, e))?;
    archive.unpack(dest).map_err(|e| StorageError::io(tarball, e))
}
