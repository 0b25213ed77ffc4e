use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::file_util::safe_ensure_dir;


/// Directory layout under the storage root
///
/// ```text
/// <root>/images/<image-id>/...              extracted image trees
/// <root>/images_meta/<image-id>.json        image records
/// <root>/containers/<id>/{upper,work,rootfs} overlay directories
/// ```
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates the layout if needed; the root is canonicalized so that
    /// every path handed out (and stored in image records) is absolute
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Storage> {
        let root = root.as_ref();
        safe_ensure_dir(root).map_err(Error::Config)?;
        let root = fs::canonicalize(root)
            .map_err(|e| Error::Read(root.to_path_buf(), e))?;
        let storage = Storage { root: root };
        for dir in &[storage.images_dir(), storage.meta_dir(),
                     storage.containers_dir()]
        {
            safe_ensure_dir(dir).map_err(Error::Config)?;
        }
        Ok(storage)
    }
    pub fn root(&self) -> &Path {
        &self.root
    }
    pub fn images_dir(&self) -> PathBuf {
        self.root.join("images")
    }
    pub fn image_dir(&self, id: &str) -> PathBuf {
        self.images_dir().join(id)
    }
    pub fn meta_dir(&self) -> PathBuf {
        self.root.join("images_meta")
    }
    pub fn meta_file(&self, id: &str) -> PathBuf {
        self.meta_dir().join(format!("{}.json", id))
    }
    pub fn containers_dir(&self) -> PathBuf {
        self.root.join("containers")
    }
    pub fn container_dir(&self, id: &str) -> PathBuf {
        self.containers_dir().join(id)
    }
}
