use std::fs;
use std::io;
use std::path::Path;

use scan_dir::ScanDir;

use crate::error::{Error, Result};
use crate::file_util::write_atomic;
use crate::ids::is_valid_id;
use crate::image::Image;
use crate::storage::Storage;


/// Local catalog of image records
///
/// Each image is one `images_meta/<id>.json` file. The files are the only
/// durable record of an image: a tree under `images/` without a record
/// can't be reached by name anymore.
#[derive(Debug, Clone)]
pub struct Registry {
    storage: Storage,
}

fn read_record(path: &Path) -> Option<Image> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!("Skipping image record {:?}: {}", path, e);
            return None;
        }
    };
    match serde_json::from_slice(&data) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!("Skipping corrupt image record {:?}: {}", path, e);
            None
        }
    }
}

impl Registry {
    pub fn new(storage: &Storage) -> Registry {
        Registry { storage: storage.clone() }
    }

    /// Writes the record of `image`, replacing one with the same id
    pub fn push(&self, image: &Image) -> Result<()> {
        if !is_valid_id(&image.id) {
            return Err(Error::InvalidName(image.id.clone()));
        }
        let path = self.storage.meta_file(&image.id);
        let data = serde_json::to_vec_pretty(image)
            .map_err(|e| Error::Serialize(path.clone(), e))?;
        write_atomic(&path, &data)
            .map_err(|e| Error::Write(path.clone(), e))?;
        info!("Registered image {:?} ({})", image.name, image.id);
        Ok(())
    }

    /// Returns every readable record, in directory order
    ///
    /// Unreadable or corrupt records are skipped with a warning.
    pub fn list(&self) -> Result<Vec<Image>> {
        let dir = self.storage.meta_dir();
        let images: Vec<Image> = ScanDir::files().read(&dir, |iter| {
            iter.filter(|&(_, ref name)| name.ends_with(".json"))
                .filter_map(|(entry, _)| read_record(&entry.path()))
                .collect()
        })?;
        Ok(images)
    }

    pub fn get(&self, id: &str) -> Result<Image> {
        if !is_valid_id(id) {
            return Err(Error::ImageNotFound(id.to_string()));
        }
        let path = self.storage.meta_file(id);
        match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| Error::Serialize(path.clone(), e)),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::ImageNotFound(id.to_string()))
            }
            Err(e) => Err(Error::Read(path, e)),
        }
    }

    /// Finds an image by name
    ///
    /// Names are not unique. When several images share a name the first
    /// one in directory listing order is returned, which is an artifact of
    /// the filesystem rather than the newest or the oldest image.
    pub fn get_by_name(&self, name: &str) -> Result<Image> {
        self.list()?.into_iter()
            .find(|img| img.name == name)
            .ok_or_else(|| Error::ImageNotFound(name.to_string()))
    }

    /// Deletes the record and then the extracted tree of an image
    pub fn remove(&self, id: &str) -> Result<Image> {
        let image = self.get(id)?;
        let path = self.storage.meta_file(id);
        fs::remove_file(&path)
            .map_err(|e| Error::Remove(path.clone(), e))?;
        // only trees inside our storage are ever removed
        if image.rootfs == self.storage.image_dir(id) {
            fs::remove_dir_all(&image.rootfs)
                .map_err(|e| Error::Remove(image.rootfs.clone(), e))?;
        } else {
            warn!("Image {} has rootfs {:?} outside of storage, \
                   keeping it", id, image.rootfs);
        }
        info!("Removed image {:?} ({})", image.name, image.id);
        Ok(image)
    }
}
