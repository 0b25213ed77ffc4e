use std::collections::BTreeMap;
use std::fs::{self, Permissions};
use std::io::Read;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use scan_dir::ScanDir;

use crate::error::{Error, Result};
use crate::ids::new_id;
use crate::image::Image;
use crate::storage::Storage;

mod unpack;

pub use self::unpack::unpack_stream;


pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::MissingName);
    }
    if name.contains('/') || name.chars().any(|c| c.is_control()) {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs()).unwrap_or(0)
}

/// Extracts an archive stream into a new image directory
///
/// The archive is unpacked into a hidden staging directory next to the
/// final location and renamed to `images/<id>` only when extraction has
/// succeeded, so a failed build leaves nothing visible behind. Each call
/// allocates a fresh id, even for the same name and contents.
///
/// The returned image is not registered yet, see `Registry::push`.
pub fn build_from_archive<R: Read>(input: R, name: &str, storage: &Storage)
    -> Result<Image>
{
    validate_name(name)?;
    let id = new_id();
    let images = storage.images_dir();
    let staging = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempdir_in(&images)
        .map_err(|e| Error::CreateDir(images.clone(), e))?;
    fs::set_permissions(staging.path(), Permissions::from_mode(0o755))
        .map_err(|e| Error::Write(staging.path().to_path_buf(), e))?;
    info!("Building image {:?} ({}) in {:?}", name, id, staging.path());

    // staging dir is removed on drop when unpacking fails
    unpack_stream(input, staging.path())?;

    let target = storage.image_dir(&id);
    let staged = staging.keep();
    if let Err(e) = fs::rename(&staged, &target) {
        fs::remove_dir_all(&staged)
            .map_err(|e| warn!("Can't remove {:?}: {}", staged, e)).ok();
        return Err(Error::Rename(staged, target, e));
    }
    info!("Image {:?} ({}) is built at {:?}", name, id, target);
    Ok(Image {
        id: id,
        name: name.to_string(),
        rootfs: target,
        created: now(),
        metadata: BTreeMap::new(),
    })
}

/// Removes staging directories of builds which never finished
///
/// Must not run concurrently with `build_from_archive` on the same
/// storage.
pub fn clean_staging(storage: &Storage) -> Result<usize> {
    let dirs: Vec<PathBuf> = ScanDir::dirs()
        .skip_hidden(false)
        .read(storage.images_dir(), |iter| {
            iter.filter(|&(_, ref name)| name.starts_with(".tmp-"))
                .map(|(entry, _)| entry.path())
                .collect()
        })?;
    for dir in &dirs {
        fs::remove_dir_all(dir)
            .map_err(|e| Error::Remove(dir.clone(), e))?;
        info!("Removed unfinished build {:?}", dir);
    }
    Ok(dirs.len())
}


#[cfg(test)]
pub mod test_util {
    use tar::{Builder, Header, EntryType};

    pub enum Item<'a> {
        Dir(&'a str),
        File(&'a str, &'a [u8], u32),
        Symlink(&'a str, &'a str),
    }

    /// Builds an in-memory tar archive
    pub fn archive(items: &[Item]) -> Vec<u8> {
        let mut builder = Builder::new(Vec::new());
        for item in items {
            let mut header = Header::new_gnu();
            match *item {
                Item::Dir(path) => {
                    header.set_path(path).unwrap();
                    header.set_entry_type(EntryType::Directory);
                    header.set_mode(0o755);
                    header.set_size(0);
                    header.set_cksum();
                    builder.append(&header, &[][..]).unwrap();
                }
                Item::File(path, data, mode) => {
                    header.set_path(path).unwrap();
                    header.set_entry_type(EntryType::Regular);
                    header.set_mode(mode);
                    header.set_size(data.len() as u64);
                    header.set_cksum();
                    builder.append(&header, data).unwrap();
                }
                Item::Symlink(path, target) => {
                    header.set_path(path).unwrap();
                    header.set_entry_type(EntryType::Symlink);
                    header.set_link_name(target).unwrap();
                    header.set_mode(0o777);
                    header.set_size(0);
                    header.set_cksum();
                    builder.append(&header, &[][..]).unwrap();
                }
            }
        }
        builder.into_inner().unwrap()
    }
}
