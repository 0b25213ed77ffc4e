use std::fs::{metadata, symlink_metadata};
use std::iter;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use libmount::Overlay;
use nix::errno::Errno;
use nix::mount::{umount2, MntFlags};

use crate::error::{Error, Result};


/// Mounts a writable overlay of `lower` at `target`
///
/// Writes land in `upper`, `work` is scratch space for the kernel and must
/// be on the same filesystem as `upper`. The lower tree is never written.
pub fn mount_overlay(lower: &Path, upper: &Path, work: &Path, target: &Path)
    -> Result<()>
{
    debug!("Overlay {:?} (upper {:?}) at {:?}", lower, upper, target);
    Overlay::writable(iter::once(lower), upper, work, target).mount()?;
    Ok(())
}

/// A mount point has a device different from its parent directory
fn is_mount_point(path: &Path) -> bool {
    let parent = match path.parent() {
        Some(parent) => parent,
        None => return true,
    };
    match (symlink_metadata(path), metadata(parent)) {
        (Ok(meta), Ok(pmeta)) => meta.is_dir() && meta.dev() != pmeta.dev(),
        _ => false,
    }
}

/// Lazily detaches the mount at `target`
///
/// Returns `false` when nothing was mounted there, so repeated cleanup of
/// the same container is harmless.
pub fn unmount(target: &Path) -> Result<bool> {
    if !is_mount_point(target) {
        return Ok(false);
    }
    match umount2(target, MntFlags::MNT_DETACH) {
        Ok(()) => {
            debug!("Unmounted {:?}", target);
            Ok(true)
        }
        Err(nix::Error::Sys(Errno::EINVAL))
        | Err(nix::Error::Sys(Errno::ENOENT)) => Ok(false),
        Err(e) => Err(Error::Unmount(target.to_path_buf(), e)),
    }
}
