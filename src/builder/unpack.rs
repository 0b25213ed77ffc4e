use std::io::{self, BufRead, BufReader, Read};
use std::fs::{File, Permissions};
use std::fs::{set_permissions, hard_link, remove_file, symlink_metadata};
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Component, Path, PathBuf};

use tar::Archive;
use flate2::read::GzDecoder;
use xz2::read::XzDecoder;
use bzip2::read::BzDecoder;

use crate::error::{Error, Result};
use crate::file_util::{create_dir, copy_stream};


/// Unpacks a (possibly compressed) tar stream into `tgt`
///
/// Compression is detected by the magic bytes at the start of the stream,
/// anything unrecognized is read as a plain tar.
pub fn unpack_stream<R: Read>(input: R, tgt: &Path) -> Result<()> {
    let mut input = BufReader::new(input);
    let magic = input.fill_buf().map_err(Error::Archive)?
        .iter().take(6).cloned().collect::<Vec<u8>>();
    if magic.len() >= 2 && magic[..2] == [0x1f, 0x8b] {
        debug!("Unpacking gzip archive into {:?}", tgt);
        unpack_tar(GzDecoder::new(input), tgt)
    } else if magic.len() >= 6 && magic[..6] ==
        [ 0xFD, b'7', b'z', b'X', b'Z', 0x00]
    {
        debug!("Unpacking xz archive into {:?}", tgt);
        unpack_tar(XzDecoder::new(input), tgt)
    } else if magic.len() >= 3 && magic[..3] == [ b'B', b'Z', b'h'] {
        debug!("Unpacking bzip2 archive into {:?}", tgt);
        unpack_tar(BzDecoder::new(input), tgt)
    } else {
        debug!("Unpacking tar archive into {:?}", tgt);
        unpack_tar(input, tgt)
    }
}

/// Converts an archive path into one relative to the image root
///
/// Leading `/` and `.` components are dropped, `..` is refused.
fn relative_path(path: &Path) -> Result<PathBuf> {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(x) => result.push(x),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(..) => {
                return Err(Error::UnsafePath(path.to_path_buf()));
            }
        }
    }
    Ok(result)
}

/// Refuses to write through a symlink unpacked earlier
///
/// Every existing ancestor of `rel` inside `root` must be a real directory,
/// otherwise an archive could place files anywhere on the host.
fn check_ancestors(root: &Path, rel: &Path) -> Result<()> {
    let mut cur = root.to_path_buf();
    let parent = rel.parent().unwrap_or(Path::new(""));
    for component in parent.components() {
        cur.push(component);
        match symlink_metadata(&cur) {
            Ok(ref stat) if stat.file_type().is_symlink() => {
                return Err(Error::UnsafePath(rel.to_path_buf()));
            }
            Ok(_) => {}
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(Error::Read(cur, e)),
        }
    }
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        create_dir(parent, true)
            .map_err(|e| Error::CreateDir(parent.to_path_buf(), e))?;
    }
    Ok(())
}

/// Removes a symlink left at `path` so it's replaced rather than followed
fn drop_symlink(path: &Path) -> Result<()> {
    match symlink_metadata(path) {
        Ok(ref stat) if stat.file_type().is_symlink() => {
            remove_file(path)
                .map_err(|e| Error::Remove(path.to_path_buf(), e))
        }
        _ => Ok(()),
    }
}

fn unpack_tar<F: Read>(file: F, tgt: &Path) -> Result<()> {
    let mut arc = Archive::new(file);
    let mut hardlinks = Vec::new();

    for item in arc.entries().map_err(Error::Archive)? {
        let mut src = item.map_err(Error::Archive)?;
        let orig_path = src.path().map_err(Error::Archive)?.to_path_buf();
        let rel = relative_path(&orig_path)?;
        if rel.as_os_str().is_empty() {
            // the `./` entry, root already exists
            continue;
        }
        check_ancestors(tgt, &rel)?;
        let path = tgt.join(&rel);
        let entry = src.header().entry_type();

        if entry.is_dir() {
            drop_symlink(&path)?;
            create_dir(&path, true)
                .map_err(|e| Error::CreateDir(path.clone(), e))?;
        } else if entry.is_file() {
            ensure_parent(&path)?;
            drop_symlink(&path)?;
            let mut dest = File::create(&path)
                .map_err(|e| Error::Write(path.clone(), e))?;
            copy_stream(&mut src, &mut dest)
                .map_err(|e| Error::Write(path.clone(), e))?;
            let mode = src.header().mode().map_err(Error::Archive)?;
            set_permissions(&path, Permissions::from_mode(mode & 0o7777))
                .map_err(|e| Error::Write(path.clone(), e))?;
        } else if entry.is_symlink() {
            let link = src.link_name().map_err(Error::Archive)?
                .ok_or_else(|| Error::UnsafePath(orig_path.clone()))?
                .into_owned();
            ensure_parent(&path)?;
            drop_symlink(&path)?;
            symlink(&link, &path)
                .map_err(|e| Error::Write(path.clone(), e))?;
        } else if entry.is_hard_link() {
            let link = src.link_name().map_err(Error::Archive)?
                .ok_or_else(|| Error::UnsafePath(orig_path.clone()))?;
            let link = relative_path(&link)?;
            hardlinks.push((link, rel));
        } else {
            debug!("Skipping {:?}: unsupported entry {:?}", orig_path, entry);
        }
    }
    // links may point to files which come later in the archive
    for (src, dst) in hardlinks.into_iter() {
        check_ancestors(tgt, &src)?;
        check_ancestors(tgt, &dst)?;
        let src = tgt.join(src);
        let dst = tgt.join(dst);
        if symlink_metadata(&src).map(|s| s.file_type().is_symlink())
            .unwrap_or(false)
        {
            return Err(Error::UnsafePath(src));
        }
        ensure_parent(&dst)?;
        hard_link(&src, &dst)
            .map_err(|e| Error::Write(dst.clone(), e))?;
    }
    Ok(())
}


#[cfg(test)]
mod test {
    use std::path::{Path, PathBuf};
    use super::relative_path;

    #[test]
    fn relative_paths() {
        assert_eq!(relative_path(Path::new("./etc/hosts")).unwrap(),
                   PathBuf::from("etc/hosts"));
        assert_eq!(relative_path(Path::new("/usr/bin/")).unwrap(),
                   PathBuf::from("usr/bin"));
        assert_eq!(relative_path(Path::new(".")).unwrap(), PathBuf::new());
        assert!(relative_path(Path::new("a/../../b")).is_err());
    }
}
