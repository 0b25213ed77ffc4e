use std::io;
use std::io::{Read, Write, Error};
use std::path::Path;
use std::fs;
use std::os::unix::fs::PermissionsExt;


pub fn create_dir<P:AsRef<Path>>(path: P, recursive: bool) -> Result<(), Error>
{
    let path = path.as_ref();
    if path.is_dir() {
        return Ok(())
    }
    if recursive {
        match path.parent() {
            Some(p) if p != path => create_dir(p, true)?,
            _ => {}
        }
    }
    match fs::create_dir(path) {
        Ok(()) => {}
        // concurrent builds may race on a shared parent
        Err(ref e) if e.kind() == io::ErrorKind::AlreadyExists
                      && path.is_dir() => return Ok(()),
        Err(e) => return Err(e),
    }
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

/// Makes sure `dir` is a real directory, creating it if absent
pub fn safe_ensure_dir(dir: &Path) -> Result<(), String> {
    match fs::symlink_metadata(dir) {
        Ok(ref stat) if stat.file_type().is_symlink() => {
            return Err(format!("The `{}` dir can't be a symlink",
                               dir.display()));
        }
        Ok(ref stat) if stat.file_type().is_dir() => {
            // ok
        }
        Ok(_) => {
            return Err(format!("The `{}` must be a directory",
                               dir.display()));
        }
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
            create_dir(dir, true)
                .map_err(|e| format!("Can't create {:?}: {}", dir, e))?;
        }
        Err(ref e) => {
            return Err(format!("Can't stat `{}`: {}", dir.display(), e));
        }
    }
    return Ok(());
}

pub fn copy_stream(reader: &mut dyn Read, writer: &mut dyn Write)
    -> io::Result<u64>
{
    // Smaller buffer on the stack
    // Because rust musl has very small stack (80k)
    let mut buf = [0; 32768];
    let mut total = 0;
    loop {
        let len = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(len) => len,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..len])?;
        total += len as u64;
    }
    Ok(total)
}

/// Writes a file so that readers see either old or new contents
///
/// Data goes to a hidden temporary file in the same directory first and
/// is renamed over `path` afterwards.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), Error> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o644))?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
