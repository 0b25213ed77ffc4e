use std::io::Write;
use std::path::Path;

use argparse::{ArgumentParser, StoreConst};
use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use tar::Builder;
use xz2::write::XzEncoder;

use crate::error::{Error, Result};


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionType {
    Gzip,
    Bzip2,
    Xz,
}

pub fn compression_type<'x>(ap: &mut ArgumentParser<'x>,
    compression_type: &'x mut Option<CompressionType>)
{
    ap.refer(compression_type)
    .add_option(&["-z", "--gzip"], StoreConst(Some(CompressionType::Gzip)),
        "Filter the archive through gzip.")
    .add_option(&["-j", "--bzip2"], StoreConst(Some(CompressionType::Bzip2)),
        "Filter the archive through bzip2.")
    .add_option(&["-J", "--xz"], StoreConst(Some(CompressionType::Xz)),
        "Filter the archive through xz.");
}

fn write_tar<W: Write>(dir: &Path, writer: W) -> Result<W> {
    let mut builder = Builder::new(writer);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", dir)
        .map_err(|e| Error::Read(dir.to_path_buf(), e))?;
    builder.into_inner().map_err(Error::Archive)
}

/// Writes a tar of the contents of `dir` to `writer`
///
/// Paths in the archive are relative to `dir`, so the result can be fed
/// to the builder as is.
pub fn pack_dir<W: Write>(dir: &Path, writer: W,
                          compression: Option<CompressionType>)
    -> Result<()>
{
    debug!("Packing {:?} with {:?}", dir, compression);
    match compression {
        None => {
            let mut out = write_tar(dir, writer)?;
            out.flush().map_err(Error::Archive)?;
        }
        Some(CompressionType::Gzip) => {
            let enc = GzEncoder::new(writer, flate2::Compression::default());
            write_tar(dir, enc)?.finish().map_err(Error::Archive)?;
        }
        Some(CompressionType::Bzip2) => {
            let enc = BzEncoder::new(writer, bzip2::Compression::Default);
            write_tar(dir, enc)?.finish().map_err(Error::Archive)?;
        }
        Some(CompressionType::Xz) => {
            let enc = XzEncoder::new(writer, 6);
            write_tar(dir, enc)?.finish().map_err(Error::Archive)?;
        }
    }
    Ok(())
}


#[cfg(test)]
mod test {
    use std::fs;
    use std::os::unix::fs::symlink;

    use tempfile::TempDir;

    use crate::builder::build_from_archive;
    use crate::storage::Storage;
    use super::{pack_dir, CompressionType};

    fn sample_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("etc/conf.d")).unwrap();
        fs::write(tmp.path().join("etc/conf.d/app"), b"key=value\n").unwrap();
        symlink("conf.d/app", tmp.path().join("etc/app.conf")).unwrap();
        tmp
    }

    #[test]
    fn packed_dir_builds_same_tree() {
        let src = sample_dir();
        let store = TempDir::new().unwrap();
        let storage = Storage::open(store.path()).unwrap();
        for compression in &[None, Some(CompressionType::Gzip),
                             Some(CompressionType::Bzip2),
                             Some(CompressionType::Xz)]
        {
            let mut buf = Vec::new();
            pack_dir(src.path(), &mut buf, *compression).unwrap();
            let img = build_from_archive(&buf[..], "packed", &storage)
                .unwrap();
            assert_eq!(fs::read(img.rootfs.join("etc/conf.d/app")).unwrap(),
                       b"key=value\n");
            let link = fs::read_link(img.rootfs.join("etc/app.conf"))
                .unwrap();
            assert_eq!(link.to_str(), Some("conf.d/app"));
        }
    }
}
