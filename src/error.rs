use std::io;
use std::path::PathBuf;


/// Coarse classification of an `Error`
///
/// Lets a caller decide whether to correct its input, give up on a
/// missing object or retry an operation that failed in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    System,
}

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// Image name was not supplied for a build
        MissingName {
            display("image name is required")
        }
        InvalidName(name: String) {
            display("invalid image name {:?}", name)
        }
        /// Image can't be removed while containers run on top of it
        ImageInUse(id: String) {
            display("image {} is used by a running container", id)
        }
        ImageNotFound(name: String) {
            display("image {:?} not found", name)
        }
        ContainerNotFound(id: String) {
            display("container {:?} not found", id)
        }
        CreateDir(path: PathBuf, err: io::Error) {
            display("can't create directory {:?}: {}", path, err)
        }
        /// Can't read file or directory
        Read(path: PathBuf, err: io::Error) {
            display("can't read {:?}: {}", path, err)
        }
        /// Can't write file
        Write(path: PathBuf, err: io::Error) {
            display("can't write {:?}: {}", path, err)
        }
        Remove(path: PathBuf, err: io::Error) {
            display("can't remove {:?}: {}", path, err)
        }
        Rename(src: PathBuf, dest: PathBuf, err: io::Error) {
            display("can't rename {:?} -> {:?}: {}", src, dest, err)
        }
        /// Error reading the archive stream itself
        Archive(err: io::Error) {
            display("error reading archive: {}", err)
        }
        /// Archive entry would escape the image root
        UnsafePath(path: PathBuf) {
            display("archive entry {:?} points outside of the image", path)
        }
        Serialize(path: PathBuf, err: serde_json::Error) {
            display("can't serialize {:?}: {}", path, err)
        }
        ScanDir(err: scan_dir::Error) {
            from()
            display("error reading directory: {}", err)
        }
        Mount(err: libmount::Error) {
            from()
            display("{}", err)
        }
        Unmount(path: PathBuf, err: nix::Error) {
            display("can't unmount {:?}: {}", path, err)
        }
        /// Command is not present in the image root
        CommandNotFound(name: PathBuf) {
            display("command {:?} not found in the image", name)
        }
        Spawn(cmd: String, err: unshare::Error) {
            display("error running {:?}: {}", cmd, err)
        }
        Signal(pid: i32, err: nix::Error) {
            display("can't kill process {}: {}", pid, err)
        }
        Supervisor(id: String, err: io::Error) {
            display("can't start supervisor for container {}: {}", id, err)
        }
        Config(message: String) {
            display("{}", message)
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use self::Error::*;
        match *self {
            MissingName | InvalidName(..) | ImageInUse(..) => {
                ErrorKind::Validation
            }
            ImageNotFound(..) | ContainerNotFound(..) => ErrorKind::NotFound,
            _ => ErrorKind::System,
        }
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;


#[cfg(test)]
mod test {
    use std::io;
    use std::path::PathBuf;
    use super::{Error, ErrorKind};

    #[test]
    fn kinds() {
        assert_eq!(Error::MissingName.kind(), ErrorKind::Validation);
        assert_eq!(Error::ImageNotFound("x".into()).kind(),
                   ErrorKind::NotFound);
        assert_eq!(Error::ContainerNotFound("x".into()).kind(),
                   ErrorKind::NotFound);
        assert_eq!(Error::Read(PathBuf::from("/x"),
                        io::Error::new(io::ErrorKind::Other, "boom")).kind(),
                   ErrorKind::System);
    }

    #[test]
    fn display() {
        assert_eq!(Error::ImageNotFound("web".into()).to_string(),
                   "image \"web\" not found");
        assert_eq!(Error::MissingName.to_string(), "image name is required");
    }
}
