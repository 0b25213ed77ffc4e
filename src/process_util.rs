use std::io;
use std::mem;
use std::path::{Path, PathBuf};

use libc::{self, pid_t};
use unshare::ExitStatus;


pub static DEFAULT_PATH: &'static str =
    "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";


pub fn convert_status(st: ExitStatus) -> i32 {
    match (st.code(), st.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 255,
    }
}

/// Looks a command up in `path` inside of the directory `root`
///
/// The returned path is the one the command has after changing root to
/// `root`. Names containing a slash are returned unchanged.
pub fn path_find_in<P: AsRef<Path>>(root: &Path, cmd: P, path: &str)
    -> Option<PathBuf>
{
    let cmd = cmd.as_ref();
    trace!("Path search {:?} in {:?} under {:?}", cmd, path, root);
    if cmd.components().count() != 1 || cmd.is_absolute() {
        return Some(cmd.to_path_buf())
    }
    for prefix in path.split(":") {
        let inner = PathBuf::from(prefix).join(cmd);
        let outer = match inner.strip_prefix("/") {
            Ok(rel) => root.join(rel),
            Err(_) => continue,
        };
        // lstat: absolute symlinks point into the image, not the host
        if outer.symlink_metadata().is_ok() {
            trace!("Path resolved {:?} is {:?}", cmd, inner);
            return Some(inner);
        }
    }
    None
}

/// Blocks until the process exits, leaving it unreaped
///
/// The pid stays allocated (as a zombie) until someone calls `wait` on
/// it, so it can still be signalled safely in the meantime.
pub fn wait_exited(pid: pid_t) -> io::Result<()> {
    loop {
        let mut info: libc::siginfo_t = unsafe { mem::zeroed() };
        let rc = unsafe {
            libc::waitid(libc::P_PID, pid as libc::id_t, &mut info,
                         libc::WEXITED | libc::WNOWAIT)
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}
