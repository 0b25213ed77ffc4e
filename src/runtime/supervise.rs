use std::fs::remove_dir_all;
use std::sync::Arc;

use unshare::Child;

use crate::process_util::{convert_status, wait_exited};
use super::mount::unmount;
use super::table::{Container, ContainerTable};


fn reap(child: &mut Child, id: &str) {
    match child.wait() {
        Ok(status) => {
            info!("Container {} exited with code {}",
                id, convert_status(status));
        }
        Err(e) => warn!("Can't reap container {}: {}", id, e),
    }
}

/// Drops mount and directories of a container which is not running
///
/// The directories are kept when the overlay can't be detached, the
/// kernel may still be writing into them.
pub fn teardown(container: &Container) {
    match unmount(&container.rootfs) {
        Ok(_) => {
            remove_dir_all(&container.dir)
                .map_err(|e| warn!("Can't remove {:?}: {}",
                                   container.dir, e))
                .ok();
        }
        Err(e) => {
            error!("{}, keeping {:?}", e, container.dir);
        }
    }
}

/// Body of the thread watching a single container
///
/// Order matters here: the process is only reaped after its table entry
/// is gone, so a concurrent `kill` never signals a reused pid.
pub fn supervise(mut child: Child, container: Container,
                 table: Arc<ContainerTable>)
{
    let id = &container.id;
    let reaped = match wait_exited(child.pid()) {
        Ok(()) => false,
        Err(e) => {
            warn!("Can't watch container {}: {}, reaping instead", id, e);
            reap(&mut child, id);
            true
        }
    };
    let unmounted = match unmount(&container.rootfs) {
        Ok(_) => true,
        Err(e) => {
            error!("{}, keeping {:?}", e, container.dir);
            false
        }
    };
    if !table.remove(id) {
        debug!("Container {} was killed", id);
    }
    if !reaped {
        reap(&mut child, id);
    }
    if unmounted {
        remove_dir_all(&container.dir)
            .map_err(|e| warn!("Can't remove {:?}: {}", container.dir, e))
            .ok();
    }
}
