use std::fs::remove_dir_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use nix::sys::signal::{kill, Signal};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use scan_dir::ScanDir;
use unshare::{Child, Command, Namespace};

use crate::error::{Error, Result};
use crate::file_util::create_dir;
use crate::ids::{new_id, is_valid_id};
use crate::process_util::{path_find_in, DEFAULT_PATH};
use crate::registry::Registry;
use crate::storage::Storage;

mod mount;
mod supervise;
mod table;

pub use self::mount::{mount_overlay, unmount};
pub use self::table::{Container, ContainerInfo, ContainerTable};
use self::supervise::{supervise, teardown};


/// Command used when a container is started without one
pub static DEFAULT_COMMAND: &'static str = "/bin/sh";


/// Starts and tracks containers
///
/// Every container gets a private overlay on top of its image and fresh
/// UTS, PID, mount and network namespaces. All state is in memory: a
/// restarted runtime knows of no containers, see `clean_orphans`.
pub struct Runtime {
    storage: Storage,
    registry: Registry,
    table: Arc<ContainerTable>,
}

impl Runtime {
    pub fn new(storage: &Storage, registry: Registry) -> Runtime {
        Runtime::with_table(storage, registry, Arc::new(ContainerTable::new()))
    }

    pub fn with_table(storage: &Storage, registry: Registry,
                      table: Arc<ContainerTable>)
        -> Runtime
    {
        Runtime {
            storage: storage.clone(),
            registry: registry,
            table: table,
        }
    }

    pub fn table(&self) -> &Arc<ContainerTable> {
        &self.table
    }

    /// Starts `command` in a new container of the image named `image_name`
    ///
    /// Returns as soon as the process is spawned. Nothing is created on
    /// disk when the image is unknown.
    pub fn run(&self, image_name: &str, command: &[String]) -> Result<String>
    {
        let image = self.registry.get_by_name(image_name)?;
        let id = new_id();
        let dir = self.storage.container_dir(&id);
        let mut container = Container {
            id: id.clone(),
            image: image.id.clone(),
            pid: 0,
            rootfs: dir.join("rootfs"),
            upperdir: dir.join("upper"),
            workdir: dir.join("work"),
            dir: dir,
        };
        self.table.reserve(&id, &image.id)?;
        let child = match self.start(&image.rootfs, &container, command) {
            Ok(child) => child,
            Err(e) => {
                self.table.release(&id);
                return Err(e);
            }
        };
        container.pid = child.pid();
        self.table.insert(container.clone());
        info!("Container {} of image {:?} started, pid {}",
            id, image.name, container.pid);

        let table = self.table.clone();
        let failed = container.clone();
        let res = thread::Builder::new()
            .name(format!("supervise-{}", id))
            .spawn(move || supervise(child, container, table));
        if let Err(e) = res {
            // child is dropped with the closure, it's still ours to reap
            let pid = Pid::from_raw(failed.pid);
            kill(pid, Signal::SIGKILL).map_err(|e| {
                error!("Can't kill container {}: {}", failed.id, e)
            }).ok();
            waitpid(pid, None).map_err(|e| {
                error!("Can't reap container {}: {}", failed.id, e)
            }).ok();
            self.table.remove(&failed.id);
            teardown(&failed);
            return Err(Error::Supervisor(failed.id, e));
        }
        Ok(id)
    }

    fn start(&self, lower: &Path, container: &Container,
             command: &[String])
        -> Result<Child>
    {
        for dir in &[&container.upperdir, &container.workdir,
                     &container.rootfs]
        {
            if let Err(e) = create_dir(dir, true) {
                remove_dir_all(&container.dir).ok();
                return Err(Error::CreateDir(dir.to_path_buf(), e));
            }
        }
        if let Err(e) = mount_overlay(lower, &container.upperdir,
                                      &container.workdir, &container.rootfs)
        {
            remove_dir_all(&container.dir).ok();
            return Err(e);
        }
        match self.spawn(container, command) {
            Ok(child) => Ok(child),
            Err(e) => {
                teardown(container);
                Err(e)
            }
        }
    }

    fn spawn(&self, container: &Container, command: &[String])
        -> Result<Child>
    {
        let (program, args) = match command.split_first() {
            Some((program, args)) => (&program[..], args),
            None => (DEFAULT_COMMAND, &[][..]),
        };
        let exe = path_find_in(&container.rootfs, program, DEFAULT_PATH)
            .ok_or_else(|| Error::CommandNotFound(PathBuf::from(program)))?;
        let mut cmd = Command::new(&exe);
        cmd.args(args);
        cmd.unshare([Namespace::Uts, Namespace::Pid,
                     Namespace::Mount, Namespace::Net].iter());
        cmd.chroot_dir(&container.rootfs);
        cmd.current_dir("/");
        cmd.env_clear();
        cmd.env("PATH", DEFAULT_PATH);
        cmd.env("HOME", "/");
        if let Ok(term) = ::std::env::var("TERM") {
            cmd.env("TERM", term);
        }
        debug!("Container {} command {:?}", container.id, cmd);
        cmd.spawn().map_err(|e| Error::Spawn(program.to_string(), e))
    }

    pub fn list(&self) -> Vec<ContainerInfo> {
        self.table.list()
    }

    pub fn kill(&self, id: &str) -> Result<()> {
        self.table.kill(id)
    }

    /// Blocks until container `id` is gone
    pub fn wait(&self, id: &str) {
        self.table.wait_removed(id)
    }

    /// Removes container directories left by a previous run
    ///
    /// Anything under `containers/` that this runtime doesn't know of is
    /// considered orphaned: its overlay is detached if still mounted and
    /// the directory is deleted. Returns the number of removed containers.
    pub fn clean_orphans(&self) -> Result<usize> {
        let base = self.storage.containers_dir();
        let dirs: Vec<(PathBuf, String)> = ScanDir::dirs()
            .skip_hidden(false)
            .read(&base, |iter| {
                iter.map(|(entry, name)| (entry.path(), name)).collect()
            })?;
        let mut removed = 0;
        for (path, name) in dirs {
            if is_valid_id(&name) && self.table.is_known(&name) {
                continue;
            }
            match unmount(&path.join("rootfs")) {
                Ok(true) => info!("Detached stale overlay of {:?}", path),
                Ok(false) => {}
                Err(e) => {
                    error!("{}, keeping {:?}", e, path);
                    continue;
                }
            }
            remove_dir_all(&path)
                .map_err(|e| Error::Remove(path.clone(), e))?;
            info!("Removed orphaned container {:?}", name);
            removed += 1;
        }
        Ok(removed)
    }
}
