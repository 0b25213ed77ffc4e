use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard};

use libc::pid_t;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use crate::error::{Error, Result};


/// A running container as tracked by the runtime
#[derive(Debug, Clone)]
pub struct Container {
    pub id: String,
    /// Id of the image providing the lower layer
    pub image: String,
    pub pid: pid_t,
    /// `containers/<id>`, holds the three directories below
    pub dir: PathBuf,
    pub rootfs: PathBuf,
    pub upperdir: PathBuf,
    pub workdir: PathBuf,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub pid: pid_t,
}

#[derive(Debug, Default)]
struct State {
    running: HashMap<String, Container>,
    /// Containers whose directories exist but which aren't running yet,
    /// mapped to their image ids
    starting: HashMap<String, String>,
    /// Images being deleted, no new container may use them
    removing: HashSet<String>,
}

impl State {
    fn uses_image(&self, image_id: &str) -> bool {
        self.running.values().any(|c| c.image == image_id) ||
            self.starting.values().any(|img| img == image_id)
    }
}

/// The process table: container id to live process
///
/// The lock covers only reads and writes of the table itself, it is never
/// held across mount, spawn or wait. An entry exists only while the
/// overlay of that container is mounted.
#[derive(Debug, Default)]
pub struct ContainerTable {
    state: Mutex<State>,
    removed: Condvar,
}

impl ContainerTable {
    pub fn new() -> ContainerTable {
        ContainerTable::default()
    }

    fn lock(&self) -> MutexGuard<State> {
        // table stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Marks `id` as being set up from image `image_id`
    ///
    /// Cleanup leaves the directories of a reserved container alone and the
    /// image can't be removed until the reservation is released or turned
    /// into a running entry. Fails if the image is being removed right now.
    pub fn reserve(&self, id: &str, image_id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.removing.contains(image_id) {
            return Err(Error::ImageNotFound(image_id.to_string()));
        }
        state.starting.insert(id.to_string(), image_id.to_string());
        Ok(())
    }

    /// Drops a reservation made by `reserve` when startup fails
    pub fn release(&self, id: &str) {
        self.lock().starting.remove(id);
    }

    pub fn insert(&self, container: Container) {
        let mut state = self.lock();
        state.starting.remove(&container.id);
        state.running.insert(container.id.clone(), container);
    }

    /// Removes the entry, returns `false` if it was already gone
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.lock().running.remove(id).is_some();
        if removed {
            self.removed.notify_all();
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().running.contains_key(id)
    }

    /// Whether `id` is running or still being started
    pub fn is_known(&self, id: &str) -> bool {
        let state = self.lock();
        state.running.contains_key(id) || state.starting.contains_key(id)
    }

    /// Whether a running or starting container is based on `image_id`
    pub fn uses_image(&self, image_id: &str) -> bool {
        self.lock().uses_image(image_id)
    }

    /// Blocks new containers of `image_id` until `end_remove`
    ///
    /// Fails with `ImageInUse` if any container uses the image already.
    pub fn begin_remove(&self, image_id: &str) -> Result<()> {
        let mut state = self.lock();
        if state.uses_image(image_id) {
            return Err(Error::ImageInUse(image_id.to_string()));
        }
        state.removing.insert(image_id.to_string());
        Ok(())
    }

    pub fn end_remove(&self, image_id: &str) {
        self.lock().removing.remove(image_id);
    }

    /// Snapshot of the running containers, sorted by id
    pub fn list(&self) -> Vec<ContainerInfo> {
        let mut result: Vec<_> = self.lock().running.values()
            .map(|c| ContainerInfo { id: c.id.clone(), pid: c.pid })
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        result
    }

    /// Sends SIGKILL and removes the entry right away
    ///
    /// Doesn't wait for the process to die: unmounting is left to the
    /// supervisor which finds the entry already gone. The signal is sent
    /// under the lock, and the supervisor removes the entry before reaping
    /// the process, so the pid can't belong to somebody else here.
    pub fn kill(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let pid = state.running.get(id).map(|c| c.pid)
            .ok_or_else(|| Error::ContainerNotFound(id.to_string()))?;
        kill(Pid::from_raw(pid), Signal::SIGKILL)
            .map_err(|e| Error::Signal(pid, e))?;
        state.running.remove(id);
        drop(state);
        self.removed.notify_all();
        info!("Killed container {} (pid {})", id, pid);
        Ok(())
    }

    /// Blocks until `id` is not in the table
    pub fn wait_removed(&self, id: &str) {
        let mut state = self.lock();
        while state.running.contains_key(id) {
            state = self.removed.wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}


#[cfg(test)]
mod test {
    use std::os::unix::process::ExitStatusExt;
    use std::path::PathBuf;
    use std::process::Command;
    use std::sync::Arc;
    use std::thread;

    use crate::error::ErrorKind;
    use super::{Container, ContainerInfo, ContainerTable};

    fn container(id: &str, pid: i32) -> Container {
        let dir = PathBuf::from("/nonexistent").join(id);
        Container {
            id: id.to_string(),
            image: "img".to_string(),
            pid: pid,
            rootfs: dir.join("rootfs"),
            upperdir: dir.join("upper"),
            workdir: dir.join("work"),
            dir: dir,
        }
    }

    #[test]
    fn insert_list_remove() {
        let table = ContainerTable::new();
        assert!(table.list().is_empty());
        table.insert(container("b", 20));
        table.insert(container("a", 10));
        assert_eq!(table.list(), vec![
            ContainerInfo { id: "a".into(), pid: 10 },
            ContainerInfo { id: "b".into(), pid: 20 },
        ]);
        assert!(table.uses_image("img"));
        assert!(table.remove("a"));
        // second removal is a normal outcome
        assert!(!table.remove("a"));
        assert_eq!(table.list().len(), 1);
    }

    #[test]
    fn reservations() {
        let table = ContainerTable::new();
        table.reserve("x", "img").unwrap();
        assert!(table.is_known("x"));
        assert!(!table.contains("x"));
        assert!(table.list().is_empty());
        table.insert(container("x", 1));
        assert!(table.contains("x"));
        table.remove("x");
        assert!(!table.is_known("x"));
        table.reserve("y", "img").unwrap();
        table.release("y");
        assert!(!table.is_known("y"));
    }

    #[test]
    fn starting_container_holds_image() {
        let table = ContainerTable::new();
        table.reserve("x", "img").unwrap();
        assert!(table.uses_image("img"));
        assert!(!table.uses_image("other"));
        assert_eq!(table.begin_remove("img").unwrap_err().kind(),
                   ErrorKind::Validation);
        table.release("x");
        assert!(!table.uses_image("img"));

        table.begin_remove("img").unwrap();
        assert_eq!(table.reserve("y", "img").unwrap_err().kind(),
                   ErrorKind::NotFound);
        assert!(!table.is_known("y"));
        table.reserve("z", "other").unwrap();
        table.end_remove("img");
        table.reserve("y", "img").unwrap();
        assert!(table.is_known("y"));
    }

    #[test]
    fn kill_removes_immediately() {
        let mut child = Command::new("sleep").arg("60").spawn().unwrap();
        let table = ContainerTable::new();
        table.insert(container("victim", child.id() as i32));
        table.kill("victim").unwrap();
        assert!(table.list().is_empty());
        let err = table.kill("victim").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(9));
    }

    #[test]
    fn kill_unknown() {
        let table = ContainerTable::new();
        assert_eq!(table.kill("nope").unwrap_err().kind(),
                   ErrorKind::NotFound);
    }

    #[test]
    fn wait_for_removal() {
        let table = Arc::new(ContainerTable::new());
        table.insert(container("w", 1));
        let remover = {
            let table = table.clone();
            thread::spawn(move || {
                thread::sleep(::std::time::Duration::from_millis(50));
                table.remove("w");
            })
        };
        table.wait_removed("w");
        assert!(!table.contains("w"));
        remover.join().unwrap();
        // returns at once for unknown ids
        table.wait_removed("never");
    }
}
