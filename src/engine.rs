use std::io::Read;
use std::sync::RwLock;

use crate::builder::{build_from_archive, clean_staging, validate_name};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::registry::Registry;
use crate::runtime::{ContainerInfo, Runtime};
use crate::storage::Storage;


/// Numbers of items removed by `Engine::clean`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanStats {
    pub containers: usize,
    pub staging: usize,
}

/// Builder, registry and runtime sharing a single storage directory
///
/// Safe to use from multiple threads, all methods take `&self`.
pub struct Engine {
    settings: Settings,
    storage: Storage,
    registry: Registry,
    runtime: Runtime,
    // builds share it, cleanup of staging directories takes it exclusively
    builds: RwLock<()>,
}

impl Engine {
    pub fn open(settings: &Settings) -> Result<Engine> {
        let storage = Storage::open(&settings.storage_dir)?;
        let registry = Registry::new(&storage);
        let runtime = Runtime::new(&storage, registry.clone());
        debug!("Engine opened at {:?}", storage.root());
        Ok(Engine {
            settings: settings.clone(),
            storage: storage,
            registry: registry,
            runtime: runtime,
            builds: RwLock::new(()),
        })
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Builds an image from an archive stream and registers it
    ///
    /// The name is checked before anything is read or written.
    pub fn build_image<R: Read>(&self, input: R, name: Option<&str>)
        -> Result<Image>
    {
        let name = match name {
            Some(name) if !name.is_empty() => name,
            _ => return Err(Error::MissingName),
        };
        validate_name(name)?;
        let _guard = self.builds.read().unwrap_or_else(|e| e.into_inner());
        let image = build_from_archive(input, name, &self.storage)?;
        if let Err(e) = self.registry.push(&image) {
            error!("Can't register image {}: {}", image.id, e);
            ::std::fs::remove_dir_all(&image.rootfs)
                .map_err(|e| warn!("Can't remove {:?}: {}", image.rootfs, e))
                .ok();
            return Err(e);
        }
        Ok(image)
    }

    pub fn list_images(&self) -> Result<Vec<Image>> {
        self.registry.list()
    }

    /// Deletes an image unless a container is running or starting from it
    pub fn remove_image(&self, id: &str) -> Result<Image> {
        let table = self.runtime.table();
        table.begin_remove(id)?;
        let result = self.registry.remove(id);
        table.end_remove(id);
        result
    }

    /// Starts a container, an empty command means the configured default
    pub fn run_container(&self, image: &str, command: Vec<String>)
        -> Result<String>
    {
        let command = if command.is_empty() {
            self.settings.default_command.clone()
        } else {
            command
        };
        self.runtime.run(image, &command)
    }

    pub fn list_containers(&self) -> Vec<ContainerInfo> {
        self.runtime.list()
    }

    pub fn kill_container(&self, id: &str) -> Result<()> {
        self.runtime.kill(id)
    }

    /// Blocks until the container is stopped and its entry removed
    pub fn wait_container(&self, id: &str) {
        self.runtime.wait(id)
    }

    /// Removes leftovers of crashed runs and interrupted builds
    pub fn clean(&self) -> Result<CleanStats> {
        let containers = self.runtime.clean_orphans()?;
        let staging = {
            let _guard = self.builds.write()
                .unwrap_or_else(|e| e.into_inner());
            clean_staging(&self.storage)?
        };
        let stats = CleanStats { containers: containers, staging: staging };
        info!("Cleanup done: {:?}", stats);
        Ok(stats)
    }
}


#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use crate::builder::test_util::{archive, Item};
    use crate::config::Settings;
    use crate::error::{Error, ErrorKind};
    use super::{Engine, CleanStats};

    fn engine() -> (TempDir, Engine) {
        let tmp = TempDir::new().unwrap();
        let engine = Engine::open(&Settings {
            storage_dir: tmp.path().to_path_buf(),
            .. Settings::default()
        }).unwrap();
        (tmp, engine)
    }

    #[test]
    fn build_requires_name() {
        let (_tmp, engine) = engine();
        let data = archive(&[Item::File("a", b"a", 0o644)]);
        for name in &[None, Some("")] {
            match engine.build_image(&data[..], *name) {
                Err(Error::MissingName) => {}
                other => panic!("unexpected result {:?}", other),
            }
        }
        assert!(engine.list_images().unwrap().is_empty());
        assert_eq!(
            fs::read_dir(engine.storage().images_dir()).unwrap().count(), 0);
    }

    #[test]
    fn build_registers_image() {
        let (_tmp, engine) = engine();
        let data = archive(&[Item::File("etc/motd", b"hi", 0o644)]);
        let img = engine.build_image(&data[..], Some("motd")).unwrap();
        assert_eq!(engine.list_images().unwrap(), vec![img.clone()]);
        assert_eq!(engine.remove_image(&img.id).unwrap(), img);
        assert!(engine.list_images().unwrap().is_empty());
    }

    #[test]
    fn remove_image_while_starting() {
        let (_tmp, engine) = engine();
        let data = archive(&[Item::File("etc/motd", b"hi", 0o644)]);
        let img = engine.build_image(&data[..], Some("motd")).unwrap();
        engine.runtime.table().reserve("0123456789abcdef", &img.id)
            .unwrap();
        match engine.remove_image(&img.id) {
            Err(Error::ImageInUse(ref id)) => assert_eq!(id, &img.id),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(img.rootfs.exists());
        assert_eq!(engine.list_images().unwrap(), vec![img.clone()]);
        engine.runtime.table().release("0123456789abcdef");
        assert_eq!(engine.remove_image(&img.id).unwrap(), img);
    }

    #[test]
    fn run_unknown_image() {
        let (_tmp, engine) = engine();
        let err = engine.run_container("nope", vec![]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(engine.list_containers().is_empty());
    }

    #[test]
    fn clean_empty_storage() {
        let (_tmp, engine) = engine();
        assert_eq!(engine.clean().unwrap(), CleanStats::default());
    }
}
