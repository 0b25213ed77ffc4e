extern crate minidock;
extern crate tar;
extern crate tempfile;

use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use tar::{Builder, Header, EntryType};
use tempfile::TempDir;

use minidock::pack::pack_dir;
use minidock::{Engine, Error, ErrorKind, Settings};


fn open(dir: &Path) -> Engine {
    Engine::open(&Settings {
        storage_dir: dir.to_path_buf(),
        .. Settings::default()
    }).unwrap()
}

fn file_archive(path: &str, data: &[u8]) -> Vec<u8> {
    let mut builder = Builder::new(Vec::new());
    let mut header = Header::new_gnu();
    header.set_path(path).unwrap();
    header.set_entry_type(EntryType::Regular);
    header.set_mode(0o644);
    header.set_size(data.len() as u64);
    header.set_cksum();
    builder.append(&header, data).unwrap();
    builder.into_inner().unwrap()
}

#[test]
fn directory_round_trip() {
    let src = TempDir::new().unwrap();
    fs::create_dir_all(src.path().join("usr/share/doc")).unwrap();
    fs::write(src.path().join("usr/share/doc/README"), b"read me").unwrap();
    fs::create_dir(src.path().join("empty")).unwrap();
    symlink("usr/share", src.path().join("share")).unwrap();

    let store = TempDir::new().unwrap();
    let engine = open(store.path());
    let mut buf = Vec::new();
    pack_dir(src.path(), &mut buf, None).unwrap();
    let img = engine.build_image(&buf[..], Some("docs")).unwrap();

    assert_eq!(fs::read(img.rootfs.join("usr/share/doc/README")).unwrap(),
               b"read me");
    assert!(img.rootfs.join("empty").is_dir());
    assert_eq!(fs::read_link(img.rootfs.join("share")).unwrap(),
               Path::new("usr/share"));
}

#[test]
fn images_survive_reopen() {
    let store = TempDir::new().unwrap();
    let built = {
        let engine = open(store.path());
        engine.build_image(&file_archive("etc/os", b"x")[..], Some("base"))
            .unwrap()
    };
    let engine = open(store.path());
    let images = engine.list_images().unwrap();
    assert_eq!(images, vec![built.clone()]);
    assert!(images[0].rootfs.join("etc/os").exists());
}

#[test]
fn same_name_twice() {
    let store = TempDir::new().unwrap();
    let engine = open(store.path());
    let one = engine.build_image(&file_archive("v", b"1")[..], Some("app"))
        .unwrap();
    let two = engine.build_image(&file_archive("v", b"2")[..], Some("app"))
        .unwrap();
    assert!(one.id != two.id);
    assert_eq!(fs::read(one.rootfs.join("v")).unwrap(), b"1");
    assert_eq!(fs::read(two.rootfs.join("v")).unwrap(), b"2");
    assert_eq!(engine.list_images().unwrap().len(), 2);
}

#[test]
fn missing_name_has_no_side_effects() {
    let store = TempDir::new().unwrap();
    let engine = open(store.path());
    let err = engine.build_image(&file_archive("a", b"a")[..], None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(fs::read_dir(store.path().join("images")).unwrap().count(), 0);
    assert_eq!(
        fs::read_dir(store.path().join("images_meta")).unwrap().count(), 0);
}

#[test]
fn unknown_image_and_container() {
    let store = TempDir::new().unwrap();
    let engine = open(store.path());
    match engine.run_container("does-not-exist", vec!["/bin/true".into()]) {
        Err(Error::ImageNotFound(..)) => {}
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(
        fs::read_dir(store.path().join("containers")).unwrap().count(), 0);
    assert_eq!(engine.kill_container("0123456789abcdef").unwrap_err().kind(),
               ErrorKind::NotFound);
    assert!(engine.list_containers().is_empty());
}

#[test]
fn clean_after_crash() {
    let store = TempDir::new().unwrap();
    let engine = open(store.path());
    fs::create_dir_all(store.path().join("containers/abcdabcdabcdabcd/upper"))
        .unwrap();
    fs::create_dir_all(store.path().join("images/.tmp-xyz/bin")).unwrap();
    let stats = engine.clean().unwrap();
    assert_eq!(stats.containers, 1);
    assert_eq!(stats.staging, 1);
    assert_eq!(
        fs::read_dir(store.path().join("containers")).unwrap().count(), 0);
    assert_eq!(fs::read_dir(store.path().join("images")).unwrap().count(), 0);
}
