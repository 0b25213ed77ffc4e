extern crate argparse;
extern crate env_logger;
extern crate humantime;
extern crate minidock;
extern crate serde_json;
extern crate tempfile;
#[macro_use] extern crate log;

use std::fs::File;
use std::io::{stdout, stderr, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::process::exit;
use std::time::{Duration, UNIX_EPOCH};

use argparse::{ArgumentParser, Store, StoreTrue, List, ParseOption};

use minidock::config::read_settings;
use minidock::pack::{pack_dir, compression_type};
use minidock::{Engine, Error, ErrorKind};


fn exit_code(err: &Error) -> i32 {
    match err.kind() {
        ErrorKind::Validation => 2,
        ErrorKind::NotFound => 3,
        ErrorKind::System => 1,
    }
}

fn parse(ap: ArgumentParser, args: Vec<String>) -> Option<i32> {
    match ap.parse(args, &mut stdout(), &mut stderr()) {
        Ok(()) => None,
        Err(0) => Some(0),
        Err(_) => Some(122),
    }
}

fn build_cmd(engine: &Engine, args: Vec<String>) -> Result<i32, Error> {
    let mut name = String::new();
    let mut path = String::new();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Builds an image from a directory or archive");
        ap.refer(&mut name)
            .add_option(&["-n", "--name"], Store, "Name of the image");
        ap.refer(&mut path)
            .add_argument("path", Store,
                "Directory to pack, or a tar archive (optionally compressed)")
            .required();
        if let Some(code) = parse(ap, args) {
            return Ok(code);
        }
    }
    let name = if name.is_empty() { None } else { Some(&name[..]) };
    let path = PathBuf::from(path);
    let image = if path.is_dir() {
        if name.is_none() {
            return Err(Error::MissingName);
        }
        let mut tmp = tempfile::tempfile()
            .map_err(|e| Error::Write(PathBuf::from("<tempfile>"), e))?;
        pack_dir(&path, &mut tmp, None)?;
        tmp.seek(SeekFrom::Start(0)).map_err(Error::Archive)?;
        engine.build_image(tmp, name)?
    } else {
        let file = File::open(&path).map_err(|e| Error::Read(path, e))?;
        engine.build_image(file, name)?
    };
    println!("{}", image.id);
    Ok(0)
}

fn images_cmd(engine: &Engine, args: Vec<String>) -> Result<i32, Error> {
    let mut json = false;
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Lists registered images");
        ap.refer(&mut json)
            .add_option(&["--json"], StoreTrue, "Print records as json");
        if let Some(code) = parse(ap, args) {
            return Ok(code);
        }
    }
    let images = engine.list_images()?;
    let mut out = stdout();
    if json {
        serde_json::to_writer_pretty(&mut out, &images)
            .map_err(|e| Error::Serialize(PathBuf::from("<stdout>"), e))?;
        writeln!(out).ok();
        return Ok(0);
    }
    for img in images {
        let created = UNIX_EPOCH + Duration::from_secs(img.created);
        writeln!(out, "{}  {:<20}  {}  {}", img.id, img.name,
            humantime::format_rfc3339_seconds(created),
            img.rootfs.display()).ok();
    }
    Ok(0)
}

fn run_cmd(engine: &Engine, args: Vec<String>) -> Result<i32, Error> {
    let mut image = String::new();
    let mut command = Vec::<String>::new();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Runs a command in a new container \
            and waits for it to finish");
        ap.refer(&mut image)
            .add_argument("image", Store, "Name of the image").required();
        ap.refer(&mut command)
            .add_argument("command", List,
                "Command and arguments, the configured default if empty");
        ap.stop_on_first_argument(true);
        if let Some(code) = parse(ap, args) {
            return Ok(code);
        }
    }
    let id = engine.run_container(&image, command)?;
    writeln!(&mut stderr(), "Container {} started", id).ok();
    engine.wait_container(&id);
    Ok(0)
}

fn rm_image_cmd(engine: &Engine, args: Vec<String>) -> Result<i32, Error> {
    let mut id = String::new();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Removes an image with its files");
        ap.refer(&mut id)
            .add_argument("id", Store, "Id of the image").required();
        if let Some(code) = parse(ap, args) {
            return Ok(code);
        }
    }
    let image = engine.remove_image(&id)?;
    println!("{}", image.id);
    Ok(0)
}

fn clean_cmd(engine: &Engine, args: Vec<String>) -> Result<i32, Error> {
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Removes leftovers of crashed containers \
            and interrupted builds. Don't run while other instances work \
            on the same storage.");
        if let Some(code) = parse(ap, args) {
            return Ok(code);
        }
    }
    let stats = engine.clean()?;
    println!("Removed {} container(s), {} unfinished build(s)",
        stats.containers, stats.staging);
    Ok(0)
}

fn pack_cmd(args: Vec<String>) -> Result<i32, Error> {
    let mut dir = String::new();
    let mut file: Option<PathBuf> = None;
    let mut compression = None;
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("Packs a directory into an archive for `build`");
        ap.refer(&mut dir)
            .add_argument("dir", Store, "Directory to pack").required();
        ap.refer(&mut file)
            .add_option(&["-f", "--file"], ParseOption,
                "File to store tar archive at").required();
        compression_type(&mut ap, &mut compression);
        if let Some(code) = parse(ap, args) {
            return Ok(code);
        }
    }
    let path = match file {
        Some(path) => path,
        None => return Ok(122),
    };
    let out = File::create(&path)
        .map_err(|e| Error::Write(path.clone(), e))?;
    pack_dir(Path::new(&dir), out, compression)?;
    Ok(0)
}

pub fn run() -> i32 {
    let mut settings_file: Option<PathBuf> = None;
    let mut cmd = String::new();
    let mut args = Vec::<String>::new();
    {
        let mut ap = ArgumentParser::new();
        ap.set_description("
            Builds images from archives and runs them in containers.
            Commands: build, images, run, rm-image, clean, pack
            ");
        ap.refer(&mut settings_file)
            .add_option(&["--settings"], ParseOption,
                "Settings file, /etc/minidock.yaml by default");
        ap.refer(&mut cmd)
            .add_argument("command", Store, "Command to run")
            .required();
        ap.refer(&mut args)
            .add_argument("args", List, "Arguments for the command");
        ap.stop_on_first_argument(true);
        match ap.parse_args() {
            Ok(()) => {}
            Err(0) => return 0,
            Err(_) => return 122,
        }
    }
    args.insert(0, format!("minidock {}", cmd));
    if cmd == "pack" {
        return pack_cmd(args).unwrap_or_else(|e| {
            error!("{}", e);
            exit_code(&e)
        });
    }

    let settings_file = settings_file.as_ref().map(|p| p.as_path());
    let settings = match read_settings(settings_file) {
        Ok(settings) => settings,
        Err(e) => {
            error!("{}", e);
            return exit_code(&e);
        }
    };
    let engine = match Engine::open(&settings) {
        Ok(engine) => engine,
        Err(e) => {
            error!("{}", e);
            return exit_code(&e);
        }
    };
    let result = match &cmd[..] {
        "build" => build_cmd(&engine, args),
        "images" => images_cmd(&engine, args),
        "run" => run_cmd(&engine, args),
        "rm-image" => rm_image_cmd(&engine, args),
        "clean" => clean_cmd(&engine, args),
        _ => {
            writeln!(&mut stderr(), "Unknown command {:?}", cmd).ok();
            return 127;
        }
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            exit_code(&e)
        }
    }
}

fn main() {
    env_logger::init();
    exit(run());
}
