extern crate libc;
extern crate nix;
extern crate rand;
extern crate argparse;
extern crate unshare;
extern crate libmount;
extern crate tar;
extern crate flate2;
extern crate xz2;
extern crate bzip2;
extern crate quire;
extern crate scan_dir;
extern crate tempfile;
extern crate serde;
extern crate serde_json;
#[macro_use] extern crate log;
#[macro_use] extern crate quick_error;
#[macro_use] extern crate serde_derive;

pub mod error;
pub mod config;
pub mod storage;
pub mod ids;
pub mod file_util;
pub mod process_util;
pub mod image;
pub mod builder;
pub mod registry;
pub mod runtime;
pub mod engine;
pub mod pack;

pub use error::{Error, ErrorKind, Result};
pub use config::Settings;
pub use storage::Storage;
pub use image::Image;
pub use registry::Registry;
pub use runtime::{Runtime, ContainerTable, ContainerInfo};
pub use engine::{Engine, CleanStats};
