extern crate cbindgen;

use cbindgen::{Config, Language};
use std::env;
use std::path::PathBuf;

fn main() {
    let crate_dir = env::var("CARGO_MANIFEST_DIR").unwrap();

    let package_name = env::var("CARGO_PKG_NAME").unwrap();
    let output_file = PathBuf::from("")
        .join(format!("{}.h", package_name))
        .display()
        .to_string();

    let mut config = Config {
        include_guard: Some(String::from("TACTRIX_OPENPORT_J2534_H_")),
        language: Language::C,
        ..Default::default()
    };
    config.parse.parse_deps = false;

    cbindgen::generate_with_config(&crate_dir, config)
        .unwrap()
        .write_to_file(&output_file);
}
