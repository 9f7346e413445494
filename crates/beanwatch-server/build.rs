//! Stamps the build time into `BEANWATCH_BUILT_MICROS` for the status bean.

use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let micros = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros())
        .unwrap_or(0);
    println!("cargo:rustc-env=BEANWATCH_BUILT_MICROS={}", micros);
    println!("cargo:rerun-if-changed=build.rs");
}
