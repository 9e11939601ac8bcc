use std::env::var;

use dotenvy::dotenv;

/// Settings the server falls back to when they are missing at runtime
const SETTINGS: [&str; 4] = ["BIND", "PORT", "HTTPMON_LOCATION", "HTTPMON_TIMEOUT_MS"];

fn main() {
    if let Ok(path) = dotenv() {
        println!("cargo:rerun-if-changed={}", path.display());
    }

    for name in SETTINGS {
        println!("cargo:rerun-if-env-changed={name}");
        if let Ok(value) = var(name) {
            println!("cargo:rustc-env={name}={value}");
        }
    }
}
