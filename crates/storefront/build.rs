//! Build script for storefront crate.
//!
//! Generates content-based hashes for static assets (CSS and JS) to enable
//! immutable CDN caching.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    hash_asset("css", "main", "css", "CSS_HASH");
    hash_asset("js", "app", "js", "JS_HASH");
}

/// Hash `static/{dir}/{stem}.{ext}` and copy it to `static/{dir}/derived`
/// with the hash in its filename.
///
/// Sets `env_var` for use with `env!`.
fn hash_asset(dir: &str, stem: &str, ext: &str, env_var: &str) {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let asset_dir = Path::new(&manifest_dir).join("static").join(dir);
    let asset_path = asset_dir.join(format!("{stem}.{ext}"));

    println!("cargo:rerun-if-changed={}", asset_path.display());

    let content = match fs::read(&asset_path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {stem}.{ext}: {e}");
            println!("cargo:rustc-env={env_var}=");
            return;
        }
    };

    // First 8 chars of SHA256
    let mut hasher = Sha256::new();
    hasher.update(&content);
    let hash = format!("{:x}", hasher.finalize());
    let short_hash = &hash[..8];

    println!("cargo:rustc-env={env_var}={short_hash}");

    let derived_dir = asset_dir.join("derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived asset directory");

    let derived_path = derived_dir.join(format!("{stem}.{short_hash}.{ext}"));
    fs::copy(&asset_path, &derived_path).expect("Failed to copy asset to derived directory");
}
