// Stamps the asset version into the crate and mirrors static/ into dist/.
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::{fs, io, path::Path};

use fs_extra::dir::{copy, CopyOptions};

fn hash_dir(dir: &Path, hasher: &mut DefaultHasher) -> io::Result<()> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let path = entry.path();
        // Generated bundle; hashing it would change the version on every build.
        if path.ends_with("pkg") {
            continue;
        }
        entry.file_name().hash(hasher);
        if path.is_dir() {
            hash_dir(&path, hasher)?;
        } else {
            fs::read(&path)?.hash(hasher);
        }
    }
    Ok(())
}

fn main() {
    println!("cargo:rerun-if-changed=static");
    println!("cargo:rerun-if-env-changed=ASSET_VERSION");

    let static_dir = Path::new("static");

    // An explicit version wins, e.g. a release tag from CI.
    let version = match std::env::var("ASSET_VERSION") {
        Ok(v) if !v.is_empty() => v,
        _ => {
            let mut hasher = DefaultHasher::new();
            if static_dir.exists() {
                if let Err(err) = hash_dir(static_dir, &mut hasher) {
                    println!("cargo:warning=could not hash static/: {}", err);
                }
            }
            format!("{:016x}", hasher.finish())[..8].to_string()
        }
    };
    println!("cargo:rustc-env=ASSET_VERSION={}", version);

    // Copy static/ to dist/
    let out_dir = Path::new("dist");
    if out_dir.exists() {
        fs::remove_dir_all(out_dir).ok();
    }
    fs::create_dir_all(out_dir).ok();

    if static_dir.exists() {
        let mut options = CopyOptions::new();
        options.content_only = true;
        options.overwrite = true;
        if let Err(err) = copy(static_dir, out_dir, &options) {
            println!("cargo:warning=copying static/ to dist/ failed: {}", err);
        }
    }
}
