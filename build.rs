use std::{env, fs, path::Path};

/// Emits `pkg_info.rs` with package and binary metadata read from Cargo.toml.
fn main() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR not set");
    let manifest = Path::new(&manifest_dir).join("Cargo.toml");
    println!("cargo:rerun-if-changed={}", manifest.display());

    let raw = fs::read_to_string(&manifest)
        .unwrap_or_else(|e| panic!("Failed to read Cargo.toml: {e}"));
    let parsed: toml::Table =
        toml::from_str(&raw).unwrap_or_else(|e| panic!("Failed to parse Cargo.toml: {e}"));

    let package = parsed
        .get("package")
        .and_then(toml::Value::as_table)
        .expect("Cargo.toml missing [package]");
    let field = |key: &str, fallback: &'static str| -> String {
        package
            .get(key)
            .and_then(toml::Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };
    let name = field("name", "syncverse-roadmap");
    let version = field("version", "0.0.0");
    let description = field("description", "");

    // First [[bin]] target, or the package name when there is none.
    let bin_name = parsed
        .get("bin")
        .and_then(toml::Value::as_array)
        .and_then(|bins| bins.first())
        .and_then(|bin| bin.get("name"))
        .and_then(toml::Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());

    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let contents = format!(
        "pub const PKG_NAME: &str = {name:?};\n\
         pub const PKG_VERSION: &str = {version:?};\n\
         pub const PKG_DESCRIPTION: &str = {description:?};\n\
         pub const BIN_NAME: &str = {bin_name:?};\n"
    );
    fs::write(Path::new(&out_dir).join("pkg_info.rs"), contents)
        .expect("Failed to write pkg_info.rs");
}
