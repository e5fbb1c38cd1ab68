use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

const SCHEMA_SUFFIX: &str = ".schema.json";

fn main() {
    let manifest_dir =
        PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .ancestors()
        .nth(2)
        .expect("workspace root")
        .to_path_buf();
    let schema_dir = workspace_root.join("contracts/v1");
    let openapi_path = workspace_root.join("openapi/v1.yaml");

    println!("cargo:rerun-if-changed={}", schema_dir.display());
    println!("cargo:rerun-if-changed={}", openapi_path.display());

    let mut schema_paths: Vec<PathBuf> = fs::read_dir(&schema_dir)
        .expect("read contracts/v1")
        .filter_map(|entry| entry.ok().map(|v| v.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(SCHEMA_SUFFIX))
        })
        .collect();
    schema_paths.sort();

    let mut set_hasher = Sha256::new();
    let mut entries = Vec::with_capacity(schema_paths.len());

    for path in schema_paths {
        println!("cargo:rerun-if-changed={}", path.display());
        let bytes =
            fs::read(&path).unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
        let reference = schema_reference(&workspace_root, &path);
        let digest = hex_sha256(&bytes);

        set_hasher.update(reference.as_bytes());
        set_hasher.update([0]);
        set_hasher.update(&bytes);
        set_hasher.update([0]);

        let body = String::from_utf8(bytes)
            .unwrap_or_else(|e| panic!("schema is not valid utf-8 {}: {e}", path.display()));
        entries.push((reference, digest, body));
    }

    let openapi_bytes = fs::read(&openapi_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", openapi_path.display()));
    let openapi_digest = hex_sha256(&openapi_bytes);
    let set_digest: String = set_hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    let built_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut out = String::new();
    out.push_str(&format!("pub const OPENAPI_SHA256: &str = {openapi_digest:?};\n"));
    out.push_str(&format!("pub const SCHEMA_SET_SHA256: &str = {set_digest:?};\n"));
    out.push_str(&format!("pub const MANIFEST_BUILT_AT: &str = {built_at:?};\n"));
    out.push_str("pub const SCHEMA_ENTRIES: &[(&str, &str, &str)] = &[\n");
    for (reference, digest, body) in entries {
        out.push_str(&format!("    ({reference:?}, {digest:?}, {body:?}),\n"));
    }
    out.push_str("];\n");

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR"));
    fs::write(out_dir.join("contract_manifest.rs"), out).expect("write contract_manifest.rs");
}

fn schema_reference(workspace_root: &Path, full_path: &Path) -> String {
    let rel = full_path
        .strip_prefix(workspace_root)
        .unwrap_or_else(|e| panic!("{} is outside the workspace: {e}", full_path.display()));
    format!("../{}", rel.to_string_lossy().replace('\\', "/"))
}

fn hex_sha256(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
