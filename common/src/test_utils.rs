use std::path::PathBuf;
use std::sync::OnceLock;

/// Workspace root, the parent of the calling crate's manifest directory.
fn workspace_root() -> PathBuf {
    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .parent()
        .map(PathBuf::from)
        .unwrap_or(manifest_dir)
}

/// Ensures the test output directory exists. Safe to call multiple times.
pub fn ensure_test_output_dir() -> PathBuf {
    static DIR: OnceLock<PathBuf> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = workspace_root().join("test_output");
        // a missing directory surfaces later as a write error in the caller
        let _ = std::fs::create_dir_all(&dir);
        dir
    })
    .clone()
}

/// Path of a file inside the shared `test_output` directory.
pub fn test_output_path(name: &str) -> PathBuf {
    ensure_test_output_dir().join(name)
}
