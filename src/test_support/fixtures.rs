//! The example workspace fixture and helpers to corrupt it.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::util::fs::copy_dir_all;

/// Name the example workspace declares.
pub const EXAMPLE_NAME: &str = "flync_example";

/// Source of the example workspace in the repository.
pub fn example_source() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(EXAMPLE_NAME)
}

/// Copy the example workspace into a fresh temporary directory.
///
/// Returns the TempDir handle - dropping it will clean up the copy - and the
/// workspace root inside it. The root keeps the workspace name.
pub fn example_workspace() -> (TempDir, PathBuf) {
    example_workspace_in(EXAMPLE_NAME)
}

/// Like [`example_workspace`], with the root directory called `dir_name`.
pub fn example_workspace_in(dir_name: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().expect("failed to create temp dir");
    let root = tmp.path().join(dir_name);
    copy_dir_all(&example_source(), &root).expect("failed to copy example workspace");
    (tmp, root)
}

/// Replace every occurrence of `from` in a file. Panics if there is none.
pub fn replace_in(path: &Path, from: &str, to: &str) {
    let content = fs::read_to_string(path).expect("failed to read fixture");
    assert!(
        content.contains(from),
        "{} does not contain {:?}",
        path.display(),
        from
    );
    fs::write(path, content.replace(from, to)).expect("failed to write fixture");
}

/// Append text to a file.
pub fn append_to(path: &Path, text: &str) {
    let mut content = fs::read_to_string(path).expect("failed to read fixture");
    content.push_str(text);
    fs::write(path, content).expect("failed to write fixture");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_workspace_is_a_copy() {
        let (_tmp, root) = example_workspace();
        assert!(root.join("system_metadata.flync.yaml").is_file());
        assert!(root.join("ecus/eth_ecu/controllers").is_dir());

        let ports = root.join("ecus/eth_ecu/ports.flync.yaml");
        replace_in(&ports, "eth_port1", "eth_port9");
        let original = fs::read_to_string(example_source().join("ecus/eth_ecu/ports.flync.yaml")).unwrap();
        assert!(original.contains("eth_port1"));
    }
}
