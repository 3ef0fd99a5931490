//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use flync::util::fs::copy_dir_all;
use tempfile::TempDir;

pub const EXAMPLE_NAME: &str = "flync_example";

/// Copy the example workspace into a temporary directory and return its root.
pub fn example_workspace() -> (TempDir, PathBuf) {
    example_workspace_in(EXAMPLE_NAME)
}

/// Copy the example workspace into a directory called `dir_name`, which need not
/// match the name the workspace declares.
pub fn example_workspace_in(dir_name: &str) -> (TempDir, PathBuf) {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(EXAMPLE_NAME);
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join(dir_name);
    copy_dir_all(&source, &root).unwrap();
    (tmp, root)
}

/// Replace text in a workspace document; the text must be present.
pub fn replace_in(root: &Path, document: &str, from: &str, to: &str) {
    let path = root.join(document);
    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains(from), "{} does not contain {:?}", document, from);
    fs::write(&path, content.replace(from, to)).unwrap();
}

pub fn append_to(root: &Path, document: &str, text: &str) {
    let path = root.join(document);
    let mut content = fs::read_to_string(&path).unwrap();
    content.push_str(text);
    fs::write(&path, content).unwrap();
}

pub fn write(root: &Path, document: &str, text: &str) {
    let path = root.join(document);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}
