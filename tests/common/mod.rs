//! Common test utilities

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Create a temporary directory with a Taskfile.yml file
pub fn create_taskfile(content: &str) -> (TempDir, PathBuf) {
    create_file("Taskfile.yml", content)
}

/// Create a temporary directory holding one named file
pub fn create_file(name: &str, content: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join(name);
    fs::write(&path, content).unwrap();
    (temp_dir, path)
}
