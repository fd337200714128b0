// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::{Path, PathBuf};

#[allow(clippy::module_name_repetitions)]
pub fn absolute_path<P: AsRef<Path>>(path: P) -> PathBuf {
    // NOTE: Fails only when the path is empty or the cwd is gone;
    // fall back to the path as given
    std::path::absolute(path.as_ref()).unwrap_or_else(|_| path.as_ref().into())
}
