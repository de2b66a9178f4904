//! Retention set of previously extracted dumps

use std::fs;
use std::io;
use std::path::Path;

/// Count regular files in `dir` whose name starts with `<prefix>-`
pub fn count_retained(dir: &Path, prefix: &str) -> io::Result<usize> {
    let marker = format!("{}-", prefix);
    let mut count = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with(&marker) {
            count += 1;
        }
    }

    Ok(count)
}
