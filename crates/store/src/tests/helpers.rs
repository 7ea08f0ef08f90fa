use segment::SEGMENT_FILE_PREFIX;
use std::fs;
use std::path::Path;

/// Counts the `segment_file_<n>` entries in a store directory.
pub fn count_segment_files(db_dir: &Path) -> usize {
    fs::read_dir(db_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.file_name()
                .to_str()
                .map(|name| name.starts_with(SEGMENT_FILE_PREFIX))
                .unwrap_or(false)
        })
        .count()
}
