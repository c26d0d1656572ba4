use std::path::Path;

/// Storage names are single path components; anything else was never written
/// by this service.
pub fn is_valid_storage_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
        && !name.starts_with('.')
}

/// Filename without directories and without its last extension.
pub fn base_name(filename: &str) -> String {
    let filename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    Path::new(filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_string())
        .unwrap_or_default()
}

/// Lower-cased last extension of `filename`, if any.
pub fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|extension| extension.to_str())
        .map(|extension| extension.to_ascii_lowercase())
}
