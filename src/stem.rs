use std::collections::HashSet;

/// Return `filename` without its final extension.
///
/// Only the last `.` counts, so `photo.tar.gz` becomes `photo.tar`. Leading
/// dots belong to the name: `.hidden` has no extension and comes back as is.
pub fn stem(filename: &str) -> &str {
    let leading = filename.len() - filename.trim_start_matches('.').len();
    match filename[leading..].rfind('.') {
        Some(idx) => &filename[..leading + idx],
        None => filename,
    }
}

/// Collect the distinct stems of a file collection.
pub fn stem_set<S: AsRef<str>>(names: &[S]) -> HashSet<&str> {
    names.iter().map(|name| stem(name.as_ref())).collect()
}
