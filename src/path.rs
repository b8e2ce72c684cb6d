//! Path normalization shared by every backend (§4.4, §9 normalization).

/// Normalize a logical path into an index key.
///
/// Lowercases, maps `\` to `/`, collapses `""`/`"."`/`"/"` to the empty
/// string (the root), and strips one leading `.` and/or `/` plus any
/// trailing `/`. Idempotent: `normalize(normalize(p)) == normalize(p)`.
pub fn normalize(path: &str) -> String {
    if path.is_empty() || path == "." || path == "/" {
        return String::new();
    }

    let mut s = path.to_lowercase().replace('\\', "/");

    if let Some(rest) = s.strip_prefix('.') {
        s = rest.to_string();
    }
    if let Some(rest) = s.strip_prefix('/') {
        s = rest.to_string();
    }
    while s.ends_with('/') {
        s.pop();
    }
    s
}
