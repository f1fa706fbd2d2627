//! Helpers for virtual resource paths such as `/models/ship.glb`.

/// Normalizes a virtual path to a leading-slash, forward-slash form.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.replace('\\', "/");
    let parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty() && *p != ".").collect();
    format!("/{}", parts.join("/"))
}

/// The last path component: `/models/ship.glb` -> `ship.glb`.
pub fn resource_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Lowercased extension of the last path component, if any.
pub fn resource_extension(path: &str) -> Option<String> {
    let name = resource_name(path);
    let dot = name.rfind('.')?;
    let ext = &name[dot + 1..];
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}
