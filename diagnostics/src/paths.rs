//! Path helpers for presenting module ids in diagnostics.
//!
//! Module ids are usually absolute paths produced by the module loader. When
//! reporting, ids are shown relative to a working directory so warnings stay
//! short and deterministic across machines. Rules:
//! - backslashes are replaced with `/`
//! - `.` segments are removed, `..` pops a segment without escaping the root
//! - drive letters are lowercased (`C:\foo` -> `c:/foo`)
//! - ids that are not absolute (virtual ids, bare specifiers) are returned
//!   unchanged.

/// Normalize an absolute path-like string into a canonical, forward-slashed
/// path. Relative inputs are returned with separators normalized only.
pub fn normalize_path(raw: &str) -> String {
  let path = raw.replace('\\', "/");
  if !is_absolute(&path) {
    return path;
  }
  let mut rest = path.trim_start_matches('/');

  let mut drive = None;
  if has_drive_letter(rest) {
    let mut prefix = rest[..2].to_string();
    prefix.make_ascii_lowercase();
    drive = Some(prefix);
    rest = rest[2..].trim_start_matches('/');
  }

  let mut components = Vec::new();
  for part in rest.split('/') {
    if part.is_empty() || part == "." {
      continue;
    }
    if part == ".." {
      components.pop();
      continue;
    }
    components.push(part);
  }

  let mut normalized = String::new();
  if let Some(drive) = drive {
    normalized.push_str(&drive);
  }
  normalized.push('/');
  normalized.push_str(&components.join("/"));
  normalized
}

/// Returns `id` relative to `cwd` when `id` is an absolute path inside `cwd`;
/// otherwise the normalized `id`.
pub fn relative_id(id: &str, cwd: Option<&str>) -> String {
  let normalized = normalize_path(id);
  if !is_absolute(&normalized) {
    return normalized;
  }
  let Some(cwd) = cwd else {
    return normalized;
  };
  let base = normalize_path(cwd);
  let base = base.trim_end_matches('/');
  match normalized.strip_prefix(base) {
    Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/').to_string(),
    _ => normalized,
  }
}

fn is_absolute(path: &str) -> bool {
  path.starts_with('/') || has_drive_letter(path)
}

fn has_drive_letter(path: &str) -> bool {
  let bytes = path.as_bytes();
  bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
