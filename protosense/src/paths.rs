//! Conversions between document URIs, file system paths and import names.

use std::{
    env,
    path::{self, Path, PathBuf},
};

use tracing::warn;
use url::Url;

/// The URI scheme used for the built-in well-known files.
pub const BUILTIN_SCHEME: &str = "builtin";

/// Converts an absolute file path to a `file://` URI.
pub fn path_to_uri(path: &Path) -> Option<String> {
    Url::from_file_path(normalize(path))
        .ok()
        .map(String::from)
}

/// The file system path of a `file://` URI.
pub fn uri_to_path(uri: &str) -> Option<PathBuf> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() == "file" {
        url.to_file_path().ok()
    } else {
        None
    }
}

/// The path component of any URI, used to match imports against documents which are not on disk.
pub(crate) fn uri_path(uri: &str) -> Option<PathBuf> {
    match Url::parse(uri) {
        Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
        Ok(url) => Some(PathBuf::from(url.path())),
        Err(_) => Some(PathBuf::from(uri)),
    }
}

/// The name of the built-in file at `uri`, e.g. `google/protobuf/any.proto`.
pub(crate) fn builtin_name(uri: &str) -> Option<&str> {
    uri.strip_prefix(BUILTIN_SCHEME)?.strip_prefix(":///")
}

pub(crate) fn builtin_uri(name: &str) -> String {
    format!("{BUILTIN_SCHEME}:///{name}")
}

/// Makes `path` absolute against the current directory and normalizes it.
///
/// If the current directory cannot be determined, a relative path is only normalized.
pub(crate) fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return normalize(path);
    }
    match env::current_dir() {
        Ok(dir) => normalize(&dir.join(path)),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot resolve relative path");
            normalize(path)
        }
    }
}

/// Removes `.` components and resolves `..` components lexically.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            path::Component::CurDir => {}
            path::Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Joins the normal components of `path` with `/`, failing on anything else.
pub(crate) fn path_to_file_name(path: &Path) -> Option<String> {
    let mut name = String::new();
    for component in path.components() {
        match component {
            path::Component::Normal(component) => {
                if let Some(component) = component.to_str() {
                    if !name.is_empty() {
                        name.push('/');
                    }
                    name.push_str(component);
                } else {
                    return None;
                }
            }
            path::Component::CurDir => {}
            _ => return None,
        }
    }

    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

pub(crate) fn strip_prefix<'a>(path: &'a Path, prefix: &Path) -> Option<&'a Path> {
    Some(iter_after(path.components(), prefix.components())?.as_path())
}

pub(crate) fn ends_with(path: &Path, suffix: &Path) -> bool {
    iter_after(path.components().rev(), suffix.components().rev()).is_some()
}

/// Comparison of paths which ignores '.' components and is case-insensitive on windows.
fn iter_after<'a, 'b, I, J>(mut iter: I, mut prefix: J) -> Option<I>
where
    I: Iterator<Item = path::Component<'a>> + Clone,
    J: Iterator<Item = path::Component<'b>> + Clone,
{
    loop {
        let mut path_next = iter.clone();
        let mut prefix_next = prefix.clone();

        match (path_next.next(), prefix_next.next()) {
            (Some(path::Component::CurDir), _) => {
                iter = path_next;
            }
            (_, Some(path::Component::CurDir)) => {
                prefix = prefix_next;
            }
            (Some(ref l), Some(ref r)) if path_component_eq(l, r) => {
                iter = path_next;
                prefix = prefix_next;
            }
            (Some(_), Some(_)) => return None,
            (Some(_), None) => return Some(iter),
            (None, None) => return Some(iter),
            (None, Some(_)) => return None,
        }
    }
}

#[cfg(windows)]
fn path_component_eq(l: &path::Component, r: &path::Component) -> bool {
    l.as_os_str().eq_ignore_ascii_case(r.as_os_str())
}

#[cfg(not(windows))]
fn path_component_eq(l: &path::Component, r: &path::Component) -> bool {
    l == r
}
