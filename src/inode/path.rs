//! Lexical path utilities for the vault's slash-separated namespace.
//!
//! These operate on strings only; nothing here touches the inode graph.
//! Separators are always forward slashes, on every OS.

/// Returns true if the path is absolute (begins with `/`).
pub fn is_abs(path: &str) -> bool {
    path.starts_with('/')
}

/// Splits off the first name in `path`, returning `(name, rest)`.
///
/// A leading run of slashes pops as the single name `"/"`. An empty path
/// pops as `("", "")`, which resolution treats as "the current inode".
pub fn pop_first(path: &str) -> (&str, &str) {
    if path.is_empty() {
        return ("", "");
    }
    if path == "/" {
        return ("/", "");
    }

    match path.find('/') {
        None => (path, ""),
        Some(0) => ("/", path.trim_start_matches('/')),
        Some(x) => (&path[..x], &path[x + 1..]),
    }
}

/// Returns the shortest lexically equivalent path.
///
/// Collapses repeated slashes, drops `.` components, folds `..` against a
/// preceding component, and clamps `..` at the root. The cleaned form of an
/// empty path is `"."`.
pub fn clean(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = is_abs(path);
    let mut out: Vec<&str> = Vec::new();

    for comp in path.split('/') {
        match comp {
            "" | "." => {}
            ".." => match out.last() {
                Some(&"..") | None if !rooted => out.push(".."),
                Some(last) if *last != ".." => {
                    out.pop();
                }
                _ => {}
            },
            comp => out.push(comp),
        }
    }

    let body = out.join("/");
    match (rooted, body.is_empty()) {
        (true, _) => format!("/{body}"),
        (false, true) => ".".to_string(),
        (false, false) => body,
    }
}

/// Joins path elements with `/` and cleans the result. Empty elements are
/// ignored; joining nothing yields `""`.
pub fn join(elems: &[&str]) -> String {
    let joined: Vec<&str> = elems.iter().copied().filter(|e| !e.is_empty()).collect();
    if joined.is_empty() {
        return String::new();
    }
    clean(&joined.join("/"))
}

/// Splits a path into `(dir, file)` around the final slash; `dir` keeps its
/// trailing slash. A path without slashes splits as `("", path)`.
pub fn split(path: &str) -> (&str, &str) {
    match path.rfind('/') {
        Some(i) => (&path[..i + 1], &path[i + 1..]),
        None => ("", path),
    }
}

/// The last element of the path. Trailing slashes are stripped first;
/// the base of `""` is `"."` and the base of `"/"` is `"/"`.
pub fn base(path: &str) -> &str {
    if path.is_empty() {
        return ".";
    }

    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }

    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Returns `name` cleaned if it is already absolute, otherwise the cleaned
/// join of `cwd` and `name`.
pub fn abs(cwd: &str, name: &str) -> String {
    if is_abs(name) {
        clean(name)
    } else {
        join(&[cwd, name])
    }
}

/// Checks the vault's path syntax: non-empty, and every component after an
/// optional leading slash is non-empty. `.` and `..` components are fine.
pub fn is_valid(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name == "/" {
        return true;
    }

    let rest = name.strip_prefix('/').unwrap_or(name);
    !rest.split('/').any(str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pop_first() {
        assert_eq!(pop_first(""), ("", ""));
        assert_eq!(pop_first("/"), ("/", ""));
        assert_eq!(pop_first("/a/b"), ("/", "a/b"));
        assert_eq!(pop_first("//a"), ("/", "a"));
        assert_eq!(pop_first("a/b/c"), ("a", "b/c"));
        assert_eq!(pop_first("a/"), ("a", ""));
        assert_eq!(pop_first("name"), ("name", ""));
    }

    #[test]
    fn test_clean() {
        assert_eq!(clean(""), ".");
        assert_eq!(clean("/"), "/");
        assert_eq!(clean("/a/b/c"), "/a/b/c");
        assert_eq!(clean("/a//b///c"), "/a/b/c");
        assert_eq!(clean("/a/./b"), "/a/b");
        assert_eq!(clean("/a/b/.."), "/a");
        assert_eq!(clean("/a/b/../.."), "/");
        assert_eq!(clean("/.."), "/");
        assert_eq!(clean("/../a"), "/a");
        assert_eq!(clean("a/.."), ".");
        assert_eq!(clean("../a"), "../a");
        assert_eq!(clean("a/b/"), "a/b");
        assert_eq!(clean("./x"), "x");
    }

    #[test]
    fn test_join() {
        assert_eq!(join(&["/", "a"]), "/a");
        assert_eq!(join(&["/a", "b/c"]), "/a/b/c");
        assert_eq!(join(&["/a", "../b"]), "/b");
        assert_eq!(join(&["", ""]), "");
        assert_eq!(join(&["a", ""]), "a");
    }

    #[test]
    fn test_split() {
        assert_eq!(split("/a/b"), ("/a/", "b"));
        assert_eq!(split("/a"), ("/", "a"));
        assert_eq!(split("a"), ("", "a"));
        assert_eq!(split("/a/b/"), ("/a/b/", ""));
    }

    #[test]
    fn test_base() {
        assert_eq!(base(""), ".");
        assert_eq!(base("/"), "/");
        assert_eq!(base("/a/b"), "b");
        assert_eq!(base("/a/b/"), "b");
        assert_eq!(base("name"), "name");
    }

    #[test]
    fn test_abs() {
        assert_eq!(abs("/", "a"), "/a");
        assert_eq!(abs("/x", "a/b"), "/x/a/b");
        assert_eq!(abs("/x", "/a"), "/a");
        assert_eq!(abs("/x", ".."), "/");
        assert_eq!(abs("/x/y", "../z"), "/x/z");
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("/"));
        assert!(is_valid("/a/b"));
        assert!(is_valid("a/b"));
        assert!(is_valid("."));
        assert!(is_valid("/a/../b"));
        assert!(!is_valid(""));
        assert!(!is_valid("/a//b"));
        assert!(!is_valid("a/"));
        assert!(!is_valid("//"));
    }
}
