//! Dotted paths into a JSON tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// A dot-separated address of a node in a state tree, e.g.
/// `settings.background.color`.
///
/// Paths are plain strings; they do not need to exist in any tree. The empty
/// path addresses the root.
///
/// # Examples
///
/// ```
/// use pathstore::Path;
///
/// let path = Path::new("settings.background.color");
/// let ancestors: Vec<_> = path.ancestors().map(|p| p.to_string()).collect();
/// assert_eq!(ancestors, ["settings", "settings.background"]);
/// assert_eq!(path.topic(), "state:settings.background.color:changed");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Path(String);

impl Path {
    /// Create a path from its dotted form.
    pub fn new(path: impl Into<String>) -> Self {
        Path(path.into())
    }

    /// The root path (empty string).
    pub fn root() -> Self {
        Path(String::new())
    }

    /// Returns `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The dotted string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the segments. The root path has none.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|_| !self.0.is_empty())
    }

    /// Append a segment.
    pub fn child(&self, segment: &str) -> Self {
        if self.is_root() {
            Path(segment.to_string())
        } else {
            Path(format!("{}.{segment}", self.0))
        }
    }

    /// Strict, non-root ancestors from the root towards the leaf.
    ///
    /// `a.b.c` yields `a` then `a.b`.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        self.0
            .match_indices('.')
            .map(|(idx, _)| Path(self.0[..idx].to_string()))
    }

    /// The bus topic on which changes to this path are published.
    pub fn topic(&self) -> String {
        crate::topic::path_changed(&self.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::new(path)
    }
}

impl From<String> for Path {
    fn from(path: String) -> Self {
        Path(path)
    }
}

impl AsRef<str> for Path {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Resolve a dotted path against any tree.
///
/// Returns `None` when a segment is missing or when traversal hits a
/// primitive before the path is exhausted. Array elements are addressed by
/// decimal index. The empty path resolves to the tree itself.
///
/// # Examples
///
/// ```
/// use pathstore::get_nested_value;
/// use serde_json::json;
///
/// let tree = json!({"a": {"b": [10, 20]}});
/// assert_eq!(get_nested_value(&tree, "a.b.1"), Some(&json!(20)));
/// assert_eq!(get_nested_value(&tree, "a.c"), None);
/// assert_eq!(get_nested_value(&tree, "a.b.1.x"), None);
/// ```
pub fn get_nested_value<'a>(tree: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(tree);
    }
    path.split('.').try_fold(tree, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Every path mentioned by a partial update, each preceded by its strict
/// ancestors, deduplicated, in root-to-leaf order.
///
/// Recursion only descends into objects; an array is a single leaf.
///
/// Segments are joined with `.`, so a key that itself contains a dot (see
/// [`has_dotted_key`]) yields a path that [`get_nested_value`] resolves as
/// nested keys. Changes under such keys are therefore never reported by path.
///
/// ```
/// use pathstore::{touched_paths, Path};
/// use serde_json::json;
///
/// let paths = touched_paths(&json!({"settings": {"background": {"color": "#000"}}}));
/// assert_eq!(
///     paths,
///     [
///         Path::new("settings"),
///         Path::new("settings.background"),
///         Path::new("settings.background.color"),
///     ]
/// );
/// ```
pub fn touched_paths(partial: &Value) -> Vec<Path> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    if let Value::Object(map) = partial {
        collect(map, &Path::root(), &mut out, &mut seen);
    }
    out
}

fn collect(map: &Map<String, Value>, prefix: &Path, out: &mut Vec<Path>, seen: &mut HashSet<Path>) {
    for (key, value) in map {
        let path = prefix.child(key);
        // Keys containing dots can produce ancestors that were never visited.
        for ancestor in path.ancestors() {
            if seen.insert(ancestor.clone()) {
                out.push(ancestor);
            }
        }
        if seen.insert(path.clone()) {
            out.push(path.clone());
        }
        if let Value::Object(children) = value {
            collect(children, &path, out, seen);
        }
    }
}

/// Returns `true` if any object key in `partial`, at any depth outside
/// arrays, contains a `.`.
pub fn has_dotted_key(partial: &Value) -> bool {
    match partial {
        Value::Object(map) => map
            .iter()
            .any(|(key, value)| key.contains('.') || has_dotted_key(value)),
        _ => false,
    }
}

/// Build the sparse partial that sets `value` at `path`.
///
/// `partial_for("a.b", 1)` is `{"a": {"b": 1}}`. The root path yields
/// `value` itself.
pub fn partial_for(path: &Path, value: Value) -> Value {
    let segments: Vec<&str> = path.segments().collect();
    segments.into_iter().rev().fold(value, |inner, segment| {
        let mut map = Map::new();
        map.insert(segment.to_string(), inner);
        Value::Object(map)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_path_has_no_segments() {
        assert_eq!(Path::root().segments().count(), 0);
        assert_eq!(Path::new("a.b").segments().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn dotted_keys_are_detected_at_any_depth() {
        assert!(!has_dotted_key(&json!({"a": {"b": 1}, "c": [{"d.e": 1}]})));
        assert!(has_dotted_key(&json!({"a.b": 1})));
        assert!(has_dotted_key(&json!({"a": {"b": {"c.d": null}}})));
    }

    #[test]
    fn dotted_key_path_resolves_as_nested() {
        let paths = touched_paths(&json!({"a.b": 1}));
        assert_eq!(paths, [Path::new("a"), Path::new("a.b")]);
        assert_eq!(get_nested_value(&json!({"a.b": 1}), "a.b"), None);
    }

    #[test]
    fn nested_value_on_primitive_root() {
        assert_eq!(get_nested_value(&json!(3), "a"), None);
        assert_eq!(get_nested_value(&json!(null), "a.b"), None);
    }

    #[test]
    fn nested_value_with_empty_segment() {
        let tree = json!({"a": {"": 1}});
        assert_eq!(get_nested_value(&tree, "a."), Some(&json!(1)));
        assert_eq!(get_nested_value(&tree, "a..b"), None);
    }

    #[test]
    fn touched_paths_covers_siblings_once() {
        let paths = touched_paths(&json!({"x": {"y": 1, "z": {"w": 2}}}));
        let names: Vec<_> = paths.iter().map(Path::as_str).collect();
        assert_eq!(names, ["x", "x.y", "x.z", "x.z.w"]);
    }

    #[test]
    fn touched_paths_stops_at_arrays() {
        let paths = touched_paths(&json!({"favorites": [{"url": "a"}]}));
        assert_eq!(paths, [Path::new("favorites")]);
    }

    #[test]
    fn touched_paths_of_non_object_is_empty() {
        assert!(touched_paths(&json!(5)).is_empty());
    }

    #[test]
    fn partial_for_nests_segments() {
        assert_eq!(
            partial_for(&Path::new("a.b.c"), json!(true)),
            json!({"a": {"b": {"c": true}}})
        );
        assert_eq!(partial_for(&Path::root(), json!(1)), json!(1));
    }
}
