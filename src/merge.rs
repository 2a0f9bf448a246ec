//! Recursive deep-merge of metadata fragments
//!
//! Fragments are merged left-to-right: values from later (more specific)
//! fragments override earlier ones at every nesting level, while keys
//! present in only one fragment are unioned. Objects merge recursively;
//! scalars and arrays are replaced outright.

use serde_json::Value;

/// Raw parsed contents of one metadata source file
pub type Fragment = serde_json::Map<String, Value>;

/// Merge `overlay` into `acc`, with `overlay` winning conflicts.
///
/// Both sides at a key must be objects for the merge to recurse; any
/// other pairing (scalar, array, or mixed kinds) replaces the
/// accumulator's value with the overlay's.
pub fn deep_merge(acc: &mut Fragment, overlay: &Fragment) {
    for (key, value) in overlay {
        match (acc.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            _ => {
                acc.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Fold an ordered sequence of fragments into one resolved structure.
///
/// Pure: no I/O, inputs are not mutated. An empty sequence yields an
/// empty structure.
pub fn merge_fragments<'a, I>(fragments: I) -> Fragment
where
    I: IntoIterator<Item = &'a Fragment>,
{
    let mut acc = Fragment::new();
    for fragment in fragments {
        deep_merge(&mut acc, fragment);
    }
    acc
}
