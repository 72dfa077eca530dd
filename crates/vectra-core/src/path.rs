//! Node path naming and pattern matching.
//!
//! Nodes are addressed by slash-separated paths such as
//! `voices/voice#3/osc`. Copies made by per-voice replication carry a
//! `#index` suffix on their container segment. A pattern segment matches a
//! path segment when:
//!
//! - it is `*`, or
//! - it contains `#` and equals the segment exactly, or
//! - it equals the segment with any `#index` suffix removed.
//!
//! So `voices/voice/osc` matches the `osc` in every voice copy, while
//! `voices/voice#0/osc` matches only the first.

/// Separator between path segments.
pub const SEPARATOR: char = '/';

/// Separator between a base name and its copy index.
pub const COPY_MARK: char = '#';

/// Joins a parent path and a child name.
pub fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}{SEPARATOR}{name}")
    }
}

/// Names the `index`th copy of `name`.
pub fn copy_name(name: &str, index: usize) -> String {
    format!("{name}{COPY_MARK}{index}")
}

/// Strips a leading separator.
pub fn normalize(path: &str) -> &str {
    path.strip_prefix(SEPARATOR).unwrap_or(path)
}

/// The part of a segment before any copy index.
pub fn base_name(segment: &str) -> &str {
    segment
        .split_once(COPY_MARK)
        .map_or(segment, |(base, _)| base)
}

/// Returns true if `name` is usable as a node name.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "*"
        && !name.contains(SEPARATOR)
        && !name.contains(COPY_MARK)
        && !name.contains('.')
}

/// Returns true if `pattern` selects `path`.
pub fn matches(pattern: &str, path: &str) -> bool {
    let mut pat = normalize(pattern).split(SEPARATOR);
    let mut segs = normalize(path).split(SEPARATOR);
    loop {
        match (pat.next(), segs.next()) {
            (None, None) => return true,
            (Some(p), Some(s)) => {
                if !segment_matches(p, s) {
                    return false;
                }
            }
            _ => return false,
        }
    }
}

/// Returns true if `pattern` selects `path` or one of its ancestors, so
/// `voices/voice#2` selects every node inside the third voice copy.
pub fn matches_prefix(pattern: &str, path: &str) -> bool {
    let mut segs = normalize(path).split(SEPARATOR);
    for p in normalize(pattern).split(SEPARATOR) {
        match segs.next() {
            Some(s) if segment_matches(p, s) => {}
            _ => return false,
        }
    }
    true
}

fn segment_matches(pattern: &str, segment: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if pattern.contains(COPY_MARK) {
        return pattern == segment;
    }
    pattern == base_name(segment)
}

/// Splits `"path.port"` into its node path and port name.
pub fn split_port(reference: &str) -> Option<(&str, &str)> {
    let (node, port) = reference.rsplit_once('.')?;
    if node.is_empty() || port.is_empty() {
        return None;
    }
    Some((node, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_segment_matches_every_copy() {
        assert!(matches("voices/voice/osc", "voices/voice#0/osc"));
        assert!(matches("voices/voice/osc", "voices/voice#7/osc"));
        assert!(!matches("voices/voice/osc", "voices/voice#7/env"));
    }

    #[test]
    fn indexed_segment_matches_one_copy() {
        assert!(matches("voices/voice#2/osc", "voices/voice#2/osc"));
        assert!(!matches("voices/voice#2/osc", "voices/voice#3/osc"));
    }

    #[test]
    fn wildcard_and_depth() {
        assert!(matches("*/osc", "lead/osc"));
        assert!(!matches("*/osc", "lead/sub/osc"));
        assert!(matches("/the_midi_inputs", "the_midi_inputs"));
    }

    #[test]
    fn prefix_selects_descendants() {
        assert!(matches_prefix("voices/voice#2", "voices/voice#2/osc"));
        assert!(matches_prefix("voices/voice", "voices/voice#0/env"));
        assert!(matches_prefix("voices/voice#2/osc", "voices/voice#2/osc"));
        assert!(!matches_prefix("voices/voice#2", "voices/voice#1/osc"));
        assert!(!matches_prefix("voices/voice#2/osc/x", "voices/voice#2/osc"));
    }

    #[test]
    fn port_split() {
        assert_eq!(split_port("voices/osc.out"), Some(("voices/osc", "out")));
        assert_eq!(split_port("osc"), None);
        assert_eq!(split_port("osc."), None);
    }

    #[test]
    fn names() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("a", "b"), "a/b");
        assert_eq!(copy_name("voice", 3), "voice#3");
        assert_eq!(base_name("voice#3"), "voice");
        assert!(is_valid_name("osc1"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name("a#1"));
        assert!(!is_valid_name("a.b"));
    }
}
