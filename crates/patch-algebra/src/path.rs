//! JSON-Pointer (RFC 6901) path parsing, tailored to the subset this algebra needs:
//! object keys, array indices and the special `-` "array end" segment.

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

/// A single parsed path segment. `End` only ever appears as the last segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
 Key(SmartString),
 Index(usize),
 End,
}

pub type Segments = SmallVec<[Segment; 6]>;

fn unescape(s: &str) -> SmartString {
 if !s.contains('~') {
 return s.into();
 }
 let mut out = SmartString::new();
 let mut chars = s.chars();
 while let Some(c) = chars.next() {
 if c == '~' {
 match chars.next() {
 Some('0') => out.push('~'),
 Some('1') => out.push('/'),
 Some(other) => { out.push('~'); out.push(other); }
 None => out.push('~'),
 }
 } else {
 out.push(c);
 }
 }
 out
}

fn escape(s: &str) -> SmartString {
 if !s.contains('~') && !s.contains('/') {
 return s.into();
 }
 let mut out = SmartString::new();
 for c in s.chars() {
 match c {
 '~' => out.push_str("~0"),
 '/' => out.push_str("~1"),
 _ => out.push(c),
 }
 }
 out
}

/// Parse a JSON-Pointer string into segments. The root path `""` parses to an empty list.
pub fn parse(path: &str) -> Segments {
 if path.is_empty() {
 return Segments::new();
 }
 debug_assert!(path.starts_with('/'), "path must be a JSON pointer starting with /");
 path.split('/').skip(1).map(|raw| {
 if raw == "-" {
 Segment::End
 } else if is_array_index(raw) {
 Segment::Index(raw.parse().unwrap())
 } else {
 Segment::Key(unescape(raw))
 }
 }).collect()
}

fn is_array_index(raw: &str) -> bool {
 !raw.is_empty() && (raw == "0" || !raw.starts_with('0')) && raw.bytes().all(|b| b.is_ascii_digit())
}

/// Render segments back into a JSON-Pointer string.
pub fn render(segments: &[Segment]) -> SmartString {
 let mut out = SmartString::new();
 for seg in segments {
 out.push('/');
 match seg {
 Segment::Key(k) => out.push_str(&escape(k)),
 Segment::Index(i) => { out.push_str(&i.to_string()); }
 Segment::End => out.push('-'),
 }
 }
 out
}

/// True if `path` and `maybe_ancestor` name the same location, or `path` is nested under it.
pub fn is_at_or_under(path: &str, maybe_ancestor: &str) -> bool {
 if maybe_ancestor.is_empty() {
 return true;
 }
 path == maybe_ancestor || path.starts_with(maybe_ancestor) && path.as_bytes().get(maybe_ancestor.len()) == Some(&b'/')
}

/// The parent path and last segment, or `None` for the root path.
pub fn split_last(path: &str) -> Option<(SmartString, Segment)> {
 let segs = parse(path);
 let last = segs.last()?.clone();
 let parent = render(&segs[..segs.len() - 1]);
 Some((parent, last))
}

/// For a path under an array (`.../N` or `.../-`), the path to the array itself.
pub fn array_parent(path: &str) -> Option<SmartString> {
 match split_last(path)? {
 (parent, Segment::Index(_)) | (parent, Segment::End) => Some(parent),
 _ => None,
 }
}

/// The numeric index named by the final segment, if any (End does not count: it has no fixed index).
pub fn last_index(path: &str) -> Option<usize> {
 match parse(path).last() {
 Some(Segment::Index(i)) => Some(*i),
 _ => None,
 }
}

/// Rewrite the final `Index(old)` segment of `path` to `new`, preserving everything else.
/// Returns `path` unchanged if its final segment isn't an index.
pub fn with_last_index(path: &str, new: usize) -> SmartString {
 let mut segs = parse(path);
 if let Some(last @ Segment::Index(_)) = segs.last_mut() {
 *last = Segment::Index(new);
 }
 render(&segs)
}

#[cfg(test)]
mod test {
 use super::*;

 #[test]
 fn parses_root() {
 assert_eq!(parse(""), Segments::new());
 }

 #[test]
 fn parses_mixed_path() {
 let segs = parse("/a/b/0/-");
 assert_eq!(segs.as_slice(), &[
 Segment::Key("a".into()),
 Segment::Key("b".into()),
 Segment::Index(0),
 Segment::End,
 ]);
 }

 #[test]
 fn round_trips() {
 for p in ["/a/b/0", "/items/-", "/a~1b/c~0d", ""] {
 let segs = parse(p);
 assert_eq!(render(&segs), p);
 }
 }

 #[test]
 fn ancestry() {
 assert!(is_at_or_under("/a/b/0", "/a/b"));
 assert!(is_at_or_under("/a/b", "/a/b"));
 assert!(!is_at_or_under("/a/bc", "/a/b"));
 assert!(is_at_or_under("/a/b", ""));
 }

 #[test]
 fn leading_zero_is_not_an_index() {
 assert_eq!(parse("/01"), Segments::from_vec(vec![Segment::Key("01".into())]));
 }
}
