//! The rich-text sub-document algebra that `@txt` ops delegate to composition and
//! transform delegate to the referenced delta algebra and are not redefined here. This module
//! is that delegate: a small, self-contained implementation of the well-known retain/insert/delete
//! delta format (as used by `ot-text-unicode`/`quill-delta`), built on top of [`jumprope`] for the
//! actual string splicing so large documents aren't copied wholesale on every edit.
//!
//! Attribute maps on `insert`/`retain` entries are carried through compose/transform but are not
//! merged field-by-field beyond "last writer wins for the overlapping span" -- a real rich-text
//! attribute algebra is out of scope here (spec Non-goals: "rich-text CRDTs... see §6").

use std::collections::BTreeMap;
use jumprope::JumpRope;

use serde::{Deserialize, Serialize};

pub type Attrs = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeltaEntry {
 Retain { len: usize, attrs: Option<Attrs> },
 Insert { text: String, attrs: Option<Attrs> },
 Delete { len: usize },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextDelta {
 pub entries: Vec<DeltaEntry>,
}

impl TextDelta {
 pub fn new() -> Self { Self::default() }

 pub fn retain(mut self, len: usize, attrs: Option<Attrs>) -> Self {
 if len > 0 { self.push(DeltaEntry::Retain { len, attrs }); }
 self
 }

 pub fn insert(mut self, text: impl Into<String>, attrs: Option<Attrs>) -> Self {
 let text = text.into();
 if !text.is_empty() { self.push(DeltaEntry::Insert { text, attrs }); }
 self
 }

 pub fn delete(mut self, len: usize) -> Self {
 if len > 0 { self.push(DeltaEntry::Delete { len }); }
 self
 }

 /// Push an entry, merging it into the previous entry when they're RLE-compatible.
 fn push(&mut self, entry: DeltaEntry) {
 match (self.entries.last_mut(), &entry) {
 (Some(DeltaEntry::Retain { len: a, attrs: aa }), DeltaEntry::Retain { len: b, attrs: ab }) if aa == ab => { *a += b; return; }
 (Some(DeltaEntry::Insert { text: a, attrs: aa }), DeltaEntry::Insert { text: b, attrs: ab }) if aa == ab => { a.push_str(b); return; }
 (Some(DeltaEntry::Delete { len: a }), DeltaEntry::Delete { len: b }) => { *a += b; return; }
 _ => {}
 }
 self.entries.push(entry);
 }

 pub fn is_empty(&self) -> bool {
 self.entries.iter().all(|e| matches!(e, DeltaEntry::Retain { attrs: None,.. }))
 }

 /// Apply this delta to `text`, producing the resulting document.
 pub fn apply(&self, text: &str) -> Result<String, crate::error::AlgebraError> {
 let mut rope = JumpRope::from(text);
 let mut pos = 0usize;
 for entry in &self.entries {
 match entry {
 DeltaEntry::Retain { len,.. } => {
 pos = pos.checked_add(*len).ok_or(crate::error::AlgebraError::DeltaOutOfRange)?;
 if pos > rope.len_chars() { return Err(crate::error::AlgebraError::DeltaOutOfRange); }
 }
 DeltaEntry::Insert { text: ins,.. } => {
 rope.insert(pos, ins);
 pos += ins.chars().count();
 }
 DeltaEntry::Delete { len } => {
 let end = pos.checked_add(*len).ok_or(crate::error::AlgebraError::DeltaOutOfRange)?;
 if end > rope.len_chars() { return Err(crate::error::AlgebraError::DeltaOutOfRange); }
 rope.remove(pos..end);
 }
 }
 }
 Ok(rope.to_string())
 }

 /// Invert this delta against the original text it was built to apply to, producing a delta
 /// that undoes it: `invert(d, s).apply(d.apply(s)) == s`.
 pub fn invert(&self, original: &str) -> TextDelta {
 let mut out = TextDelta::new();
 let mut pos = 0usize;
 let chars: Vec<char> = original.chars().collect();
 for entry in &self.entries {
 match entry {
 DeltaEntry::Retain { len, attrs } => {
 // Retains with attribute changes invert to a retain restoring no-op attrs;
 // plain retains invert to themselves.
 out = out.retain(*len, attrs.as_ref().map(|_| Attrs::new()));
 pos += len;
 }
 DeltaEntry::Insert { text,.. } => {
 out = out.delete(text.chars().count());
 }
 DeltaEntry::Delete { len } => {
 let removed: String = chars[pos..pos + len].iter().collect();
 out = out.insert(removed, None);
 pos += len;
 }
 }
 }
 out
 }

 /// Compose `self` then `other` into a single equivalent delta.
 pub fn compose(&self, other: &TextDelta) -> TextDelta {
 let mut a = Cursor::new(&self.entries);
 let mut b = Cursor::new(&other.entries);
 let mut out = TextDelta::new();

 loop {
 match (a.peek(), b.peek()) {
 (None, None) => break,
 // b's insert always goes straight through: it's new content b adds on top of
 // whatever a produced, so it never needs to line up with an a entry.
 (_, Some(DeltaEntry::Insert { text, attrs })) => {
 out = out.insert(text.clone(), attrs.clone());
 b.advance_whole();
 }
 // a ran out (implicit trailing retain-to-end) but b still has non-insert work
 // (retain/delete against content a left alone) -- pass it straight through.
 (None, Some(_)) => {
 let (e, _) = b.take(usize::MAX);
 out.push_entry(e);
 }
 // a's insert has nothing left in b to compose against yet (b ran out, or b's
 // head is non-insert and shorter) -- keep a's insert as-is, consuming what b
 // can cover of it.
 (Some(DeltaEntry::Insert {.. }), None) => {
 let (e, _) = a.take(usize::MAX);
 out.push_entry(e);
 }
 (Some(a_head), Some(b_head)) => {
 let len = entry_len(a_head).min(entry_len(b_head));
 let (a_piece, _) = a.take(len);
 let (b_piece, _) = b.take(len);
 out.push_entry(compose_piece(a_piece, b_piece));
 }
 }
 }
 out
 }

 fn push_entry(&mut self, e: DeltaEntry) { self.push(e); }

 /// Transform `other` so it can be applied after `self` (priority breaks same-position ties:
 /// `true` means `self`'s inserts come first).
 pub fn transform(&self, other: &TextDelta, self_is_left: bool) -> TextDelta {
 let mut a = Cursor::new(&self.entries);
 let mut b = Cursor::new(&other.entries);
 let mut out = TextDelta::new();

 loop {
 match (a.peek(), b.peek()) {
 (Some(DeltaEntry::Insert { text,.. }), _) if self_is_left => {
 out = out.retain(text.chars().count(), None);
 a.advance_whole();
 }
 (_, Some(DeltaEntry::Insert { text, attrs })) => {
 out = out.insert(text.clone(), attrs.clone());
 b.advance_whole();
 }
 (Some(DeltaEntry::Insert { text,.. }), _) => {
 out = out.retain(text.chars().count(), None);
 a.advance_whole();
 }
 (None, None) => break,
 (None, Some(_)) => {
 let (e, _) = b.take(usize::MAX);
 out.push_entry(e);
 }
 (Some(_), None) => { a.advance_whole(); }
 (Some(a_head), Some(b_head)) => {
 let len = entry_len(a_head).min(entry_len(b_head));
 let (_, a_kind) = a.take(len);
 let (b_piece, _) = b.take(len);
 match (a_kind, b_piece) {
 (EntryKind::Delete, _) => { /* b's op against deleted text vanishes */ }
 (_, DeltaEntry::Delete { len }) => out = out.delete(len),
 (_, DeltaEntry::Retain { len, attrs }) => out = out.retain(len, attrs),
 (_, DeltaEntry::Insert {.. }) => unreachable!("inserts are handled above"),
 }
 }
 }
 }
 out
 }
}

enum EntryKind { Retain, Insert, Delete }

fn entry_len(e: &DeltaEntry) -> usize {
 match e {
 DeltaEntry::Retain { len,.. } | DeltaEntry::Delete { len } => *len,
 DeltaEntry::Insert { text,.. } => text.chars().count(),
 }
}

fn compose_piece(a: DeltaEntry, b: DeltaEntry) -> DeltaEntry {
 match (a, b) {
 (DeltaEntry::Delete { len }, _) => DeltaEntry::Delete { len },
 (_, DeltaEntry::Delete { len }) => DeltaEntry::Delete { len },
 (DeltaEntry::Insert { text, attrs: a_attrs }, DeltaEntry::Retain { attrs: b_attrs,.. }) => {
 DeltaEntry::Insert { text, attrs: b_attrs.or(a_attrs) }
 }
 (DeltaEntry::Retain { len, attrs: a_attrs }, DeltaEntry::Retain { attrs: b_attrs,.. }) => {
 DeltaEntry::Retain { len, attrs: b_attrs.or(a_attrs) }
 }
 (a, _) => a,
 }
}

/// A cursor that can yield prefixes of the current entry without mutating the underlying slice,
/// used by compose/transform to walk two delta sequences in lock-step.
struct Cursor<'a> {
 entries: &'a [DeltaEntry],
 idx: usize,
 offset: usize,
}

impl<'a> Cursor<'a> {
 fn new(entries: &'a [DeltaEntry]) -> Self { Self { entries, idx: 0, offset: 0 } }

 fn peek(&self) -> Option<&'a DeltaEntry> { self.entries.get(self.idx) }

 fn advance_whole(&mut self) { self.idx += 1; self.offset = 0; }

 /// Take up to `max_len` characters from the current entry, returning an owned piece-entry
 /// and a tag for what kind it was. Advances past the entry if it's now exhausted.
 fn take(&mut self, max_len: usize) -> (DeltaEntry, EntryKind) {
 let e = self.entries[self.idx].clone();
 let full_len = entry_len(&e);
 let avail = full_len - self.offset;
 let take = avail.min(max_len);
 let piece = match &e {
 DeltaEntry::Retain { attrs,.. } => DeltaEntry::Retain { len: take, attrs: attrs.clone() },
 DeltaEntry::Delete {.. } => DeltaEntry::Delete { len: take },
 DeltaEntry::Insert { text, attrs } => {
 let chars: Vec<char> = text.chars().collect();
 let slice: String = chars[self.offset..self.offset + take].iter().collect();
 DeltaEntry::Insert { text: slice, attrs: attrs.clone() }
 }
 };
 self.offset += take;
 if self.offset >= full_len {
 self.advance_whole();
 }
 let kind = match e {
 DeltaEntry::Retain {.. } => EntryKind::Retain,
 DeltaEntry::Insert {.. } => EntryKind::Insert,
 DeltaEntry::Delete {.. } => EntryKind::Delete,
 };
 (piece, kind)
 }
}
