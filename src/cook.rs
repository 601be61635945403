//! Semantic post-processing (C9, §4.8): turns a raw numeric reading into
//! a meaningful one (time span, symbolic name) the moment its dependencies
//! are known, while leaving the raw value in place for callers that still
//! want it (§3 `rawValue` invariant, modeled here as `Element::cooked`
//! being an overlay rather than a destructive rewrite).
//!
//! Cooking never fails (§4.8): a rule with an unmet dependency simply
//! leaves the element raw and is retried when that dependency is cooked
//! (`recook_duration` below is the one case this crate needs, since
//! `TimecodeScale` may legitimately follow `Duration` in file order).

use std::io::{Read, Seek};

use crate::document::Document;
use crate::element::{Cooked, NodeId};

/// Parse-time state threaded through a single Segment's traversal. Not
/// part of the output tree (§9 "keep parse-time state in the core's own
/// state record only").
#[derive(Debug, Clone, Copy)]
pub struct CookState {
    pub timecode_scale: u64,
}

impl Default for CookState {
    fn default() -> Self {
        Self { timecode_scale: 1_000_000 }
    }
}

fn track_type_symbol(raw: u64) -> Option<&'static str> {
    match raw {
        1 => Some("Video"),
        2 => Some("Audio"),
        0x10 => Some("Logo"),
        0x11 => Some("Subtitle"),
        0x12 => Some("Buttons"),
        0x20 => Some("Control"),
        _ => None,
    }
}

/// Apply the cooking rule for `node`, if its name matches one of the
/// known semantic fields. Called by the reader immediately after a leaf's
/// value is decoded (§5 ordering guarantee: cooking precedes the entry
/// callback).
pub fn cook_leaf<R: Read + Seek>(doc: &mut Document<R>, state: &mut CookState, node: NodeId) {
    let name = doc.get(node).name;
    match name {
        "TimecodeScale" => {
            if let Some(scale) = doc.get(node).value.as_uint() {
                state.timecode_scale = scale;
            }
            if let Some(parent) = doc.get(node).parent {
                recook_duration(doc, state, parent);
            }
        }
        "Duration" => cook_duration(doc, state, node),
        "Timecode" | "CueTime" => cook_scaled_ns(doc, state, node),
        "ChapterTimeStart" | "ChapterTimeEnd" => cook_direct_ns(doc, node),
        "CueDuration" | "BlockDuration" => cook_scaled_ns(doc, state, node),
        "DefaultDuration" | "DefaultDecodedFieldDuration" => cook_default_duration(doc, node),
        "TrackType" => cook_track_type(doc, node),
        _ => {}
    }
}

fn cook_duration<R: Read + Seek>(doc: &mut Document<R>, state: &CookState, node: NodeId) {
    let Some(raw) = doc.get(node).value.as_float() else { return };
    let ns = (raw * state.timecode_scale as f64) as i64;
    doc.get_mut(node).cooked = Some(Cooked::nanos(ns));
}

/// Re-apply `Duration` cooking for an `Info` container whose `Duration`
/// child was already cooked under a now-superseded `TimecodeScale`
/// default (§4.8 "If a sibling Duration has already been parsed with a
/// raw float, rewrite it").
fn recook_duration<R: Read + Seek>(doc: &mut Document<R>, state: &CookState, info_node: NodeId) {
    if let Some(duration) = doc.child(info_node, "Duration") {
        cook_duration(doc, state, duration);
    }
}

fn cook_scaled_ns<R: Read + Seek>(doc: &mut Document<R>, state: &CookState, node: NodeId) {
    let Some(raw) = doc.get(node).value.as_uint() else { return };
    let ns = (raw as i64).saturating_mul(state.timecode_scale as i64);
    doc.get_mut(node).cooked = Some(Cooked::nanos(ns));
}

fn cook_direct_ns<R: Read + Seek>(doc: &mut Document<R>, node: NodeId) {
    let Some(raw) = doc.get(node).value.as_uint() else { return };
    doc.get_mut(node).cooked = Some(Cooked::nanos(raw as i64));
}

fn cook_default_duration<R: Read + Seek>(doc: &mut Document<R>, node: NodeId) {
    let Some(raw) = doc.get(node).value.as_uint() else { return };
    let is_video = doc
        .get(node)
        .parent
        .map(|track_entry| doc.child(track_entry, "Video").is_some())
        .unwrap_or(false);
    let fps = if is_video && raw > 0 { Some(1.0e9 / raw as f64) } else { None };
    doc.get_mut(node).cooked = Some(Cooked::Nanos { ns: raw as i64, fps });
}

fn cook_track_type<R: Read + Seek>(doc: &mut Document<R>, node: NodeId) {
    let Some(raw) = doc.get(node).value.as_uint() else { return };
    let Some(symbol) = track_type_symbol(raw) else {
        log::warn!("TrackType {raw} is not a recognized symbolic type");
        return;
    };
    doc.get_mut(node).cooked = Some(Cooked::Symbol(symbol));

    // Index the owning TrackEntry under its parent Tracks container by
    // symbolic name (§4.6 secondary index), so callers can enumerate e.g.
    // all video tracks without scanning.
    let Some(track_entry) = doc.get(node).parent else { return };
    let Some(tracks) = doc.get(track_entry).parent else { return };
    doc.index_secondary(tracks, symbol, track_entry);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, Value};
    use std::io::Cursor;

    fn leaf(name: &'static str, parent: Option<NodeId>, value: Value) -> Element {
        Element {
            name,
            id: 0,
            pos: 0,
            datapos: 0,
            size: 0,
            level: 1,
            path: format!("/{name}/"),
            parent,
            root: None,
            value,
            cooked: None,
            display_string: None,
            skipped: false,
        }
    }

    fn container(name: &'static str, parent: Option<NodeId>) -> Element {
        leaf(name, parent, Value::Container(Vec::new()))
    }

    #[test]
    fn duration_rewritten_on_late_timecode_scale() {
        let mut doc: Document<Cursor<Vec<u8>>> = Document::new();
        let info = doc.alloc(container("Info", None));
        let duration = doc.alloc(leaf("Duration", Some(info), Value::Float(123_456.0)));
        doc.push_child(info, duration);

        let mut state = CookState::default();
        cook_leaf(&mut doc, &mut state, duration);
        assert_eq!(doc.get(duration).cooked_nanos(), Some(123_456_000_000));

        let scale = doc.alloc(leaf("TimecodeScale", Some(info), Value::Uint(2_000_000)));
        doc.push_child(info, scale);
        cook_leaf(&mut doc, &mut state, scale);

        assert_eq!(state.timecode_scale, 2_000_000);
        assert_eq!(doc.get(duration).cooked_nanos(), Some(246_912_000_000));
    }

    #[test]
    fn track_type_indexes_by_symbol() {
        let mut doc: Document<Cursor<Vec<u8>>> = Document::new();
        let tracks = doc.alloc(container("Tracks", None));
        let entry = doc.alloc(container("TrackEntry", Some(tracks)));
        doc.push_child(tracks, entry);
        let track_type = doc.alloc(leaf("TrackType", Some(entry), Value::Uint(1)));
        doc.push_child(entry, track_type);

        let mut state = CookState::default();
        cook_leaf(&mut doc, &mut state, track_type);

        assert_eq!(doc.get(track_type).cooked_symbol(), Some("Video"));
        let video = doc.children(tracks, "Video");
        assert_eq!(video, vec![entry]);
    }
}
