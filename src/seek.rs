//! Selective-read controller (C7, §4.7): decides which Segment-level
//! sections get their payload read, and how to reach the ones that are
//! wanted but lie past a big skippable section, without reading Clusters.
//!
//! `SeekHead` is always parsed in full the moment it is encountered,
//! regardless of `include_sections` — the controller needs its index to
//! do its job, the same way it always skips straight past the first
//! `Cluster` it meets unless that section was actually requested.

use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek};

use crate::document::Document;
use crate::element::NodeId;
use crate::error::Result;
use crate::source::Source;
use crate::value;
use crate::vint::VInt;

/// Top-level Segment child IDs the tail scan knows how to recognize by
/// byte signature (§4.7 step 4).
const TOP_LEVEL_IDS: &[(u64, &str)] = &[
    (0x1254C367, "Tags"),
    (0x114D9B74, "SeekHead"),
    (0x1F43B675, "Cluster"),
    (0x1C53BB6B, "Cues"),
    (0x1043A770, "Chapters"),
    (0x1941A469, "Attachments"),
    (0x1654AE6B, "Tracks"),
    (0x1549A966, "Info"),
];

const TAIL_SCAN_STEP: u64 = 4096;
const TAIL_SCAN_BOUND: u64 = 1 << 20;

/// Running state of the selective-read controller across one Segment.
#[derive(Default)]
pub struct Controller {
    /// Sections still to be located, by schema name.
    pub wanted: HashSet<&'static str>,
    /// Sections already read.
    pub found: HashSet<&'static str>,
    /// Offsets resolved from one or more SeekHead indexes, absolute from
    /// the start of the stream.
    index: HashMap<&'static str, u64>,
    pub exhaustive_search: bool,
    /// Set once a tail scan has run for this Segment (it runs at most once).
    tail_scanned: bool,
}

impl Controller {
    pub fn new(wanted: HashSet<&'static str>, exhaustive_search: bool) -> Self {
        Self { wanted, exhaustive_search, ..Default::default() }
    }

    pub fn mark_found(&mut self, name: &'static str) {
        self.wanted.remove(name);
        self.found.insert(name);
    }

    pub fn is_satisfied(&self) -> bool {
        self.wanted.is_empty()
    }

    pub fn should_read(&self, name: &str) -> bool {
        name == "SeekHead" || self.wanted.contains(name)
    }

    /// Merge a freshly parsed `SeekHead` node's `Seek` entries into the
    /// controller's index.
    pub fn merge_seek_head<R: Read + Seek>(
        &mut self,
        doc: &Document<R>,
        seekhead_node: NodeId,
        segment_datapos: u64,
    ) {
        for seek_node in doc.children(seekhead_node, "Seek") {
            let Some(id_node) = doc.child(seek_node, "SeekID") else { continue };
            let Some(pos_node) = doc.child(seek_node, "SeekPosition") else { continue };
            let Some(id_bytes) = doc.get(id_node).value.as_bin() else { continue };
            let Some(pos) = doc.get(pos_node).value.as_uint() else { continue };
            let id = value::decode_uint(id_bytes);
            let Some(name) = crate::schema::lookup(id).map(|e| e.name) else { continue };
            self.index.insert(name, segment_datapos + pos);
        }
    }

    /// The SeekHead-directed offset for a still-wanted section, if known.
    pub fn resolved_offset(&self, name: &str) -> Option<u64> {
        self.index.get(name).copied()
    }

    /// The nearest still-wanted offset the index knows about, used to pick
    /// the next seek target (§4.7 step 2 "seek to the nearest such position").
    pub fn nearest_wanted_offset(&self, after: u64) -> Option<(&'static str, u64)> {
        self.wanted
            .iter()
            .filter_map(|&name| self.index.get(name).map(|&off| (name, off)))
            .filter(|(_, off)| *off >= after)
            .min_by_key(|(_, off)| *off)
            .or_else(|| {
                self.wanted
                    .iter()
                    .filter_map(|&name| self.index.get(name).map(|&off| (name, off)))
                    .min_by_key(|(_, off)| *off)
            })
    }

    /// Run a tail scan once per Segment (§4.7 step 4): step backward from
    /// `segment_end` in ~4 KiB chunks, bounded to ~1 MiB, looking for a
    /// still-wanted top-level element whose declared end lines up exactly
    /// with `segment_end`.
    pub fn tail_scan<R: Read + Seek>(
        &mut self,
        source: &mut Source<R>,
        segment_datapos: u64,
        segment_end: u64,
    ) -> Result<Option<(&'static str, u64)>> {
        if self.tail_scanned {
            return Ok(None);
        }
        self.tail_scanned = true;

        let mut window_end = segment_end;
        let mut scanned = 0u64;
        while scanned < TAIL_SCAN_BOUND && window_end > segment_datapos {
            let chunk_start = window_end.saturating_sub(TAIL_SCAN_STEP).max(segment_datapos);
            let len = (window_end - chunk_start) as usize;
            if len < 4 {
                break;
            }
            source.seek_to(chunk_start)?;
            let buf = source.read_exact(len)?;
            for i in 0..=buf.len() - 4 {
                let candidate = u32::from_be_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]) as u64;
                let Some(&(_, name)) = TOP_LEVEL_IDS.iter().find(|(id, _)| *id == candidate) else {
                    continue;
                };
                if !self.wanted.contains(name) {
                    continue;
                }
                let pos = chunk_start + i as u64;
                if let Some(end) = self.verify_candidate(source, pos, candidate, segment_end)? {
                    debug_assert_eq!(end, segment_end);
                    self.index.insert(name, pos);
                    return Ok(Some((name, pos)));
                }
            }
            window_end = chunk_start;
            scanned += len as u64;
        }
        Ok(None)
    }

    fn verify_candidate<R: Read + Seek>(
        &self,
        source: &mut Source<R>,
        pos: u64,
        expected_id: u64,
        segment_end: u64,
    ) -> Result<Option<u64>> {
        source.seek_to(pos)?;
        let id = match VInt::read_id(source) {
            Ok(v) => v,
            Err(crate::error::Error::InvalidVInt { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if *id != expected_id {
            return Ok(None);
        }
        let size = match VInt::read_size(source) {
            Ok(v) => v,
            Err(crate::error::Error::InvalidVInt { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        if size.is_unknown {
            return Ok(None);
        }
        let datapos = source.position()?;
        let end = datapos + *size;
        Ok(if end == segment_end { Some(end) } else { None })
    }
}
