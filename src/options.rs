//! Parse configuration (A3): a plain struct with a `Default` impl, no
//! builder, no configuration-framework crate.

use std::collections::HashSet;

use crate::element::{Element, NodeId};

/// Segment-level sections the selective-read controller (C7) may be asked
/// to read in full.
pub const ALL_SECTIONS: &[&str] =
    &["Info", "Tracks", "Chapters", "Attachments", "Tags", "Cues", "Cluster", "SeekHead", "EBML"];

/// The `*common` meta-value: the sections read by default.
pub const COMMON_SECTIONS: &[&str] = &["Info", "Tracks", "Chapters", "Attachments"];

/// What the entry callback asks the reader to do after an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Abort,
}

/// Per-element callback invoked in document order (§5): once per
/// container right after its header is read, once per leaf right after
/// its value is decoded and cooked.
pub type EntryCallback<'a> = dyn FnMut(&Element, NodeId) -> Action + 'a;

/// Parse configuration (§6).
pub struct Options<'a> {
    /// Requested Segment-level sections, before meta-value expansion.
    /// Accepts literal names, `"*common"`, and `"*"`.
    pub include_sections: HashSet<String>,
    /// Byte cap per binary leaf; `-1` means unlimited. Ignored for `SeekID`.
    pub binary_size_limit: i64,
    /// Permit sequential Cluster scanning when SeekHead and tail-scan both
    /// fail to locate a requested section.
    pub exhaustive_search: bool,
    /// Keep the byte source attached to the returned document so the
    /// caller can seek and read attachment payloads after parsing.
    pub keep_stream_open: bool,
    /// Optional per-element callback; returning [`Action::Abort`] ends the
    /// parse early and the partial tree is returned.
    pub entry_callback: Option<Box<EntryCallback<'a>>>,
}

impl<'a> Default for Options<'a> {
    fn default() -> Self {
        Self {
            include_sections: COMMON_SECTIONS.iter().map(|s| s.to_string()).collect(),
            binary_size_limit: 16,
            exhaustive_search: false,
            keep_stream_open: false,
            entry_callback: None,
        }
    }
}

impl<'a> Options<'a> {
    /// Expand `*common` / `*` meta-values into the concrete section-name
    /// set the controller consults.
    pub fn resolved_sections(&self) -> HashSet<&'static str> {
        let mut out = HashSet::new();
        for requested in &self.include_sections {
            match requested.as_str() {
                "*" => out.extend(ALL_SECTIONS.iter().copied()),
                "*common" => out.extend(COMMON_SECTIONS.iter().copied()),
                other => {
                    if let Some(&canon) = ALL_SECTIONS.iter().find(|s| **s == other) {
                        out.insert(canon);
                    }
                }
            }
        }
        out
    }
}
