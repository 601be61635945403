//! The element tree (§3): an arena of nodes addressed by index rather than
//! owning `parent`/`root` pointers, which would otherwise form reference
//! cycles (§9 "cyclic parent/root back-references").

use std::time::SystemTime;

/// Index of a node within a [`crate::document::Document`]'s arena.
pub type NodeId = usize;

/// The decoded value of a leaf element, or the child map of a container.
#[derive(Debug, Clone)]
pub enum Value {
    Uint(u64),
    Int(i64),
    Float(f64),
    Date(SystemTime),
    Str(String),
    Bin(Vec<u8>),
    /// A container's payload: an insertion-ordered name -> children mapping.
    /// Stored on the node itself as the list of child `NodeId`s in on-disk
    /// order; grouping by name is reconstructed by [`Element::child`] and
    /// [`Element::children`] so a single representation serves both the
    /// "single vs list" view and the raw document-order view.
    Container(Vec<NodeId>),
}

impl Value {
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_bin(&self) -> Option<&[u8]> {
        match self {
            Value::Bin(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn children(&self) -> Option<&[NodeId]> {
        match self {
            Value::Container(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self, Value::Container(_))
    }
}

/// A replacement value for the visible value of a node whose raw reading
/// has been "cooked" (§4.8) into something more meaningful: a duration
/// expressed in nanoseconds, or a symbolic name.
#[derive(Debug, Clone)]
pub enum Cooked {
    /// A duration in nanoseconds, derived from a raw tick count. `fps`
    /// is set only for a video track's `DefaultDuration` (§4.8: "for
    /// video tracks, also compute fps = 1e9 / raw").
    Nanos { ns: i64, fps: Option<f64> },
    /// A symbolic replacement for a raw numeric code (e.g. TrackType).
    Symbol(&'static str),
}

impl Cooked {
    pub fn nanos(ns: i64) -> Self {
        Cooked::Nanos { ns, fps: None }
    }
}

/// A single parsed node: either a leaf with a typed [`Value`] or a
/// container whose value is [`Value::Container`].
#[derive(Debug, Clone)]
pub struct Element {
    pub name: &'static str,
    pub id: u64,
    pub pos: u64,
    pub datapos: u64,
    pub size: u64,
    pub level: u32,
    pub path: String,
    pub parent: Option<NodeId>,
    /// The owning top-level `EBML` or `Segment` node.
    pub root: Option<NodeId>,
    pub value: Value,
    /// Set once the raw value has been replaced by a cooked form; the
    /// original numeric reading, preserved per the §3 `rawValue` invariant.
    pub cooked: Option<Cooked>,
    pub display_string: Option<String>,
    /// True if the payload was intentionally not read (skipped section,
    /// over the binary size limit, or an unknown element).
    pub skipped: bool,
}

impl Element {
    pub fn is_container(&self) -> bool {
        self.value.is_container()
    }

    /// Nanosecond form of a cooked time value, if this element was cooked
    /// into one.
    pub fn cooked_nanos(&self) -> Option<i64> {
        match self.cooked {
            Some(Cooked::Nanos { ns, .. }) => Some(ns),
            _ => None,
        }
    }

    pub fn cooked_fps(&self) -> Option<f64> {
        match self.cooked {
            Some(Cooked::Nanos { fps, .. }) => fps,
            _ => None,
        }
    }

    /// Symbolic form of a cooked value, if this element was cooked into one.
    pub fn cooked_symbol(&self) -> Option<&'static str> {
        match self.cooked {
            Some(Cooked::Symbol(s)) => Some(s),
            _ => None,
        }
    }
}
