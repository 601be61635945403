//! The parsed document (§3 "Root document", §6 entry point).
//!
//! Holds the element arena and the two top-level lists (`EBML`, `Segment`)
//! the format permits repeating for concatenated files. `find`/`closest`
//! are the out-of-core convenience accessors (§6): thin, regex-capable
//! tree walks layered on top of the arena, not part of the parsing engine.

use std::fmt;
use std::io::{Read, Seek};

use regex_lite::Regex;

use crate::element::{Cooked, Element, NodeId, Value};
use crate::error::Result;
use crate::options::Options;
use crate::source::Source;

/// A fully or partially parsed Matroska file.
pub struct Document<R> {
    nodes: Vec<Element>,
    /// Symbolic secondary index built during cooking (§4.6): maps a
    /// container node and a symbolic key (`"Video"`, `"Audio"`, ...) to
    /// the already-allocated child nodes that earned that key.
    secondary: std::collections::HashMap<(NodeId, &'static str), Vec<NodeId>>,
    pub ebml: Vec<NodeId>,
    pub segment: Vec<NodeId>,
    /// The byte source, retained only when `Options::keep_stream_open`.
    source: Option<Source<R>>,
}

impl<R: Read + Seek> Document<R> {
    pub(crate) fn new() -> Self {
        Self {
            nodes: Vec::new(),
            secondary: std::collections::HashMap::new(),
            ebml: Vec::new(),
            segment: Vec::new(),
            source: None,
        }
    }

    pub(crate) fn alloc(&mut self, element: Element) -> NodeId {
        self.nodes.push(element);
        self.nodes.len() - 1
    }

    pub fn get(&self, id: NodeId) -> &Element {
        &self.nodes[id]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Element {
        &mut self.nodes[id]
    }

    pub(crate) fn push_child(&mut self, parent: NodeId, child: NodeId) {
        if let Value::Container(children) = &mut self.get_mut(parent).value {
            children.push(child);
        }
    }

    pub(crate) fn index_secondary(&mut self, parent: NodeId, key: &'static str, child: NodeId) {
        self.secondary.entry((parent, key)).or_default().push(child);
    }

    pub(crate) fn attach_source(&mut self, source: Source<R>) {
        self.source = Some(source);
    }

    /// Hand back the byte source after parsing, for attachment extraction
    /// (`keep_stream_open`). Consumes the document.
    pub fn into_source(mut self) -> Option<Source<R>> {
        self.source.take()
    }

    pub fn source_mut(&mut self) -> Option<&mut Source<R>> {
        self.source.as_mut()
    }

    /// The single named child of `parent` in document order, or `None`.
    /// When the schema allows multiplicity there may be several; this
    /// returns the first.
    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.children(parent, name).into_iter().next()
    }

    /// All named children of `parent`, in document order, scanning both
    /// direct children and the symbolic secondary index (so `Tracks.Video`
    /// resolves the same way whether or not a literal element named
    /// `"Video"` exists).
    pub fn children(&self, parent: NodeId, name: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        if let Value::Container(children) = &self.get(parent).value {
            for &c in children {
                if self.get(c).name == name {
                    out.push(c);
                }
            }
        }
        if out.is_empty() {
            if let Some(v) = self.secondary.get(&(parent, name)) {
                out.extend(v.iter().copied());
            }
        }
        out
    }

    /// All descendants of the document whose path (or bare name) matches
    /// `pattern`, compiled as a regular expression.
    pub fn find(&self, pattern: &str) -> Result<Vec<NodeId>> {
        let re = Regex::new(pattern)
            .map_err(|e| crate::error::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())))?;
        let roots: Vec<NodeId> = self.ebml.iter().chain(self.segment.iter()).copied().collect();
        let mut out = Vec::new();
        for r in roots {
            self.find_from(r, &re, &mut out);
        }
        Ok(out)
    }

    fn find_from(&self, node: NodeId, re: &Regex, out: &mut Vec<NodeId>) {
        let e = self.get(node);
        if re.is_match(e.name) || re.is_match(&e.path) {
            out.push(node);
        }
        if let Value::Container(children) = &e.value {
            for &c in children {
                self.find_from(c, re, out);
            }
        }
    }

    /// Walk `node`'s parent chain upward, returning the nearest ancestor
    /// whose name matches `pattern`.
    pub fn closest(&self, node: NodeId, pattern: &str) -> Result<Option<NodeId>> {
        let re = Regex::new(pattern)
            .map_err(|e| crate::error::Error::Io(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())))?;
        let mut cur = self.get(node).parent;
        while let Some(id) = cur {
            if re.is_match(self.get(id).name) {
                return Ok(Some(id));
            }
            cur = self.get(id).parent;
        }
        Ok(None)
    }

    fn display_node(&self, node: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = self.get(node);
        let indent = "  ".repeat(e.level as usize);
        match &e.value {
            Value::Container(children) => {
                writeln!(f, "{indent}{}", e.name)?;
                for &c in children {
                    self.display_node(c, f)?;
                }
                Ok(())
            }
            other => {
                let shown = match (&e.cooked, &e.display_string) {
                    (Some(Cooked::Nanos { ns, .. }), _) => format!("{ns}ns"),
                    (Some(Cooked::Symbol(s)), _) => s.to_string(),
                    (None, Some(preview)) => format!("{preview:?}"),
                    (None, None) => match other {
                        Value::Uint(v) => v.to_string(),
                        Value::Int(v) => v.to_string(),
                        Value::Float(v) => v.to_string(),
                        Value::Str(v) => v.clone(),
                        Value::Bin(v) => format!("<{} bytes>", v.len()),
                        Value::Date(_) => "<date>".to_string(),
                        Value::Container(_) => unreachable!(),
                    },
                };
                writeln!(f, "{indent}{}: {shown}", e.name)
            }
        }
    }
}

/// A minimal, uncolored rendering of the parsed tree, standing in for the
/// out-of-core pretty-printer (§1 Non-goals).
impl<R: Read + Seek> fmt::Display for Document<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &r in &self.ebml {
            self.display_node(r, f)?;
        }
        for &r in &self.segment {
            self.display_node(r, f)?;
        }
        Ok(())
    }
}

/// Parse a Matroska/EBML stream into a [`Document`].
pub fn parse<R: Read + Seek>(reader: R, options: &mut Options) -> Result<Document<R>> {
    crate::reader::parse(reader, options)
}
