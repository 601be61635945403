//! Element reader (C5, §4.5): reads one header at a time, resolves its
//! schema entry, decides whether to read or skip its payload, decodes or
//! recurses, cooks, and appends it to its parent. This is the component
//! the other six assemble around.

use std::collections::HashSet;
use std::io::{Read, Seek};

use crate::cook::{self, CookState};
use crate::document::Document;
use crate::element::{Element, NodeId, Value};
use crate::error::{Error, Result};
use crate::options::{Action, Options};
use crate::schema::{self, Kind};
use crate::seek::Controller;
use crate::source::Source;
use crate::value;
use crate::vint::VInt;

const EBML_ID: u64 = 0x1A45DFA3;
const SEGMENT_ID: u64 = 0x18538067;

/// Whether the caller's entry callback has asked to stop.
enum Flow {
    Continue,
    Stop,
}

/// Parse a full Matroska/EBML stream (§6 entry point).
pub fn parse<R: Read + Seek>(reader: R, options: &mut Options) -> Result<Document<R>> {
    let mut source = Source::new(reader)?;
    crate::root::locate(&mut source)?;

    let mut doc = Document::new();
    let wanted: HashSet<&'static str> = options.resolved_sections();

    'documents: loop {
        let pos = match source.position() {
            Ok(p) if p < source.len() => p,
            _ => break,
        };
        source.seek_to(pos)?;
        let id = match VInt::read_id(&mut source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) at top-level offset {pos}, stopping");
                break;
            }
            Err(e) => return Err(e),
        };
        let size = match VInt::read_size(&mut source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) at top-level offset {pos}, stopping");
                break;
            }
            Err(e) => return Err(e),
        };
        let datapos = source.position()?;

        match *id {
            EBML_ID => {
                let end = if size.is_unknown { source.len() } else { datapos + *size };
                let node = doc.alloc(Element {
                    name: "EBML",
                    id: *id,
                    pos,
                    datapos,
                    size: end.saturating_sub(datapos),
                    level: 0,
                    path: "/EBML/".to_string(),
                    parent: None,
                    root: None,
                    value: Value::Container(Vec::new()),
                    cooked: None,
                    display_string: None,
                    skipped: false,
                });
                doc.get_mut(node).root = Some(node);
                let mut state = CookState::default();
                let end_bound = if size.is_unknown { None } else { Some(end) };
                let final_end = read_children(
                    &mut doc, &mut source, node, "EBML", end_bound, 1, "/EBML/", &mut state, options,
                    node,
                )?;
                doc.get_mut(node).size = final_end.saturating_sub(datapos);
                doc.ebml.push(node);
            }
            SEGMENT_ID => {
                let node = read_segment(&mut doc, &mut source, options, &wanted, pos, &id, &size, datapos)?;
                doc.segment.push(node);
            }
            other => {
                log::warn!("unexpected top-level id 0x{other:X}, stopping");
                break 'documents;
            }
        }

        if source.position()? >= source.len() {
            break;
        }
    }

    if options.keep_stream_open {
        doc.attach_source(source);
    }

    Ok(doc)
}

#[allow(clippy::too_many_arguments)]
fn read_segment<R: Read + Seek>(
    doc: &mut Document<R>,
    source: &mut Source<R>,
    options: &mut Options,
    wanted: &HashSet<&'static str>,
    pos: u64,
    id: &VInt,
    size: &VInt,
    datapos: u64,
) -> Result<NodeId> {
    let end = if size.is_unknown { source.len() } else { datapos + **size };

    let segment = doc.alloc(Element {
        name: "Segment",
        id: **id,
        pos,
        datapos,
        size: end.saturating_sub(datapos),
        level: 0,
        path: "/Segment/".to_string(),
        parent: None,
        root: None,
        value: Value::Container(Vec::new()),
        cooked: None,
        display_string: None,
        skipped: false,
    });
    doc.get_mut(segment).root = Some(segment);

    let mut state = CookState::default();
    let mut controller = Controller::new(wanted.clone(), options.exhaustive_search);

    let mut cur = datapos;
    'outer: loop {
        if cur >= end {
            break;
        }
        source.seek_to(cur)?;
        let child_id = match VInt::read_id(source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) while scanning Segment at offset {cur}, stopping");
                break;
            }
            Err(e) => return Err(e),
        };
        if size.is_unknown && !schema::is_legal_child("Segment", *child_id) {
            break;
        }
        let child_size = match VInt::read_size(source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) while scanning Segment at offset {cur}, stopping");
                break;
            }
            Err(e) => return Err(e),
        };
        let header_pos = cur;
        let child_datapos = source.position()?;
        let entry = schema::lookup(*child_id);
        let name = entry.map(|e| e.name).unwrap_or("?");
        let known_end = if child_size.is_unknown { None } else { Some(child_datapos + *child_size) };

        if name == "SeekHead" {
            let child_end = known_end.unwrap_or(end);
            let (node, flow) = read_one(
                doc, source, segment, "Segment", header_pos, &child_id, &child_size, child_datapos,
                child_end, entry, 1, "/Segment/", &mut state, options, segment,
            )?;
            controller.merge_seek_head(doc, node, datapos);
            controller.mark_found("SeekHead");
            cur = doc.get(node).datapos + doc.get(node).size;
            if matches!(flow, Flow::Stop) {
                break 'outer;
            }
            continue;
        }

        if controller.should_read(name) {
            let child_end = known_end.unwrap_or(end);
            let (node, flow) = read_one(
                doc, source, segment, "Segment", header_pos, &child_id, &child_size, child_datapos,
                child_end, entry, 1, "/Segment/", &mut state, options, segment,
            )?;
            controller.mark_found(name);
            cur = doc.get(node).datapos + doc.get(node).size;
            if matches!(flow, Flow::Stop) {
                break 'outer;
            }
            continue;
        }

        // Not wanted: skip the payload without reading it. An unknown-size
        // child's own bound is determined by ITS legal-children set (§4.5),
        // not the Segment's.
        let next = match known_end {
            Some(e) => e,
            None => skip_unknown_size(source, child_datapos, name)?,
        };
        cur = next;

        if !controller.is_satisfied() {
            if let Some((_, offset)) = controller.nearest_wanted_offset(cur) {
                source.seek_to(offset)?;
                cur = offset;
                continue;
            }
            if let Some((_, offset)) = controller.tail_scan(source, datapos, end)? {
                source.seek_to(offset)?;
                cur = offset;
                continue;
            }
            if !options.exhaustive_search {
                break;
            }
            // Exhaustive fallback: keep scanning sequentially from `cur`;
            // Clusters still get skipped cheaply by declared size unless
            // explicitly requested, but the Segment is no longer abandoned.
        }
    }

    doc.get_mut(segment).size = cur.saturating_sub(datapos);
    Ok(segment)
}

/// Read one element (leaf or container) whose header has already been
/// consumed, append it to `parent`, and return its node id plus whether
/// the caller's callback asked to stop.
#[allow(clippy::too_many_arguments)]
fn read_one<R: Read + Seek>(
    doc: &mut Document<R>,
    source: &mut Source<R>,
    parent: NodeId,
    parent_name: &str,
    pos: u64,
    id: &VInt,
    size: &VInt,
    datapos: u64,
    declared_end: u64,
    entry: Option<&'static schema::SchemaEntry>,
    level: u32,
    parent_path: &str,
    state: &mut CookState,
    options: &mut Options,
    root: NodeId,
) -> Result<(NodeId, Flow)> {
    let name = entry.map(|e| e.name).unwrap_or("?");
    let is_container = entry.map(|e| e.kind == Kind::Container).unwrap_or(false);
    let path = if is_container { format!("{parent_path}{name}/") } else { format!("{parent_path}{name}") };

    if is_container {
        let node = doc.alloc(Element {
            name,
            id: **id,
            pos,
            datapos,
            size: declared_end.saturating_sub(datapos),
            level,
            path: path.clone(),
            parent: Some(parent),
            root: Some(root),
            value: Value::Container(Vec::new()),
            cooked: None,
            display_string: None,
            skipped: false,
        });
        doc.push_child(parent, node);

        // Containers fire the callback right after their header is read
        // (§5), before any child is read, so an abort can skip the whole
        // subtree.
        let flow = run_callback(doc, options, node);
        if matches!(flow, Flow::Stop) {
            return Ok((node, Flow::Stop));
        }

        let child_end = if size.is_unknown { None } else { Some(declared_end) };
        let actual_end = read_children(doc, source, node, name, child_end, level + 1, &path, state, options, root)?;
        doc.get_mut(node).size = actual_end.saturating_sub(datapos);
        return Ok((node, Flow::Continue));
    }

    // Leaf.
    source.seek_to(datapos)?;
    let payload_size = declared_end.saturating_sub(datapos);
    let is_seek_id = name == "SeekID";

    // Unknown IDs are always opaque and skipped (§4.5): only a short
    // printable-ASCII preview is captured, never the full payload.
    let (value, skipped, display_string) = match entry {
        Some(e) => {
            let (value, skipped) =
                decode_leaf(source, e.kind, e.default, payload_size, options.binary_size_limit, is_seek_id, name)?;
            (value, skipped, None)
        }
        None => {
            let (preview, printable) = value::decode_unknown(source, payload_size)?;
            (Value::Bin(preview), true, printable)
        }
    };
    let node = doc.alloc(Element {
        name,
        id: **id,
        pos,
        datapos,
        size: payload_size,
        level,
        path,
        parent: Some(parent),
        root: Some(root),
        value,
        cooked: None,
        display_string,
        skipped,
    });
    doc.push_child(parent, node);
    cook::cook_leaf(doc, state, node);
    source.seek_to(datapos + payload_size)?;

    let flow = run_callback(doc, options, node);
    Ok((node, flow))
}

/// Invoke the caller's per-element callback, if any, in document order
/// (§5): once per container right after its header is read and once per
/// leaf right after decoding.
fn run_callback<R: Read + Seek>(doc: &Document<R>, options: &mut Options, node: NodeId) -> Flow {
    match options.entry_callback.as_mut() {
        Some(cb) => match cb(doc.get(node), node) {
            Action::Continue => Flow::Continue,
            Action::Abort => Flow::Stop,
        },
        None => Flow::Continue,
    }
}

/// Read every child of a container until `end` (or, for an unknown-size
/// container, until a sibling whose ID is not legal there, or EOF).
/// Returns the offset the reader actually stopped at.
#[allow(clippy::too_many_arguments)]
fn read_children<R: Read + Seek>(
    doc: &mut Document<R>,
    source: &mut Source<R>,
    parent: NodeId,
    parent_name: &str,
    end: Option<u64>,
    level: u32,
    parent_path: &str,
    state: &mut CookState,
    options: &mut Options,
    root: NodeId,
) -> Result<u64> {
    let mut cur = source.position()?;
    loop {
        if let Some(e) = end {
            if cur >= e {
                break;
            }
        } else if cur >= source.len() {
            break;
        }
        source.seek_to(cur)?;
        let id = match VInt::read_id(source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) in {parent_name} at offset {cur}, stopping");
                break;
            }
            Err(e) => return Err(e),
        };
        if end.is_none() && !schema::is_legal_child(parent_name, *id) {
            break;
        }
        let size = match VInt::read_size(source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) in {parent_name} at offset {cur}, stopping");
                break;
            }
            Err(e) => return Err(e),
        };
        let pos = cur;
        let datapos = source.position()?;
        let entry = schema::lookup(*id);

        let declared_end = if size.is_unknown {
            // Nested unknown-size container: bound discovered recursively.
            source.len()
        } else {
            datapos + *size
        };

        let (node, flow) = read_one(
            doc, source, parent, parent_name, pos, &id, &size, datapos, declared_end, entry, level,
            parent_path, state, options, root,
        )?;
        cur = doc.get(node).datapos + doc.get(node).size;
        if matches!(flow, Flow::Stop) {
            break;
        }
    }
    Ok(cur)
}

#[allow(clippy::too_many_arguments)]
fn decode_leaf<R: Read + Seek>(
    source: &mut Source<R>,
    kind: Kind,
    default: Option<schema::Default>,
    size: u64,
    binary_limit: i64,
    is_seek_id: bool,
    name: &str,
) -> Result<(Value, bool)> {
    if size == 0 {
        return Ok((default_value(kind, default), false));
    }
    match kind {
        Kind::Uint => Ok((Value::Uint(value::decode_uint(&read_n(source, size)?)), false)),
        Kind::Int => Ok((Value::Int(value::decode_int(&read_n(source, size)?)), false)),
        Kind::Float => {
            if !matches!(size, 4 | 8 | 10) {
                log::warn!("{name}: unexpected float size {size}");
            }
            Ok((Value::Float(value::decode_float(&read_n(source, size)?)), false))
        }
        Kind::Date => Ok((Value::Date(value::decode_date(&read_n(source, size)?)), false)),
        Kind::String => Ok((Value::Str(value::decode_string(&read_n(source, size)?)), false)),
        Kind::Binary => {
            let (bytes, truncated) = value::decode_binary(source, size, binary_limit, is_seek_id)?;
            Ok((Value::Bin(bytes), truncated))
        }
        Kind::Container => unreachable!("containers are handled by read_one"),
    }
}

/// The value a zero-sized element takes: its schema-declared default if
/// one exists (§4.3), otherwise a type-appropriate zero.
fn default_value(kind: Kind, default: Option<schema::Default>) -> Value {
    match default {
        Some(schema::Default::Uint(v)) => Value::Uint(v),
        Some(schema::Default::Float(v)) => Value::Float(v),
        Some(schema::Default::Str(v)) => Value::Str(v.to_string()),
        None => zero_value(kind),
    }
}

fn zero_value(kind: Kind) -> Value {
    match kind {
        Kind::Uint => Value::Uint(0),
        Kind::Int => Value::Int(0),
        Kind::Float => Value::Float(0.0),
        Kind::Date => Value::Date(std::time::SystemTime::UNIX_EPOCH),
        Kind::String => Value::Str(String::new()),
        Kind::Binary => Value::Bin(Vec::new()),
        Kind::Container => Value::Container(Vec::new()),
    }
}

fn read_n<R: Read + Seek>(source: &mut Source<R>, n: u64) -> Result<Vec<u8>> {
    let offset = source.position()?;
    if n > usize::MAX as u64 || offset + n > source.len() {
        return Err(Error::TruncatedElement { offset, size: n });
    }
    source.read_exact(n as usize)
}

/// Skip forward past an unknown-size container that is itself being
/// skipped (not read): locate the next sibling ID that is not legal in
/// `parent_name`, scanning one candidate header at a time.
fn skip_unknown_size<R: Read + Seek>(source: &mut Source<R>, start: u64, parent_name: &str) -> Result<u64> {
    let mut cur = start;
    let len = source.len();
    loop {
        if cur >= len {
            return Ok(len);
        }
        source.seek_to(cur)?;
        let id = match VInt::read_id(source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) skipping {parent_name} at offset {cur}, stopping");
                return Ok(cur);
            }
            Err(e) => return Err(e),
        };
        if !schema::is_legal_child(parent_name, *id) {
            return Ok(cur);
        }
        let size = match VInt::read_size(source) {
            Ok(v) => v,
            Err(Error::InvalidVInt { byte }) => {
                log::warn!("invalid vint (leading byte 0x{byte:02X}) skipping {parent_name} at offset {cur}, stopping");
                return Ok(cur);
            }
            Err(e) => return Err(e),
        };
        let datapos = source.position()?;
        cur = if size.is_unknown { skip_unknown_size(source, datapos, parent_name)? } else { datapos + *size };
    }
}
