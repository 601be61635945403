//! End-to-end fixtures built as raw EBML byte streams, exercising the
//! selective-read controller, cooking, and the recursive/secondary-index
//! bookkeeping together rather than any one module in isolation.

use std::io::Cursor;

use mkv_tree::element::Value;
use mkv_tree::{parse, Action, Options};

const EBML_ID: u64 = 0x1A45DFA3;
const SEGMENT_ID: u64 = 0x18538067;
const INFO_ID: u64 = 0x1549A966;
const TIMECODE_SCALE_ID: u64 = 0x2AD7B1;
const DURATION_ID: u64 = 0x4489;
const TRACKS_ID: u64 = 0x1654AE6B;
const TRACK_ENTRY_ID: u64 = 0xAE;
const TRACK_NUMBER_ID: u64 = 0xD7;
const TRACK_TYPE_ID: u64 = 0x83;
const VOID_ID: u64 = 0xEC;
const TAGS_ID: u64 = 0x1254C367;
const TAG_ID: u64 = 0x7373;
const TARGETS_ID: u64 = 0x63C0;
const SIMPLE_TAG_ID: u64 = 0x67C8;
const TAG_NAME_ID: u64 = 0x45A3;
const TAG_STRING_ID: u64 = 0x4487;
const SEEK_HEAD_ID: u64 = 0x114D9B74;
const SEEK_ID: u64 = 0x4DBB;
const SEEK_ID_FIELD_ID: u64 = 0x53AB;
const SEEK_POSITION_ID: u64 = 0x53AC;
const ATTACHMENTS_ID: u64 = 0x1941A469;
const ATTACHED_FILE_ID: u64 = 0x61A7;
const FILE_NAME_ID: u64 = 0x466E;
const FILE_MEDIA_TYPE_ID: u64 = 0x4660;
const FILE_DATA_ID: u64 = 0x465C;
const FILE_UID_ID: u64 = 0x46AE;
const CHAPTERS_ID: u64 = 0x1043A770;
const EDITION_ENTRY_ID: u64 = 0x45B9;
const CHAPTER_ATOM_ID: u64 = 0xB6;
const CHAPTER_UID_ID: u64 = 0x73C4;
const CHAPTER_TIME_START_ID: u64 = 0x91;
const CHAPTER_DISPLAY_ID: u64 = 0x80;
const CHAP_STRING_ID: u64 = 0x85;

fn enc_id(id: u64) -> Vec<u8> {
    let be = id.to_be_bytes();
    let start = be.iter().position(|&b| b != 0).unwrap_or(7);
    be[start..].to_vec()
}

fn enc_size(value: u64) -> Vec<u8> {
    for k in 1u32..=8 {
        let max = if 7 * k >= 64 { u64::MAX - 1 } else { (1u64 << (7 * k)) - 2 };
        if value <= max {
            let marker: u8 = 1 << (8 - k);
            let be = value.to_be_bytes();
            let mut bytes = be[8 - k as usize..].to_vec();
            bytes[0] |= marker;
            return bytes;
        }
    }
    unreachable!("value too large for an 8-byte VINT")
}

fn elem(id: u64, payload: &[u8]) -> Vec<u8> {
    let mut out = enc_id(id);
    out.extend(enc_size(payload.len() as u64));
    out.extend_from_slice(payload);
    out
}

fn uint(v: u64) -> Vec<u8> {
    let be = v.to_be_bytes();
    let start = be.iter().position(|&b| b != 0).unwrap_or(7);
    be[start..].to_vec()
}

fn ebml_header() -> Vec<u8> {
    elem(EBML_ID, &elem(0x4282, b"matroska"))
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn duration_only_fast_path() {
    init();
    let info = elem(
        INFO_ID,
        &[elem(TIMECODE_SCALE_ID, &uint(2_000_000)), elem(DURATION_ID, &2000.0f64.to_be_bytes())].concat(),
    );
    let segment_payload = info;
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &segment_payload));

    let mut options = Options::default();
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    let info_node = doc.child(segment, "Info").unwrap();
    let duration = doc.child(info_node, "Duration").unwrap();
    // 2000 ticks * 2_000_000 ns/tick = 4_000_000_000 ns.
    assert_eq!(doc.get(duration).cooked_nanos(), Some(4_000_000_000));
}

#[test]
fn track_type_indexes_video_track() {
    let track_entry = elem(
        TRACK_ENTRY_ID,
        &[elem(TRACK_NUMBER_ID, &uint(1)), elem(TRACK_TYPE_ID, &uint(1))].concat(),
    );
    let tracks = elem(TRACKS_ID, &track_entry);
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &tracks));

    let mut options = Options::default();
    options.include_sections = ["Tracks".to_string()].into_iter().collect();
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    let tracks_node = doc.child(segment, "Tracks").unwrap();
    let video = doc.children(tracks_node, "Video");
    assert_eq!(video.len(), 1);
    let track_type = doc.child(video[0], "TrackType").unwrap();
    assert_eq!(doc.get(track_type).cooked_symbol(), Some("Video"));
}

#[test]
fn tail_scan_locates_trailing_tags_without_seek_head() {
    let info = elem(INFO_ID, &elem(TIMECODE_SCALE_ID, &uint(1_000_000)));
    // A chunky, unrequested section standing between Info and Tags; it is
    // never read (the tail scan jumps straight to Tags), only its declared
    // size has to be honest so the byte layout is well-formed.
    let filler = elem(VOID_ID, &vec![0u8; 512]);
    let tags = elem(
        TAGS_ID,
        &elem(
            TAG_ID,
            &[elem(TARGETS_ID, &[]), elem(SIMPLE_TAG_ID, &[elem(TAG_NAME_ID, b"TITLE"), elem(TAG_STRING_ID, b"Example")].concat())].concat(),
        ),
    );

    let segment_payload = [info, filler, tags].concat();
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &segment_payload));

    let mut options = Options::default();
    options.include_sections = ["Tags".to_string()].into_iter().collect();
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    let tags_node = doc.child(segment, "Tags").expect("Tags should be found via tail scan");
    let tag = doc.child(tags_node, "Tag").unwrap();
    let simple_tag = doc.child(tag, "SimpleTag").unwrap();
    let name = doc.child(simple_tag, "TagName").unwrap();
    assert_eq!(doc.get(name).value.as_str(), Some("TITLE"));
}

#[test]
fn seek_head_redirects_past_unrequested_section() {
    let info = elem(INFO_ID, &elem(TIMECODE_SCALE_ID, &uint(1_000_000)));
    let filler = elem(VOID_ID, &vec![0u8; 64]);
    let tags = elem(TAGS_ID, &elem(TAG_ID, &elem(TARGETS_ID, &[])));

    // Segment-relative offset of Tags: right after SeekHead (placeholder
    // sized below), Info, and filler.
    let seek_head_placeholder_len = {
        let dummy_seek = elem(SEEK_ID, &[elem(SEEK_ID_FIELD_ID, &enc_id(TAGS_ID)), elem(SEEK_POSITION_ID, &uint(0))].concat());
        elem(SEEK_HEAD_ID, &dummy_seek).len()
    };
    let tags_offset = (seek_head_placeholder_len + info.len() + filler.len()) as u64;

    let seek_head = elem(
        SEEK_HEAD_ID,
        &elem(SEEK_ID, &[elem(SEEK_ID_FIELD_ID, &enc_id(TAGS_ID)), elem(SEEK_POSITION_ID, &uint(tags_offset))].concat()),
    );
    assert_eq!(seek_head.len(), seek_head_placeholder_len);

    let segment_payload = [seek_head, info, filler, tags].concat();
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &segment_payload));

    let mut options = Options::default();
    options.include_sections = ["Tags".to_string()].into_iter().collect();
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    let tags_node = doc.child(segment, "Tags").expect("Tags should be found via SeekHead redirect");
    assert!(doc.child(tags_node, "Tag").is_some());
}

#[test]
fn attachment_payload_recoverable_after_truncation() {
    let payload = b"PNG-ish-bytes-longer-than-the-limit".to_vec();
    let attached_file = elem(
        ATTACHED_FILE_ID,
        &[
            elem(FILE_NAME_ID, b"cover.png"),
            elem(FILE_MEDIA_TYPE_ID, b"image/png"),
            elem(FILE_UID_ID, &uint(42)),
            elem(FILE_DATA_ID, &payload),
        ]
        .concat(),
    );
    let attachments = elem(ATTACHMENTS_ID, &attached_file);
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &attachments));

    let mut options = Options::default();
    options.include_sections = ["Attachments".to_string()].into_iter().collect();
    options.binary_size_limit = 4;
    options.keep_stream_open = true;
    let mut doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    let attachments_node = doc.child(segment, "Attachments").unwrap();
    let file_node = doc.child(attachments_node, "AttachedFile").unwrap();
    let file_data = doc.child(file_node, "FileData").unwrap();
    let element = doc.get(file_data).clone();
    assert!(element.skipped);
    assert_eq!(element.value.as_bin().unwrap().len(), 4);

    let source = doc.source_mut().expect("keep_stream_open retains the source");
    source.seek_to(element.datapos).unwrap();
    let full = source.read_exact(element.size as usize).unwrap();
    assert_eq!(full, payload);
}

#[test]
fn recursive_chapter_atom_nests_and_cooks() {
    let inner_atom = elem(
        CHAPTER_ATOM_ID,
        &[elem(CHAPTER_UID_ID, &uint(2)), elem(CHAPTER_TIME_START_ID, &uint(5_000_000_000))].concat(),
    );
    let outer_atom = elem(
        CHAPTER_ATOM_ID,
        &[
            elem(CHAPTER_UID_ID, &uint(1)),
            elem(CHAPTER_TIME_START_ID, &uint(1_000_000_000)),
            elem(CHAPTER_DISPLAY_ID, &elem(CHAP_STRING_ID, b"Chapter One")),
            inner_atom,
        ]
        .concat(),
    );
    let edition = elem(EDITION_ENTRY_ID, &outer_atom);
    let chapters = elem(CHAPTERS_ID, &edition);
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &chapters));

    let mut options = Options::default();
    options.include_sections = ["Chapters".to_string()].into_iter().collect();
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    let chapters_node = doc.child(segment, "Chapters").unwrap();
    let edition_node = doc.child(chapters_node, "EditionEntry").unwrap();
    let outer_node = doc.child(edition_node, "ChapterAtom").unwrap();
    let start = doc.child(outer_node, "ChapterTimeStart").unwrap();
    assert_eq!(doc.get(start).cooked_nanos(), Some(1_000_000_000));

    let inner_node = doc.children(outer_node, "ChapterAtom");
    assert_eq!(inner_node.len(), 1);
    let inner_start = doc.child(inner_node[0], "ChapterTimeStart").unwrap();
    assert_eq!(doc.get(inner_start).cooked_nanos(), Some(5_000_000_000));
}

#[test]
fn abort_callback_stops_the_parse_early() {
    let track_entry = elem(
        TRACK_ENTRY_ID,
        &[elem(TRACK_NUMBER_ID, &uint(1)), elem(TRACK_TYPE_ID, &uint(1))].concat(),
    );
    let tracks = elem(TRACKS_ID, &track_entry);
    let info = elem(INFO_ID, &elem(TIMECODE_SCALE_ID, &uint(1_000_000)));
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &[info, tracks].concat()));

    let mut options = Options::default();
    options.include_sections = ["Info".to_string(), "Tracks".to_string()].into_iter().collect();
    options.entry_callback = Some(Box::new(|element, _id| {
        if element.name == "Tracks" { Action::Abort } else { Action::Continue }
    }));
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    assert!(doc.child(segment, "Info").is_some());
    // Tracks' header was seen (it fired the callback) but its children,
    // which would follow the abort, were never read.
    let tracks_node = doc.child(segment, "Tracks");
    if let Some(node) = tracks_node {
        assert!(doc.get(node).value.children().unwrap().is_empty());
    }
}

/// Universal structural invariants (every node's byte range nests inside
/// its parent's, and `path` is the slash-joined chain of ancestor names).
#[test]
fn structural_invariants_hold_across_the_tree() {
    let info = elem(INFO_ID, &elem(TIMECODE_SCALE_ID, &uint(1_000_000)));
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &info));

    let mut options = Options::default();
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    fn check(doc: &mkv_tree::Document<Cursor<Vec<u8>>>, node: mkv_tree::element::NodeId) {
        let e = doc.get(node);
        if let Some(parent) = e.parent {
            let p = doc.get(parent);
            assert!(e.datapos >= p.datapos);
            assert!(e.datapos + e.size <= p.datapos + p.size);
            assert!(e.path.starts_with(&p.path));
        }
        if let Value::Container(children) = &e.value {
            for &c in children {
                check(doc, c);
            }
        }
    }

    for &r in doc.ebml.iter().chain(doc.segment.iter()) {
        check(&doc, r);
    }
}

#[test]
fn unknown_element_is_opaque_and_skipped() {
    const UNKNOWN_ID: u64 = 0xFE; // a syntactically valid 1-byte ID, never assigned by the schema.
    let info = elem(
        INFO_ID,
        &[elem(TIMECODE_SCALE_ID, &uint(1_000_000)), elem(UNKNOWN_ID, b"vendor extension data")].concat(),
    );
    let mut data = ebml_header();
    data.extend(elem(SEGMENT_ID, &info));

    let mut options = Options::default();
    let doc = parse(Cursor::new(data), &mut options).unwrap();

    let segment = doc.segment[0];
    let info_node = doc.child(segment, "Info").unwrap();
    let unknown = doc.child(info_node, "?").expect("unrecognized element is kept under the \"?\" name");
    let element = doc.get(unknown);
    assert!(element.skipped);
    assert_eq!(element.display_string.as_deref(), Some("vendor extension data"));
}
