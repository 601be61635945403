//! Schema / DTD (C4): the static description of the Matroska element
//! hierarchy.
//!
//! Declared once as data (§4.4, §9 "schema both as data and as control"):
//! a flat, perfect-hash ID table covers global lookup, and a second table
//! gives, per container, the set of child IDs that are legal there. The
//! element reader (`reader.rs`) walks these tables rather than any
//! per-type generated code.

use once_cell::sync::Lazy;

/// The decoded type of a schema-known element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Uint,
    Int,
    Float,
    Date,
    String,
    Binary,
    Container,
}

/// A single entry in the schema.
#[derive(Debug, Clone, Copy)]
pub struct SchemaEntry {
    pub id: u64,
    pub name: &'static str,
    pub kind: Kind,
    /// Schema-declared multiplicity: if true, repeated children of this
    /// name are always kept as a list even when only one is observed is
    /// not required; a single observed occurrence still stays a scalar
    /// (§3 "which it is depends on... and, defensively, on whether
    /// multiple were observed").
    pub multiple: bool,
    /// May legally appear as a child of any container (`CRC32`, `Void`).
    pub global: bool,
    /// May legally contain a child of its own type (`ChapterAtom`,
    /// `SimpleTag`): ID lookup reuses the outer container's schema.
    pub recursive_nesting: bool,
    /// Default value used when the element is absent or zero-sized.
    pub default: Option<Default>,
}

/// A schema-declared default value, sufficient for the default-value
/// resolution rule in §4.3.
#[derive(Debug, Clone, Copy)]
pub enum Default {
    Uint(u64),
    Float(f64),
    Str(&'static str),
}

macro_rules! entry {
    ($id:expr, $name:expr, $kind:expr) => {
        SchemaEntry {
            id: $id,
            name: $name,
            kind: $kind,
            multiple: false,
            global: false,
            recursive_nesting: false,
            default: None,
        }
    };
    ($id:expr, $name:expr, $kind:expr, multiple) => {
        SchemaEntry {
            id: $id,
            name: $name,
            kind: $kind,
            multiple: true,
            global: false,
            recursive_nesting: false,
            default: None,
        }
    };
    ($id:expr, $name:expr, $kind:expr, recursive) => {
        SchemaEntry {
            id: $id,
            name: $name,
            kind: $kind,
            multiple: true,
            global: false,
            recursive_nesting: true,
            default: None,
        }
    };
    ($id:expr, $name:expr, $kind:expr, global) => {
        SchemaEntry {
            id: $id,
            name: $name,
            kind: $kind,
            multiple: false,
            global: true,
            recursive_nesting: false,
            default: None,
        }
    };
    ($id:expr, $name:expr, $kind:expr, default = $default:expr) => {
        SchemaEntry {
            id: $id,
            name: $name,
            kind: $kind,
            multiple: false,
            global: false,
            recursive_nesting: false,
            default: Some($default),
        }
    };
}

use Kind::*;

/// The full set of known elements, keyed by numeric EBML ID. IDs are
/// globally unique across the Matroska hierarchy in practice, so a single
/// flat table doubles as the "global ID table" (§4.4) and the per-element
/// type/default lookup.
pub static SCHEMA: Lazy<std::collections::HashMap<u64, SchemaEntry>> = Lazy::new(|| {
    let entries: &[SchemaEntry] = &[
        // EBML header.
        entry!(0x1A45DFA3, "EBML", Container),
        entry!(0x4286, "EBMLVersion", Uint),
        entry!(0x42F7, "EBMLReadVersion", Uint),
        entry!(0x42F2, "EBMLMaxIDLength", Uint),
        entry!(0x42F3, "EBMLMaxSizeLength", Uint),
        entry!(0x4282, "DocType", String),
        entry!(0x4287, "DocTypeVersion", Uint),
        entry!(0x4285, "DocTypeReadVersion", Uint),
        // Globals.
        entry!(0xBF, "CRC32", Binary, global),
        entry!(0xEC, "Void", Binary, global),
        // Segment / SeekHead.
        entry!(0x18538067, "Segment", Container),
        entry!(0x114D9B74, "SeekHead", Container, multiple),
        entry!(0x4DBB, "Seek", Container, multiple),
        entry!(0x53AB, "SeekID", Binary),
        entry!(0x53AC, "SeekPosition", Uint),
        // Info.
        entry!(0x1549A966, "Info", Container, multiple),
        entry!(0x2AD7B1, "TimecodeScale", Uint, default = Default::Uint(1_000_000)),
        entry!(0x4489, "Duration", Float),
        entry!(0x4461, "DateUTC", Date),
        entry!(0x7BA9, "Title", String),
        entry!(0x4D80, "MuxingApp", String),
        entry!(0x5741, "WritingApp", String),
        entry!(0x3CB923, "SegmentUID", Binary),
        // Cluster.
        entry!(0x1F43B675, "Cluster", Container, multiple),
        entry!(0xE7, "Timecode", Uint),
        entry!(0xA7, "Position", Uint),
        entry!(0xAB, "PrevSize", Uint),
        entry!(0xA3, "SimpleBlock", Binary, multiple),
        entry!(0xA0, "BlockGroup", Container, multiple),
        entry!(0xA1, "Block", Binary),
        entry!(0x75A1, "BlockAdditions", Container),
        entry!(0xA6, "BlockMore", Container, multiple),
        entry!(0xEE, "BlockAddID", Uint, default = Default::Uint(1)),
        entry!(0xA5, "BlockAdditional", Binary),
        entry!(0x9B, "BlockDuration", Uint),
        entry!(0xFB, "ReferenceBlock", Int, multiple),
        entry!(0x75A2, "DiscardPadding", Int),
        // Tracks.
        entry!(0x1654AE6B, "Tracks", Container, multiple),
        entry!(0xAE, "TrackEntry", Container, multiple),
        entry!(0xD7, "TrackNumber", Uint),
        entry!(0x73C5, "TrackUID", Uint),
        entry!(0x83, "TrackType", Uint),
        entry!(0xB9, "FlagEnabled", Uint, default = Default::Uint(1)),
        entry!(0x88, "FlagDefault", Uint, default = Default::Uint(1)),
        entry!(0x55AA, "FlagForced", Uint, default = Default::Uint(0)),
        entry!(0x9C, "FlagLacing", Uint, default = Default::Uint(1)),
        entry!(0x23E383, "DefaultDuration", Uint),
        entry!(0x234E7A, "DefaultDecodedFieldDuration", Uint),
        entry!(0x536E, "Name", String),
        entry!(0x22B59C, "Language", String, default = Default::Str("eng")),
        entry!(0x86, "CodecID", String),
        entry!(0x63A2, "CodecPrivate", Binary),
        entry!(0x258688, "CodecName", String),
        entry!(0x56AA, "CodecDelay", Uint),
        entry!(0x56BB, "SeekPreRoll", Uint),
        entry!(0xE0, "Video", Container),
        entry!(0x9A, "FlagInterlaced", Uint, default = Default::Uint(0)),
        entry!(0xB0, "PixelWidth", Uint),
        entry!(0xBA, "PixelHeight", Uint),
        entry!(0x54AA, "PixelCropBottom", Uint, default = Default::Uint(0)),
        entry!(0x54BB, "PixelCropTop", Uint, default = Default::Uint(0)),
        entry!(0x54CC, "PixelCropLeft", Uint, default = Default::Uint(0)),
        entry!(0x54DD, "PixelCropRight", Uint, default = Default::Uint(0)),
        entry!(0x54B0, "DisplayWidth", Uint),
        entry!(0x54BA, "DisplayHeight", Uint),
        entry!(0x54B2, "DisplayUnit", Uint, default = Default::Uint(0)),
        entry!(0xE1, "Audio", Container),
        entry!(0xB5, "SamplingFrequency", Float, default = Default::Float(8000.0)),
        entry!(0x78B5, "OutputSamplingFrequency", Float),
        entry!(0x9F, "Channels", Uint, default = Default::Uint(1)),
        entry!(0x6264, "BitDepth", Uint),
        entry!(0x6D80, "ContentEncodings", Container),
        entry!(0x6240, "ContentEncoding", Container, multiple),
        entry!(0x5031, "ContentEncodingOrder", Uint, default = Default::Uint(0)),
        entry!(0x5032, "ContentEncodingScope", Uint, default = Default::Uint(1)),
        entry!(0x5033, "ContentEncodingType", Uint, default = Default::Uint(0)),
        entry!(0x5035, "ContentEncryption", Container),
        entry!(0x47E1, "ContentEncAlgo", Uint, default = Default::Uint(0)),
        entry!(0x47E2, "ContentEncKeyID", Binary),
        // Cues.
        entry!(0x1C53BB6B, "Cues", Container, multiple),
        entry!(0xBB, "CuePoint", Container, multiple),
        entry!(0xB3, "CueTime", Uint),
        entry!(0xB7, "CueTrackPositions", Container, multiple),
        entry!(0xF7, "CueTrack", Uint),
        entry!(0xF1, "CueClusterPosition", Uint),
        entry!(0xF0, "CueRelativePosition", Uint),
        entry!(0xB2, "CueDuration", Uint),
        entry!(0x5378, "CueBlockNumber", Uint, default = Default::Uint(1)),
        // Chapters.
        entry!(0x1043A770, "Chapters", Container, multiple),
        entry!(0x45B9, "EditionEntry", Container, multiple),
        entry!(0x45BC, "EditionUID", Uint),
        entry!(0x45BD, "EditionFlagHidden", Uint, default = Default::Uint(0)),
        entry!(0x45DB, "EditionFlagDefault", Uint, default = Default::Uint(0)),
        entry!(0xB6, "ChapterAtom", Container, recursive),
        entry!(0x73C4, "ChapterUID", Uint),
        entry!(0x5654, "ChapterStringUID", String),
        entry!(0x91, "ChapterTimeStart", Uint),
        entry!(0x92, "ChapterTimeEnd", Uint),
        entry!(0x98, "ChapterFlagHidden", Uint, default = Default::Uint(0)),
        entry!(0x4598, "ChapterFlagEnabled", Uint, default = Default::Uint(1)),
        entry!(0x80, "ChapterDisplay", Container, multiple),
        entry!(0x85, "ChapString", String),
        entry!(0x437C, "ChapLanguage", String, default = Default::Str("eng")),
        entry!(0x437E, "ChapCountry", String),
        // Tags.
        entry!(0x1254C367, "Tags", Container, multiple),
        entry!(0x7373, "Tag", Container, multiple),
        entry!(0x63C0, "Targets", Container),
        entry!(0x68CA, "TargetTypeValue", Uint, default = Default::Uint(50)),
        entry!(0x63CA, "TargetType", String),
        entry!(0x63C5, "TagTrackUID", Uint, default = Default::Uint(0)),
        entry!(0x67C8, "SimpleTag", Container, recursive),
        entry!(0x45A3, "TagName", String),
        entry!(0x447A, "TagLanguage", String, default = Default::Str("und")),
        entry!(0x4484, "TagDefault", Uint, default = Default::Uint(1)),
        entry!(0x4487, "TagString", String),
        entry!(0x4485, "TagBinary", Binary),
        // Attachments.
        entry!(0x1941A469, "Attachments", Container),
        entry!(0x61A7, "AttachedFile", Container, multiple),
        entry!(0x467E, "FileDescription", String),
        entry!(0x466E, "FileName", String),
        entry!(0x4660, "FileMediaType", String),
        entry!(0x465C, "FileData", Binary),
        entry!(0x46AE, "FileUID", Uint),
    ];
    entries.iter().map(|e| (e.id, *e)).collect()
});

/// Legal children of each named container, for ID resolution that must
/// honor `recursiveNesting` (§4.4) and for bounding unknown-size
/// containers (§4.5): a sibling ID not in this set ends the container.
pub static CHILDREN: Lazy<std::collections::HashMap<&'static str, Vec<u64>>> = Lazy::new(|| {
    let table: &[(&str, &[u64])] = &[
        ("EBML", &[0x4286, 0x42F7, 0x42F2, 0x42F3, 0x4282, 0x4287, 0x4285]),
        (
            "Segment",
            &[
                0x114D9B74, 0x1549A966, 0x1F43B675, 0x1654AE6B, 0x1C53BB6B, 0x1043A770,
                0x1254C367, 0x1941A469,
            ],
        ),
        ("SeekHead", &[0x4DBB]),
        ("Seek", &[0x53AB, 0x53AC]),
        (
            "Info",
            &[0x2AD7B1, 0x4489, 0x4461, 0x7BA9, 0x4D80, 0x5741, 0x3CB923],
        ),
        (
            "Cluster",
            &[0xE7, 0xA7, 0xAB, 0xA3, 0xA0],
        ),
        (
            "BlockGroup",
            &[0xA1, 0x75A1, 0xEE, 0x9B, 0xFB, 0x75A2],
        ),
        ("BlockAdditions", &[0xA6]),
        ("BlockMore", &[0xEE, 0xA5]),
        ("Tracks", &[0xAE]),
        (
            "TrackEntry",
            &[
                0xD7, 0x73C5, 0x83, 0xB9, 0x88, 0x55AA, 0x9C, 0x23E383, 0x234E7A, 0x536E,
                0x22B59C, 0x86, 0x63A2, 0x258688, 0x56AA, 0x56BB, 0xE0, 0xE1, 0x6D80,
            ],
        ),
        (
            "Video",
            &[
                0x9A, 0xB0, 0xBA, 0x54AA, 0x54BB, 0x54CC, 0x54DD, 0x54B0, 0x54BA, 0x54B2,
            ],
        ),
        ("Audio", &[0xB5, 0x78B5, 0x9F, 0x6264]),
        ("ContentEncodings", &[0x6240]),
        ("ContentEncoding", &[0x5031, 0x5032, 0x5033, 0x5035]),
        ("ContentEncryption", &[0x47E1, 0x47E2]),
        ("Cues", &[0xBB]),
        ("CuePoint", &[0xB3, 0xB7]),
        ("CueTrackPositions", &[0xF7, 0xF1, 0xF0, 0xB2, 0x5378]),
        ("Chapters", &[0x45B9]),
        ("EditionEntry", &[0x45BC, 0x45BD, 0x45DB, 0xB6]),
        (
            "ChapterAtom",
            &[0x73C4, 0x5654, 0x91, 0x92, 0x98, 0x4598, 0x80, 0xB6],
        ),
        ("ChapterDisplay", &[0x85, 0x437C, 0x437E]),
        ("Tags", &[0x7373]),
        ("Tag", &[0x63C0, 0x67C8]),
        ("Targets", &[0x68CA, 0x63CA, 0x63C5]),
        ("SimpleTag", &[0x45A3, 0x447A, 0x4484, 0x4487, 0x4485, 0x67C8]),
        ("Attachments", &[0x61A7]),
        (
            "AttachedFile",
            &[0x467E, 0x466E, 0x4660, 0x465C, 0x46AE],
        ),
    ];
    table.iter().map(|(name, ids)| (*name, ids.to_vec())).collect()
});

/// Look up an element by numeric ID in the global table.
pub fn lookup(id: u64) -> Option<&'static SchemaEntry> {
    SCHEMA.get(&id)
}

/// Whether `child_id` is declared a legal child of the container named
/// `parent`. Unknown parents (e.g. the virtual root) admit only the two
/// top-level document IDs.
pub fn is_legal_child(parent: &str, child_id: u64) -> bool {
    if let Some(e) = lookup(child_id) {
        if e.global {
            return true;
        }
    }
    CHILDREN.get(parent).map(|ids| ids.contains(&child_id)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_and_info_ids_resolve() {
        assert_eq!(lookup(0x18538067).unwrap().name, "Segment");
        assert_eq!(lookup(0x1549A966).unwrap().name, "Info");
        assert_eq!(lookup(0x1A45DFA3).unwrap().name, "EBML");
    }

    #[test]
    fn recursive_nesting_flags_set() {
        assert!(lookup(0xB6).unwrap().recursive_nesting); // ChapterAtom
        assert!(lookup(0x67C8).unwrap().recursive_nesting); // SimpleTag
    }

    #[test]
    fn globals_are_legal_anywhere() {
        assert!(is_legal_child("Info", 0xBF)); // CRC32
        assert!(is_legal_child("TrackEntry", 0xEC)); // Void
    }

    #[test]
    fn chapter_atom_admits_itself() {
        assert!(is_legal_child("ChapterAtom", 0xB6));
    }

    #[test]
    fn attachments_children_present() {
        assert!(is_legal_child("AttachedFile", 0x465C)); // FileData
        assert!(is_legal_child("Segment", 0x1941A469)); // Attachments
    }
}
