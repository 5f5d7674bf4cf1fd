//! Raw protobuf field access
//!
//! prost discards fields it does not know when decoding. The session blob
//! carries extra fields the client schema lacks, so decoding goes through
//! [`Preserved`], which keeps those fields as raw bytes and writes them back
//! untouched. Unknown fields inside the elements of repeated message fields
//! (groups, cells, cell flags) are kept too, matched back to their element by
//! its identifying field.

use prost::encoding::{decode_key, decode_varint, encode_key, encode_varint, WireType};
use prost::Message;
use thiserror::Error;

use super::messages::{CellFlag, ChapterCellInfo, CurrentChapterInfo, GroupInChapter};

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Malformed protobuf: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Field {tag} truncated: needs {needed} bytes, {available} available")]
    Truncated {
        tag: u32,
        needed: usize,
        available: usize,
    },

    #[error("Group encoding is not supported (field {tag})")]
    GroupUnsupported { tag: u32 },
}

/// A repeated message field whose elements keep their own unknown fields.
#[derive(Debug, Clone, Copy)]
pub struct NestedField {
    pub tag: u32,
    /// Tags the element type declares
    pub known_tags: &'static [u32],
    /// Field of the element that identifies it across rewrites
    pub key_tag: u32,
}

impl NestedField {
    const fn of<E: KnownFields>(tag: u32, key_tag: u32) -> Self {
        Self {
            tag,
            known_tags: E::KNOWN_TAGS,
            key_tag,
        }
    }
}

/// Top-level field numbers a message type declares.
pub trait KnownFields {
    const KNOWN_TAGS: &'static [u32];
    const NESTED: &'static [NestedField] = &[];

    fn is_known_tag(tag: u32) -> bool {
        Self::KNOWN_TAGS.contains(&tag)
    }

    fn nested_field(tag: u32) -> Option<&'static NestedField> {
        Self::NESTED.iter().find(|nested| nested.tag == tag)
    }
}

impl KnownFields for CurrentChapterInfo {
    const KNOWN_TAGS: &'static [u32] = &[
        1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24,
    ];
    // Groups are keyed by id, cells and cell flags by position
    const NESTED: &'static [NestedField] = &[
        NestedField::of::<ChapterCellInfo>(3, 1),
        NestedField::of::<GroupInChapter>(4, 1),
        NestedField::of::<ChapterCellInfo>(5, 1),
        NestedField::of::<ChapterCellInfo>(6, 1),
        NestedField::of::<CellFlag>(14, 1),
        NestedField::of::<GroupInChapter>(23, 1),
        NestedField::of::<GroupInChapter>(24, 1),
    ];
}

impl KnownFields for GroupInChapter {
    const KNOWN_TAGS: &'static [u32] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14];
}

impl KnownFields for ChapterCellInfo {
    const KNOWN_TAGS: &'static [u32] = &[1, 2, 3, 4, 5];
}

impl KnownFields for CellFlag {
    const KNOWN_TAGS: &'static [u32] = &[1, 2];
}

/// One top-level field as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawField<'a> {
    pub tag: u32,
    pub wire_type: WireType,
    /// Key and value bytes exactly as encoded
    pub raw: &'a [u8],
    /// Payload of a length-delimited field
    pub payload: Option<&'a [u8]>,
}

/// Iterator over the top-level fields of an encoded message.
pub struct RawFields<'a> {
    rest: &'a [u8],
    failed: bool,
}

pub fn raw_fields(data: &[u8]) -> RawFields<'_> {
    RawFields {
        rest: data,
        failed: false,
    }
}

impl<'a> RawFields<'a> {
    fn read_field(&mut self) -> Result<RawField<'a>, WireError> {
        let start = self.rest;
        let mut cursor = self.rest;

        let (tag, wire_type) = decode_key(&mut cursor)?;
        let payload = match wire_type {
            WireType::Varint => {
                decode_varint(&mut cursor)?;
                None
            }
            WireType::SixtyFourBit => {
                take(&mut cursor, tag, 8)?;
                None
            }
            WireType::ThirtyTwoBit => {
                take(&mut cursor, tag, 4)?;
                None
            }
            WireType::LengthDelimited => {
                let len = decode_varint(&mut cursor)? as usize;
                Some(take(&mut cursor, tag, len)?)
            }
            WireType::StartGroup | WireType::EndGroup => {
                return Err(WireError::GroupUnsupported { tag });
            }
        };

        let consumed = start.len() - cursor.len();
        self.rest = cursor;
        Ok(RawField {
            tag,
            wire_type,
            raw: &start[..consumed],
            payload,
        })
    }
}

impl<'a> Iterator for RawFields<'a> {
    type Item = Result<RawField<'a>, WireError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        let field = self.read_field();
        if field.is_err() {
            self.failed = true;
        }
        Some(field)
    }
}

fn take<'a>(cursor: &mut &'a [u8], tag: u32, needed: usize) -> Result<&'a [u8], WireError> {
    if cursor.len() < needed {
        return Err(WireError::Truncated {
            tag,
            needed,
            available: cursor.len(),
        });
    }
    let (head, tail) = cursor.split_at(needed);
    *cursor = tail;
    Ok(head)
}

/// Bytes of every top-level field whose tag `M` does not declare, in wire order.
#[cfg(test)]
pub fn unknown_fields<M: KnownFields>(data: &[u8]) -> Result<Vec<u8>, WireError> {
    undeclared_fields(data, M::KNOWN_TAGS)
}

fn undeclared_fields(data: &[u8], known_tags: &[u32]) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::new();
    for field in raw_fields(data) {
        let field = field?;
        if !known_tags.contains(&field.tag) {
            out.extend_from_slice(field.raw);
        }
    }
    Ok(out)
}

/// Value bytes of the first `tag` field: the payload when length-delimited,
/// the encoded value otherwise. Empty when the field is absent.
fn element_key(data: &[u8], tag: u32) -> Result<Vec<u8>, WireError> {
    for field in raw_fields(data) {
        let field = field?;
        if field.tag != tag {
            continue;
        }
        let key = match field.payload {
            Some(payload) => payload.to_vec(),
            None => {
                let mut cursor = field.raw;
                decode_key(&mut cursor)?;
                cursor.to_vec()
            }
        };
        return Ok(key);
    }
    Ok(Vec::new())
}

/// Drop every field carrying `tag`, keeping everything else byte-for-byte.
pub fn strip_field(data: &[u8], tag: u32) -> Result<Vec<u8>, WireError> {
    let mut out = Vec::with_capacity(data.len());
    for field in raw_fields(data) {
        let field = field?;
        if field.tag != tag {
            out.extend_from_slice(field.raw);
        }
    }
    Ok(out)
}

/// Payloads of all length-delimited fields carrying `tag`.
pub fn length_delimited_values(data: &[u8], tag: u32) -> Result<Vec<&[u8]>, WireError> {
    let mut values = Vec::new();
    for field in raw_fields(data) {
        let field = field?;
        if field.tag != tag {
            continue;
        }
        if let Some(payload) = field.payload {
            values.push(payload);
        }
    }
    Ok(values)
}

pub fn append_length_delimited(buf: &mut Vec<u8>, tag: u32, value: &[u8]) {
    encode_key(tag, WireType::LengthDelimited, buf);
    encode_varint(value.len() as u64, buf);
    buf.extend_from_slice(value);
}

/// Unknown fields of one element of a repeated message field.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedUnknown {
    pub tag: u32,
    pub key: Vec<u8>,
    pub unknown: Vec<u8>,
}

/// A decoded message plus the raw bytes of the fields its schema does not declare.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Preserved<M> {
    pub message: M,
    pub unknown: Vec<u8>,
    pub nested: Vec<NestedUnknown>,
}

impl<M> Preserved<M>
where
    M: Message + Default + KnownFields,
{
    pub fn decode(data: &[u8]) -> Result<Self, WireError> {
        let message = M::decode(data)?;
        let mut unknown = Vec::new();
        let mut nested: Vec<NestedUnknown> = Vec::new();

        for field in raw_fields(data) {
            let field = field?;
            if !M::is_known_tag(field.tag) {
                unknown.extend_from_slice(field.raw);
                continue;
            }
            let (Some(spec), Some(payload)) = (M::nested_field(field.tag), field.payload) else {
                continue;
            };
            let extra = undeclared_fields(payload, spec.known_tags)?;
            if extra.is_empty() {
                continue;
            }
            let key = element_key(payload, spec.key_tag)?;
            // First element wins when two share a key
            if !nested.iter().any(|n| n.tag == field.tag && n.key == key) {
                nested.push(NestedUnknown {
                    tag: field.tag,
                    key,
                    unknown: extra,
                });
            }
        }

        Ok(Self {
            message,
            unknown,
            nested,
        })
    }

    /// Canonical encoding with element fields re-attached, then the preserved
    /// top-level fields.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let canonical = self.message.encode_to_vec();
        let mut out = Vec::with_capacity(canonical.len() + self.unknown.len());

        if self.nested.is_empty() {
            out.extend_from_slice(&canonical);
        } else {
            self.reattach_nested(&canonical, &mut out);
        }
        out.extend_from_slice(&self.unknown);
        out
    }

    fn reattach_nested(&self, canonical: &[u8], out: &mut Vec<u8>) {
        let mut rest = canonical;
        for field in raw_fields(canonical) {
            let Ok(field) = field else { break };
            rest = &rest[field.raw.len()..];

            let extra = match (M::nested_field(field.tag), field.payload) {
                (Some(spec), Some(payload)) => element_key(payload, spec.key_tag)
                    .ok()
                    .and_then(|key| self.nested.iter().find(|n| n.tag == field.tag && n.key == key))
                    .map(|n| (payload, n.unknown.as_slice())),
                _ => None,
            };

            match extra {
                Some((payload, unknown)) => {
                    encode_key(field.tag, WireType::LengthDelimited, out);
                    encode_varint((payload.len() + unknown.len()) as u64, out);
                    out.extend_from_slice(payload);
                    out.extend_from_slice(unknown);
                }
                None => out.extend_from_slice(field.raw),
            }
        }
        // prost output always splits cleanly; copy anything left as is
        out.extend_from_slice(rest);
    }
}
