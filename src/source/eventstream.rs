//! YAML event-stream parsing.
//!
//! Each YAML document in the stream is one fsevent (or a composite
//! application event that expands to several). Unknown top-level keys
//! are tolerated (logged at `warn` and dropped); an unrecognized `type`
//! tag is rejected, since that is the one thing the wire format commits
//! to as closed.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::attributes::{Attributes, DeviceId, FileType, StatxMask};
use crate::fsevent::{FSEvent, NamespaceRef, XattrOp, XattrPatch};
use crate::id::{BackendTag, Id};
use crate::statx::{StatX, Timestamp};
use crate::value::Value;

/// Errors specific to decoding the event-stream wire format.
#[derive(Debug, Error)]
pub enum EventStreamError {
    /// The document's `type` field named something other than one of
    /// `upsert`, `link`, `unlink`, `delete`, `xattr`.
    #[error("unknown event type {0:?}")]
    UnknownEventType(String),
    /// A document was missing the sub-map its `type` requires (e.g.
    /// `type: link` with no `link:` key).
    #[error("event type {0:?} is missing its {0} payload")]
    MissingPayload(String),
    /// The `id` or a referenced `parent_id` was not valid hex.
    #[error("malformed id: {0}")]
    MalformedId(String),
    /// An unrecognized backend tag name.
    #[error("unknown backend tag: {0}")]
    UnknownTag(String),
    /// The underlying YAML document was malformed.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Deserialize)]
struct RawId {
    tag: String,
    bytes: String,
}

#[derive(Deserialize)]
struct RawNamespaceRef {
    parent: RawId,
    name: String,
}

#[derive(Deserialize, Default)]
struct RawUpsert {
    statx: Option<BTreeMap<String, serde_yaml::Value>>,
    symlink: Option<String>,
    xattrs: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Deserialize)]
struct RawLink {
    parent: RawId,
    name: String,
    xattrs: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Deserialize)]
struct RawUnlink {
    parent: RawId,
    name: String,
}

#[derive(Deserialize)]
struct RawEvent {
    id: RawId,
    #[serde(rename = "type")]
    kind: String,
    upsert: Option<RawUpsert>,
    link: Option<RawLink>,
    unlink: Option<RawUnlink>,
    delete: Option<bool>,
    xattrs: Option<BTreeMap<String, serde_yaml::Value>>,
    namespace: Option<RawNamespaceRef>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_yaml::Value>,
}

fn decode_tag(tag: &str) -> std::result::Result<BackendTag, EventStreamError> {
    match tag {
        "posix" => Ok(BackendTag::Posix),
        "mpi" => Ok(BackendTag::Mpi),
        "s3" => Ok(BackendTag::S3),
        "target" => Ok(BackendTag::TargetStore),
        other => Err(EventStreamError::UnknownTag(other.to_string())),
    }
}

fn decode_id(raw: &RawId) -> std::result::Result<Id, EventStreamError> {
    let tag = decode_tag(&raw.tag)?;
    let bytes = hex_decode(&raw.bytes).ok_or_else(|| EventStreamError::MalformedId(raw.bytes.clone()))?;
    Ok(Id::new(tag, bytes))
}

fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

fn yaml_to_value(v: &serde_yaml::Value) -> Option<Value<'static>> {
    match v {
        serde_yaml::Value::Null => None,
        serde_yaml::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Value::Int64(i))
            } else if let Some(u) = n.as_u64() {
                Some(Value::UInt64(u))
            } else {
                n.as_f64().map(|f| Value::Int64(f as i64))
            }
        }
        serde_yaml::Value::String(s) => Some(Value::String(s.clone().into())),
        serde_yaml::Value::Sequence(items) => Some(Value::Sequence(
            items.iter().filter_map(yaml_to_value).collect(),
        )),
        serde_yaml::Value::Mapping(map) => {
            let mut out = crate::value::ValueMap::new();
            for (k, v) in map {
                if let (Some(k), Some(v)) = (k.as_str(), yaml_to_value(v)) {
                    out.insert(k.to_string(), v);
                }
            }
            Some(Value::Map(out))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_value(&tagged.value),
    }
}

fn xattr_patch_from_map(map: &BTreeMap<String, serde_yaml::Value>) -> XattrPatch<'static> {
    let mut patch = XattrPatch::new();
    for (key, raw) in map {
        let op = match yaml_to_value(raw) {
            Some(value) => XattrOp::Set(value),
            None => XattrOp::Unset,
        };
        patch.push(key.clone(), op);
    }
    patch
}

fn parse_statx(map: &BTreeMap<String, serde_yaml::Value>) -> StatX {
    let mut statx = StatX::empty();
    let mut mask = StatxMask::empty();

    if let Some(v) = map.get("mode").and_then(as_u64) {
        statx.mode = v as u16;
        mask |= StatxMask::MODE;
    }
    if let Some(v) = map.get("nlink").and_then(as_u64) {
        statx.nlink = v as u32;
        mask |= StatxMask::NLINK;
    }
    if let Some(v) = map.get("uid").and_then(as_u64) {
        statx.uid = v as u32;
        mask |= StatxMask::UID;
    }
    if let Some(v) = map.get("gid").and_then(as_u64) {
        statx.gid = v as u32;
        mask |= StatxMask::GID;
    }
    if let Some(v) = map.get("size").and_then(as_u64) {
        statx.size = v;
        mask |= StatxMask::SIZE;
    }
    if let Some(v) = map.get("blocks").and_then(as_u64) {
        statx.blocks = v;
        mask |= StatxMask::BLOCKS;
    }
    if let Some(v) = map.get("ino").and_then(as_u64) {
        statx.ino = v;
        mask |= StatxMask::INO;
    }
    if let Some(v) = map.get("blksize").and_then(as_u64) {
        statx.blksize = v as u32;
        mask |= StatxMask::BLKSIZE;
    }
    if let Some(kind) = map.get("type").and_then(|v| v.as_str()) {
        statx.kind = parse_file_type(kind);
        if statx.kind.is_some() {
            mask |= StatxMask::TYPE;
        }
    }
    for (field, setter): (&str, fn(&mut StatX, Timestamp)) in [
        ("atime", (|s, t| s.atime = t) as fn(&mut StatX, Timestamp)),
        ("btime", |s, t| s.btime = t),
        ("ctime", |s, t| s.ctime = t),
        ("mtime", |s, t| s.mtime = t),
    ] {
        if let Some(ts_map) = map.get(field).and_then(|v| v.as_mapping()) {
            let sec = ts_map
                .get("sec")
                .and_then(as_u64_value)
                .unwrap_or(0) as i64;
            let nsec = ts_map
                .get("nsec")
                .and_then(as_u64_value)
                .unwrap_or(0) as u32;
            setter(&mut statx, Timestamp { sec, nsec });
            mask |= match field {
                "atime" => StatxMask::ATIME,
                "btime" => StatxMask::BTIME,
                "ctime" => StatxMask::CTIME,
                _ => StatxMask::MTIME,
            };
        }
    }
    if let Some(attrs_map) = map.get("attributes").and_then(|v| v.as_mapping()) {
        let mut attrs = Attributes::empty();
        for (name, bit) in [
            ("compressed", Attributes::COMPRESSED),
            ("immutable", Attributes::IMMUTABLE),
            ("append", Attributes::APPEND),
            ("nodump", Attributes::NODUMP),
            ("encrypted", Attributes::ENCRYPTED),
        ] {
            if attrs_map
                .get(name)
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                attrs |= bit;
            }
        }
        statx.attributes = attrs;
        statx.attributes_mask = attrs;
        mask |= StatxMask::ATTRIBUTES;
    }
    if let Some(dev_map) = map.get("dev").and_then(|v| v.as_mapping()) {
        statx.dev = device_from_mapping(dev_map);
        mask |= StatxMask::DEV;
    }
    if let Some(rdev_map) = map.get("rdev").and_then(|v| v.as_mapping()) {
        statx.rdev = device_from_mapping(rdev_map);
        mask |= StatxMask::RDEV;
    }
    statx.mask = mask;
    statx
}

fn as_u64(v: &serde_yaml::Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_i64().map(|i| i as u64))
}

fn as_u64_value(v: &serde_yaml::Value) -> Option<u64> {
    as_u64(v)
}

fn device_from_mapping(map: &serde_yaml::Mapping) -> DeviceId {
    DeviceId {
        major: map
            .get("major")
            .and_then(as_u64)
            .unwrap_or(0) as u32,
        minor: map
            .get("minor")
            .and_then(as_u64)
            .unwrap_or(0) as u32,
    }
}

fn parse_file_type(name: &str) -> Option<FileType> {
    match name {
        "fifo" => Some(FileType::NamedPipe),
        "chr" => Some(FileType::CharDevice),
        "blk" => Some(FileType::BlockDevice),
        "dir" => Some(FileType::Directory),
        "reg" => Some(FileType::RegularFile),
        "lnk" => Some(FileType::Symlink),
        "sock" => Some(FileType::Socket),
        _ => None,
    }
}

fn convert(raw: RawEvent) -> std::result::Result<Vec<FSEvent<'static>>, EventStreamError> {
    for key in raw.extra.keys() {
        log::warn!("event-stream: ignoring unrecognized key {key:?}");
    }
    let id = decode_id(&raw.id)?;
    match raw.kind.as_str() {
        "upsert" => {
            let payload = raw
                .upsert
                .ok_or_else(|| EventStreamError::MissingPayload("upsert".to_string()))?;
            let statx = payload.statx.as_ref().map(parse_statx);
            let inode_xattrs = payload.xattrs.as_ref().map(xattr_patch_from_map);
            Ok(vec![FSEvent::Upsert {
                id,
                statx,
                symlink: payload.symlink,
                inode_xattrs,
            }])
        }
        "link" => {
            let payload = raw
                .link
                .ok_or_else(|| EventStreamError::MissingPayload("link".to_string()))?;
            let parent_id = decode_id(&payload.parent)?;
            let namespace_xattrs = payload.xattrs.as_ref().map(xattr_patch_from_map);
            Ok(vec![FSEvent::Link {
                id,
                parent_id,
                name: payload.name,
                namespace_xattrs,
            }])
        }
        "unlink" => {
            let payload = raw
                .unlink
                .ok_or_else(|| EventStreamError::MissingPayload("unlink".to_string()))?;
            let parent_id = decode_id(&payload.parent)?;
            Ok(vec![FSEvent::Unlink {
                id,
                parent_id,
                name: payload.name,
            }])
        }
        "delete" => Ok(vec![FSEvent::Delete { id }]),
        "xattr" => {
            let map = raw
                .xattrs
                .ok_or_else(|| EventStreamError::MissingPayload("xattr".to_string()))?;
            let namespace = match raw.namespace {
                Some(ns) => Some(NamespaceRef {
                    parent_id: decode_id(&ns.parent)?,
                    name: ns.name,
                }),
                None => None,
            };
            Ok(vec![FSEvent::Xattr {
                id,
                xattrs: xattr_patch_from_map(&map),
                namespace,
            }])
        }
        other => Err(EventStreamError::UnknownEventType(other.to_string())),
    }
}

/// Parse a YAML document stream into its fsevents, in document order. A
/// composite document expands to more than one event; order among the
/// expansion is preserved.
pub fn parse_event_stream(
    input: &str,
) -> impl Iterator<Item = std::result::Result<FSEvent<'static>, EventStreamError>> + '_ {
    serde_yaml::Deserializer::from_str(input).flat_map(|document| {
        match RawEvent::deserialize(document) {
            Ok(raw) => match convert(raw) {
                Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(err) => vec![Err(err)],
            },
            Err(err) => vec![Err(EventStreamError::Yaml(err))],
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_upsert_document() {
        let yaml = "id: {tag: posix, bytes: \"0011\"}\ntype: upsert\nupsert:\n  statx:\n    size: 1024\n";
        let events: Vec<_> = parse_event_stream(yaml).collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], FSEvent::Upsert { statx: Some(s), .. } if s.size == 1024));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let yaml = "id: {tag: posix, bytes: \"00\"}\ntype: frobnicate\n";
        let err = parse_event_stream(yaml).collect::<std::result::Result<Vec<_>, _>>().unwrap_err();
        assert!(matches!(err, EventStreamError::UnknownEventType(_)));
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let yaml = "id: {tag: posix, bytes: \"00\"}\ntype: delete\nfuture_field: 42\n";
        let events: Vec<_> = parse_event_stream(yaml).collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(events.len(), 1);
    }
}
