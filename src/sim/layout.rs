//! Struct layouts for typed reads and writes
//!
//! Fields are packed sequentially in declaration order (no padding), little
//! endian. Every field tinyalloc uses is pointer-sized, so this matches the
//! real layout on 64-bit targets.

use super::SimError;
use crate::session::value::Value;
use rustc_hash::FxHashMap;

/// Scalar kinds a field can have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Pointer,
    Size,
    Int,
}

impl FieldKind {
    pub fn size(self) -> usize {
        match self {
            FieldKind::Pointer | FieldKind::Size => 8,
            FieldKind::Int => 4,
        }
    }

    fn decode(self, bytes: &[u8]) -> Value {
        match self {
            FieldKind::Pointer => Value::pointer(le_u64(bytes)),
            FieldKind::Size => Value::Size(le_u64(bytes)),
            FieldKind::Int => {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&bytes[..4]);
                Value::Int(i32::from_le_bytes(raw) as i64)
            }
        }
    }

    fn encode(self, value: &Value) -> Option<Vec<u8>> {
        match (self, value) {
            (FieldKind::Int, Value::Int(n)) => {
                i32::try_from(*n).ok().map(|n| n.to_le_bytes().to_vec())
            }
            (FieldKind::Pointer | FieldKind::Size, v) => {
                v.as_u64().map(|n| n.to_le_bytes().to_vec())
            }
            _ => None,
        }
    }
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

/// A named struct type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructLayout {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl StructLayout {
    pub fn new(name: &str, fields: &[(&str, FieldKind)]) -> Self {
        StructLayout {
            name: name.to_string(),
            fields: fields
                .iter()
                .map(|&(field, kind)| FieldDef {
                    name: field.to_string(),
                    kind,
                })
                .collect(),
        }
    }

    /// `typedef struct { Block *free; Block *used; Block *fresh; size_t top; } Heap;`
    pub fn tinyalloc_heap() -> Self {
        StructLayout::new(
            "Heap",
            &[
                ("free", FieldKind::Pointer),
                ("used", FieldKind::Pointer),
                ("fresh", FieldKind::Pointer),
                ("top", FieldKind::Size),
            ],
        )
    }

    /// `typedef struct Block { void *addr; struct Block *next; size_t size; } Block;`
    pub fn tinyalloc_block() -> Self {
        StructLayout::new(
            "Block",
            &[
                ("addr", FieldKind::Pointer),
                ("next", FieldKind::Pointer),
                ("size", FieldKind::Size),
            ],
        )
    }

    pub fn size(&self) -> usize {
        self.fields.iter().map(|f| f.kind.size()).sum()
    }

    /// Field definitions paired with their byte offsets
    pub fn offsets(&self) -> Vec<(&FieldDef, usize)> {
        let mut current_offset = 0;
        let mut result = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            result.push((field, current_offset));
            current_offset += field.kind.size();
        }
        result
    }

    /// Decode a struct value; `bytes` must hold at least [`size`](Self::size) bytes
    pub fn decode(&self, bytes: &[u8]) -> Value {
        let fields: FxHashMap<String, Value> = self
            .offsets()
            .into_iter()
            .map(|(field, offset)| (field.name.clone(), field.kind.decode(&bytes[offset..])))
            .collect();
        Value::Struct(fields)
    }

    /// Encode one field, returning its offset and bytes
    pub fn encode_field(&self, name: &str, value: &Value) -> Result<(usize, Vec<u8>), SimError> {
        let (field, offset) = self
            .offsets()
            .into_iter()
            .find(|(field, _)| field.name == name)
            .ok_or_else(|| SimError::UnknownField {
                type_name: self.name.clone(),
                field: name.to_string(),
            })?;
        let bytes = field.kind.encode(value).ok_or_else(|| SimError::BadFieldValue {
            field: name.to_string(),
            value: value.clone(),
        })?;
        Ok((offset, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tinyalloc_sizes() {
        assert_eq!(StructLayout::tinyalloc_heap().size(), 32);
        assert_eq!(StructLayout::tinyalloc_block().size(), 24);
    }

    #[test]
    fn test_encode_then_decode_block() {
        let layout = StructLayout::tinyalloc_block();
        let mut bytes = vec![0u8; layout.size()];
        for (name, value) in [
            ("addr", Value::Pointer(0x2000)),
            ("next", Value::Null),
            ("size", Value::Size(48)),
        ] {
            let (offset, encoded) = layout.encode_field(name, &value).unwrap();
            bytes[offset..offset + encoded.len()].copy_from_slice(&encoded);
        }

        let block = layout.decode(&bytes);
        assert_eq!(block.field("addr"), Some(&Value::Pointer(0x2000)));
        assert_eq!(block.field("next"), Some(&Value::Null));
        assert_eq!(block.field("size"), Some(&Value::Size(48)));
    }

    #[test]
    fn test_unknown_field_and_bad_value() {
        let layout = StructLayout::tinyalloc_block();
        assert!(matches!(
            layout.encode_field("prev", &Value::Null),
            Err(SimError::UnknownField { .. })
        ));
        assert!(matches!(
            layout.encode_field("size", &Value::structure([("x", Value::Null)])),
            Err(SimError::BadFieldValue { .. })
        ));
    }
}
