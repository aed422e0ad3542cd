//! Lays [`Variant`]s out in the platform's rendered-value format
//!
//! Output is a header of [`RawVariant`]s followed by an arena holding every
//! pointer payload. Pointers are absolute addresses inside the caller's
//! buffer, exactly as the real service produces them.

use evtlog_core::{Variant, VariantArray, VariantTag};

use crate::platform::{RawVariant, RenderBuffer, RenderOutcome, RAW_VARIANT_SIZE};

const PTR_SIZE: usize = std::mem::size_of::<usize>();

/// One rendered slot before layout
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Field {
    /// A well-formed value
    Value(Variant),
    /// A raw tag and count with a null payload, for exercising decoder errors
    Malformed {
        kind: u32,
        count: u32,
    },
}

#[derive(Debug, Clone, Copy)]
enum Payload {
    Inline(u64),
    Offset(usize),
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    payload: Payload,
    count: u32,
    kind: u32,
}

impl Slot {
    fn inline(tag: VariantTag, bits: u64) -> Self {
        Self {
            payload: Payload::Inline(bits),
            count: 0,
            kind: tag.code(),
        }
    }
}

#[derive(Debug, Default)]
struct Arena {
    bytes: Vec<u8>,
    // arena positions holding pointer-sized arena offsets
    fixups: Vec<usize>,
}

impl Arena {
    fn align(&mut self, to: usize) {
        let pad = (to - self.bytes.len() % to) % to;
        self.bytes.resize(self.bytes.len() + pad, 0);
    }

    fn push_bytes(&mut self, bytes: &[u8], align: usize) -> usize {
        self.align(align);
        let at = self.bytes.len();
        self.bytes.extend_from_slice(bytes);
        at
    }

    fn push_each<T, const N: usize>(
        &mut self,
        items: &[T],
        align: usize,
        encode: impl Fn(&T) -> [u8; N],
    ) -> usize {
        self.align(align);
        let at = self.bytes.len();
        for item in items {
            self.bytes.extend_from_slice(&encode(item));
        }
        at
    }

    fn push_wide(&mut self, s: &str) -> usize {
        self.align(2);
        let at = self.bytes.len();
        for unit in s.encode_utf16().chain(std::iter::once(0)) {
            self.bytes.extend_from_slice(&unit.to_ne_bytes());
        }
        at
    }

    fn push_ansi(&mut self, s: &str) -> usize {
        let at = self.bytes.len();
        self.bytes.extend_from_slice(s.as_bytes());
        self.bytes.push(0);
        at
    }

    fn push_table(&mut self, offsets: &[usize]) -> usize {
        self.align(PTR_SIZE);
        let at = self.bytes.len();
        for &offset in offsets {
            self.fixups.push(self.bytes.len());
            self.bytes.extend_from_slice(&offset.to_ne_bytes());
        }
        at
    }

    /// Rewrite every table entry from an arena offset to an absolute address
    fn relocate(&mut self, base: usize) {
        for &at in &self.fixups {
            let mut entry = [0u8; PTR_SIZE];
            entry.copy_from_slice(&self.bytes[at..at + PTR_SIZE]);
            let absolute = base + usize::from_ne_bytes(entry);
            self.bytes[at..at + PTR_SIZE].copy_from_slice(&absolute.to_ne_bytes());
        }
    }

    fn encode(&mut self, field: &Field) -> Slot {
        match field {
            Field::Value(v) => self.encode_value(v),
            Field::Malformed { kind, count } => Slot {
                payload: Payload::Inline(0),
                count: *count,
                kind: *kind,
            },
        }
    }

    fn encode_value(&mut self, value: &Variant) -> Slot {
        let tag = value.tag();
        let pointer = |offset: usize| Slot {
            payload: Payload::Offset(offset),
            count: 0,
            kind: tag.code(),
        };
        match value {
            Variant::Null => Slot::inline(tag, 0),
            Variant::String(s) | Variant::EvtXml(s) => pointer(self.push_wide(s)),
            Variant::AnsiString(s) => pointer(self.push_ansi(s)),
            Variant::SByte(v) => Slot::inline(tag, *v as u8 as u64),
            Variant::Byte(v) => Slot::inline(tag, u64::from(*v)),
            Variant::Int16(v) => Slot::inline(tag, *v as u16 as u64),
            Variant::UInt16(v) => Slot::inline(tag, u64::from(*v)),
            Variant::Int32(v) => Slot::inline(tag, *v as u32 as u64),
            Variant::UInt32(v) | Variant::HexInt32(v) => Slot::inline(tag, u64::from(*v)),
            Variant::Int64(v) => Slot::inline(tag, *v as u64),
            Variant::UInt64(v) | Variant::HexInt64(v) | Variant::SizeT(v) => Slot::inline(tag, *v),
            Variant::Single(v) => Slot::inline(tag, u64::from(v.to_bits())),
            Variant::Double(v) => Slot::inline(tag, v.to_bits()),
            Variant::Boolean(v) => Slot::inline(tag, u64::from(*v)),
            Variant::FileTime(ft) => Slot::inline(tag, ft.ticks()),
            Variant::EvtHandle(v) => Slot::inline(tag, *v as u64),
            Variant::Binary(bytes) if bytes.is_empty() => Slot::inline(tag, 0),
            Variant::Binary(bytes) => Slot {
                payload: Payload::Offset(self.push_bytes(bytes, 1)),
                count: bytes.len() as u32,
                kind: tag.code(),
            },
            Variant::Guid(g) => pointer(self.push_bytes(&g.to_le_bytes(), 4)),
            Variant::SysTime(st) => pointer(self.push_each(&[*st], 2, systime_bytes)),
            Variant::Sid(sid) => pointer(self.push_bytes(&sid.to_bytes(), 4)),
            Variant::Array(array) => self.encode_array(tag, array),
        }
    }

    fn encode_array(&mut self, tag: VariantTag, array: &VariantArray) -> Slot {
        if array.is_empty() {
            return Slot::inline(tag, 0);
        }
        let offset = match array {
            VariantArray::String(items) | VariantArray::EvtXml(items) => {
                let offsets: Vec<usize> = items.iter().map(|s| self.push_wide(s)).collect();
                self.push_table(&offsets)
            }
            VariantArray::AnsiString(items) => {
                let offsets: Vec<usize> = items.iter().map(|s| self.push_ansi(s)).collect();
                self.push_table(&offsets)
            }
            VariantArray::Sid(items) => {
                let offsets: Vec<usize> = items
                    .iter()
                    .map(|sid| self.push_bytes(&sid.to_bytes(), 4))
                    .collect();
                self.push_table(&offsets)
            }
            VariantArray::SByte(items) => self.push_each(items, 1, |v| v.to_ne_bytes()),
            VariantArray::Byte(items) => self.push_bytes(items, 1),
            VariantArray::Int16(items) => self.push_each(items, 2, |v| v.to_ne_bytes()),
            VariantArray::UInt16(items) => self.push_each(items, 2, |v| v.to_ne_bytes()),
            VariantArray::Int32(items) => self.push_each(items, 4, |v| v.to_ne_bytes()),
            VariantArray::UInt32(items) | VariantArray::HexInt32(items) => {
                self.push_each(items, 4, |v| v.to_ne_bytes())
            }
            VariantArray::Int64(items) => self.push_each(items, 8, |v| v.to_ne_bytes()),
            VariantArray::UInt64(items) | VariantArray::HexInt64(items) => {
                self.push_each(items, 8, |v| v.to_ne_bytes())
            }
            VariantArray::Single(items) => self.push_each(items, 4, |v| v.to_ne_bytes()),
            VariantArray::Double(items) => self.push_each(items, 8, |v| v.to_ne_bytes()),
            VariantArray::Boolean(items) => {
                self.push_each(items, 4, |v| i32::from(*v).to_ne_bytes())
            }
            VariantArray::Guid(items) => self.push_each(items, 4, |g| g.to_le_bytes()),
            VariantArray::SizeT(items) => {
                self.push_each(items, PTR_SIZE, |v| (*v as usize).to_ne_bytes())
            }
            VariantArray::FileTime(items) => self.push_each(items, 4, |ft| ft.ticks().to_ne_bytes()),
            VariantArray::SysTime(items) => self.push_each(items, 2, systime_bytes),
        };
        Slot {
            payload: Payload::Offset(offset),
            count: array.len() as u32,
            kind: tag.code(),
        }
    }
}

fn systime_bytes(st: &evtlog_core::SystemTime) -> [u8; 16] {
    let fields = [
        st.year,
        st.month,
        st.day_of_week,
        st.day,
        st.hour,
        st.minute,
        st.second,
        st.milliseconds,
    ];
    let mut out = [0u8; 16];
    for (chunk, field) in out.chunks_exact_mut(2).zip(fields) {
        chunk.copy_from_slice(&field.to_ne_bytes());
    }
    out
}

/// Render `fields` into `buffer`, or report the size needed
pub(crate) fn marshal(fields: &[Field], buffer: &mut RenderBuffer) -> RenderOutcome {
    let header_len = fields.len() * RAW_VARIANT_SIZE;
    let mut arena = Arena::default();
    let slots: Vec<Slot> = fields.iter().map(|f| arena.encode(f)).collect();

    let required = header_len + arena.bytes.len();
    if buffer.len() < required {
        return RenderOutcome::InsufficientBuffer { required };
    }

    let base = buffer.as_mut_ptr() as usize + header_len;
    arena.relocate(base);

    let bytes = buffer.as_bytes_mut();
    for (i, slot) in slots.iter().enumerate() {
        let raw = RawVariant {
            value: match slot.payload {
                Payload::Inline(bits) => bits,
                Payload::Offset(offset) => (base + offset) as u64,
            },
            count: slot.count,
            kind: slot.kind,
        };
        let at = i * RAW_VARIANT_SIZE;
        bytes[at..at + 8].copy_from_slice(&raw.value.to_ne_bytes());
        bytes[at + 8..at + 12].copy_from_slice(&raw.count.to_ne_bytes());
        bytes[at + 12..at + 16].copy_from_slice(&raw.kind.to_ne_bytes());
    }
    bytes[header_len..required].copy_from_slice(&arena.bytes);

    RenderOutcome::Rendered {
        count: fields.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_values;
    use evtlog_core::{FileTime, Guid, Sid, SystemTime};
    use proptest::prelude::*;

    fn render(values: &[Variant]) -> Vec<Variant> {
        let fields: Vec<Field> = values.iter().cloned().map(Field::Value).collect();
        let mut buffer = RenderBuffer::with_capacity(0);
        let count = match marshal(&fields, &mut buffer) {
            RenderOutcome::Rendered { count } => count,
            RenderOutcome::InsufficientBuffer { required } => {
                buffer.grow_to(required);
                match marshal(&fields, &mut buffer) {
                    RenderOutcome::Rendered { count } => count,
                    other => panic!("second marshal failed: {other:?}"),
                }
            }
        };
        let header = buffer.header(count).unwrap();
        unsafe { decode_values(header) }.unwrap()
    }

    #[test]
    fn test_reports_required_size() {
        let fields = vec![Field::Value(Variant::String("abc".into()))];
        let mut buffer = RenderBuffer::with_capacity(16);
        assert_eq!(
            marshal(&fields, &mut buffer),
            RenderOutcome::InsufficientBuffer { required: 16 + 8 }
        );
    }

    #[test]
    fn test_empty_render() {
        let mut buffer = RenderBuffer::with_capacity(0);
        assert_eq!(marshal(&[], &mut buffer), RenderOutcome::Rendered { count: 0 });
    }

    #[test]
    fn test_mixed_layout_decodes() {
        let sid: Sid = "S-1-5-32-544".parse().unwrap();
        let values = vec![
            Variant::String("Microsoft-Windows-Security-Auditing".into()),
            Variant::UInt16(4624),
            Variant::Byte(0),
            Variant::Sid(sid.clone()),
            Variant::Guid(Guid {
                data1: 1,
                data2: 2,
                data3: 3,
                data4: [4; 8],
            }),
            Variant::SysTime(SystemTime {
                year: 2024,
                month: 2,
                day_of_week: 4,
                day: 29,
                hour: 23,
                minute: 59,
                second: 58,
                milliseconds: 7,
            }),
            Variant::Array(VariantArray::Sid(vec![sid.clone(), sid])),
            Variant::Array(VariantArray::AnsiString(vec!["a".into(), "".into()])),
            Variant::Array(VariantArray::FileTime(vec![FileTime::from_ticks(1)])),
            Variant::Binary(vec![]),
            Variant::Null,
        ];
        assert_eq!(render(&values), values);
    }

    fn arb_text() -> impl Strategy<Value = String> {
        "[^\u{0}]{0,12}"
    }

    fn arb_sid() -> impl Strategy<Value = Sid> {
        (any::<[u8; 6]>(), prop::collection::vec(any::<u32>(), 0..=15)).prop_map(
            |(authority, sub_authorities)| Sid {
                revision: 1,
                authority,
                sub_authorities,
            },
        )
    }

    fn arb_guid() -> impl Strategy<Value = Guid> {
        any::<[u8; 16]>().prop_map(|b| Guid::from_le_bytes(&b))
    }

    fn arb_systime() -> impl Strategy<Value = SystemTime> {
        any::<[u16; 8]>().prop_map(|f| SystemTime {
            year: f[0],
            month: f[1],
            day_of_week: f[2],
            day: f[3],
            hour: f[4],
            minute: f[5],
            second: f[6],
            milliseconds: f[7],
        })
    }

    fn arb_text_array() -> impl Strategy<Value = VariantArray> {
        let n = 0..6usize;
        prop_oneof![
            prop::collection::vec(arb_text(), n.clone()).prop_map(VariantArray::String),
            prop::collection::vec(arb_text(), n.clone()).prop_map(VariantArray::AnsiString),
            prop::collection::vec(arb_text(), n.clone()).prop_map(VariantArray::EvtXml),
            prop::collection::vec(arb_sid(), n).prop_map(VariantArray::Sid),
        ]
    }

    fn arb_int_array() -> impl Strategy<Value = VariantArray> {
        let n = 0..6usize;
        prop_oneof![
            prop::collection::vec(any::<i8>(), n.clone()).prop_map(VariantArray::SByte),
            prop::collection::vec(any::<u8>(), n.clone()).prop_map(VariantArray::Byte),
            prop::collection::vec(any::<i16>(), n.clone()).prop_map(VariantArray::Int16),
            prop::collection::vec(any::<u16>(), n.clone()).prop_map(VariantArray::UInt16),
            prop::collection::vec(any::<i32>(), n.clone()).prop_map(VariantArray::Int32),
            prop::collection::vec(any::<u32>(), n.clone()).prop_map(VariantArray::UInt32),
            prop::collection::vec(any::<i64>(), n.clone()).prop_map(VariantArray::Int64),
            prop::collection::vec(any::<u64>(), n.clone()).prop_map(VariantArray::UInt64),
            prop::collection::vec(any::<u32>(), n.clone()).prop_map(VariantArray::HexInt32),
            prop::collection::vec(any::<u64>(), n).prop_map(VariantArray::HexInt64),
        ]
    }

    fn arb_struct_array() -> impl Strategy<Value = VariantArray> {
        let n = 0..6usize;
        prop_oneof![
            prop::collection::vec(-1e6f32..1e6f32, n.clone()).prop_map(VariantArray::Single),
            prop::collection::vec(-1e12f64..1e12f64, n.clone()).prop_map(VariantArray::Double),
            prop::collection::vec(any::<bool>(), n.clone()).prop_map(VariantArray::Boolean),
            prop::collection::vec(arb_guid(), n.clone()).prop_map(VariantArray::Guid),
            prop::collection::vec(any::<u32>().prop_map(u64::from), n.clone())
                .prop_map(VariantArray::SizeT),
            prop::collection::vec(any::<u64>().prop_map(FileTime::from_ticks), n.clone())
                .prop_map(VariantArray::FileTime),
            prop::collection::vec(arb_systime(), n).prop_map(VariantArray::SysTime),
        ]
    }

    fn arb_int_scalar() -> impl Strategy<Value = Variant> {
        prop_oneof![
            any::<i8>().prop_map(Variant::SByte),
            any::<u8>().prop_map(Variant::Byte),
            any::<i16>().prop_map(Variant::Int16),
            any::<u16>().prop_map(Variant::UInt16),
            any::<i32>().prop_map(Variant::Int32),
            any::<u32>().prop_map(Variant::UInt32),
            any::<i64>().prop_map(Variant::Int64),
            any::<u64>().prop_map(Variant::UInt64),
            any::<u32>().prop_map(Variant::HexInt32),
            any::<u64>().prop_map(Variant::HexInt64),
        ]
    }

    fn arb_other_scalar() -> impl Strategy<Value = Variant> {
        prop_oneof![
            Just(Variant::Null),
            arb_text().prop_map(Variant::String),
            arb_text().prop_map(Variant::AnsiString),
            arb_text().prop_map(Variant::EvtXml),
            (-1e6f32..1e6f32).prop_map(Variant::Single),
            (-1e12f64..1e12f64).prop_map(Variant::Double),
            any::<bool>().prop_map(Variant::Boolean),
            prop::collection::vec(any::<u8>(), 0..32).prop_map(Variant::Binary),
            any::<u32>().prop_map(|v| Variant::SizeT(u64::from(v))),
            any::<i32>().prop_map(|v| Variant::EvtHandle(i64::from(v))),
        ]
    }

    fn arb_struct_scalar() -> impl Strategy<Value = Variant> {
        prop_oneof![
            arb_guid().prop_map(Variant::Guid),
            any::<u64>().prop_map(|t| Variant::FileTime(FileTime::from_ticks(t))),
            arb_systime().prop_map(Variant::SysTime),
            arb_sid().prop_map(Variant::Sid),
        ]
    }

    fn arb_variant() -> impl Strategy<Value = Variant> {
        prop_oneof![
            arb_int_scalar(),
            arb_other_scalar(),
            arb_struct_scalar(),
            arb_text_array().prop_map(Variant::Array),
            arb_int_array().prop_map(Variant::Array),
            arb_struct_array().prop_map(Variant::Array),
        ]
    }

    proptest! {
        #[test]
        fn prop_decode_yields_exactly_the_tagged_kind(
            values in prop::collection::vec(arb_variant(), 0..12)
        ) {
            let decoded = render(&values);
            prop_assert_eq!(decoded.len(), values.len());
            for (got, want) in decoded.iter().zip(&values) {
                prop_assert_eq!(got.tag(), want.tag());
                prop_assert_eq!(got.count(), want.count());
                prop_assert_eq!(got, want);
            }
        }
    }
}
