//! Attribute store
//!
//! Attributes are named metadata with either global scope (a list of
//! entries) or variable scope (at most one entry per variable). Entry values
//! are decoded from the file encoding on open and re-encoded on write.

use crate::codec::{read_lane, write_lane, Scalar};
use crate::{Error, Result};
use cdfio_core::format::constants::STRING_DELIMITER;
use cdfio_core::format::field::trim_name;
use cdfio_core::{
    normalize_offset, AttributeEntryRecord, AttributeRecord, AttributeScope, ByteOrder, CdfError,
    DataType, DecodeLane, EntryChain, StorageBackend, VariableKind,
};
use hashbrown::{HashMap, HashSet};
use std::collections::BTreeMap;

/// Name of the attribute consulted for pad values
pub const FILL_VALUE: &str = "FILLVAL";

/// Decoded entry values
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeValue {
    /// CHAR/UCHAR entries; several strings when the entry is multi-valued
    Text(Vec<String>),
    Int(Vec<i64>),
    /// Float, double and epoch lanes (EPOCH16 contributes two per value)
    Float(Vec<f64>),
}

/// One attribute entry: a type code and its values
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttributeEntry {
    pub data_type: DataType,
    pub value: AttributeValue,
}

impl AttributeEntry {
    /// Single string entry
    pub fn text(value: &str) -> Self {
        Self {
            data_type: DataType::Char,
            value: AttributeValue::Text(vec![value.to_string()]),
        }
    }

    /// Multi-valued string entry
    pub fn texts<S: AsRef<str>>(values: &[S]) -> Self {
        Self {
            data_type: DataType::Char,
            value: AttributeValue::Text(values.iter().map(|s| s.as_ref().to_string()).collect()),
        }
    }

    pub fn floats(data_type: DataType, values: Vec<f64>) -> Self {
        Self {
            data_type,
            value: AttributeValue::Float(values),
        }
    }

    pub fn ints(data_type: DataType, values: Vec<i64>) -> Self {
        Self {
            data_type,
            value: AttributeValue::Int(values),
        }
    }

    /// Strings joined by newlines, for CHAR entries
    pub fn as_text(&self) -> Option<String> {
        match &self.value {
            AttributeValue::Text(parts) => Some(parts.join("\n")),
            _ => None,
        }
    }

    /// Numeric lanes widened to f64
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match &self.value {
            AttributeValue::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            AttributeValue::Float(v) => Some(v.clone()),
            AttributeValue::Text(_) => None,
        }
    }

    pub fn as_i64_vec(&self) -> Option<Vec<i64>> {
        match &self.value {
            AttributeValue::Int(v) => Some(v.clone()),
            _ => None,
        }
    }

    /// First numeric lane, used for pad resolution
    pub(crate) fn first_scalar(&self) -> Option<Scalar> {
        match &self.value {
            AttributeValue::Int(v) => v.first().map(|&x| Scalar::Int(x)),
            AttributeValue::Float(v) => v.first().map(|&x| Scalar::Float(x)),
            AttributeValue::Text(_) => None,
        }
    }

    /// Decode an entry record's values
    pub(crate) fn decode(record: &AttributeEntryRecord, order: ByteOrder) -> Result<Self> {
        let data_type = record.data_type;
        if data_type.is_char() {
            return Ok(Self {
                data_type,
                value: AttributeValue::Text(split_strings(&record.value, record.num_strings)),
            });
        }

        let width = data_type.size_bytes() / data_type.lanes_per_value();
        let lanes = record.value.len() / width;
        let is_float = matches!(
            data_type.lane(),
            DecodeLane::F32 | DecodeLane::F64 | DecodeLane::F64Pair
        );
        let mut ints = Vec::new();
        let mut floats = Vec::new();
        for lane in record.value.chunks_exact(width).take(lanes) {
            match read_lane(data_type, order, lane) {
                Scalar::Int(v) => ints.push(v),
                Scalar::Float(v) => floats.push(v),
            }
        }
        let value = if is_float {
            AttributeValue::Float(floats)
        } else {
            AttributeValue::Int(ints)
        };
        Ok(Self { data_type, value })
    }

    /// Encode into an entry record for `chain`
    pub(crate) fn encode(
        &self,
        chain: EntryChain,
        attr_num: i32,
        num: i32,
        order: ByteOrder,
    ) -> Result<AttributeEntryRecord> {
        let data_type = self.data_type;
        let (value, num_elems, num_strings) = match &self.value {
            AttributeValue::Text(parts) => {
                if !data_type.is_char() {
                    return Err(Error::InvalidArgument("text entry needs a CHAR or UCHAR type"));
                }
                let joined = parts
                    .iter()
                    .map(|s| s.as_bytes())
                    .collect::<Vec<_>>()
                    .join(STRING_DELIMITER);
                let count = parts.len().max(1);
                let len = joined.len();
                (joined, len, count)
            }
            AttributeValue::Int(values) => {
                let scalars: Vec<Scalar> = values.iter().map(|&v| Scalar::Int(v)).collect();
                encode_lanes(data_type, order, &scalars)?
            }
            AttributeValue::Float(values) => {
                let scalars: Vec<Scalar> = values.iter().map(|&v| Scalar::Float(v)).collect();
                encode_lanes(data_type, order, &scalars)?
            }
        };
        Ok(AttributeEntryRecord {
            chain,
            next: 0,
            attr_num,
            data_type,
            num,
            num_elems: to_i32(num_elems)?,
            num_strings: if data_type.is_char() { to_i32(num_strings)? } else { 0 },
            value,
        })
    }
}

fn encode_lanes(
    data_type: DataType,
    order: ByteOrder,
    scalars: &[Scalar],
) -> Result<(Vec<u8>, usize, usize)> {
    if data_type.is_char() {
        return Err(Error::InvalidArgument("numeric entry needs a numeric type"));
    }
    let lanes = data_type.lanes_per_value();
    if scalars.is_empty() || scalars.len() % lanes != 0 {
        return Err(Error::LengthMismatch {
            expected: lanes,
            found: scalars.len(),
        });
    }
    let width = data_type.size_bytes() / lanes;
    let mut out = vec![0u8; width * scalars.len()];
    for (index, (scalar, slot)) in scalars.iter().zip(out.chunks_exact_mut(width)).enumerate() {
        if !write_lane(data_type, order, *scalar, slot, false) {
            return Err(Error::ValueOutOfRange { data_type, index });
        }
    }
    Ok((out, scalars.len() / lanes, 0))
}

fn split_strings(bytes: &[u8], num_strings: i32) -> Vec<String> {
    let text = |b: &[u8]| String::from_utf8_lossy(trim_name(b)).into_owned();
    if num_strings <= 1 {
        return vec![text(bytes)];
    }
    let mut parts = Vec::with_capacity(num_strings as usize);
    let mut rest = bytes;
    while let Some(pos) = rest
        .windows(STRING_DELIMITER.len())
        .position(|w| w == STRING_DELIMITER)
    {
        parts.push(text(&rest[..pos]));
        rest = &rest[pos + STRING_DELIMITER.len()..];
    }
    parts.push(text(rest));
    parts
}

fn to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::Format(CdfError::ArraySizeOverflow))
}

/// One named attribute with its entries
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    name: String,
    number: u32,
    scope: AttributeScope,
    /// Global entries, or rVariable entries for variable scope
    entries: BTreeMap<u32, AttributeEntry>,
    /// zVariable entries
    z_entries: BTreeMap<u32, AttributeEntry>,
}

impl Attribute {
    pub fn new(name: &str, number: u32, scope: AttributeScope) -> Self {
        Self {
            name: name.to_string(),
            number,
            scope,
            entries: BTreeMap::new(),
            z_entries: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn scope(&self) -> AttributeScope {
        self.scope
    }

    /// Global entries by entry number
    pub fn entries(&self) -> impl Iterator<Item = (u32, &AttributeEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    pub fn entry(&self, number: u32) -> Option<&AttributeEntry> {
        self.entries.get(&number)
    }

    /// Entry attached to a variable
    pub fn variable_entry(&self, kind: VariableKind, number: u32) -> Option<&AttributeEntry> {
        match kind {
            VariableKind::R => self.entries.get(&number),
            VariableKind::Z => self.z_entries.get(&number),
        }
    }

    pub fn z_entries(&self) -> impl Iterator<Item = (u32, &AttributeEntry)> {
        self.z_entries.iter().map(|(k, v)| (*k, v))
    }

    fn entry_count(&self) -> usize {
        self.entries.len() + self.z_entries.len()
    }
}

/// All attributes of a file, in definition order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeStore {
    attributes: Vec<Attribute>,
    by_name: HashMap<String, usize>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.by_name.get(name).map(|&i| &self.attributes[i])
    }

    /// Global-scope attribute by name
    pub fn global(&self, name: &str) -> Option<&Attribute> {
        self.get(name)
            .filter(|attr| attr.scope == AttributeScope::Global)
    }

    /// Entry of a variable-scope attribute for one variable
    pub fn variable_entry(
        &self,
        attribute: &str,
        kind: VariableKind,
        number: u32,
    ) -> Option<&AttributeEntry> {
        self.get(attribute)
            .filter(|attr| attr.scope == AttributeScope::Variable)
            .and_then(|attr| attr.variable_entry(kind, number))
    }

    /// The variable's FILLVAL entry, if any
    pub fn fill_value(&self, kind: VariableKind, number: u32) -> Option<&AttributeEntry> {
        self.variable_entry(FILL_VALUE, kind, number)
    }

    fn attribute_mut(&mut self, name: &str, scope: AttributeScope) -> Result<&mut Attribute> {
        let index = match self.by_name.get(name) {
            Some(&index) => {
                if self.attributes[index].scope != scope {
                    return Err(Error::InvalidArgument("attribute already defined with another scope"));
                }
                index
            }
            None => {
                let index = self.attributes.len();
                self.attributes
                    .push(Attribute::new(name, index as u32, scope));
                self.by_name.insert(name.to_string(), index);
                index
            }
        };
        Ok(&mut self.attributes[index])
    }

    /// Replace the entries of a global attribute
    pub fn set_global(&mut self, name: &str, entries: Vec<AttributeEntry>) -> Result<()> {
        let attr = self.attribute_mut(name, AttributeScope::Global)?;
        attr.entries = entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| (i as u32, e))
            .collect();
        Ok(())
    }

    /// Set a variable-scope attribute's entry for one variable
    pub fn set_variable_entry(
        &mut self,
        name: &str,
        kind: VariableKind,
        number: u32,
        entry: AttributeEntry,
    ) -> Result<()> {
        let attr = self.attribute_mut(name, AttributeScope::Variable)?;
        match kind {
            VariableKind::R => attr.entries.insert(number, entry),
            VariableKind::Z => attr.z_entries.insert(number, entry),
        };
        Ok(())
    }

    /// Read the attribute chain starting at `head`
    pub(crate) fn parse<B: StorageBackend + ?Sized>(
        source: &B,
        head: u64,
        order: ByteOrder,
    ) -> Result<Self> {
        let mut store = Self::new();
        let mut visited = HashSet::new();
        let mut cursor = normalize_offset(head);
        while let Some(offset) = cursor {
            if !visited.insert(offset) {
                return Err(CdfError::ChainCycle.into());
            }
            let adr = AttributeRecord::from_bytes(source.record_at(offset)?)?;
            let name = String::from_utf8_lossy(adr.name_bytes()).into_owned();
            let number = u32::try_from(adr.num).map_err(|_| CdfError::InvalidRecordSize)?;
            let mut attr = Attribute::new(&name, number, adr.scope);
            attr.entries = read_entries(source, adr.agr_edr_head, order, &mut visited)?;
            attr.z_entries = read_entries(source, adr.az_edr_head, order, &mut visited)?;
            store.by_name.insert(name, store.attributes.len());
            store.attributes.push(attr);
            cursor = adr.next_offset();
        }
        tracing::debug!(attributes = store.len(), "read attribute chain");
        Ok(store)
    }

    /// Lay out ADR and AEDR records starting at file offset `base`.
    /// Returns the bytes and the offset of the first ADR.
    pub(crate) fn serialize(&self, base: u64, order: ByteOrder) -> Result<(Vec<u8>, u64)> {
        let mut out = Vec::new();
        let head = if self.attributes.is_empty() { 0 } else { base };

        for (i, attr) in self.attributes.iter().enumerate() {
            let attr_num = i as i32;
            let mut gr = encode_chain(attr.entries(), EntryChain::Gr, attr_num, order)?;
            let mut z = encode_chain(attr.z_entries(), EntryChain::Z, attr_num, order)?;

            let adr_offset = base + out.len() as u64;
            let mut cursor = adr_offset + AttributeRecord::SIZE as u64;
            let gr_head = link_chain(&mut gr, &mut cursor);
            let z_head = link_chain(&mut z, &mut cursor);
            let is_last = i + 1 == self.attributes.len();

            let mut adr = AttributeRecord::new(&attr.name, attr.scope, attr_num);
            adr.next = if is_last { 0 } else { cursor };
            adr.agr_edr_head = gr_head;
            adr.num_gr_entries = gr.len() as i32;
            adr.max_gr_entry = attr.entries.keys().next_back().map_or(-1, |&k| k as i32);
            adr.az_edr_head = z_head;
            adr.num_z_entries = z.len() as i32;
            adr.max_z_entry = attr.z_entries.keys().next_back().map_or(-1, |&k| k as i32);

            out.extend_from_slice(&adr.to_bytes());
            for record in gr.iter().chain(z.iter()) {
                out.extend_from_slice(&record.to_bytes());
            }
            debug_assert_eq!(base + out.len() as u64, cursor);
            tracing::trace!(attribute = %attr.name, entries = attr.entry_count(), "laid out attribute");
        }

        Ok((out, head))
    }
}

fn read_entries<B: StorageBackend + ?Sized>(
    source: &B,
    head: u64,
    order: ByteOrder,
    visited: &mut HashSet<u64>,
) -> Result<BTreeMap<u32, AttributeEntry>> {
    let mut entries = BTreeMap::new();
    let mut cursor = normalize_offset(head);
    while let Some(offset) = cursor {
        if !visited.insert(offset) {
            return Err(CdfError::ChainCycle.into());
        }
        let record = AttributeEntryRecord::from_bytes(source.record_at(offset)?)?;
        let number = u32::try_from(record.num).map_err(|_| CdfError::InvalidRecordSize)?;
        entries.insert(number, AttributeEntry::decode(&record, order)?);
        cursor = record.next_offset();
    }
    Ok(entries)
}

fn encode_chain<'a>(
    entries: impl Iterator<Item = (u32, &'a AttributeEntry)>,
    chain: EntryChain,
    attr_num: i32,
    order: ByteOrder,
) -> Result<Vec<AttributeEntryRecord>> {
    entries
        .map(|(num, entry)| entry.encode(chain, attr_num, num as i32, order))
        .collect()
}

/// Assign offsets and next pointers to a chain placed at `cursor`
fn link_chain(records: &mut [AttributeEntryRecord], cursor: &mut u64) -> u64 {
    let head = if records.is_empty() { 0 } else { *cursor };
    let count = records.len();
    for (i, record) in records.iter_mut().enumerate() {
        *cursor += record.size() as u64;
        record.next = if i + 1 == count { 0 } else { *cursor };
    }
    head
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_string_roundtrip() {
        let entry = AttributeEntry::texts(&["alpha", "beta", "gamma"]);
        let record = entry.encode(EntryChain::Gr, 0, 0, ByteOrder::Big).unwrap();
        assert_eq!(record.num_strings, 3);
        assert_eq!(record.value, b"alpha\\N beta\\N gamma".to_vec());
        let decoded = AttributeEntry::decode(&record, ByteOrder::Big).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_numeric_entry_roundtrip() {
        let entry = AttributeEntry::floats(DataType::Real4, vec![-1.0e30, 2.5]);
        let record = entry.encode(EntryChain::Z, 1, 3, ByteOrder::Little).unwrap();
        assert_eq!(record.num_elems, 2);
        assert_eq!(record.value.len(), 8);
        let decoded = AttributeEntry::decode(&record, ByteOrder::Little).unwrap();
        assert_eq!(decoded.as_f64_vec(), Some(vec![-1.0e30f32 as f64, 2.5]));

        let bad = AttributeEntry::ints(DataType::UInt1, vec![300]);
        assert!(matches!(
            bad.encode(EntryChain::Gr, 0, 0, ByteOrder::Big),
            Err(Error::ValueOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn test_store_scope_rules() {
        let mut store = AttributeStore::new();
        store.set_global("TITLE", vec![AttributeEntry::text("run 7")]).unwrap();
        store
            .set_variable_entry(FILL_VALUE, VariableKind::Z, 2, AttributeEntry::floats(DataType::Real8, vec![-1e31]))
            .unwrap();
        assert!(store.global("TITLE").is_some());
        assert!(store.global(FILL_VALUE).is_none());
        assert!(store.fill_value(VariableKind::Z, 2).is_some());
        assert!(store.fill_value(VariableKind::R, 2).is_none());
        assert!(store
            .set_variable_entry("TITLE", VariableKind::Z, 0, AttributeEntry::text("x"))
            .is_err());
    }

    #[test]
    fn test_serialize_and_parse_chain() {
        let mut store = AttributeStore::new();
        store
            .set_global("Project", vec![AttributeEntry::text("ISTP"), AttributeEntry::text("cdfio")])
            .unwrap();
        store
            .set_variable_entry("UNITS", VariableKind::Z, 0, AttributeEntry::text("nT"))
            .unwrap();
        store
            .set_variable_entry(FILL_VALUE, VariableKind::Z, 0, AttributeEntry::floats(DataType::Real8, vec![-1e31]))
            .unwrap();

        let base = 1000u64;
        let (bytes, head) = store.serialize(base, ByteOrder::Big).unwrap();
        assert_eq!(head, base);
        let mut file = vec![0u8; base as usize];
        file.extend_from_slice(&bytes);

        let parsed = AttributeStore::parse(file.as_slice(), head, ByteOrder::Big).unwrap();
        assert_eq!(parsed.len(), 3);
        let project = parsed.global("Project").unwrap();
        assert_eq!(project.entry(1).and_then(AttributeEntry::as_text).as_deref(), Some("cdfio"));
        assert_eq!(
            parsed.variable_entry("UNITS", VariableKind::Z, 0).and_then(AttributeEntry::as_text).as_deref(),
            Some("nT")
        );
        assert_eq!(parsed, store);
    }
}
