use std::collections::HashSet;

use crate::keyvalue::{self, KeyValue};
use crate::wire::{self, Cursor, Emit, Parse};
use crate::{Error, Result};

/// Variable id reserved for the constant one.
///
/// A collection may refer to it, but fresh allocations never produce
/// it and witnesses never assign it.
pub const CONSTANT_ONE_ID: u64 = 0;

const FIELD_IDS: u8 = 1;
const FIELD_VALUES: u8 = 2;
const FIELD_INFO: u8 = 3;

/// Ordered collection of variable ids with an optional flat buffer of
/// field-element values, one element per id.
///
/// Field elements are opaque little-endian byte strings; no field
/// arithmetic happens at this layer. The element width is implied by
/// the buffer length and must divide evenly across the ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Variables {
    variable_ids: Vec<u64>,
    values: Option<Vec<u8>>,
    info: Vec<KeyValue>,
}

impl Variables {
    /// Create a collection, enforcing the structural invariants: ids
    /// must be distinct and the values buffer, when present, must
    /// split evenly across them.
    pub fn new(
        variable_ids: Vec<u64>,
        values: Option<Vec<u8>>,
        info: Vec<KeyValue>,
    ) -> Result<Self> {
        let slf = Self::raw(variable_ids, values, info);

        slf.validate()?;

        Ok(slf)
    }

    /// Create a collection with no assignment.
    pub fn unassigned(variable_ids: Vec<u64>) -> Result<Self> {
        Self::new(variable_ids, None, Vec::new())
    }

    /// Create a collection from (id, value) pairs. Every value must
    /// have the same width.
    pub fn from_assignments<I, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u64, V)>,
        V: AsRef<[u8]>,
    {
        let mut variable_ids = Vec::new();
        let mut values = Vec::new();
        let mut width = None;

        for (id, value) in pairs {
            let value = value.as_ref();

            match width {
                None => width = Some(value.len()),
                Some(w) if w != value.len() => {
                    return Err(Error::InconsistentValueLength {
                        ids: variable_ids.len() + 1,
                        bytes: values.len() + value.len(),
                    })
                }
                Some(_) => (),
            }

            variable_ids.push(id);
            values.extend_from_slice(value);
        }

        Self::new(variable_ids, Some(values), Vec::new())
    }

    /// Build without validation. Decoding uses this so a relay can pass
    /// through collections it does not fully understand; consumers call
    /// [`validate`](Self::validate) before trusting the data.
    pub(crate) fn raw(
        variable_ids: Vec<u64>,
        values: Option<Vec<u8>>,
        info: Vec<KeyValue>,
    ) -> Self {
        // an empty buffer carries no assignment
        let values = values.filter(|v| !v.is_empty());

        Self {
            variable_ids,
            values,
            info,
        }
    }

    /// Check the structural invariants of the collection.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.variable_ids.len());

        for id in &self.variable_ids {
            if !seen.insert(*id) {
                return Err(Error::DuplicateVariableId { id: *id });
            }
        }

        if let Some(values) = &self.values {
            let ids = self.variable_ids.len();

            if ids == 0 || values.len() % ids != 0 {
                return Err(Error::InconsistentValueLength {
                    ids,
                    bytes: values.len(),
                });
            }
        }

        Ok(())
    }

    /// Ordered variable ids.
    pub fn ids(&self) -> &[u64] {
        &self.variable_ids
    }

    /// Per-variable metadata records.
    pub fn info(&self) -> &[KeyValue] {
        &self.info
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variable_ids.len()
    }

    /// True when the collection holds no variables.
    pub fn is_empty(&self) -> bool {
        self.variable_ids.is_empty()
    }

    /// True when a value buffer is present.
    pub const fn is_assigned(&self) -> bool {
        self.values.is_some()
    }

    /// Width in bytes of each stored element, or `None` when the
    /// collection carries no assignment.
    pub fn element_width(&self) -> Option<usize> {
        let values = self.values.as_ref()?;

        if self.variable_ids.is_empty() {
            return Some(0);
        }

        Some(values.len() / self.variable_ids.len())
    }

    /// Stored value of a variable, at its stored width.
    pub fn value_of(&self, id: u64) -> Option<&[u8]> {
        let idx = self.variable_ids.iter().position(|v| *v == id)?;
        let width = self.element_width()?;

        self.values
            .as_ref()
            .map(|values| &values[idx * width..(idx + 1) * width])
    }

    /// Stored value of a variable, zero-extended on the high end to
    /// `width` bytes. Values are little-endian, so the extension
    /// appends trailing zero bytes.
    pub fn value_of_padded(&self, id: u64, width: usize) -> Option<Vec<u8>> {
        let value = self.value_of(id)?;
        let mut padded = value.to_vec();

        if padded.len() < width {
            padded.resize(width, 0);
        }

        Some(padded)
    }

    /// Check that stored elements fit the canonical field width. A
    /// `max_width` of zero means the field is unknown and the check is
    /// skipped.
    pub fn check_width(&self, max_width: usize) -> Result<()> {
        match self.element_width() {
            Some(w) if max_width > 0 && w > max_width => {
                Err(Error::InconsistentValueLength {
                    ids: self.variable_ids.len(),
                    bytes: self.values.as_ref().map(Vec::len).unwrap_or(0),
                })
            }
            _ => Ok(()),
        }
    }

    /// Iterate over (id, value) pairs; empty when unassigned.
    pub fn assignments(&self) -> impl Iterator<Item = (u64, &[u8])> {
        let width = self.element_width().unwrap_or(0);
        let values = self.values.as_deref().unwrap_or(&[]);

        self.variable_ids
            .iter()
            .enumerate()
            .take_while(move |_| width > 0)
            .map(move |(idx, id)| (*id, &values[idx * width..(idx + 1) * width]))
    }
}

impl Emit for Variables {
    fn emit(&self, buf: &mut Vec<u8>) {
        wire::put_field(buf, FIELD_IDS, |b| {
            for id in &self.variable_ids {
                wire::put_u64(b, *id);
            }
        });

        if let Some(values) = &self.values {
            wire::put_field(buf, FIELD_VALUES, |b| b.extend_from_slice(values));
        }

        if !self.info.is_empty() {
            wire::put_field(buf, FIELD_INFO, |b| {
                keyvalue::emit_list(b, &self.info)
            });
        }
    }
}

impl Parse for Variables {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut variable_ids = Vec::new();
        let mut values = None;
        let mut info = Vec::new();

        while !cur.is_empty() {
            let (id, mut body) = cur.field("variables record")?;

            match id {
                FIELD_IDS => {
                    if body.remaining() % 8 != 0 {
                        return Err(Error::MalformedMessage {
                            context: "variable id run is not a multiple of 8",
                            offset: body.offset(),
                        });
                    }

                    while !body.is_empty() {
                        variable_ids.push(body.u64("variable id")?);
                    }
                }
                FIELD_VALUES => {
                    values = Some(
                        body.take(body.remaining(), "values buffer")?.to_vec(),
                    );
                }
                FIELD_INFO => info = keyvalue::parse_list(&mut body)?,
                // forward compatibility: skip unknown records
                _ => (),
            }
        }

        Ok(Self::raw(variable_ids, values, info))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn duplicate_id_is_rejected() {
        let err = Variables::unassigned(vec![1, 2, 1]).unwrap_err();

        match err {
            Error::DuplicateVariableId { id } => assert_eq!(id, 1),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn uneven_values_are_rejected() {
        let err = Variables::new(vec![1, 2, 3], Some(vec![0u8; 7]), Vec::new())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InconsistentValueLength);
    }

    #[test]
    fn empty_values_mean_unassigned() {
        let vars =
            Variables::new(vec![1, 2], Some(Vec::new()), Vec::new()).unwrap();

        assert!(!vars.is_assigned());
        assert_eq!(vars.element_width(), None);
        assert_eq!(vars.value_of(1), None);
    }

    #[test]
    fn padded_value_extends_the_high_end() {
        let vars =
            Variables::from_assignments([(1u64, [0x11u8, 0x22]), (2, [3, 0])])
                .unwrap();

        assert_eq!(vars.element_width(), Some(2));
        assert_eq!(vars.value_of(1), Some(&[0x11, 0x22][..]));
        assert_eq!(
            vars.value_of_padded(1, 4),
            Some(vec![0x11, 0x22, 0x00, 0x00])
        );
    }

    #[test]
    fn mixed_width_assignments_are_rejected() {
        let err =
            Variables::from_assignments([(1u64, vec![1u8]), (2, vec![2u8, 0])])
                .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InconsistentValueLength);
    }

    #[test]
    fn width_check_respects_field_maximum() {
        let vars = Variables::from_assignments([(1u64, [1u8, 0, 0])]).unwrap();

        vars.check_width(4).unwrap();
        vars.check_width(3).unwrap();
        vars.check_width(0).unwrap();

        let err = vars.check_width(2).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InconsistentValueLength);
    }
}
