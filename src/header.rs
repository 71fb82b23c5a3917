use crate::keyvalue::{self, KeyValue};
use crate::variables::{Variables, CONSTANT_ONE_ID};
use crate::wire::{self, Cursor, Emit, Parse};
use crate::Result;

const FIELD_INSTANCE_VARIABLES: u8 = 1;
const FIELD_FREE_VARIABLE_ID: u8 = 2;
const FIELD_FIELD_MAXIMUM: u8 = 3;
const FIELD_CONFIGURATION: u8 = 4;

/// Description of a circuit or sub-circuit.
///
/// A caller emits a header to describe the inputs of a gadget; the
/// gadget echoes a header back with its outputs in
/// `instance_variables` and a strictly greater `free_variable_id`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CircuitHeader {
    /// Public/shared variables: gadget inputs on request, outputs on
    /// response.
    pub instance_variables: Variables,
    /// Exclusive upper bound on the variable ids already allocated by
    /// the sender. The recipient allocates fresh ids starting here.
    pub free_variable_id: u64,
    /// Canonical little-endian bytes of (field order - 1); fixes the
    /// field and the canonical element width. Empty means unknown.
    pub field_maximum: Vec<u8>,
    /// Construction parameters; never witness data.
    pub configuration: Vec<KeyValue>,
}

impl CircuitHeader {
    /// Create a header.
    pub const fn new(
        instance_variables: Variables,
        free_variable_id: u64,
        field_maximum: Vec<u8>,
        configuration: Vec<KeyValue>,
    ) -> Self {
        Self {
            instance_variables,
            free_variable_id,
            field_maximum,
            configuration,
        }
    }

    /// Canonical element width implied by the field maximum; zero when
    /// the field is unknown.
    pub fn field_width(&self) -> usize {
        self.field_maximum.len()
    }

    /// Check the semantic invariants: instance variables structurally
    /// sound and stored elements no wider than the field.
    pub fn validate(&self) -> Result<()> {
        self.instance_variables.validate()?;
        self.instance_variables.check_width(self.field_width())?;

        Ok(())
    }

    /// Allocate `n` fresh variable ids, advancing `free_variable_id`.
    /// Never yields the reserved constant-one id.
    pub fn allocate(&mut self, n: u64) -> std::ops::Range<u64> {
        if self.free_variable_id <= CONSTANT_ONE_ID {
            self.free_variable_id = CONSTANT_ONE_ID + 1;
        }

        let start = self.free_variable_id;

        self.free_variable_id += n;

        start..self.free_variable_id
    }
}

impl Emit for CircuitHeader {
    fn emit(&self, buf: &mut Vec<u8>) {
        wire::put_field(buf, FIELD_INSTANCE_VARIABLES, |b| {
            self.instance_variables.emit(b)
        });
        wire::put_field(buf, FIELD_FREE_VARIABLE_ID, |b| {
            wire::put_u64(b, self.free_variable_id)
        });
        wire::put_field(buf, FIELD_FIELD_MAXIMUM, |b| {
            b.extend_from_slice(&self.field_maximum)
        });

        if !self.configuration.is_empty() {
            wire::put_field(buf, FIELD_CONFIGURATION, |b| {
                keyvalue::emit_list(b, &self.configuration)
            });
        }
    }
}

impl Parse for CircuitHeader {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut slf = Self::default();

        while !cur.is_empty() {
            let (id, mut body) = cur.field("header record")?;

            match id {
                FIELD_INSTANCE_VARIABLES => {
                    slf.instance_variables = Variables::parse(&mut body)?;
                }
                FIELD_FREE_VARIABLE_ID => {
                    slf.free_variable_id = body.u64("free variable id")?;
                }
                FIELD_FIELD_MAXIMUM => {
                    slf.field_maximum =
                        body.take(body.remaining(), "field maximum")?.to_vec();
                }
                FIELD_CONFIGURATION => {
                    slf.configuration = keyvalue::parse_list(&mut body)?;
                }
                _ => (),
            }
        }

        Ok(slf)
    }
}
