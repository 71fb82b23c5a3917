use crate::config::Flow;
use crate::keyvalue::{self, KeyValue};
use crate::wire::{self, Cursor, Emit, Parse};
use crate::Result;

const FIELD_CONSTRAINTS_GENERATION: u8 = 1;
const FIELD_WITNESS_GENERATION: u8 = 2;
const FIELD_PARAMETERS: u8 = 3;

/// Out-of-band control message, legal only as the first message of a
/// stream. It selects the flows of the session; a stream without a
/// command falls back to the configured flow.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Command {
    /// Request a constraint-generation exchange.
    pub constraints_generation: bool,
    /// Request a witness-generation exchange.
    pub witness_generation: bool,
    /// Free-form parameters for the gadget.
    pub parameters: Vec<KeyValue>,
}

impl Command {
    /// Create a command.
    pub const fn new(
        constraints_generation: bool,
        witness_generation: bool,
        parameters: Vec<KeyValue>,
    ) -> Self {
        Self {
            constraints_generation,
            witness_generation,
            parameters,
        }
    }

    /// Flow selected by the flags, or `None` when no flag is set.
    pub const fn flow(&self) -> Option<Flow> {
        match (self.constraints_generation, self.witness_generation) {
            (true, true) => Some(Flow::Both),
            (true, false) => Some(Flow::Constraints),
            (false, true) => Some(Flow::Witness),
            (false, false) => None,
        }
    }
}

impl Emit for Command {
    fn emit(&self, buf: &mut Vec<u8>) {
        wire::put_field(buf, FIELD_CONSTRAINTS_GENERATION, |b| {
            b.push(self.constraints_generation as u8)
        });
        wire::put_field(buf, FIELD_WITNESS_GENERATION, |b| {
            b.push(self.witness_generation as u8)
        });

        if !self.parameters.is_empty() {
            wire::put_field(buf, FIELD_PARAMETERS, |b| {
                keyvalue::emit_list(b, &self.parameters)
            });
        }
    }
}

impl Parse for Command {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut slf = Self::default();

        while !cur.is_empty() {
            let (id, mut body) = cur.field("command record")?;

            match id {
                FIELD_CONSTRAINTS_GENERATION => {
                    slf.constraints_generation =
                        body.u8("constraints generation flag")? != 0;
                }
                FIELD_WITNESS_GENERATION => {
                    slf.witness_generation =
                        body.u8("witness generation flag")? != 0;
                }
                FIELD_PARAMETERS => {
                    slf.parameters = keyvalue::parse_list(&mut body)?;
                }
                _ => (),
            }
        }

        Ok(slf)
    }
}
