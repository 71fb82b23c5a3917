use crate::variables::{Variables, CONSTANT_ONE_ID};
use crate::wire::{self, Cursor, Emit, Parse};
use crate::{Error, Result};

const FIELD_ASSIGNED_VARIABLES: u8 = 1;

/// Concrete field-element values for the variables not covered by the
/// corresponding header's instance variables.
///
/// Several messages concatenate logically into one assignment. The
/// reserved constant-one variable never appears here.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Witness {
    /// The assigned variables and their values.
    pub assigned_variables: Variables,
}

impl Witness {
    /// Create a witness message body.
    pub const fn new(assigned_variables: Variables) -> Self {
        Self { assigned_variables }
    }

    /// Check the structural invariants, plus the reserved-id rule.
    pub fn validate(&self) -> Result<()> {
        self.assigned_variables.validate()?;

        if self.assigned_variables.ids().contains(&CONSTANT_ONE_ID) {
            return Err(Error::ReservedVariableId {
                id: CONSTANT_ONE_ID,
            });
        }

        Ok(())
    }
}

impl Emit for Witness {
    fn emit(&self, buf: &mut Vec<u8>) {
        wire::put_field(buf, FIELD_ASSIGNED_VARIABLES, |b| {
            self.assigned_variables.emit(b)
        });
    }
}

impl Parse for Witness {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut slf = Self::default();

        while !cur.is_empty() {
            let (id, mut body) = cur.field("witness record")?;

            match id {
                FIELD_ASSIGNED_VARIABLES => {
                    slf.assigned_variables = Variables::parse(&mut body)?;
                }
                _ => (),
            }
        }

        Ok(slf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_one_cannot_be_assigned() {
        let assigned =
            Variables::from_assignments([(0u64, [1u8]), (1, [2])]).unwrap();
        let witness = Witness::new(assigned);

        match witness.validate().unwrap_err() {
            Error::ReservedVariableId { id } => assert_eq!(id, 0),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn regular_assignment_validates() {
        let assigned =
            Variables::from_assignments([(3u64, [7u8]), (4, [9])]).unwrap();

        Witness::new(assigned).validate().unwrap();
    }
}
