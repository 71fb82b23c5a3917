use crate::keyvalue::{self, KeyValue};
use crate::variables::Variables;
use crate::wire::{self, Cursor, Emit, Parse};
use crate::Result;

const FIELD_CONSTRAINTS: u8 = 1;
const FIELD_INFO: u8 = 2;

/// R1CS relation (A) * (B) = (C) over three linear combinations.
///
/// Each operand is a [`Variables`] collection where the ids reference
/// variables and the values are the coefficients. No feasibility check
/// happens here: the field arithmetic is opaque to this layer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BilinearConstraint {
    /// Left operand of the product.
    pub linear_combination_a: Variables,
    /// Right operand of the product.
    pub linear_combination_b: Variables,
    /// Result side of the relation.
    pub linear_combination_c: Variables,
}

impl BilinearConstraint {
    /// Create a constraint, checking each operand structurally.
    pub fn new(a: Variables, b: Variables, c: Variables) -> Result<Self> {
        a.validate()?;
        b.validate()?;
        c.validate()?;

        Ok(Self {
            linear_combination_a: a,
            linear_combination_b: b,
            linear_combination_c: c,
        })
    }

    /// Check the structural invariants of the three operands.
    pub fn validate(&self) -> Result<()> {
        self.linear_combination_a.validate()?;
        self.linear_combination_b.validate()?;
        self.linear_combination_c.validate()?;

        Ok(())
    }
}

impl Emit for BilinearConstraint {
    fn emit(&self, buf: &mut Vec<u8>) {
        for lc in [
            &self.linear_combination_a,
            &self.linear_combination_b,
            &self.linear_combination_c,
        ] {
            let block = lc.to_vec();

            wire::put_bytes(buf, &block);
        }
    }
}

impl Parse for BilinearConstraint {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self> {
        let a = Variables::parse_all(cur.bytes("linear combination a")?)?;
        let b = Variables::parse_all(cur.bytes("linear combination b")?)?;
        let c = Variables::parse_all(cur.bytes("linear combination c")?)?;

        Ok(Self {
            linear_combination_a: a,
            linear_combination_b: b,
            linear_combination_c: c,
        })
    }
}

/// Ordered list of bilinear constraints.
///
/// Several messages concatenate logically into one list; arrival order
/// is the canonical constraint order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConstraintSystem {
    /// Constraints, in canonical order.
    pub constraints: Vec<BilinearConstraint>,
    /// Non-semantic annotations.
    pub info: Vec<KeyValue>,
}

impl ConstraintSystem {
    /// Create a constraint system.
    pub const fn new(
        constraints: Vec<BilinearConstraint>,
        info: Vec<KeyValue>,
    ) -> Self {
        Self { constraints, info }
    }

    /// Append the constraints of a later message, preserving order.
    pub fn extend(&mut self, other: ConstraintSystem) {
        self.constraints.extend(other.constraints);
        self.info.extend(other.info);
    }

    /// Check the structural invariants of every constraint.
    pub fn validate(&self) -> Result<()> {
        self.constraints.iter().try_for_each(BilinearConstraint::validate)
    }
}

impl Emit for ConstraintSystem {
    fn emit(&self, buf: &mut Vec<u8>) {
        wire::put_field(buf, FIELD_CONSTRAINTS, |b| {
            wire::put_u32(b, self.constraints.len() as u32);

            for constraint in &self.constraints {
                constraint.emit(b);
            }
        });

        if !self.info.is_empty() {
            wire::put_field(buf, FIELD_INFO, |b| {
                keyvalue::emit_list(b, &self.info)
            });
        }
    }
}

impl Parse for ConstraintSystem {
    fn parse(cur: &mut Cursor<'_>) -> Result<Self> {
        let mut slf = Self::default();

        while !cur.is_empty() {
            let (id, mut body) = cur.field("constraint system record")?;

            match id {
                FIELD_CONSTRAINTS => {
                    let count = body.u32("constraint count")? as usize;

                    if count > body.remaining() {
                        return Err(crate::Error::MalformedMessage {
                            context: "constraint count exceeds payload",
                            offset: body.offset(),
                        });
                    }

                    slf.constraints.reserve(count);

                    for _ in 0..count {
                        slf.constraints.push(BilinearConstraint::parse(&mut body)?);
                    }
                }
                FIELD_INFO => slf.info = keyvalue::parse_list(&mut body)?,
                _ => (),
            }
        }

        Ok(slf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lc(pairs: &[(u64, u8)]) -> Variables {
        Variables::from_assignments(
            pairs.iter().map(|(id, coeff)| (*id, [*coeff])),
        )
        .unwrap()
    }

    #[test]
    fn extension_preserves_order() {
        let first = ConstraintSystem::new(
            vec![
                BilinearConstraint::new(
                    lc(&[(1, 1)]),
                    lc(&[(2, 1)]),
                    lc(&[(3, 1)]),
                )
                .unwrap(),
            ],
            Vec::new(),
        );

        let second = ConstraintSystem::new(
            vec![
                BilinearConstraint::new(
                    lc(&[(3, 2)]),
                    lc(&[(0, 1)]),
                    lc(&[(4, 1)]),
                )
                .unwrap(),
            ],
            Vec::new(),
        );

        let mut merged = first.clone();
        merged.extend(second.clone());

        assert_eq!(merged.constraints.len(), 2);
        assert_eq!(merged.constraints[0], first.constraints[0]);
        assert_eq!(merged.constraints[1], second.constraints[0]);
    }

    #[test]
    fn operands_are_checked_on_construction() {
        let bad = Variables::raw(vec![5, 5], None, Vec::new());

        assert!(BilinearConstraint::new(bad, lc(&[(1, 1)]), lc(&[(2, 1)]))
            .is_err());
    }
}
