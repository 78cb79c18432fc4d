//! `Value`: the central typed quantity produced by expression evaluation
//! and stored in every symbol.

use bitflags::bitflags;

use crate::symtab::SectionId;

bitflags! {
    /// Attribute bitset carried on every `Value`. At most one of
    /// `WORD_ADDRESS`/`PARCEL_ADDRESS`/`BYTE_ADDRESS` may be set, and
    /// `RELOCATABLE`/`IMMOBILE` are mutually exclusive — both invariants
    /// are enforced by the expression evaluator, not by this type.
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
    pub struct Attr: u16 {
        const WORD_ADDRESS        = 1 << 0;
        const PARCEL_ADDRESS      = 1 << 1;
        const BYTE_ADDRESS        = 1 << 2;
        const LITERAL             = 1 << 3;
        const RELOCATABLE         = 1 << 4;
        const IMMOBILE            = 1 << 5;
        const EXTERNAL            = 1 << 6;
        const ENTRY               = 1 << 7;
        const COUNTER             = 1 << 8;
        const UNDEFINED           = 1 << 9;
        const DEFINED_IN_PASS_2   = 1 << 10;
        const REDEFINABLE         = 1 << 11;
    }
}

impl Attr {
    pub const ADDRESS_MASK: Attr = Attr::WORD_ADDRESS
        .union(Attr::PARCEL_ADDRESS)
        .union(Attr::BYTE_ADDRESS);

    pub fn is_address(self) -> bool {
        self.intersects(Attr::ADDRESS_MASK)
    }

    /// Exactly one of {word, parcel, byte}-address is set (the invariant
    /// from the testable properties list), checked for address values.
    pub fn has_single_address_unit(self) -> bool {
        !self.is_address() || (self & Attr::ADDRESS_MASK).bits().count_ones() == 1
    }
}

/// The numeric payload of a `Value`. Arithmetic is always performed on
/// `i64`; `Float` exists only to carry a pure floating literal through to
/// a `Literal` emission or a unary negation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_i64(self) -> i64 {
        match self {
            Number::Int(v) => v,
            Number::Float(v) => v as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Number::Int(v) => v as f64,
            Number::Float(v) => v,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, Number::Float(_))
    }
}

impl Default for Number {
    fn default() -> Self {
        Number::Int(0)
    }
}

/// The central typed quantity: a number, its attribute bitset, the
/// section it is based on (for relocation), an external back-reference,
/// and the relocation coefficient.
#[derive(Clone, Copy, Debug, Default)]
pub struct Value {
    pub attrs: Attr,
    pub number: Number,
    /// The section this value is based on, i.e. the section whose
    /// `originOffset` contributes `coefficient` times to the final
    /// address. `None` for plain absolute values.
    pub section: Option<SectionId>,
    /// Back-reference to the external symbol's chain index, when
    /// `attrs` contains `EXTERNAL`.
    pub external: Option<u32>,
    /// Nonzero means "contributes this multiple of the section's origin
    /// to the final address". Must be exactly +1 for a well-formed
    /// relocatable/immobile result after the post-evaluation check.
    pub coefficient: i64,
}

impl Value {
    pub fn absolute(n: i64) -> Self {
        Value {
            number: Number::Int(n),
            ..Default::default()
        }
    }

    pub fn float(n: f64) -> Self {
        Value {
            number: Number::Float(n),
            ..Default::default()
        }
    }

    pub fn undefined() -> Self {
        Value {
            attrs: Attr::UNDEFINED,
            ..Default::default()
        }
    }

    pub fn is_undefined(&self) -> bool {
        self.attrs.contains(Attr::UNDEFINED)
    }

    pub fn is_relocatable(&self) -> bool {
        self.attrs.contains(Attr::RELOCATABLE)
    }

    pub fn is_immobile(&self) -> bool {
        self.attrs.contains(Attr::IMMOBILE)
    }

    pub fn is_external(&self) -> bool {
        self.attrs.contains(Attr::EXTERNAL)
    }

    /// The combined coefficient of relocatable + external contributions,
    /// used by the post-evaluation relocation check: it must not exceed
    /// +1 in magnitude once summed across a single section.
    pub fn relocation_coefficient(&self) -> i64 {
        if self.is_relocatable() || self.is_immobile() {
            self.coefficient
        } else {
            0
        }
    }

    pub fn i64_value(&self) -> i64 {
        self.number.as_i64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_mask_invariant() {
        let v = Attr::WORD_ADDRESS;
        assert!(v.has_single_address_unit());
        let v2 = Attr::WORD_ADDRESS | Attr::PARCEL_ADDRESS;
        assert!(!v2.has_single_address_unit());
        let plain = Attr::empty();
        assert!(plain.has_single_address_unit());
    }

    #[test]
    fn relocatable_and_immobile_are_distinguishable() {
        let v = Value {
            attrs: Attr::RELOCATABLE,
            coefficient: 1,
            ..Default::default()
        };
        assert_eq!(v.relocation_coefficient(), 1);
        let v = Value::absolute(5);
        assert_eq!(v.relocation_coefficient(), 0);
    }
}
