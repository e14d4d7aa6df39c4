//! Operand-fit policy for binary operators.
//!
//! Legality of a binary operation is decided by a two-dimensional table
//! indexed by the kinds of the left and right operands. Each cell lists the
//! operation classes that are legal for that pairing plus whether either
//! operand must be stringified first. The table is data, not control flow,
//! so the evaluator (and tests) drive it directly.

use bitflags::bitflags;

use crate::Kind;

bitflags! {
    /// Operation classes plus coercion directives.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpClass: u32 {
        /// `* / % + -` with an integer left operand.
        const MATH      = 1 << 0;
        /// `<< >>`.
        const SHIFT     = 1 << 1;
        /// `& | ^` with an integer left operand.
        const BITWISE   = 1 << 2;
        /// `%` with a string left operand (sprintf-style formatting).
        const FORMAT    = 1 << 3;
        /// `*` (intersection) and `-` (exclusion) on arrays.
        const SET_ISECT = 1 << 4;
        /// `|` (union) on arrays.
        const SET_UNION = 1 << 5;
        /// `&` concatenation with a string or array left operand.
        const CONCAT    = 1 << 6;
        /// `< <= > >=`.
        const REL       = 1 << 7;
        /// `=~ !~`.
        const MATCH     = 1 << 8;
        /// `== !=`.
        const EQ        = 1 << 9;
        /// `&& || and or`.
        const LOGICAL   = 1 << 10;
        /// `?:`.
        const COND      = 1 << 11;
        /// `=` and compound assignment.
        const ASSIGN    = 1 << 12;
        /// Stringify the left operand before applying the operation.
        const STR_LEFT  = 1 << 13;
        /// Stringify the right operand before applying the operation.
        const STR_RIGHT = 1 << 14;
    }
}

const ALWAYS: OpClass = OpClass::EQ
    .union(OpClass::LOGICAL)
    .union(OpClass::COND)
    .union(OpClass::ASSIGN);

fn idx(kind: Kind) -> usize {
    match kind {
        Kind::Nil => 0,
        Kind::Bool => 1,
        Kind::Int => 2,
        Kind::Str => 3,
        Kind::Array => 4,
    }
}

/// `FIT[left][right]`. Rows and columns are ordered nil, bool, int, string,
/// array. Equality, logical, conditional, and assignment are legal for every
/// pairing; the rest is per-cell.
#[rustfmt::skip]
static FIT: [[OpClass; 5]; 5] = {
    let always = ALWAYS;
    // Left nil / bool: only usable where the operation stringifies them
    // (right side of string concat and format handled by the string row).
    let inert = always;
    let int_int = always
        .union(OpClass::MATH)
        .union(OpClass::SHIFT)
        .union(OpClass::BITWISE)
        .union(OpClass::REL);
    let str_str = always
        .union(OpClass::FORMAT)
        .union(OpClass::CONCAT)
        .union(OpClass::REL)
        .union(OpClass::MATCH);
    // String op non-string: format always legal; concatenation stringifies
    // the right operand first.
    let str_other = always
        .union(OpClass::FORMAT)
        .union(OpClass::CONCAT)
        .union(OpClass::STR_RIGHT);
    let str_array = always.union(OpClass::FORMAT);
    let arr_arr = always
        .union(OpClass::SET_ISECT)
        .union(OpClass::SET_UNION)
        .union(OpClass::CONCAT);
    // Array op scalar: concatenation appends the element.
    let arr_other = always.union(OpClass::CONCAT);
    [
        /* nil   */ [inert, inert, inert, inert, inert],
        /* bool  */ [inert, inert, inert, inert, inert],
        /* int   */ [always, always, int_int, always, always],
        /* str   */ [str_other, str_other, str_other, str_str, str_array],
        /* array */ [arr_other, arr_other, arr_other, arr_other, arr_arr],
    ]
};

/// Look up the fit cell for an operand pairing.
pub fn op_fit(left: Kind, right: Kind) -> OpClass {
    FIT[idx(left)][idx(right)]
}

/// Check one operation class against the table, yielding the coercion
/// directives on success.
pub fn check(left: Kind, right: Kind, class: OpClass) -> Option<OpClass> {
    let cell = op_fit(left, right);
    if cell.contains(class) {
        Some(cell & (OpClass::STR_LEFT | OpClass::STR_RIGHT))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn math_is_int_int_only() {
        assert!(check(Kind::Int, Kind::Int, OpClass::MATH).is_some());
        assert!(check(Kind::Int, Kind::Str, OpClass::MATH).is_none());
        assert!(check(Kind::Str, Kind::Int, OpClass::MATH).is_none());
        assert!(check(Kind::Nil, Kind::Int, OpClass::MATH).is_none());
    }

    #[test]
    fn concat_stringifies_right_scalar() {
        let coerce = check(Kind::Str, Kind::Int, OpClass::CONCAT).unwrap();
        assert!(coerce.contains(OpClass::STR_RIGHT));
        let none = check(Kind::Str, Kind::Str, OpClass::CONCAT).unwrap();
        assert!(!none.contains(OpClass::STR_RIGHT));
    }

    #[test]
    fn set_ops_require_arrays() {
        assert!(check(Kind::Array, Kind::Array, OpClass::SET_UNION).is_some());
        assert!(check(Kind::Array, Kind::Int, OpClass::SET_UNION).is_none());
        assert!(check(Kind::Array, Kind::Array, OpClass::SET_ISECT).is_some());
    }

    #[test]
    fn equality_and_assignment_always_fit() {
        for &l in &[Kind::Nil, Kind::Bool, Kind::Int, Kind::Str, Kind::Array] {
            for &r in &[Kind::Nil, Kind::Bool, Kind::Int, Kind::Str, Kind::Array] {
                assert!(check(l, r, OpClass::EQ).is_some());
                assert!(check(l, r, OpClass::ASSIGN).is_some());
            }
        }
    }

    #[test]
    fn relational_on_strings_and_ints_only() {
        assert!(check(Kind::Str, Kind::Str, OpClass::REL).is_some());
        assert!(check(Kind::Int, Kind::Int, OpClass::REL).is_some());
        assert!(check(Kind::Str, Kind::Int, OpClass::REL).is_none());
        assert!(check(Kind::Bool, Kind::Bool, OpClass::REL).is_none());
    }
}
