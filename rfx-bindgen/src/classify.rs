//! Classification heuristics over the API model.
//!
//! These are pure predicates over names and structural shape, kept
//! separate from the emitter so their false-positive/false-negative
//! behavior is pinned by tests instead of being re-derived from emission
//! code. Misclassification degrades output quality; it never fails a run.

use std::collections::HashSet;

use crate::model::{Struct, Typedef};

/// Canonical primitive names the generators pass through untouched.
pub fn is_primitive(name: &str) -> bool {
    matches!(
        name,
        "u8" | "u16"
            | "u32"
            | "u64"
            | "i8"
            | "i16"
            | "i32"
            | "i64"
            | "f32"
            | "f64"
            | "bool"
            | "usize"
            | "isize"
            | "c_char"
            | "c_void"
    )
}

/// Bit-flag classification is purely a substring match on the enum name;
/// value disjointness is not checked.
pub fn is_bitflags_name(name: &str) -> bool {
    name.contains("Flags") || name.contains("Bits")
}

/// A typedef to a pointer of some non-primitive type is a handle — the
/// `typedef struct RfxDeviceT* RfxDevice;` idiom.
pub fn is_handle_typedef(td: &Typedef) -> bool {
    td.target.is_pointer && !is_primitive(&td.target.name)
}

/// Whether a `Debug` derive is safe for the raw struct. Unions cannot be
/// debug-printed field by field, and neither can structs embedding one.
/// The `Data`/`union` substring check catches synthesized anonymous
/// record types whose union-ness the field type string no longer shows.
pub fn is_debug_safe(s: &Struct, union_types: &HashSet<String>) -> bool {
    if s.is_union {
        return false;
    }
    for field in &s.fields {
        if union_types.contains(&field.ty.name) {
            return false;
        }
        if field.ty.name.contains("Data") || field.ty.name.contains("union") {
            return false;
        }
    }
    true
}
