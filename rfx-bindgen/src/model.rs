//! Intermediate API model — the bridge between AST ingestion and code
//! emission.
//!
//! These types are independent of both the clang dump format and the
//! emitted Rust text, so each half of the pipeline can be tested in
//! isolation. Everything is a plain value type; a module compares equal
//! to another if and only if the two describe the same API.

use std::collections::HashMap;

use indexmap::IndexMap;

/// A single type reference.
///
/// One level of pointer indirection only — multi-level pointers collapse
/// to the single flag, a known fidelity limit. Fixed arrays up to two
/// dimensions (`array_size` is the innermost extent).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: String,
    pub is_pointer: bool,
    pub is_const: bool,
    pub array_size: Option<u64>,
    pub array_size_2d: Option<u64>,
}

impl TypeInfo {
    /// A plain non-pointer, non-array reference to `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_pointer: false,
            is_const: false,
            array_size: None,
            array_size_2d: None,
        }
    }
}

/// Width and signedness of an enum's backing integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntRepr {
    U8,
    U16,
    #[default]
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

impl IntRepr {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
        }
    }

    /// Best-effort parse of a C or canonical integer spelling. Unsigned
    /// 32-bit is the fallback on anything unrecognized, matching the
    /// default representation of an unannotated enum.
    pub fn from_spelling(spelling: &str) -> Self {
        let s = spelling.to_lowercase();
        if s.contains("unsigned")
            || s.contains("u8")
            || s.contains("u16")
            || s.contains("u32")
            || s.contains("u64")
        {
            if s.contains("char") || s.contains('8') {
                Self::U8
            } else if s.contains("short") || s.contains("16") {
                Self::U16
            } else if s.contains("long long") || s.contains("64") {
                Self::U64
            } else {
                Self::U32
            }
        } else if s.contains("char") || s.contains('8') {
            Self::I8
        } else if s.contains("short") || s.contains("16") {
            Self::I16
        } else if s.contains("long long") || s.contains("64") {
            Self::I64
        } else {
            Self::I32
        }
    }
}

/// One enum constant with its resolved (not symbolic) value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    pub name: String,
    pub value: i64,
    pub doc: Option<String>,
}

/// A C enum. Anonymous enums (`name` empty) are emitted as loose
/// constants rather than a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enum {
    pub name: String,
    pub repr: IntRepr,
    pub values: Vec<EnumValue>,
    pub is_anonymous: bool,
    /// Name-substring heuristic (`Flags`/`Bits`); no check of value
    /// disjointness.
    pub is_bitflags: bool,
    pub doc: Option<String>,
    /// Id of the declaration node, for typedef back-references.
    pub node_id: Option<String>,
}

/// A struct or union field, also used for function parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeInfo,
    pub doc: Option<String>,
}

/// A C struct or union. Starts opaque when forward-declared; upgraded to
/// complete by the first full definition seen under the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Struct {
    pub name: String,
    pub fields: Vec<Field>,
    pub is_union: bool,
    pub is_opaque: bool,
    pub doc: Option<String>,
}

/// A C function declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub ret: TypeInfo,
    pub params: Vec<Field>,
    pub doc: Option<String>,
}

/// A C typedef that survived ingestion (self-aliases are dropped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Typedef {
    pub name: String,
    pub target: TypeInfo,
    pub doc: Option<String>,
}

/// The aggregate API model — the sole handoff artifact between ingestion
/// and emission, with no back-references into the raw tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiModule {
    pub enums: Vec<Enum>,
    /// Source-node-id → index into `enums`, so a later typedef can name
    /// an already-ingested anonymous enum.
    pub enum_index: HashMap<String, usize>,
    /// Name-keyed, iteration in first-seen declaration order.
    pub structs: IndexMap<String, Struct>,
    pub functions: Vec<Function>,
    pub typedefs: Vec<Typedef>,
}

impl ApiModule {
    /// Insert or merge a struct under its name.
    ///
    /// An opaque (forward-declared) entry is replaced by a complete
    /// definition for the same name; a complete entry is never
    /// overwritten, so completion is monotonic regardless of the order
    /// declarations arrive in.
    pub fn upsert_struct(&mut self, s: Struct) {
        match self.structs.get(&s.name) {
            Some(existing) if !(existing.is_opaque && !s.is_opaque) => {}
            _ => {
                self.structs.insert(s.name.clone(), s);
            }
        }
    }

    /// Append an enum, recording its node id for later cross-referencing.
    pub fn push_enum(&mut self, e: Enum) {
        if let Some(id) = &e.node_id {
            self.enum_index.insert(id.clone(), self.enums.len());
        }
        self.enums.push(e);
    }

    /// Look up an ingested enum by the id of its declaration node.
    pub fn enum_index_of(&self, node_id: &str) -> Option<usize> {
        self.enum_index.get(node_id).copied()
    }
}
