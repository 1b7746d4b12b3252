//! Naming policy — project-prefix stripping, case conversion, reserved
//! words, the common-prefix computation for enum variants, and the
//! public-name arbitration map.

use std::collections::{BTreeSet, HashSet};

use indexmap::IndexMap;

use crate::classify;
use crate::model::{ApiModule, EnumValue};

/// Rust keywords that must be escaped as raw identifiers when a C name
/// collides with them. Names that cannot be raw identifiers at all
/// (`self`, `Self`, `super`, `crate`) are excluded; they do not occur as
/// field or parameter names in C APIs worth supporting.
const RESERVED: &[&str] = &[
    "as", "async", "await", "box", "break", "const", "continue", "dyn", "else", "enum", "extern",
    "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
    "return", "static", "struct", "trait", "type", "unsafe", "use", "where", "while", "yield",
];

/// Escape a reserved word with the `r#` prefix; other names pass through.
pub fn escape_reserved(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// The fixed naming policy of one emission pass: which project prefix to
/// strip from public identifiers.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    prefix: String,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self::new("Rfx")
    }
}

impl NamingPolicy {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Strip the project prefix (any capitalization, optional trailing
    /// underscore) from the front of `name`.
    pub fn strip_prefix<'a>(&self, name: &'a str) -> &'a str {
        let n = self.prefix.len();
        if name.len() >= n && name[..n].eq_ignore_ascii_case(&self.prefix) {
            let rest = &name[n..];
            rest.strip_prefix('_').unwrap_or(rest)
        } else {
            name
        }
    }

    /// Prefix-stripped snake_case, for function, method, field, and
    /// parameter names.
    pub fn snake_case(&self, name: &str) -> String {
        to_snake_case(self.strip_prefix(name))
    }

    /// Prefix-stripped PascalCase, for enum variant names.
    pub fn pascal_case(&self, name: &str) -> String {
        to_pascal_case(self.strip_prefix(name))
    }
}

/// camelCase / PascalCase / SCREAMING_CASE → snake_case. Runs of capitals
/// stay together until the last one starts a new word (`RGBA8Unorm` →
/// `rgba8_unorm`).
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let boundary = match chars.get(i.wrapping_sub(1)) {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => {
                    chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase())
                }
                _ => false,
            };
            if boundary {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// snake_case / SCREAMING_CASE → PascalCase, one word per underscore-
/// separated segment.
pub fn to_pascal_case(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(first) => {
                    first.to_ascii_uppercase().to_string() + &cs.as_str().to_ascii_lowercase()
                }
                None => String::new(),
            }
        })
        .collect()
}

/// Longest prefix shared by every constant name in an enum, trimmed back
/// to the last underscore boundary so that stripping it never cuts a
/// word in half.
pub fn common_prefix(values: &[EnumValue]) -> String {
    let Some(first) = values.first() else {
        return String::new();
    };
    let mut prefix = first.name.clone();
    for v in &values[1..] {
        while !prefix.is_empty() && !v.name.starts_with(&prefix) {
            prefix.pop();
        }
    }
    if let Some(pos) = prefix.rfind('_') {
        prefix.truncate(pos + 1);
    }
    prefix
}

/// Public-facing identifiers for every raw name the emitter will touch.
///
/// Assignment order is a deliberate precedence, not an accident: handles
/// first, then structs/unions, then named enums, then remaining
/// typedefs. A later category whose stripped name collides with an
/// earlier one takes a category-specific suffix, so handles win naming
/// ties over structs, structs over enums, enums over typedefs.
#[derive(Debug, Default)]
pub struct NameMap {
    map: IndexMap<String, String>,
    /// Raw names of handle types: opaque structs plus pointer typedefs.
    pub handles: BTreeSet<String>,
    /// Raw names of union types, for the debug-safety check.
    pub unions: HashSet<String>,
}

impl NameMap {
    pub fn build(module: &ApiModule, policy: &NamingPolicy) -> Self {
        let mut handles = BTreeSet::new();
        let mut unions = HashSet::new();
        for (name, s) in &module.structs {
            if s.is_opaque {
                handles.insert(name.clone());
            }
            if s.is_union {
                unions.insert(name.clone());
            }
        }
        for td in &module.typedefs {
            if classify::is_handle_typedef(td) {
                handles.insert(td.name.clone());
            }
        }

        let mut map = IndexMap::new();
        let mut used: HashSet<String> = HashSet::new();

        for handle in &handles {
            let safe = policy.strip_prefix(handle).to_string();
            used.insert(safe.clone());
            map.insert(handle.clone(), safe);
        }

        let mut struct_names: Vec<&String> = module.structs.keys().collect();
        struct_names.sort();
        for name in struct_names {
            if map.contains_key(name) {
                continue;
            }
            let mut safe = policy.strip_prefix(name).to_string();
            if used.contains(&safe) {
                safe.push_str("Struct");
            }
            used.insert(safe.clone());
            map.insert(name.clone(), safe);
        }

        for e in &module.enums {
            if e.is_anonymous || e.name.is_empty() || map.contains_key(&e.name) {
                continue;
            }
            let mut safe = policy.strip_prefix(&e.name).to_string();
            if used.contains(&safe) {
                let suffix = if e.name.contains("Flags") { "Flags" } else { "Enum" };
                if !safe.ends_with(suffix) {
                    safe.push_str(suffix);
                }
            }
            used.insert(safe.clone());
            map.insert(e.name.clone(), safe);
        }

        for td in &module.typedefs {
            if map.contains_key(&td.name) {
                continue;
            }
            let mut safe = policy.strip_prefix(&td.name).to_string();
            if used.contains(&safe) {
                safe.push_str("Type");
            }
            used.insert(safe.clone());
            map.insert(td.name.clone(), safe);
        }

        Self {
            map,
            handles,
            unions,
        }
    }

    /// Public name for a raw identifier, if it was assigned one.
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.map.get(raw).map(String::as_str)
    }

    /// Public name for a raw identifier, falling back to the raw name.
    pub fn public<'n>(&'n self, raw: &'n str) -> &'n str {
        self.get(raw).unwrap_or(raw)
    }

    /// All (raw, public) pairs in assignment order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.map.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Struct, TypeInfo, Typedef};

    fn ev(name: &str) -> EnumValue {
        EnumValue {
            name: name.to_string(),
            value: 0,
            doc: None,
        }
    }

    #[test]
    fn prefix_stripping_handles_capitalization_variants() {
        let policy = NamingPolicy::default();
        assert_eq!(policy.strip_prefix("RfxDevice"), "Device");
        assert_eq!(policy.strip_prefix("RFX_FORMAT_UNKNOWN"), "FORMAT_UNKNOWN");
        assert_eq!(policy.strip_prefix("rfxDeviceDestroy"), "DeviceDestroy");
        assert_eq!(policy.strip_prefix("Rfx_Buffer"), "Buffer");
        assert_eq!(policy.strip_prefix("Unrelated"), "Unrelated");
    }

    #[test]
    fn snake_case_conversion() {
        assert_eq!(to_snake_case("DeviceDestroy"), "device_destroy");
        assert_eq!(to_snake_case("commandListT"), "command_list_t");
        assert_eq!(to_snake_case("RGBA8Unorm"), "rgba8_unorm");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn pascal_case_conversion() {
        assert_eq!(to_pascal_case("UNKNOWN"), "Unknown");
        assert_eq!(to_pascal_case("RGBA8"), "Rgba8");
        assert_eq!(to_pascal_case("two_words"), "TwoWords");
    }

    #[test]
    fn common_prefix_trims_to_underscore() {
        let values = [ev("Rfx_Format_Unknown"), ev("Rfx_Format_Rgba8")];
        assert_eq!(common_prefix(&values), "Rfx_Format_");
    }

    #[test]
    fn common_prefix_of_camel_names_is_untouched() {
        let values = [ev("RfxFormatUnknown"), ev("RfxFormatRgba8")];
        assert_eq!(common_prefix(&values), "RfxFormat");
    }

    #[test]
    fn reserved_words_are_raw_escaped() {
        assert_eq!(escape_reserved("type"), "r#type");
        assert_eq!(escape_reserved("width"), "width");
    }

    fn opaque(name: &str) -> Struct {
        Struct {
            name: name.to_string(),
            fields: vec![],
            is_union: false,
            is_opaque: true,
            doc: None,
        }
    }

    fn complete(name: &str) -> Struct {
        Struct {
            is_opaque: false,
            ..opaque(name)
        }
    }

    #[test]
    fn handles_win_naming_ties_over_structs() {
        let mut module = ApiModule::default();
        // An opaque tag and a complete struct that strip to the same name.
        module.upsert_struct(opaque("RfxBuffer"));
        module.upsert_struct(complete("Rfx_Buffer"));

        let names = NameMap::build(&module, &NamingPolicy::default());
        assert_eq!(names.get("RfxBuffer"), Some("Buffer"));
        assert_eq!(names.get("Rfx_Buffer"), Some("BufferStruct"));
    }

    #[test]
    fn colliding_enums_and_typedefs_take_category_suffixes() {
        let mut module = ApiModule::default();
        module.upsert_struct(complete("RfxFence"));
        module.push_enum(crate::model::Enum {
            name: "Rfx_Fence".to_string(),
            repr: Default::default(),
            values: vec![],
            is_anonymous: false,
            is_bitflags: false,
            doc: None,
            node_id: None,
        });
        module.typedefs.push(Typedef {
            name: "rfxFence".to_string(),
            target: TypeInfo::named("u64"),
            doc: None,
        });

        let names = NameMap::build(&module, &NamingPolicy::default());
        assert_eq!(names.get("RfxFence"), Some("Fence"));
        assert_eq!(names.get("Rfx_Fence"), Some("FenceEnum"));
        assert_eq!(names.get("rfxFence"), Some("FenceType"));
    }

    #[test]
    fn pointer_typedef_is_registered_as_a_handle() {
        let mut module = ApiModule::default();
        module.typedefs.push(Typedef {
            name: "RfxDevice".to_string(),
            target: TypeInfo {
                is_pointer: true,
                ..TypeInfo::named("RfxDeviceT")
            },
            doc: None,
        });
        let names = NameMap::build(&module, &NamingPolicy::default());
        assert!(names.handles.contains("RfxDevice"));
        assert_eq!(names.get("RfxDevice"), Some("Device"));
    }
}
