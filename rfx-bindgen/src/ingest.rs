//! Ingestion — clang AST dump → intermediate API model.
//!
//! One pass over the top-level declaration list, in declaration order,
//! dispatching on node kind. Unrecognized constructs are skipped
//! silently; nothing in here can fail the run (only the compiler
//! subprocess can, before ingestion starts).

use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, trace, warn};

use crate::ast::{LiteralValue, Node, NodeIndex, NodeKind};
use crate::classify;
use crate::model::*;

/// Compiler-intrinsic and runtime-support names that never belong in
/// generated bindings.
const IGNORE_NAMES: &[&str] = &[
    "va_list",
    "__builtin_va_list",
    "__va_list_tag",
    "wchar_t",
    "max_align_t",
    "__int128_t",
    "__uint128_t",
    "int_least8_t",
    "int_least16_t",
    "int_least32_t",
    "int_least64_t",
    "uint_least8_t",
    "uint_least16_t",
    "uint_least32_t",
    "uint_least64_t",
    "int_fast8_t",
    "int_fast16_t",
    "int_fast32_t",
    "int_fast64_t",
    "uint_fast8_t",
    "uint_fast16_t",
    "uint_fast32_t",
    "uint_fast64_t",
    "intmax_t",
    "uintmax_t",
    "__vcrt_bool",
    "__security_cookie",
    "_StackCookie",
    "__va_start",
    "__security_init_cookie",
    "__security_check_cookie",
    "__report_gsfailure",
];

/// Map a C primitive spelling to its canonical short name.
fn map_spelling(spelling: &str) -> Option<&'static str> {
    Some(match spelling {
        "unsigned int" | "uint32_t" => "u32",
        "int" | "int32_t" => "i32",
        "unsigned char" | "uint8_t" => "u8",
        "signed char" | "int8_t" => "i8",
        "char" => "c_char",
        "unsigned short" | "uint16_t" => "u16",
        "short" | "int16_t" => "i16",
        "unsigned long long" | "uint64_t" => "u64",
        "long long" | "int64_t" => "i64",
        "float" => "f32",
        "double" => "f64",
        "void" => "c_void",
        "_Bool" | "bool" => "bool",
        "size_t" => "usize",
        "intptr_t" | "ptrdiff_t" => "isize",
        "uintptr_t" => "usize",
        _ => return None,
    })
}

/// Ingest a full AST dump into an [`ApiModule`].
///
/// `header` is the header being processed; declarations pulled in from
/// other files are filtered out by source location. Deterministic for a
/// fixed tree — ingesting the same tree twice yields equal modules.
pub fn ingest<'a>(root: &'a Node, index: &'a NodeIndex<'a>, header: &Path) -> ApiModule {
    let header_name = header
        .file_name()
        .map(|f| f.to_string_lossy().replace('\\', "/").to_lowercase())
        .unwrap_or_default();

    let mut ingestor = Ingestor {
        index,
        header_name,
        module: ApiModule::default(),
        processed: HashSet::new(),
        pending_doc: None,
        enum_name_hint: None,
    };

    for node in &root.inner {
        if !ingestor.in_header(node) {
            continue;
        }
        ingestor.visit_top(node);
    }

    debug!(
        enums = ingestor.module.enums.len(),
        structs = ingestor.module.structs.len(),
        functions = ingestor.module.functions.len(),
        typedefs = ingestor.module.typedefs.len(),
        "ingestion complete"
    );
    ingestor.module
}

struct Ingestor<'a> {
    index: &'a NodeIndex<'a>,
    /// Normalized (lowercase, forward-slash) header file name.
    header_name: String,
    module: ApiModule,
    /// Record node ids already visited, against revisits through
    /// multiple reference paths in the tree.
    processed: HashSet<String>,
    /// Doc comment buffered from a preceding sibling comment node.
    pending_doc: Option<String>,
    /// Name and representation of the most recent typedef aliasing a
    /// small fixed-width integer — the `typedef uint32_t RfxThing;`
    /// followed by an anonymous `enum { ... }` macro idiom. Reset by any
    /// other intervening declaration. Order-sensitive on purpose;
    /// generated names depend on the existing precedence.
    enum_name_hint: Option<(String, IntRepr)>,
}

impl<'a> Ingestor<'a> {
    /// A node is in scope if it has no file in its location (intrinsic,
    /// or clang eliding an unchanged file) or its file matches the
    /// processed header, case-insensitively with separators normalized.
    fn in_header(&self, node: &Node) -> bool {
        let Some(loc) = &node.loc else { return false };
        match &loc.file {
            None => true,
            Some(file) => file
                .replace('\\', "/")
                .to_lowercase()
                .ends_with(&self.header_name),
        }
    }

    /// Doc for a declaration: the buffered preceding comment wins, else
    /// the `FullComment` clang attached to the declaration itself.
    fn take_doc(&mut self, node: &Node) -> Option<String> {
        self.pending_doc.take().or_else(|| node.own_doc())
    }

    fn visit_top(&mut self, node: &Node) {
        match node.kind {
            kind if kind.is_comment() => {
                self.pending_doc = node.comment_text();
            }
            // Linkage/visibility annotations neither consume the pending
            // doc comment nor reset the enum-name tracker; an extern "C"
            // block's children are real declarations.
            NodeKind::LinkageSpecDecl | NodeKind::VisibilityAttr => {
                for child in &node.inner {
                    if self.in_header(child) {
                        self.visit_top(child);
                    }
                }
            }
            NodeKind::RecordDecl => {
                let doc = self.take_doc(node);
                self.visit_record(node, None, doc);
                self.enum_name_hint = None;
            }
            NodeKind::TypedefDecl => self.visit_typedef(node),
            NodeKind::EnumDecl => {
                let doc = self.take_doc(node);
                self.visit_enum(node, None, doc);
            }
            NodeKind::FunctionDecl => {
                self.visit_function(node);
                self.enum_name_hint = None;
            }
            _ => {
                trace!(kind = ?node.kind, "skipping unhandled node");
                self.pending_doc = None;
                self.enum_name_hint = None;
            }
        }
    }

    // -----------------------------------------------------------------
    // Records
    // -----------------------------------------------------------------

    fn visit_record(&mut self, node: &Node, forced_name: Option<&str>, doc: Option<String>) {
        if let Some(id) = node.id.as_deref()
            && self.processed.contains(id)
        {
            return;
        }
        let name = match forced_name {
            Some(n) => n.to_string(),
            None => node.name.clone().unwrap_or_default(),
        };
        if name.is_empty() {
            return;
        }
        if let Some(id) = node.id.as_deref() {
            self.processed.insert(id.to_string());
        }

        let is_union = node.tag_used.as_deref() == Some("union");
        let has_fields = node
            .inner
            .iter()
            .any(|c| matches!(c.kind, NodeKind::FieldDecl | NodeKind::RecordDecl));
        let is_complete = node.complete_definition || has_fields;

        if !is_complete {
            trace!(%name, "opaque record (forward declaration)");
            self.module.upsert_struct(Struct {
                name,
                fields: vec![],
                is_union,
                is_opaque: true,
                doc,
            });
        } else {
            let fields = self.parse_fields(node, &name);
            debug!(%name, fields = fields.len(), "extracted record");
            self.module.upsert_struct(Struct {
                name,
                fields,
                is_union,
                is_opaque: false,
                doc,
            });
        }
    }

    fn parse_fields(&mut self, record: &Node, parent_name: &str) -> Vec<Field> {
        let mut fields = Vec::new();
        for child in &record.inner {
            match child.kind {
                // Anonymous nested record: synthesize a name, visit it as
                // its own struct, and reference it through a `data` field.
                NodeKind::RecordDecl if child.name.as_deref().unwrap_or_default().is_empty() => {
                    let nested_name = if parent_name.is_empty() {
                        "AnonymousInner".to_string()
                    } else {
                        format!("{parent_name}_Data")
                    };
                    self.visit_record(child, Some(&nested_name), None);
                    fields.push(Field {
                        name: "data".to_string(),
                        ty: TypeInfo::named(nested_name),
                        doc: None,
                    });
                }
                NodeKind::FieldDecl => {
                    let Some(fname) = child.name.clone().filter(|n| !n.is_empty()) else {
                        continue;
                    };
                    let Some(qt) = child.ty.as_ref() else { continue };
                    fields.push(Field {
                        name: fname,
                        ty: parse_type(&qt.qual_type),
                        doc: child.own_doc(),
                    });
                }
                _ => {}
            }
        }
        fields
    }

    // -----------------------------------------------------------------
    // Typedefs
    // -----------------------------------------------------------------

    fn visit_typedef(&mut self, node: &Node) {
        let Some(name) = node.name.clone().filter(|n| !n.is_empty()) else {
            return;
        };
        if IGNORE_NAMES.contains(&name.as_str()) {
            return;
        }
        let doc = self.take_doc(node);

        if let Some(target) = resolve_owned_tag(node, self.index) {
            match target.kind {
                NodeKind::RecordDecl => {
                    // typedef struct { ... } Name; — the record takes the
                    // typedef's name, no separate typedef entry.
                    self.visit_record(target, Some(&name), doc);
                    self.enum_name_hint = None;
                    return;
                }
                NodeKind::EnumDecl if target.name.as_deref().unwrap_or_default().is_empty() => {
                    // typedef enum { ... } Name; — thread the name into
                    // the enum. The enum body was usually already seen as
                    // an anonymous top-level declaration, so rename it in
                    // place through the node-id index.
                    if let Some(ix) = target
                        .id
                        .as_deref()
                        .and_then(|id| self.module.enum_index_of(id))
                    {
                        let e = &mut self.module.enums[ix];
                        debug!(%name, "naming anonymous enum from typedef");
                        e.name = name.clone();
                        e.is_anonymous = false;
                        e.is_bitflags = classify::is_bitflags_name(&name);
                        if e.doc.is_none() {
                            e.doc = doc;
                        }
                    } else {
                        self.visit_enum(target, Some(&name), doc);
                    }
                    self.enum_name_hint = None;
                    return;
                }
                // A named tag target falls through to the plain path,
                // where `typedef enum Foo Foo;` drops as a self-alias.
                _ => {}
            }
        }

        let Some(qt) = node.ty.as_ref() else {
            self.enum_name_hint = None;
            return;
        };
        let target = parse_type(&qt.qual_type);

        // A typedef shadowing a primitive spelling would alias a type to
        // itself after mapping (e.g. `typedef _Bool bool;`).
        if map_spelling(&name).is_some() || classify::is_primitive(&name) {
            trace!(%name, "skipping typedef that shadows a primitive");
            self.enum_name_hint = None;
            return;
        }
        // Self-referential typedefs carry no information.
        if target.name == name && !target.is_pointer {
            trace!(%name, "skipping self-referential typedef");
            self.enum_name_hint = None;
            return;
        }

        // Track the `typedef uint32_t RfxThing;` + anonymous enum idiom:
        // a small fixed-width integer alias names the enum that follows.
        self.enum_name_hint = small_int_repr(&target).map(|repr| (name.clone(), repr));

        debug!(%name, target = %target.name, "extracted typedef");
        self.module.typedefs.push(Typedef { name, target, doc });
    }

    // -----------------------------------------------------------------
    // Enums
    // -----------------------------------------------------------------

    fn visit_enum(&mut self, node: &Node, forced_name: Option<&str>, doc: Option<String>) {
        let mut name = forced_name
            .map(str::to_string)
            .or_else(|| node.name.clone())
            .unwrap_or_default();
        let mut doc = doc;

        let mut repr = node.fixed_underlying_type.as_ref().map(|qt| {
            let spelled = map_spelling(&qt.qual_type).unwrap_or(&qt.qual_type);
            IntRepr::from_spelling(spelled)
        });

        // An untyped, unnamed enum adopts the name and width of the
        // immediately preceding small-integer typedef, which it then
        // supersedes.
        if name.is_empty()
            && repr.is_none()
            && let Some((hint_name, hint_repr)) = self.enum_name_hint.take()
        {
            if self
                .module
                .typedefs
                .last()
                .is_some_and(|td| td.name == hint_name)
            {
                let superseded = self.module.typedefs.pop();
                if doc.is_none() {
                    doc = superseded.and_then(|td| td.doc);
                }
            }
            debug!(name = %hint_name, "naming anonymous enum from integer typedef");
            name = hint_name;
            repr = Some(hint_repr);
        }

        let mut values = Vec::new();
        let mut next_value = 0i64;
        let mut pending_value_doc: Option<String> = None;
        for child in &node.inner {
            if child.kind.is_comment() {
                pending_value_doc = child.comment_text();
                continue;
            }
            if child.kind != NodeKind::EnumConstantDecl {
                pending_value_doc = None;
                continue;
            }
            let Some(vname) = child.name.clone().filter(|n| !n.is_empty()) else {
                pending_value_doc = None;
                continue;
            };
            let init = child.inner.iter().find(|n| !n.kind.is_comment());
            let value = match init {
                Some(expr) => evaluate_expr(expr),
                None => next_value,
            };
            let vdoc = child.own_doc().or_else(|| pending_value_doc.take());
            values.push(EnumValue {
                name: vname,
                value,
                doc: vdoc,
            });
            next_value = value + 1;
            pending_value_doc = None;
        }

        debug!(%name, values = values.len(), "extracted enum");
        self.module.push_enum(Enum {
            is_anonymous: name.is_empty(),
            is_bitflags: classify::is_bitflags_name(&name),
            name,
            repr: repr.unwrap_or_default(),
            values,
            doc,
            node_id: node.id.clone(),
        });
        self.enum_name_hint = None;
    }

    // -----------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------

    fn visit_function(&mut self, node: &Node) {
        let Some(name) = node.name.clone().filter(|n| !n.is_empty()) else {
            return;
        };
        if IGNORE_NAMES.contains(&name.as_str()) || name.contains("operator") {
            trace!(%name, "skipping ignored or operator function");
            return;
        }
        let doc = self.take_doc(node);

        let Some(qt) = node.ty.as_ref() else {
            warn!(%name, "function without a type string, skipping");
            return;
        };
        let ret_text = qt.qual_type.split('(').next().unwrap_or_default().trim();
        let ret = parse_type(ret_text);

        let mut params = Vec::new();
        for child in &node.inner {
            if child.kind != NodeKind::ParmVarDecl {
                continue;
            }
            let pname = child
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| "arg".to_string());
            let Some(pqt) = child.ty.as_ref() else { continue };
            params.push(Field {
                name: pname,
                ty: parse_type(&pqt.qual_type),
                doc: None,
            });
        }

        debug!(%name, params = params.len(), "extracted function");
        self.module.functions.push(Function {
            name,
            ret,
            params,
            doc,
        });
    }
}

// ---------------------------------------------------------------------------
// Typedef target resolution
// ---------------------------------------------------------------------------

/// Resolve the tag declaration a typedef points at: a directly owned
/// tag, or an elaborated-type wrapper / nested record/enum among the
/// immediate children. Stub nodes without a body are followed through
/// the node index to their defining occurrence.
fn resolve_owned_tag<'a>(node: &'a Node, index: &'a NodeIndex<'a>) -> Option<&'a Node> {
    if let Some(owned) = node.owned_tag_decl.as_deref() {
        if owned.inner.is_empty()
            && let Some(full) = owned.id.as_deref().and_then(|id| index.get(id))
        {
            return Some(full);
        }
        return Some(owned);
    }
    for child in &node.inner {
        match child.kind {
            NodeKind::ElaboratedType => {
                if let Some(resolved) = resolve_owned_tag(child, index) {
                    return Some(resolved);
                }
            }
            NodeKind::RecordDecl | NodeKind::EnumDecl => {
                if child.inner.is_empty()
                    && let Some(full) = child.id.as_deref().and_then(|id| index.get(id))
                {
                    return Some(full);
                }
                return Some(child);
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Type-string parsing
// ---------------------------------------------------------------------------

/// Parse a qualified C type string into a [`TypeInfo`].
///
/// Extracts `[N]`/`[N][M]` array suffixes (outer dimension second in the
/// source, stored as `array_size_2d`), strips `const` and tag keywords,
/// detects one level of pointer indirection, and maps primitive
/// spellings to canonical names.
pub fn parse_type(qual_type: &str) -> TypeInfo {
    let (stripped, dims) = split_array_suffixes(qual_type);
    let mut t = stripped.trim().to_string();

    let (array_size, array_size_2d) = match dims.as_slice() {
        [n] => (Some(*n), None),
        [outer, inner] => (Some(*inner), Some(*outer)),
        _ => (None, None),
    };

    let is_const = t.contains("const ");
    t = t.replace("const ", "").trim().to_string();
    let is_pointer = t.contains('*');
    t = t.replace('*', "").trim().to_string();
    t = t
        .replace("struct ", "")
        .replace("union ", "")
        .replace("enum ", "")
        .trim()
        .to_string();

    if let Some(mapped) = map_spelling(&t) {
        t = mapped.to_string();
    }

    TypeInfo {
        name: t,
        is_pointer,
        is_const,
        array_size,
        array_size_2d,
    }
}

/// Remove `[N]` groups from a type string, returning the remainder and
/// the extents in source order. Non-numeric bracket contents are left
/// untouched.
fn split_array_suffixes(s: &str) -> (String, Vec<u64>) {
    let mut out = String::with_capacity(s.len());
    let mut dims = Vec::new();
    let mut rest = s;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) if !after[..close].is_empty() => match after[..close].trim().parse() {
                Ok(n) => {
                    out.push_str(&rest[..open]);
                    dims.push(n);
                    rest = &after[close + 1..];
                }
                Err(_) => {
                    out.push_str(&rest[..open + 1]);
                    rest = after;
                }
            },
            _ => {
                out.push_str(&rest[..open + 1]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    (out, dims)
}

/// The representation of a typedef target that qualifies for the
/// enum-as-integer naming idiom: a fixed-width integer, not a pointer,
/// not an array.
fn small_int_repr(target: &TypeInfo) -> Option<IntRepr> {
    if target.is_pointer || target.array_size.is_some() {
        return None;
    }
    match target.name.as_str() {
        "u8" => Some(IntRepr::U8),
        "u16" => Some(IntRepr::U16),
        "u32" => Some(IntRepr::U32),
        "u64" => Some(IntRepr::U64),
        "i8" => Some(IntRepr::I8),
        "i16" => Some(IntRepr::I16),
        "i32" => Some(IntRepr::I32),
        "i64" => Some(IntRepr::I64),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Constant folding
// ---------------------------------------------------------------------------

/// Fold a constant expression tree to an integer, best-effort.
///
/// Integer literals and the binary operators `<< >> | & + - * /` are
/// supported; anything else (including overflow and division by zero)
/// falls back to the left operand's value. Never fails.
pub fn evaluate_expr(node: &Node) -> i64 {
    if node.kind == NodeKind::IntegerLiteral {
        return node.value.as_ref().map(LiteralValue::as_i64).unwrap_or(0);
    }

    let Some(first) = node.inner.first() else {
        return 0;
    };

    if node.kind == NodeKind::BinaryOperator && node.inner.len() >= 2 {
        let lhs = evaluate_expr(first);
        let rhs = evaluate_expr(&node.inner[1]);
        let folded = match node.opcode.as_deref() {
            Some("<<") => u32::try_from(rhs).ok().and_then(|r| lhs.checked_shl(r)),
            Some(">>") => u32::try_from(rhs).ok().and_then(|r| lhs.checked_shr(r)),
            Some("|") => Some(lhs | rhs),
            Some("&") => Some(lhs & rhs),
            Some("+") => lhs.checked_add(rhs),
            Some("-") => lhs.checked_sub(rhs),
            Some("*") => lhs.checked_mul(rhs),
            Some("/") if rhs != 0 => Some(lhs / rhs),
            _ => None,
        };
        if let Some(value) = folded {
            return value;
        }
    }

    evaluate_expr(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(value: serde_json::Value) -> Node {
        serde_json::from_value(value).expect("valid node")
    }

    #[test]
    fn parse_plain_and_pointer_types() {
        let t = parse_type("unsigned int");
        assert_eq!(t, TypeInfo::named("u32"));

        let t = parse_type("const char *");
        assert_eq!(t.name, "c_char");
        assert!(t.is_pointer);
        assert!(t.is_const);

        let t = parse_type("struct RfxDeviceT *");
        assert_eq!(t.name, "RfxDeviceT");
        assert!(t.is_pointer);
        assert!(!t.is_const);
    }

    #[test]
    fn parse_array_suffixes() {
        let t = parse_type("int[4]");
        assert_eq!(t.name, "i32");
        assert_eq!(t.array_size, Some(4));
        assert_eq!(t.array_size_2d, None);

        let t = parse_type("int[2][4]");
        assert_eq!(t.array_size, Some(4));
        assert_eq!(t.array_size_2d, Some(2));

        let t = parse_type("float[3]");
        assert_eq!(t.name, "f32");
        assert_eq!(t.array_size, Some(3));
    }

    #[test]
    fn multi_level_pointers_collapse_to_one_flag() {
        let t = parse_type("char **");
        assert!(t.is_pointer);
        assert_eq!(t.name, "c_char");
    }

    #[test]
    fn fold_shift_and_or() {
        let n = expr(serde_json::json!({
            "kind": "BinaryOperator", "opcode": "<<",
            "inner": [
                {"kind": "IntegerLiteral", "value": "1"},
                {"kind": "IntegerLiteral", "value": "4"}
            ]
        }));
        assert_eq!(evaluate_expr(&n), 16);

        let n = expr(serde_json::json!({
            "kind": "BinaryOperator", "opcode": "|",
            "inner": [
                {"kind": "IntegerLiteral", "value": "3"},
                {"kind": "IntegerLiteral", "value": "4"}
            ]
        }));
        assert_eq!(evaluate_expr(&n), 7);
    }

    #[test]
    fn unsupported_operator_falls_back_to_left_operand() {
        let n = expr(serde_json::json!({
            "kind": "BinaryOperator", "opcode": "%",
            "inner": [
                {"kind": "IntegerLiteral", "value": "7"},
                {"kind": "IntegerLiteral", "value": "3"}
            ]
        }));
        assert_eq!(evaluate_expr(&n), 7);
    }

    #[test]
    fn division_by_zero_falls_back_to_left_operand() {
        let n = expr(serde_json::json!({
            "kind": "BinaryOperator", "opcode": "/",
            "inner": [
                {"kind": "IntegerLiteral", "value": "9"},
                {"kind": "IntegerLiteral", "value": "0"}
            ]
        }));
        assert_eq!(evaluate_expr(&n), 9);
    }

    #[test]
    fn wrapper_nodes_fold_through_to_first_child() {
        let n = expr(serde_json::json!({
            "kind": "ConstantExpr",
            "inner": [{"kind": "IntegerLiteral", "value": "12"}]
        }));
        assert_eq!(evaluate_expr(&n), 12);
    }

    #[test]
    fn truncating_division() {
        let n = expr(serde_json::json!({
            "kind": "BinaryOperator", "opcode": "/",
            "inner": [
                {"kind": "IntegerLiteral", "value": "7"},
                {"kind": "IntegerLiteral", "value": "2"}
            ]
        }));
        assert_eq!(evaluate_expr(&n), 3);
    }
}
