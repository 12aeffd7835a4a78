//! Resolved static types.
//!
//! A [`TypeTable`] owns every type produced while analysing one file; the
//! rest of the crate only holds [`TypeId`] handles into it. Slots can be
//! reserved before they are defined, which is how self-referential
//! declarations (`interface Node { children: Node[] }`) end up as real cycles
//! in the graph.
pub mod parse;
pub mod prelude;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LiteralValue {
    String(String),
    Number(OrderedFloat<f64>),
    Boolean(bool),
    /// Digits only, without the `n` suffix.
    BigInt(String),
}

/// Cardinality of one tuple position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementFlag {
    Required,
    Optional,
    /// `...T[]`; the element stores `T`.
    Rest,
    /// `...T` where `T` is not an array.
    Variadic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TupleElement {
    pub ty: TypeId,
    pub flag: ElementFlag,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(String),
    /// Well-known symbol key such as `[Symbol.iterator]`.
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub key: PropertyKey,
    pub ty: TypeId,
    pub optional: bool,
}

/// Name and arguments of the alias an object type was written through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub args: Vec<TypeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectType {
    /// Nominal name (`Date`, an interface name); `None` for literal types.
    pub symbol: Option<String>,
    pub alias: Option<Alias>,
    pub type_args: Vec<TypeId>,
    pub properties: Vec<Property>,
    /// Return types of the call signatures.
    pub call_signatures: Vec<TypeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Any,
    Unknown,
    String,
    Number,
    Boolean,
    BigInt,
    Null,
    Undefined,
    Void,
    Never,
    Literal(LiteralValue),
    EnumLiteral { enum_name: String, member: String, value: LiteralValue },
    Union(Vec<TypeId>),
    Intersection(Vec<TypeId>),
    /// `None` when the element type could not be resolved.
    Array(Option<TypeId>),
    Tuple(Vec<TupleElement>),
    Object(ObjectType),
    /// Reserved slot whose definition is still being parsed.
    Pending,
}

/// A table entry: a type of its own, or a forward to a declaration's body.
#[derive(Debug, Clone)]
enum Slot {
    Kind(TypeKind),
    Ref(TypeId),
}

#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    slots: Vec<Slot>,
    /// Enum name → total member count.
    enums: IndexMap<String, usize>,
}

static NEVER: TypeKind = TypeKind::Never;

// ————————————————————————————————————————————————————————————————————————————
// CONSTRUCTION
// ————————————————————————————————————————————————————————————————————————————

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: TypeKind) -> TypeId {
        let id = TypeId(self.slots.len() as u32);
        self.slots.push(Slot::Kind(kind));
        id
    }

    pub fn reserve(&mut self) -> TypeId {
        self.insert(TypeKind::Pending)
    }

    /// Make the reserved `slot` behave exactly like `ty`. The slot forwards
    /// to `ty`, so it also sees `ty`'s definition when `ty` is itself still
    /// pending (`type Parent = Category` inside `Category`).
    pub fn define(&mut self, slot: TypeId, ty: TypeId) {
        self.slots[slot.0 as usize] = Slot::Ref(ty);
    }

    pub fn literal(&mut self, value: LiteralValue) -> TypeId {
        self.insert(TypeKind::Literal(value))
    }

    pub fn array(&mut self, element: TypeId) -> TypeId {
        self.insert(TypeKind::Array(Some(element)))
    }

    pub fn new_object(&mut self, properties: Vec<Property>) -> TypeId {
        self.insert(TypeKind::Object(ObjectType { properties, ..ObjectType::default() }))
    }

    /// Anonymous function type returning `ret`.
    pub fn function(&mut self, ret: TypeId) -> TypeId {
        self.insert(TypeKind::Object(ObjectType { call_signatures: vec![ret], ..ObjectType::default() }))
    }

    /// Union with nested unions flattened and duplicate primitives/literals
    /// removed. A single surviving member is returned as is.
    pub fn union(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat: Vec<TypeId> = Vec::new();
        for m in members {
            let parts = match self.kind(m) {
                TypeKind::Union(inner) => inner.clone(),
                _ => vec![m],
            };
            for p in parts {
                if !flat.iter().any(|f| self.same(*f, p)) {
                    flat.push(p);
                }
            }
        }
        self.widen_booleans(&mut flat);
        match flat.len() {
            1 => flat[0],
            _ => self.insert(TypeKind::Union(flat)),
        }
    }

    /// `true | false` is `boolean`.
    fn widen_booleans(&mut self, flat: &mut Vec<TypeId>) {
        let is_bool = |table: &Self, id: TypeId, value: bool| {
            matches!(table.kind(id), TypeKind::Literal(LiteralValue::Boolean(b)) if *b == value)
        };
        let has_true = flat.iter().any(|m| is_bool(self, *m, true));
        let has_false = flat.iter().any(|m| is_bool(self, *m, false));
        if !(has_true && has_false) {
            return;
        }
        let at = flat.iter().position(|m| is_bool(self, *m, true) || is_bool(self, *m, false)).unwrap_or(0);
        flat.retain(|m| !is_bool(self, *m, true) && !is_bool(self, *m, false));
        if !flat.iter().any(|m| self.is_boolean(*m)) {
            let boolean = self.insert(TypeKind::Boolean);
            flat.insert(at.min(flat.len()), boolean);
        }
    }

    pub fn intersection(&mut self, members: Vec<TypeId>) -> TypeId {
        let mut flat: Vec<TypeId> = Vec::new();
        for m in members {
            match self.kind(m) {
                TypeKind::Intersection(inner) => flat.extend(inner.iter().copied()),
                _ => flat.push(m),
            }
        }
        match flat.len() {
            1 => flat[0],
            _ => self.insert(TypeKind::Intersection(flat)),
        }
    }

    pub fn declare_enum(&mut self, name: &str, member_count: usize) {
        self.enums.insert(name.to_string(), member_count);
    }
}

// ————————————————————————————————————————————————————————————————————————————
// QUERIES
// ————————————————————————————————————————————————————————————————————————————

impl TypeTable {
    /// Kind of `id`, following defined slots. A slot that only forwards to
    /// itself (`type A = B; type B = A`) reads as `never`.
    pub fn kind(&self, id: TypeId) -> &TypeKind {
        let mut at = id;
        for _ in 0..self.slots.len() {
            match &self.slots[at.0 as usize] {
                Slot::Kind(kind) => return kind,
                Slot::Ref(target) => at = *target,
            }
        }
        &NEVER
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_string(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::String)
    }
    pub fn is_number(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Number)
    }
    pub fn is_boolean(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Boolean)
    }
    pub fn is_null(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Null)
    }
    pub fn is_undefined(&self, id: TypeId) -> bool {
        matches!(self.kind(id), TypeKind::Undefined)
    }

    /// Literal value of a literal or enum-literal type.
    pub fn literal_value(&self, id: TypeId) -> Option<&LiteralValue> {
        match self.kind(id) {
            TypeKind::Literal(v) | TypeKind::EnumLiteral { value: v, .. } => Some(v),
            _ => None,
        }
    }
    pub fn is_string_literal(&self, id: TypeId) -> bool {
        matches!(self.literal_value(id), Some(LiteralValue::String(_)))
    }
    pub fn is_number_literal(&self, id: TypeId) -> bool {
        matches!(self.literal_value(id), Some(LiteralValue::Number(_)))
    }
    pub fn is_boolean_literal(&self, id: TypeId) -> bool {
        matches!(self.literal_value(id), Some(LiteralValue::Boolean(_)))
    }

    /// Enclosing enum of an enum-literal type.
    pub fn enum_parent(&self, id: TypeId) -> Option<&str> {
        match self.kind(id) {
            TypeKind::EnumLiteral { enum_name, .. } => Some(enum_name),
            _ => None,
        }
    }
    pub fn enum_member_count(&self, name: &str) -> Option<usize> {
        self.enums.get(name).copied()
    }

    pub fn union_types(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.kind(id) {
            TypeKind::Union(members) => Some(members),
            _ => None,
        }
    }
    pub fn intersection_types(&self, id: TypeId) -> Option<&[TypeId]> {
        match self.kind(id) {
            TypeKind::Intersection(members) => Some(members),
            _ => None,
        }
    }

    pub fn object(&self, id: TypeId) -> Option<&ObjectType> {
        match self.kind(id) {
            TypeKind::Object(obj) => Some(obj),
            _ => None,
        }
    }
    pub fn call_signatures(&self, id: TypeId) -> &[TypeId] {
        self.object(id).map(|o| o.call_signatures.as_slice()).unwrap_or(&[])
    }
    pub fn property(&self, id: TypeId, name: &str) -> Option<&Property> {
        self.object(id)?
            .properties
            .iter()
            .find(|p| matches!(&p.key, PropertyKey::Name(n) if n == name))
    }
    pub fn type_arguments(&self, id: TypeId) -> &[TypeId] {
        self.object(id).map(|o| o.type_args.as_slice()).unwrap_or(&[])
    }
    pub fn alias(&self, id: TypeId) -> Option<&Alias> {
        self.object(id)?.alias.as_ref()
    }

    /// Structural identity for primitives and literals; ids otherwise.
    pub fn same(&self, a: TypeId, b: TypeId) -> bool {
        if a == b {
            return true;
        }
        use TypeKind::*;
        match (self.kind(a), self.kind(b)) {
            (Any, Any) | (Unknown, Unknown) | (String, String) | (Number, Number)
            | (Boolean, Boolean) | (BigInt, BigInt) | (Null, Null) | (Undefined, Undefined)
            | (Void, Void) | (Never, Never) => true,
            (Literal(x), Literal(y)) => x == y,
            (EnumLiteral { enum_name: e1, member: m1, .. }, EnumLiteral { enum_name: e2, member: m2, .. }) => {
                e1 == e2 && m1 == m2
            }
            _ => false,
        }
    }

    /// TypeScript-ish rendering, for diagnostics only.
    pub fn display(&self, id: TypeId) -> String {
        let mut out = String::new();
        self.write_display(id, 0, &mut out);
        out
    }

    fn write_display(&self, id: TypeId, depth: usize, out: &mut String) {
        if depth > 6 {
            out.push_str("...");
            return;
        }
        let join = |ids: &[TypeId], sep: &str, out: &mut String| {
            for (i, t) in ids.iter().enumerate() {
                if i > 0 {
                    out.push_str(sep);
                }
                self.write_display(*t, depth + 1, out);
            }
        };
        match self.kind(id) {
            TypeKind::Any => out.push_str("any"),
            TypeKind::Unknown => out.push_str("unknown"),
            TypeKind::String => out.push_str("string"),
            TypeKind::Number => out.push_str("number"),
            TypeKind::Boolean => out.push_str("boolean"),
            TypeKind::BigInt => out.push_str("bigint"),
            TypeKind::Null => out.push_str("null"),
            TypeKind::Undefined => out.push_str("undefined"),
            TypeKind::Void => out.push_str("void"),
            TypeKind::Never => out.push_str("never"),
            TypeKind::Pending => out.push_str("<pending>"),
            TypeKind::Literal(v) => out.push_str(&v.to_string()),
            TypeKind::EnumLiteral { enum_name, member, .. } => {
                out.push_str(&format!("{enum_name}.{member}"))
            }
            TypeKind::Union(ms) => join(ms, " | ", out),
            TypeKind::Intersection(ms) => join(ms, " & ", out),
            TypeKind::Array(Some(el)) => {
                out.push('(');
                self.write_display(*el, depth + 1, out);
                out.push_str(")[]");
            }
            TypeKind::Array(None) => out.push_str("unknown[]"),
            TypeKind::Tuple(els) => {
                out.push('[');
                for (i, el) in els.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    if matches!(el.flag, ElementFlag::Rest | ElementFlag::Variadic) {
                        out.push_str("...");
                    }
                    self.write_display(el.ty, depth + 1, out);
                    match el.flag {
                        ElementFlag::Optional => out.push('?'),
                        ElementFlag::Rest => out.push_str("[]"),
                        _ => {}
                    }
                }
                out.push(']');
            }
            TypeKind::Object(obj) => {
                if let Some(ret) = obj.call_signatures.first().filter(|_| obj.properties.is_empty()) {
                    out.push_str("() => ");
                    self.write_display(*ret, depth + 1, out);
                } else if let Some(alias) = &obj.alias {
                    out.push_str(&alias.name);
                    out.push('<');
                    join(&alias.args, ", ", out);
                    out.push('>');
                } else if let Some(symbol) = &obj.symbol {
                    out.push_str(symbol);
                    if !obj.type_args.is_empty() {
                        out.push('<');
                        join(&obj.type_args, ", ", out);
                        out.push('>');
                    }
                } else {
                    out.push_str("{ ");
                    for p in &obj.properties {
                        match &p.key {
                            PropertyKey::Name(n) => out.push_str(n),
                            PropertyKey::Symbol(s) => out.push_str(&format!("[Symbol.{s}]")),
                        }
                        out.push_str(if p.optional { "?: " } else { ": " });
                        self.write_display(p.ty, depth + 1, out);
                        out.push_str("; ");
                    }
                    out.push('}');
                }
            }
        }
    }
}

impl std::fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralValue::String(s) => write!(f, "{s:?}"),
            LiteralValue::Number(n) => write!(f, "{}", n.0),
            LiteralValue::Boolean(b) => write!(f, "{b}"),
            LiteralValue::BigInt(digits) => write!(f, "{digits}n"),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
