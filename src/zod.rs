//! Type-directed synthesis of zod validators.
//!
//! [`Synthesizer::synthesize`] is a recursive dispatch over the resolved
//! type. Categories overlap (a `Date` is also an object, a function is also
//! an object), so the order of the checks below is significant:
//!
//! 1. functions fail
//! 2. primitives
//! 3. unions
//! 4. literals
//! 5. arrays
//! 6. tuples
//! 7. date, set, map and record shapes
//! 8. plain objects
//! 9. intersections
//! 10. `void`, then `never` for everything else
pub mod print;

use ordered_float::OrderedFloat;

use crate::error::{Error, Result};
use crate::simplify::{self, IntersectionShape};
use crate::types::{LiteralValue, PropertyKey, TypeId, TypeKind, TypeTable};

pub const BEGIN_MARKER: &str = "/* BEGIN GENERATED CONTENT */";
pub const END_MARKER: &str = "/* END GENERATED CONTENT */";
pub const DEFAULT_MAX_DEPTH: usize = 50;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// A validator expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Zod {
    /// `z.name(args)`
    Validator { name: &'static str, args: Vec<Arg> },
    /// `recv.name(args)`, e.g. `.nullable()` or `.rest(..)`.
    Method { recv: Box<Zod>, name: &'static str, args: Vec<Arg> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arg {
    Zod(Zod),
    List(Vec<Arg>),
    Object(Vec<(String, Zod)>),
    Str(String),
    Num(OrderedFloat<f64>),
    Bool(bool),
    /// Digits only.
    BigInt(String),
    Ident(String),
}

/// Validator wrapped in the generated-content markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated(pub Zod);

pub struct Synthesizer<'t> {
    table: &'t TypeTable,
    max_depth: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Zod {
    pub fn call(name: &'static str, args: Vec<Arg>) -> Self {
        Zod::Validator { name, args }
    }

    pub fn method(self, name: &'static str) -> Self {
        self.method_with(name, Vec::new())
    }

    pub fn method_with(self, name: &'static str, args: Vec<Arg>) -> Self {
        Zod::Method { recv: Box::new(self), name, args }
    }
}

impl From<Zod> for Arg {
    fn from(zod: Zod) -> Self {
        Arg::Zod(zod)
    }
}

impl From<&LiteralValue> for Arg {
    fn from(value: &LiteralValue) -> Self {
        match value {
            LiteralValue::String(s) => Arg::Str(s.clone()),
            LiteralValue::Number(n) => Arg::Num(*n),
            LiteralValue::Boolean(b) => Arg::Bool(*b),
            LiteralValue::BigInt(digits) => Arg::BigInt(digits.clone()),
        }
    }
}

impl<'t> Synthesizer<'t> {
    pub fn new(table: &'t TypeTable) -> Self {
        Self { table, max_depth: DEFAULT_MAX_DEPTH }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Validator for a handler's return type: the promise is unwrapped and
    /// the result wrapped in markers.
    pub fn generate(&self, return_type: TypeId) -> Result<Generated> {
        let ty = simplify::remove_promise(self.table, return_type);
        Ok(Generated(self.synthesize(ty, 0)?))
    }

    pub fn synthesize(&self, ty: TypeId, depth: usize) -> Result<Zod> {
        if depth > self.max_depth {
            return Err(Error::RecursionLimit { limit: self.max_depth });
        }
        let table = self.table;
        if simplify::is_function(table, ty) {
            return Err(Error::UnsupportedFunction { ty: table.display(ty) });
        }
        let next = depth + 1;
        let zod = match table.kind(ty) {
            TypeKind::String => primitive("string"),
            TypeKind::Number => primitive("number"),
            TypeKind::Boolean => primitive("boolean"),
            TypeKind::BigInt => primitive("bigint"),
            TypeKind::Null => primitive("null"),
            TypeKind::Undefined => primitive("undefined"),
            TypeKind::Any => primitive("any"),
            TypeKind::Unknown => primitive("unknown"),
            TypeKind::Union(members) => self.union(members, next)?,
            TypeKind::Literal(value) | TypeKind::EnumLiteral { value, .. } => Zod::call("literal", vec![value.into()]),
            TypeKind::Array(element) => Zod::call("array", vec![self.or_unknown(*element, next)?.into()]),
            TypeKind::Tuple(elements) => {
                let shape = simplify::tuple_shape(table, ty, elements)?;
                let items = shape
                    .items
                    .iter()
                    .map(|item| self.synthesize(*item, next).map(Arg::Zod))
                    .collect::<Result<Vec<_>>>()?;
                let tuple = Zod::call("tuple", vec![Arg::List(items)]);
                match shape.rest {
                    Some(rest) => tuple.method_with("rest", vec![self.synthesize(rest, next)?.into()]),
                    None => tuple,
                }
            }
            TypeKind::Object(_) if simplify::is_date(table, ty) => primitive("date"),
            TypeKind::Object(_) if simplify::is_set(table, ty) => {
                let element = table.type_arguments(ty).first().copied();
                Zod::call("set", vec![self.or_unknown(element, next)?.into()])
            }
            TypeKind::Object(_) if simplify::is_map(table, ty) => {
                let args = table.type_arguments(ty);
                let (key, value) = (args.first().copied(), args.get(1).copied());
                Zod::call("map", vec![self.or_unknown(key, next)?.into(), self.or_unknown(value, next)?.into()])
            }
            TypeKind::Object(_) if simplify::record_arguments(table, ty).is_some() => {
                let (key, value) = simplify::record_arguments(table, ty).unwrap_or_default();
                Zod::call("record", vec![self.or_unknown(key, next)?.into(), self.or_unknown(value, next)?.into()])
            }
            TypeKind::Object(_) => self.object(ty, next)?,
            TypeKind::Intersection(_) => match simplify::simplify_intersection(table, ty)? {
                IntersectionShape::Chain(members) => self.intersection_chain(&members, next)?,
                IntersectionShape::Single(member) => self.synthesize(member, next)?,
            },
            TypeKind::Void => primitive("void"),
            TypeKind::Never | TypeKind::Pending => primitive("never"),
        };
        Ok(zod)
    }

    fn or_unknown(&self, ty: Option<TypeId>, depth: usize) -> Result<Zod> {
        match ty {
            Some(ty) => self.synthesize(ty, depth),
            None => Ok(primitive("unknown")),
        }
    }

    fn union(&self, members: &[TypeId], depth: usize) -> Result<Zod> {
        let table = self.table;
        let has_null = members.iter().any(|m| table.is_null(*m));
        let has_undefined = members.iter().any(|m| table.is_undefined(*m));

        let mut remaining: Vec<TypeId> = Vec::new();
        for member in members.iter().filter(|m| !table.is_null(**m) && !table.is_undefined(**m)) {
            let member = simplify::collapse_brand(table, *member);
            if !remaining.iter().any(|r| table.same(*r, member)) {
                remaining.push(member);
            }
        }
        let remaining = simplify::squash_union(table, &remaining);

        let zod = match remaining.as_slice() {
            [] => return Ok(primitive("undefined").method("nullable")),
            [only] => self.synthesize(*only, depth)?,
            many => {
                if let Some(name) = simplify::whole_enum(table, many) {
                    Zod::call("nativeEnum", vec![Arg::Ident(name.to_string())])
                } else if many.iter().all(|m| table.is_string_literal(*m)) {
                    let values = many.iter().filter_map(|m| table.literal_value(*m)).map(Arg::from).collect();
                    Zod::call("enum", vec![Arg::List(values)])
                } else {
                    let options = many
                        .iter()
                        .map(|m| self.synthesize(*m, depth).map(Arg::Zod))
                        .collect::<Result<Vec<_>>>()?;
                    Zod::call("union", vec![Arg::List(options)])
                }
            }
        };
        Ok(match (has_null, has_undefined) {
            (true, true) => zod.method("nullish"),
            (true, false) => zod.method("nullable"),
            (false, true) => zod.method("optional"),
            (false, false) => zod,
        })
    }

    /// Own named properties; symbol-keyed and function-valued ones are left out.
    fn object(&self, ty: TypeId, depth: usize) -> Result<Zod> {
        let table = self.table;
        let mut fields = Vec::new();
        for property in table.object(ty).map(|o| o.properties.as_slice()).unwrap_or(&[]) {
            let PropertyKey::Name(name) = &property.key else { continue };
            if simplify::is_function_valued(table, property.ty) {
                continue;
            }
            fields.push((name.clone(), self.synthesize(property.ty, depth)?));
        }
        Ok(Zod::call("object", vec![Arg::Object(fields)]))
    }

    /// `A & B & C` → `z.intersection(A, z.intersection(B, C))`.
    fn intersection_chain(&self, members: &[TypeId], depth: usize) -> Result<Zod> {
        match members {
            [] => Ok(primitive("never")),
            [only] => self.object(*only, depth),
            [first, rest @ ..] => {
                let left = self.object(*first, depth)?;
                let right = self.intersection_chain(rest, depth + 1)?;
                Ok(Zod::call("intersection", vec![left.into(), right.into()]))
            }
        }
    }
}

fn primitive(name: &'static str) -> Zod {
    Zod::call(name, Vec::new())
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————
