//! Normalization of resolved types before synthesis, plus the structural
//! capability checks the synthesizer dispatches on.
//!
//! Checks look at member names and alias names only. Anything that has the
//! members of a `Date` is treated as a date, wherever it was declared; the
//! occasional false positive on a look-alike type is accepted.

use crate::error::{Error, Result};
use crate::types::{ElementFlag, PropertyKey, TupleElement, TypeId, TypeKind, TypeTable};

const DATE_MEMBERS: &[&str] = &["toUTCString", "toISOString", "getDate", "getTime"];
const SET_MEMBERS: &[&str] = &["add", "has", "forEach", "delete"];
const MAP_MEMBERS: &[&str] = &["set", "get", "has", "forEach", "delete"];

// ————————————————————————————————————————————————————————————————————————————
// NORMALIZATION
// ————————————————————————————————————————————————————————————————————————————

/// `Promise<T>` → `T`. Only the nominal `Promise` with exactly one type
/// argument is unwrapped; other thenables are left alone.
pub fn remove_promise(table: &TypeTable, ty: TypeId) -> TypeId {
    match table.object(ty) {
        Some(obj) if obj.symbol.as_deref() == Some("Promise") && obj.type_args.len() == 1 => obj.type_args[0],
        _ => ty,
    }
}

/// Drop literals absorbed by a wide member of the same primitive:
/// `'a' | string` → `string`, `3 | number` → `number`, `true | boolean` → `boolean`.
pub fn squash_union(table: &TypeTable, members: &[TypeId]) -> Vec<TypeId> {
    let has_string = members.iter().any(|m| table.is_string(*m));
    let has_number = members.iter().any(|m| table.is_number(*m));
    let has_boolean = members.iter().any(|m| table.is_boolean(*m));
    members
        .iter()
        .copied()
        .filter(|m| {
            !(has_string && table.is_string_literal(*m)
                || has_number && table.is_number_literal(*m)
                || has_boolean && table.is_boolean_literal(*m))
        })
        .collect()
}

/// Name of the enum when `members` are exactly all members of one enum.
/// A partial subset is not promoted.
pub fn whole_enum<'t>(table: &'t TypeTable, members: &[TypeId]) -> Option<&'t str> {
    let (first, rest) = members.split_first()?;
    let parent = table.enum_parent(*first)?;
    if !rest.iter().all(|m| table.enum_parent(*m) == Some(parent)) {
        return None;
    }
    (table.enum_member_count(parent) == Some(members.len())).then_some(parent)
}

/// Two-member intersection with exactly one empty object (`string & {}`)
/// → the other member. Anything else is returned unchanged.
pub fn collapse_brand(table: &TypeTable, ty: TypeId) -> TypeId {
    match table.intersection_types(ty) {
        Some(&[a, b]) => match (is_empty_object(table, a), is_empty_object(table, b)) {
            (true, false) => b,
            (false, true) => a,
            _ => ty,
        },
        _ => ty,
    }
}

/// Supported reading of an intersection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntersectionShape {
    /// Every member is a structural object; validated as a right-associated
    /// chain of binary intersections.
    Chain(Vec<TypeId>),
    /// Brand stripped; validate the remaining member.
    Single(TypeId),
}

pub fn simplify_intersection(table: &TypeTable, ty: TypeId) -> Result<IntersectionShape> {
    let members = table.intersection_types(ty).unwrap_or(&[]);
    if members.len() >= 2 && members.iter().all(|m| is_structural_object(table, *m)) {
        return Ok(IntersectionShape::Chain(members.to_vec()));
    }
    match collapse_brand(table, ty) {
        single if single != ty => Ok(IntersectionShape::Single(single)),
        _ => Err(Error::UnsupportedIntersection { ty: table.display(ty) }),
    }
}

/// Fixed positions of a tuple plus its trailing rest element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TupleShape {
    pub items: Vec<TypeId>,
    pub rest: Option<TypeId>,
}

/// Only `Required*` optionally followed by one trailing `Rest` is supported.
pub fn tuple_shape(table: &TypeTable, ty: TypeId, elements: &[TupleElement]) -> Result<TupleShape> {
    let (fixed, rest) = match elements.split_last() {
        Some((last, init)) if last.flag == ElementFlag::Rest => (init, Some(last.ty)),
        _ => (elements, None),
    };
    if fixed.iter().any(|el| el.flag != ElementFlag::Required) {
        return Err(Error::UnsupportedTuple { ty: table.display(ty) });
    }
    Ok(TupleShape { items: fixed.iter().map(|el| el.ty).collect(), rest })
}

// ————————————————————————————————————————————————————————————————————————————
// CAPABILITY CHECKS
// ————————————————————————————————————————————————————————————————————————————

pub fn is_function(table: &TypeTable, ty: TypeId) -> bool {
    !table.call_signatures(ty).is_empty()
}

/// A function, or a union of functions with `null`/`undefined`
/// (`onClick?: () => void`).
pub fn is_function_valued(table: &TypeTable, ty: TypeId) -> bool {
    let Some(members) = table.union_types(ty) else {
        return is_function(table, ty);
    };
    let mut rest = members
        .iter()
        .filter(|m| !table.is_null(**m) && !table.is_undefined(**m))
        .peekable();
    rest.peek().is_some() && rest.all(|m| is_function(table, *m))
}

pub fn is_date(table: &TypeTable, ty: TypeId) -> bool {
    has_members(table, ty, DATE_MEMBERS)
}

pub fn is_set(table: &TypeTable, ty: TypeId) -> bool {
    has_members(table, ty, SET_MEMBERS)
}

pub fn is_map(table: &TypeTable, ty: TypeId) -> bool {
    has_members(table, ty, MAP_MEMBERS)
}

/// Key and value arguments when `ty` was written through the `Record` alias.
pub fn record_arguments(table: &TypeTable, ty: TypeId) -> Option<(Option<TypeId>, Option<TypeId>)> {
    let alias = table.alias(ty).filter(|a| a.name == "Record")?;
    Some((alias.args.first().copied(), alias.args.get(1).copied()))
}

pub fn is_empty_object(table: &TypeTable, ty: TypeId) -> bool {
    table
        .object(ty)
        .is_some_and(|o| o.properties.is_empty() && o.call_signatures.is_empty() && o.alias.is_none())
}

/// Plain object type, not a function.
pub fn is_structural_object(table: &TypeTable, ty: TypeId) -> bool {
    table.object(ty).is_some() && !is_function(table, ty)
}

pub fn is_symbol_property(key: &PropertyKey) -> bool {
    matches!(key, PropertyKey::Symbol(_))
}

fn has_members(table: &TypeTable, ty: TypeId, names: &[&str]) -> bool {
    matches!(table.kind(ty), TypeKind::Object(_)) && names.iter().all(|n| table.property(ty, n).is_some())
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LiteralValue, Property, prelude};
    use ordered_float::OrderedFloat;
    use pretty_assertions::assert_eq;

    fn string_literal(t: &mut TypeTable, s: &str) -> TypeId {
        t.literal(LiteralValue::String(s.into()))
    }

    #[test]
    fn promise_unwrap_is_nominal() {
        let mut t = TypeTable::new();
        let s = t.insert(TypeKind::String);
        let p = prelude::instantiate(&mut t, "Promise", &[s]).unwrap();
        assert_eq!(remove_promise(&t, p), s);

        let any = t.insert(TypeKind::Any);
        let then = t.function(any);
        let thenable = t.new_object(vec![Property { key: PropertyKey::Name("then".into()), ty: then, optional: false }]);
        assert_eq!(remove_promise(&t, thenable), thenable);
    }

    #[test]
    fn squash_drops_absorbed_literals() {
        let mut t = TypeTable::new();
        let three = t.literal(LiteralValue::Number(OrderedFloat(3.0)));
        let a = string_literal(&mut t, "a");
        let b = string_literal(&mut t, "b");
        let s = t.insert(TypeKind::String);
        assert_eq!(squash_union(&t, &[three, a, b, s]), vec![three, s]);
        assert_eq!(squash_union(&t, &[three, a, b]), vec![three, a, b]);
    }

    #[test]
    fn brand_collapses_to_the_other_member() {
        let mut t = TypeTable::new();
        let s = t.insert(TypeKind::String);
        let empty = t.new_object(Vec::new());
        let branded = t.intersection(vec![s, empty]);
        assert_eq!(collapse_brand(&t, branded), s);
        assert_eq!(simplify_intersection(&t, branded).unwrap(), IntersectionShape::Single(s));
    }

    #[test]
    fn intersections_of_objects_chain() {
        let mut t = TypeTable::new();
        let a = t.new_object(Vec::new());
        let b = t.new_object(Vec::new());
        let c = t.new_object(Vec::new());
        let i = t.intersection(vec![a, b, c]);
        assert_eq!(simplify_intersection(&t, i).unwrap(), IntersectionShape::Chain(vec![a, b, c]));

        let s = t.insert(TypeKind::String);
        let n = t.insert(TypeKind::Number);
        let bad = t.intersection(vec![s, n]);
        assert!(matches!(simplify_intersection(&t, bad), Err(Error::UnsupportedIntersection { .. })));
    }

    #[test]
    fn tuple_shapes() {
        let mut t = TypeTable::new();
        let n = t.insert(TypeKind::Number);
        let s = t.insert(TypeKind::String);
        let el = |ty, flag| TupleElement { ty, flag };

        let ok = [el(n, ElementFlag::Required), el(s, ElementFlag::Rest)];
        let tup = t.insert(TypeKind::Tuple(ok.to_vec()));
        assert_eq!(tuple_shape(&t, tup, &ok).unwrap(), TupleShape { items: vec![n], rest: Some(s) });

        let optional = [el(n, ElementFlag::Required), el(s, ElementFlag::Optional)];
        let tup = t.insert(TypeKind::Tuple(optional.to_vec()));
        assert!(matches!(tuple_shape(&t, tup, &optional), Err(Error::UnsupportedTuple { .. })));

        let leading_rest = [el(s, ElementFlag::Rest), el(n, ElementFlag::Required)];
        let tup = t.insert(TypeKind::Tuple(leading_rest.to_vec()));
        assert!(tuple_shape(&t, tup, &leading_rest).is_err());
    }

    #[test]
    fn capability_checks_are_structural() {
        let mut t = TypeTable::new();
        let s = t.insert(TypeKind::String);
        let n = t.insert(TypeKind::Number);
        let date = prelude::instantiate(&mut t, "Date", &[]).unwrap();
        let set = prelude::instantiate(&mut t, "Set", &[s]).unwrap();
        let readonly_set = prelude::instantiate(&mut t, "ReadonlySet", &[s]).unwrap();
        let map = prelude::instantiate(&mut t, "Map", &[s, n]).unwrap();
        let record = prelude::instantiate(&mut t, "Record", &[s, n]).unwrap();

        assert!(is_date(&t, date) && !is_date(&t, set));
        assert!(is_set(&t, set) && !is_set(&t, readonly_set));
        assert!(is_map(&t, map) && !is_set(&t, map));
        assert_eq!(record_arguments(&t, record), Some((Some(s), Some(n))));
        assert_eq!(record_arguments(&t, map), None);
    }

    #[test]
    fn optional_functions_are_function_valued() {
        let mut t = TypeTable::new();
        let void = t.insert(TypeKind::Void);
        let undefined = t.insert(TypeKind::Undefined);
        let s = t.insert(TypeKind::String);
        let callback = t.function(void);
        let optional = t.union(vec![callback, undefined]);
        let mixed = t.union(vec![callback, s]);
        assert!(is_function_valued(&t, callback));
        assert!(is_function_valued(&t, optional));
        assert!(!is_function_valued(&t, mixed));
        assert!(!is_function_valued(&t, undefined));
    }
}
