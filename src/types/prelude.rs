//! Shapes of the standard-library types the synthesizer cares about.
//!
//! They are built structurally (member names and type arguments), the same
//! way a user-declared look-alike would be, so the capability checks in
//! `simplify` never depend on where a type came from.

use super::{Alias, ObjectType, Property, PropertyKey, TypeId, TypeKind, TypeTable};

/// Instantiate the built-in generic `name` with `args`. `None` for unknown
/// names or a wrong argument count.
pub fn instantiate(table: &mut TypeTable, name: &str, args: &[TypeId]) -> Option<TypeId> {
    let ty = match (name, args) {
        ("Array" | "ReadonlyArray", [el]) => table.array(*el),
        ("Date", []) => {
            let string = table.insert(TypeKind::String);
            let number = table.insert(TypeKind::Number);
            let properties = vec![
                method(table, "toUTCString", string),
                method(table, "toISOString", string),
                method(table, "getDate", number),
                method(table, "getTime", number),
                method(table, "valueOf", number),
            ];
            nominal(table, "Date", Vec::new(), properties)
        }
        ("Set" | "ReadonlySet", [el]) => {
            let void = table.insert(TypeKind::Void);
            let boolean = table.insert(TypeKind::Boolean);
            let number = table.insert(TypeKind::Number);
            let mut properties = Vec::new();
            // ReadonlySet has no mutators, so it never reads as a set.
            if name == "Set" {
                properties.push(method(table, "add", void));
                properties.push(method(table, "delete", boolean));
                properties.push(method(table, "clear", void));
            }
            properties.push(method(table, "has", boolean));
            properties.push(method(table, "forEach", void));
            properties.push(field("size", number));
            properties.push(symbol_method(table, "iterator", void));
            nominal(table, name, vec![*el], properties)
        }
        ("Map" | "ReadonlyMap", [key, value]) => {
            let void = table.insert(TypeKind::Void);
            let boolean = table.insert(TypeKind::Boolean);
            let number = table.insert(TypeKind::Number);
            let mut properties = Vec::new();
            if name == "Map" {
                properties.push(method(table, "set", void));
                properties.push(method(table, "delete", boolean));
                properties.push(method(table, "clear", void));
            }
            properties.push(method(table, "get", *value));
            properties.push(method(table, "has", boolean));
            properties.push(method(table, "forEach", void));
            properties.push(field("size", number));
            properties.push(symbol_method(table, "iterator", void));
            nominal(table, name, vec![*key, *value], properties)
        }
        ("Record", [key, value]) => table.insert(TypeKind::Object(ObjectType {
            symbol: Some("__type".into()),
            alias: Some(Alias { name: "Record".into(), args: vec![*key, *value] }),
            ..ObjectType::default()
        })),
        ("Promise", [inner]) => {
            let any = table.insert(TypeKind::Any);
            let properties = vec![
                method(table, "then", any),
                method(table, "catch", any),
                method(table, "finally", any),
            ];
            nominal(table, "Promise", vec![*inner], properties)
        }
        ("Object", []) => table.new_object(Vec::new()),
        _ => return None,
    };
    Some(ty)
}

fn nominal(table: &mut TypeTable, name: &str, type_args: Vec<TypeId>, properties: Vec<Property>) -> TypeId {
    table.insert(TypeKind::Object(ObjectType {
        symbol: Some(name.to_string()),
        type_args,
        properties,
        ..ObjectType::default()
    }))
}

fn method(table: &mut TypeTable, name: &str, ret: TypeId) -> Property {
    field(name, table.function(ret))
}

fn symbol_method(table: &mut TypeTable, name: &str, ret: TypeId) -> Property {
    Property { key: PropertyKey::Symbol(name.to_string()), ty: table.function(ret), optional: false }
}

fn field(name: &str, ty: TypeId) -> Property {
    Property { key: PropertyKey::Name(name.to_string()), ty, optional: false }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_arity_is_unknown() {
        let mut t = TypeTable::new();
        let s = t.insert(TypeKind::String);
        assert!(instantiate(&mut t, "Promise", &[]).is_none());
        assert!(instantiate(&mut t, "Map", &[s]).is_none());
        assert!(instantiate(&mut t, "Nope", &[]).is_none());
    }

    #[test]
    fn promise_keeps_its_argument() {
        let mut t = TypeTable::new();
        let s = t.insert(TypeKind::String);
        let p = instantiate(&mut t, "Promise", &[s]).unwrap();
        assert_eq!(t.type_arguments(p), &[s]);
        assert_eq!(t.display(p), "Promise<string>");
    }
}
