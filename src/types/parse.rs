//! Parser for TypeScript type annotations, straight off the token stream.
//!
//! Covers what handler return types are written with in practice: primitives,
//! literals, unions, intersections, arrays, tuples, object literals
//! (properties, methods, call and index signatures), function types and
//! named references with type arguments. Mapped, conditional, indexed and
//! `keyof`/`typeof` types are reported as unsupported, which the oracle turns
//! into "unresolved".

use std::collections::HashMap;

use ordered_float::OrderedFloat;

use super::{Alias, ElementFlag, LiteralValue, ObjectType, Property, PropertyKey, TupleElement, TypeId, TypeKind, TypeTable};
use crate::syntax::{SourceFile, Tok};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeSyntaxError {
    #[error("unexpected `{found}` at byte {at}, expected {expected}")]
    Unexpected { found: String, at: usize, expected: &'static str },
    #[error("unsupported type syntax: {0}")]
    Unsupported(String),
    #[error("cannot find type `{0}`")]
    UnknownName(String),
}

type Result<T> = std::result::Result<T, TypeSyntaxError>;

/// Where named references are looked up.
pub trait TypeScope {
    fn table(&mut self) -> &mut TypeTable;
    fn resolve_named(&mut self, name: &str, args: Vec<TypeId>) -> Result<TypeId>;
    /// `Qualifier.Member`; in practice an enum member.
    fn resolve_member(&mut self, qualifier: &str, member: &str) -> Result<TypeId>;
}

pub struct TypeParser<'f, 's, S: TypeScope> {
    file: &'f SourceFile,
    pos: usize,
    scope: &'s mut S,
    /// Generic parameters in scope, already substituted.
    params: HashMap<String, TypeId>,
}

impl<'f, 's, S: TypeScope> TypeParser<'f, 's, S> {
    pub fn new(file: &'f SourceFile, pos: usize, scope: &'s mut S) -> Self {
        Self { file, pos, scope, params: HashMap::new() }
    }

    pub fn with_params(mut self, params: HashMap<String, TypeId>) -> Self {
        self.params = params;
        self
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn parse_type(&mut self) -> Result<TypeId> {
        let ty = self.parse_union()?;
        if self.file.is_ident(self.pos, "extends") {
            return Err(TypeSyntaxError::Unsupported("conditional type".into()));
        }
        Ok(ty)
    }

    /// `extends A, B<C>` list of an interface, up to its `{`.
    pub fn parse_heritage(&mut self) -> Result<Vec<TypeId>> {
        let mut out = Vec::new();
        if !self.file.is_ident(self.pos, "extends") {
            return Ok(out);
        }
        self.pos += 1;
        loop {
            out.push(self.parse_postfix()?);
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        Ok(out)
    }

    /// Members of `{ ... }` starting at the opening brace.
    pub fn parse_object_body(&mut self) -> Result<ObjectType> {
        let open = self.pos;
        let close = self
            .file
            .is(open, Tok::LBrace)
            .then(|| self.file.matching(open))
            .flatten()
            .ok_or_else(|| self.unexpected("`{`"))?;
        self.pos += 1;

        let mut obj = ObjectType::default();
        let mut index: Option<(TypeId, TypeId)> = None;
        while self.pos < close {
            if self.eat(Tok::Semi) || self.eat(Tok::Comma) {
                continue;
            }
            if self.file.is_ident(self.pos, "readonly")
                && !matches!(self.file.kind(self.pos + 1), Some(Tok::Colon | Tok::Question | Tok::LParen))
            {
                self.pos += 1;
            }
            // call signature
            if self.is(Tok::LParen) {
                let ret = self.signature_return()?;
                obj.call_signatures.push(ret);
                continue;
            }
            if self.is(Tok::Lt) {
                return Err(TypeSyntaxError::Unsupported("generic signature".into()));
            }

            let key = match self.file.kind(self.pos) {
                Some(Tok::Ident | Tok::Number) => PropertyKey::Name(self.file.token_text(self.pos).to_string()),
                Some(Tok::Str) => PropertyKey::Name(unquote(self.file.token_text(self.pos))),
                Some(Tok::LBracket) => {
                    if self.file.is(self.pos + 1, Tok::Ident) && self.file.is(self.pos + 2, Tok::Colon) {
                        self.pos += 3;
                        let key = self.parse_type()?;
                        self.expect(Tok::RBracket)?;
                        self.expect(Tok::Colon)?;
                        let value = self.parse_type()?;
                        index = Some((key, value));
                        continue;
                    }
                    if self.file.is_ident(self.pos + 1, "Symbol")
                        && self.file.is(self.pos + 2, Tok::Dot)
                        && self.file.is(self.pos + 4, Tok::RBracket)
                    {
                        let name = self.file.token_text(self.pos + 3).to_string();
                        self.pos += 4;
                        PropertyKey::Symbol(name)
                    } else {
                        return Err(TypeSyntaxError::Unsupported("computed property key".into()));
                    }
                }
                _ => return Err(self.unexpected("a property")),
            };
            self.pos += 1;

            let optional = self.eat(Tok::Question);
            let mut ty = if self.is(Tok::LParen) || self.is(Tok::Lt) {
                let ret = self.signature_return()?;
                self.scope.table().function(ret)
            } else {
                self.expect(Tok::Colon)?;
                self.parse_type()?
            };
            if optional {
                let undefined = self.scope.table().insert(TypeKind::Undefined);
                ty = self.scope.table().union(vec![ty, undefined]);
            }
            // overloads repeat the key; the first declaration wins
            if !obj.properties.iter().any(|p| p.key == key) {
                obj.properties.push(Property { key, ty, optional });
            }
        }
        self.pos = close + 1;

        if let Some((key, value)) = index {
            if !obj.properties.is_empty() || !obj.call_signatures.is_empty() {
                return Err(TypeSyntaxError::Unsupported("index signature mixed with members".into()));
            }
            obj.symbol = Some("__type".into());
            obj.alias = Some(Alias { name: "Record".into(), args: vec![key, value] });
        }
        Ok(obj)
    }

    fn parse_union(&mut self) -> Result<TypeId> {
        self.eat(Tok::Pipe);
        let mut members = vec![self.parse_intersection()?];
        while self.eat(Tok::Pipe) {
            members.push(self.parse_intersection()?);
        }
        Ok(match members.len() {
            1 => members[0],
            _ => self.scope.table().union(members),
        })
    }

    fn parse_intersection(&mut self) -> Result<TypeId> {
        self.eat(Tok::Amp);
        let mut members = vec![self.parse_postfix()?];
        while self.eat(Tok::Amp) {
            members.push(self.parse_postfix()?);
        }
        Ok(match members.len() {
            1 => members[0],
            _ => self.scope.table().intersection(members),
        })
    }

    fn parse_postfix(&mut self) -> Result<TypeId> {
        let mut ty = self.parse_primary()?;
        while self.is(Tok::LBracket) {
            if !self.file.is(self.pos + 1, Tok::RBracket) {
                return Err(TypeSyntaxError::Unsupported("indexed access type".into()));
            }
            self.pos += 2;
            ty = self.scope.table().array(ty);
        }
        Ok(ty)
    }

    fn parse_primary(&mut self) -> Result<TypeId> {
        let i = self.pos;
        match self.file.kind(i) {
            Some(Tok::LParen) => {
                let close = self.file.matching(i).ok_or_else(|| self.unexpected("`)`"))?;
                if self.file.is(close + 1, Tok::FatArrow) {
                    self.pos = close + 2;
                    let ret = self.parse_type()?;
                    return Ok(self.scope.table().function(ret));
                }
                self.pos += 1;
                let inner = self.parse_type()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Some(Tok::LBrace) => {
                let obj = self.parse_object_body()?;
                Ok(self.scope.table().insert(TypeKind::Object(obj)))
            }
            Some(Tok::LBracket) => self.parse_tuple(),
            Some(Tok::Str) => {
                self.pos += 1;
                let value = unquote(self.file.token_text(i));
                Ok(self.scope.table().literal(LiteralValue::String(value)))
            }
            Some(Tok::Template) => {
                let text = self.file.token_text(i);
                if text.contains("${") {
                    return Err(TypeSyntaxError::Unsupported("template literal type".into()));
                }
                self.pos += 1;
                Ok(self.scope.table().literal(LiteralValue::String(unquote(text))))
            }
            Some(Tok::Number) => {
                self.pos += 1;
                let n = parse_number(self.file.token_text(i)).ok_or_else(|| self.unexpected_at(i, "a number"))?;
                Ok(self.scope.table().literal(LiteralValue::Number(OrderedFloat(n))))
            }
            Some(Tok::Minus) if self.file.is(i + 1, Tok::Number) => {
                self.pos += 2;
                let n = parse_number(self.file.token_text(i + 1)).ok_or_else(|| self.unexpected_at(i + 1, "a number"))?;
                Ok(self.scope.table().literal(LiteralValue::Number(OrderedFloat(-n))))
            }
            Some(Tok::BigInt) => {
                self.pos += 1;
                let text = self.file.token_text(i);
                let digits = text.trim_end_matches('n').replace('_', "");
                Ok(self.scope.table().literal(LiteralValue::BigInt(digits)))
            }
            Some(Tok::Lt) => Err(TypeSyntaxError::Unsupported("generic function type".into())),
            Some(Tok::Ident) => self.parse_named(),
            _ => Err(self.unexpected("a type")),
        }
    }

    fn parse_named(&mut self) -> Result<TypeId> {
        let file = self.file;
        let name = file.token_text(self.pos);
        self.pos += 1;
        let kind = match name {
            "string" => TypeKind::String,
            "number" => TypeKind::Number,
            "boolean" => TypeKind::Boolean,
            "bigint" => TypeKind::BigInt,
            "null" => TypeKind::Null,
            "undefined" => TypeKind::Undefined,
            "any" => TypeKind::Any,
            "unknown" => TypeKind::Unknown,
            "void" => TypeKind::Void,
            "never" => TypeKind::Never,
            "true" => TypeKind::Literal(LiteralValue::Boolean(true)),
            "false" => TypeKind::Literal(LiteralValue::Boolean(false)),
            "object" => TypeKind::Object(ObjectType::default()),
            "readonly" => return self.parse_postfix(),
            "keyof" | "typeof" | "infer" | "unique" | "asserts" | "symbol" | "this" | "new" | "abstract" => {
                return Err(TypeSyntaxError::Unsupported(format!("`{name}`")));
            }
            _ => return self.parse_reference(name),
        };
        Ok(self.scope.table().insert(kind))
    }

    fn parse_reference(&mut self, name: &str) -> Result<TypeId> {
        if self.eat(Tok::Dot) {
            let file = self.file;
            let member = file.ident(self.pos).ok_or_else(|| self.unexpected("a member name"))?;
            self.pos += 1;
            if self.is(Tok::Dot) || self.is(Tok::Lt) {
                return Err(TypeSyntaxError::Unsupported("namespaced type".into()));
            }
            return self.scope.resolve_member(name, member);
        }
        let mut args = Vec::new();
        if self.eat(Tok::Lt) {
            loop {
                args.push(self.parse_type()?);
                if !self.eat(Tok::Comma) {
                    break;
                }
            }
            self.expect(Tok::Gt)?;
        }
        if args.is_empty() {
            if let Some(id) = self.params.get(name) {
                return Ok(*id);
            }
        }
        self.scope.resolve_named(name, args)
    }

    fn parse_tuple(&mut self) -> Result<TypeId> {
        self.expect(Tok::LBracket)?;
        let mut elements = Vec::new();
        while !self.is(Tok::RBracket) {
            let spread = self.eat(Tok::Ellipsis);
            let mut optional = false;
            if self.is(Tok::Ident) {
                if self.file.is(self.pos + 1, Tok::Colon) {
                    self.pos += 2;
                } else if self.file.is(self.pos + 1, Tok::Question) && self.file.is(self.pos + 2, Tok::Colon) {
                    self.pos += 3;
                    optional = true;
                }
            }
            let ty = self.parse_type()?;
            optional |= self.eat(Tok::Question);
            let element = if spread {
                match self.scope.table().kind(ty) {
                    TypeKind::Array(Some(el)) => TupleElement { ty: *el, flag: ElementFlag::Rest },
                    _ => TupleElement { ty, flag: ElementFlag::Variadic },
                }
            } else if optional {
                TupleElement { ty, flag: ElementFlag::Optional }
            } else {
                TupleElement { ty, flag: ElementFlag::Required }
            };
            elements.push(element);
            if !self.eat(Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RBracket)?;
        Ok(self.scope.table().insert(TypeKind::Tuple(elements)))
    }

    /// `(params): Ret` or `<T>(params): Ret` at the cursor; the parameters
    /// are skipped. A missing annotation reads as `any`.
    fn signature_return(&mut self) -> Result<TypeId> {
        if self.is(Tok::Lt) {
            self.pos = self.file.skip_angles(self.pos).ok_or_else(|| self.unexpected("`>`"))?;
        }
        let close = self
            .file
            .is(self.pos, Tok::LParen)
            .then(|| self.file.matching(self.pos))
            .flatten()
            .ok_or_else(|| self.unexpected("`(`"))?;
        self.pos = close + 1;
        if self.eat(Tok::Colon) {
            self.parse_type()
        } else {
            Ok(self.scope.table().insert(TypeKind::Any))
        }
    }

    // ---------------------------- cursor helpers ------------------------------ //

    fn is(&self, kind: Tok) -> bool {
        self.file.is(self.pos, kind)
    }

    fn eat(&mut self, kind: Tok) -> bool {
        let hit = self.is(kind);
        if hit {
            self.pos += 1;
        }
        hit
    }

    fn expect(&mut self, kind: Tok) -> Result<()> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected(match kind {
                Tok::RParen => "`)`",
                Tok::RBracket => "`]`",
                Tok::Colon => "`:`",
                Tok::Gt => "`>`",
                Tok::LBracket => "`[`",
                _ => "a token",
            }))
        }
    }

    fn unexpected(&self, expected: &'static str) -> TypeSyntaxError {
        self.unexpected_at(self.pos, expected)
    }

    fn unexpected_at(&self, i: usize, expected: &'static str) -> TypeSyntaxError {
        let found = match self.file.kind(i) {
            Some(_) => self.file.token_text(i).to_string(),
            None => "end of file".to_string(),
        };
        TypeSyntaxError::Unexpected { found, at: self.file.span(i).start, expected }
    }
}

/// Contents of a quoted string or template token, with common escapes resolved.
pub fn unquote(token: &str) -> String {
    let inner = token.get(1..token.len().saturating_sub(1)).unwrap_or("");
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Value of a numeric literal token (decimal, exponent, hex; `_` separators).
pub fn parse_number(token: &str) -> Option<f64> {
    let clean = token.replace('_', "");
    if let Some(hex) = clean.strip_prefix("0x").or_else(|| clean.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    clean.parse::<f64>().ok()
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prelude;
    use pretty_assertions::assert_eq;

    /// Scope with only the built-ins and a fixed `Color` enum.
    #[derive(Default)]
    struct Builtins {
        table: TypeTable,
    }

    impl TypeScope for Builtins {
        fn table(&mut self) -> &mut TypeTable {
            &mut self.table
        }
        fn resolve_named(&mut self, name: &str, args: Vec<TypeId>) -> Result<TypeId> {
            prelude::instantiate(&mut self.table, name, &args).ok_or_else(|| TypeSyntaxError::UnknownName(name.into()))
        }
        fn resolve_member(&mut self, qualifier: &str, member: &str) -> Result<TypeId> {
            Ok(self.table.insert(TypeKind::EnumLiteral {
                enum_name: qualifier.into(),
                member: member.into(),
                value: LiteralValue::String(member.to_lowercase()),
            }))
        }
    }

    fn parse(src: &str) -> (Builtins, Result<TypeId>) {
        let file = SourceFile::parse("t.ts", src);
        let mut scope = Builtins::default();
        let res = TypeParser::new(&file, 0, &mut scope).parse_type();
        (scope, res)
    }

    fn display(src: &str) -> String {
        let (scope, res) = parse(src);
        scope.table.display(res.unwrap())
    }

    #[test]
    fn unions_and_literals() {
        assert_eq!(display("'A' | \"B\" | 3 | -1 | 10n | true"), "\"A\" | \"B\" | 3 | -1 | 10n | true");
        assert_eq!(display("| string | null"), "string | null");
    }

    #[test]
    fn optional_property_adds_undefined() {
        assert_eq!(display("{ x: number; y?: number }"), "{ x: number; y?: number | undefined; }");
    }

    #[test]
    fn arrays_tuples_and_functions() {
        assert_eq!(display("string[][]"), "((string)[])[]");
        assert_eq!(display("[number, false, ...string[]]"), "[number, false, ...string[]]");
        assert_eq!(display("[a: number, b?: string]"), "[number, string?]");
        assert_eq!(display("() => string"), "() => string");
        assert_eq!(display("(string | number)[]"), "(string | number)[]");
    }

    #[test]
    fn builtins_and_members() {
        assert_eq!(display("Promise<Map<string, Date>>"), "Promise<Map<string, Date>>");
        assert_eq!(display("Record<string, number>"), "Record<string, number>");
        assert_eq!(display("{ [key: string]: boolean }"), "Record<string, boolean>");
        assert_eq!(display("Color.Red"), "Color.Red");
    }

    #[test]
    fn methods_are_function_valued_properties() {
        let (scope, res) = parse("{ name: string; greet(): string; [Symbol.iterator](): void }");
        let id = res.unwrap();
        let obj = scope.table.object(id).unwrap();
        assert_eq!(obj.properties.len(), 3);
        assert_eq!(scope.table.call_signatures(obj.properties[1].ty).len(), 1);
        assert_eq!(obj.properties[2].key, PropertyKey::Symbol("iterator".into()));
    }

    #[test]
    fn unsupported_syntax() {
        assert!(matches!(parse("keyof Foo").1, Err(TypeSyntaxError::Unsupported(_))));
        assert!(matches!(parse("Foo['bar']").1, Err(TypeSyntaxError::UnknownName(_))));
        assert!(matches!(parse("Array<string>['length']").1, Err(TypeSyntaxError::Unsupported(_))));
        assert!(matches!(parse("Missing").1, Err(TypeSyntaxError::UnknownName(name)) if name == "Missing"));
    }

    #[test]
    fn escapes_and_numbers() {
        assert_eq!(unquote(r#"'it\'s'"#), "it's");
        assert_eq!(parse_number("1_000"), Some(1000.0));
        assert_eq!(parse_number("0xff"), Some(255.0));
    }
}
