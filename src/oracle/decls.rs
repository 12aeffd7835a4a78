//! Oracle backed by explicit annotations and declarations.
//!
//! Types come from `type`, `interface` and `enum` declarations anywhere in
//! the scanned project, matched by name (the current file wins). Values come
//! from `function` declarations and `const`/`let`/`var` bindings that are
//! either annotated or initialized with an annotated function. Nothing is
//! inferred from expression bodies.

use std::collections::HashMap;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use tracing::debug;

use super::TypeOracle;
use crate::syntax::{FunctionExpr, Handler, Reference, SourceFile, Tok};
use crate::types::parse::{TypeParser, TypeScope, TypeSyntaxError, parse_number, unquote};
use crate::types::{LiteralValue, ObjectType, TypeId, TypeKind, TypeTable, prelude};

/// Generic instantiations nested deeper than this are given up on.
const MAX_NESTING: usize = 64;

// ————————————————————————————————————————————————————————————————————————————
// PROJECT
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Alias,
    Interface,
    Enum,
    Function,
    Variable,
}

#[derive(Debug, Clone, Copy)]
struct DeclRef {
    file: usize,
    kind: DeclKind,
    /// Token index of the declared name.
    name: usize,
}

/// Every scanned file plus a name index of its declarations.
#[derive(Debug, Default)]
pub struct Project {
    files: Vec<SourceFile>,
    types: IndexMap<String, Vec<DeclRef>>,
    values: IndexMap<String, Vec<DeclRef>>,
}

impl Project {
    pub fn new(files: Vec<SourceFile>) -> Self {
        let mut project = Project { files, ..Project::default() };
        for index in 0..project.files.len() {
            project.index_file(index);
        }
        project
    }

    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }
    pub fn file(&self, index: usize) -> &SourceFile {
        &self.files[index]
    }
    pub fn len(&self) -> usize {
        self.files.len()
    }
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn index_file(&mut self, index: usize) {
        let file = &self.files[index];
        let mut found = Vec::new();
        for i in 0..file.len() {
            let Some(word) = file.ident(i) else { continue };
            if i > 0 && matches!(file.kind(i - 1), Some(Tok::Dot | Tok::QuestionDot)) {
                continue;
            }
            let Some(name) = file.ident(i + 1) else { continue };
            let next = file.kind(i + 2);
            let kind = match word {
                "type" if matches!(next, Some(Tok::Eq | Tok::Lt)) => DeclKind::Alias,
                "interface" if matches!(next, Some(Tok::LBrace | Tok::Lt)) || file.is_ident(i + 2, "extends") => {
                    DeclKind::Interface
                }
                "enum" if next == Some(Tok::LBrace) => DeclKind::Enum,
                "function" if matches!(next, Some(Tok::LParen | Tok::Lt)) => DeclKind::Function,
                "const" | "let" | "var" if matches!(next, Some(Tok::Colon | Tok::Eq)) => DeclKind::Variable,
                _ => continue,
            };
            found.push((name.to_string(), DeclRef { file: index, kind, name: i + 1 }));
        }
        for (name, decl) in found {
            let map = match decl.kind {
                DeclKind::Alias | DeclKind::Interface | DeclKind::Enum => &mut self.types,
                DeclKind::Function | DeclKind::Variable => &mut self.values,
            };
            map.entry(name).or_default().push(decl);
        }
    }

    fn type_decls(&self, name: &str, current: usize) -> Vec<DeclRef> {
        pick(self.types.get(name), current)
    }

    fn value_decls(&self, name: &str, current: usize) -> Vec<DeclRef> {
        pick(self.values.get(name), current)
    }
}

/// Declarations from `current` if it has any, otherwise from the first file
/// that does.
fn pick(decls: Option<&Vec<DeclRef>>, current: usize) -> Vec<DeclRef> {
    let Some(decls) = decls else { return Vec::new() };
    let file = match decls.iter().any(|d| d.file == current) {
        true => current,
        false => decls[0].file,
    };
    decls.iter().filter(|d| d.file == file).copied().collect()
}

// ————————————————————————————————————————————————————————————————————————————
// ORACLE
// ————————————————————————————————————————————————————————————————————————————

/// Per-file oracle. Owns the [`TypeTable`] for that file's pass.
pub struct DeclaredTypes<'p> {
    project: &'p Project,
    /// File whose declarations win name lookups. Switches while a
    /// declaration from another file is being read.
    current: usize,
    table: TypeTable,
    /// Instantiated declarations, including ones still being defined.
    memo: HashMap<(String, Vec<TypeId>), TypeId>,
    enum_members: HashMap<String, IndexMap<String, TypeId>>,
    values: HashMap<String, Option<TypeId>>,
    nesting: usize,
}

impl<'p> DeclaredTypes<'p> {
    pub fn new(project: &'p Project, current: usize) -> Self {
        Self {
            project,
            current,
            table: TypeTable::new(),
            memo: HashMap::new(),
            enum_members: HashMap::new(),
            values: HashMap::new(),
            nesting: 0,
        }
    }

    pub fn into_table(self) -> TypeTable {
        self.table
    }

    fn parse_at(&mut self, file: &SourceFile, at: usize) -> Option<TypeId> {
        match TypeParser::new(file, at, self).parse_type() {
            Ok(ty) => Some(ty),
            Err(err) => {
                debug!(
                    path = %file.path().display(),
                    line = file.line_of(file.span(at).start),
                    %err,
                    "unresolved type annotation"
                );
                None
            }
        }
    }

    fn signature_return(&mut self, file: &SourceFile, function: &FunctionExpr) -> Option<TypeId> {
        let at = function.return_annotation?;
        self.parse_at(file, at)
    }

    fn value_type(&mut self, name: &str) -> Option<TypeId> {
        if let Some(memo) = self.values.get(name) {
            return *memo;
        }
        // placeholder so `const a = b; const b = a;` terminates
        self.values.insert(name.to_string(), None);
        let project = self.project;
        let decl = project.value_decls(name, self.current).into_iter().next()?;
        let saved = std::mem::replace(&mut self.current, decl.file);
        let ty = self.value_decl_type(project.file(decl.file), decl);
        self.current = saved;
        self.values.insert(name.to_string(), ty);
        ty
    }

    fn value_decl_type(&mut self, file: &SourceFile, decl: DeclRef) -> Option<TypeId> {
        match decl.kind {
            DeclKind::Function => {
                let open = file.skip_angles(decl.name + 1)?;
                let close = file.is(open, Tok::LParen).then(|| file.matching(open)).flatten()?;
                if !file.is(close + 1, Tok::Colon) {
                    return None;
                }
                let ret = self.parse_at(file, close + 2)?;
                Some(self.table.function(ret))
            }
            DeclKind::Variable => {
                let at = decl.name + 1;
                if file.is(at, Tok::Colon) {
                    return self.parse_at(file, at + 1);
                }
                let start = at + 1;
                match file.classify_handler(start, file.expression_end(start)) {
                    Handler::Function(function) => {
                        let ret = self.signature_return(file, &function)?;
                        Some(self.table.function(ret))
                    }
                    Handler::Reference(other) => self.value_type(&other.name),
                    Handler::Other { .. } => None,
                }
            }
            DeclKind::Alias | DeclKind::Interface | DeclKind::Enum => None,
        }
    }

    fn alias_body(&mut self, file: &SourceFile, decl: DeclRef, args: &[TypeId]) -> Result<TypeId, TypeSyntaxError> {
        let (params, after) = type_params(file, decl.name + 1).ok_or_else(|| malformed(file, decl.name + 1, "type parameters"))?;
        if !file.is(after, Tok::Eq) {
            return Err(malformed(file, after, "`=`"));
        }
        let bound = self.bind_params(file, &params, args)?;
        TypeParser::new(file, after + 1, self).with_params(bound).parse_type()
    }

    fn interface_body(&mut self, name: &str, decls: &[DeclRef], args: &[TypeId]) -> Result<TypeId, TypeSyntaxError> {
        let project = self.project;
        let mut merged = ObjectType {
            symbol: Some(name.to_string()),
            type_args: args.to_vec(),
            ..ObjectType::default()
        };
        let mut bases = Vec::new();
        for decl in decls.iter().filter(|d| d.kind == DeclKind::Interface) {
            let file = project.file(decl.file);
            let (params, after) =
                type_params(file, decl.name + 1).ok_or_else(|| malformed(file, decl.name + 1, "type parameters"))?;
            let bound = self.bind_params(file, &params, args)?;
            let mut parser = TypeParser::new(file, after, self).with_params(bound);
            bases.extend(parser.parse_heritage()?);
            let body = parser.parse_object_body()?;
            for property in body.properties {
                if !merged.properties.iter().any(|p| p.key == property.key) {
                    merged.properties.push(property);
                }
            }
            merged.call_signatures.extend(body.call_signatures);
        }
        // own members shadow inherited ones
        for base in bases {
            let Some(inherited) = self.table.object(base) else { continue };
            let inherited = inherited.properties.clone();
            for property in inherited {
                if !merged.properties.iter().any(|p| p.key == property.key) {
                    merged.properties.push(property);
                }
            }
        }
        Ok(self.table.insert(TypeKind::Object(merged)))
    }

    fn bind_params(
        &mut self,
        file: &SourceFile,
        params: &[(String, Option<usize>)],
        args: &[TypeId],
    ) -> Result<HashMap<String, TypeId>, TypeSyntaxError> {
        let mut bound = HashMap::new();
        for (k, (name, default)) in params.iter().enumerate() {
            let ty = match (args.get(k), default) {
                (Some(arg), _) => *arg,
                (None, Some(at)) => TypeParser::new(file, *at, self).with_params(bound.clone()).parse_type()?,
                (None, None) => self.table.insert(TypeKind::Unknown),
            };
            bound.insert(name.clone(), ty);
        }
        Ok(bound)
    }

    fn enum_members(&mut self, name: &str) -> Result<IndexMap<String, TypeId>, TypeSyntaxError> {
        if let Some(members) = self.enum_members.get(name) {
            return Ok(members.clone());
        }
        let project = self.project;
        let decl = project
            .type_decls(name, self.current)
            .into_iter()
            .find(|d| d.kind == DeclKind::Enum)
            .ok_or_else(|| TypeSyntaxError::UnknownName(name.to_string()))?;
        let file = project.file(decl.file);
        let open = decl.name + 1;
        let close = file.matching(open).ok_or_else(|| malformed(file, open, "`}`"))?;

        let mut members = IndexMap::new();
        let mut next = 0.0;
        let mut i = open + 1;
        while i < close {
            let member = match file.kind(i) {
                Some(Tok::Ident) => file.token_text(i).to_string(),
                Some(Tok::Str) => unquote(file.token_text(i)),
                _ => return Err(malformed(file, i, "an enum member")),
            };
            i += 1;
            let value = if file.is(i, Tok::Eq) {
                let start = i + 1;
                let end = file.expression_end(start);
                i = end;
                match (file.kind(start), end - start) {
                    (Some(Tok::Str), 1) => LiteralValue::String(unquote(file.token_text(start))),
                    (Some(Tok::Number), 1) => {
                        let n = parse_number(file.token_text(start)).unwrap_or(next);
                        next = n + 1.0;
                        LiteralValue::Number(OrderedFloat(n))
                    }
                    (Some(Tok::Minus), 2) if file.is(start + 1, Tok::Number) => {
                        let n = -parse_number(file.token_text(start + 1)).unwrap_or(-next);
                        next = n + 1.0;
                        LiteralValue::Number(OrderedFloat(n))
                    }
                    // computed initializer; the value is only used for literal
                    // narrowing, so the running counter is good enough
                    _ => {
                        next += 1.0;
                        LiteralValue::Number(OrderedFloat(next - 1.0))
                    }
                }
            } else {
                next += 1.0;
                LiteralValue::Number(OrderedFloat(next - 1.0))
            };
            let ty = self.table.insert(TypeKind::EnumLiteral {
                enum_name: name.to_string(),
                member: member.clone(),
                value,
            });
            members.insert(member, ty);
            if file.is(i, Tok::Comma) {
                i += 1;
            }
        }
        self.table.declare_enum(name, members.len());
        self.enum_members.insert(name.to_string(), members.clone());
        Ok(members)
    }
}

impl TypeScope for DeclaredTypes<'_> {
    fn table(&mut self) -> &mut TypeTable {
        &mut self.table
    }

    fn resolve_named(&mut self, name: &str, args: Vec<TypeId>) -> Result<TypeId, TypeSyntaxError> {
        let key = (name.to_string(), args);
        if let Some(id) = self.memo.get(&key) {
            return Ok(*id);
        }
        let (_, args) = &key;
        let project = self.project;
        let decls = project.type_decls(name, self.current);
        let Some(first) = decls.first().copied() else {
            return prelude::instantiate(&mut self.table, name, args)
                .ok_or_else(|| TypeSyntaxError::UnknownName(name.to_string()));
        };
        if self.nesting >= MAX_NESTING {
            return Err(TypeSyntaxError::Unsupported(format!("`{name}` instantiated too deeply")));
        }

        let args = args.clone();
        let slot = self.table.reserve();
        self.memo.insert(key.clone(), slot);
        let saved = std::mem::replace(&mut self.current, first.file);
        self.nesting += 1;
        let body = match first.kind {
            DeclKind::Alias => self.alias_body(project.file(first.file), first, &args),
            DeclKind::Interface => self.interface_body(name, &decls, &args),
            DeclKind::Enum => self.enum_members(name).map(|members| self.table.union(members.into_values().collect())),
            DeclKind::Function | DeclKind::Variable => Err(TypeSyntaxError::UnknownName(name.to_string())),
        };
        self.nesting -= 1;
        self.current = saved;

        match body {
            Ok(ty) => {
                self.table.define(slot, ty);
                Ok(slot)
            }
            Err(err) => {
                self.memo.remove(&key);
                Err(err)
            }
        }
    }

    fn resolve_member(&mut self, qualifier: &str, member: &str) -> Result<TypeId, TypeSyntaxError> {
        self.enum_members(qualifier)?
            .get(member)
            .copied()
            .ok_or_else(|| TypeSyntaxError::UnknownName(format!("{qualifier}.{member}")))
    }
}

impl TypeOracle for DeclaredTypes<'_> {
    fn table(&self) -> &TypeTable {
        &self.table
    }

    fn resolve_type(&mut self, reference: &Reference) -> Option<TypeId> {
        self.value_type(&reference.name)
    }

    fn return_type_of_signature(&mut self, function: &FunctionExpr) -> Option<TypeId> {
        let project = self.project;
        self.signature_return(project.file(self.current), function)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// `<A, B extends X = Y>` at `i`: parameter names with the token index of
/// their default, and the index after the closing `>`.
fn type_params(file: &SourceFile, i: usize) -> Option<(Vec<(String, Option<usize>)>, usize)> {
    if !file.is(i, Tok::Lt) {
        return Some((Vec::new(), i));
    }
    let end = file.skip_angles(i)?;
    let close = end - 1;
    let mut params = Vec::new();
    let mut j = i + 1;
    while j < close {
        if matches!(file.ident(j), Some("const" | "in" | "out")) && file.is(j + 1, Tok::Ident) {
            j += 1;
        }
        let name = file.ident(j)?.to_string();
        j += 1;
        let mut default = None;
        let mut depth = 0usize;
        while j < close {
            match file.kind(j) {
                Some(Tok::Lt) => depth += 1,
                Some(Tok::Gt) => depth = depth.saturating_sub(1),
                Some(Tok::Comma) if depth == 0 => break,
                Some(Tok::Eq) if depth == 0 => default = Some(j + 1),
                Some(kind) if kind.opens() => j = file.matching(j)?,
                _ => {}
            }
            j += 1;
        }
        params.push((name, default));
        j += 1;
    }
    Some((params, end))
}

fn malformed(file: &SourceFile, i: usize, expected: &'static str) -> TypeSyntaxError {
    TypeSyntaxError::Unexpected {
        found: file.token_text(i).to_string(),
        at: file.span(i).start,
        expected,
    }
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyKey;
    use pretty_assertions::assert_eq;

    fn project(files: &[(&str, &str)]) -> Project {
        Project::new(files.iter().map(|(path, src)| SourceFile::parse(*path, *src)).collect())
    }

    fn resolve(oracle: &mut DeclaredTypes<'_>, name: &str) -> TypeId {
        oracle.resolve_named(name, Vec::new()).unwrap()
    }

    fn names(table: &TypeTable, id: TypeId) -> Vec<String> {
        table
            .object(id)
            .unwrap()
            .properties
            .iter()
            .map(|p| match &p.key {
                PropertyKey::Name(n) => n.clone(),
                PropertyKey::Symbol(s) => format!("[{s}]"),
            })
            .collect()
    }

    #[test]
    fn self_referential_interface_is_a_cycle() {
        let p = project(&[("a.ts", "interface Node { name: string; children: Node[] }")]);
        let mut oracle = DeclaredTypes::new(&p, 0);
        let node = resolve(&mut oracle, "Node");
        let children = oracle.table.property(node, "children").unwrap().ty;
        assert!(matches!(oracle.table.kind(children), TypeKind::Array(Some(el)) if *el == node));
    }

    #[test]
    fn alias_to_an_interface_under_construction() {
        let p = project(&[("a.ts", "interface Category { name: string; parent: Parent | null }\ntype Parent = Category;")]);
        let mut oracle = DeclaredTypes::new(&p, 0);
        let category = resolve(&mut oracle, "Category");
        let parent = oracle.table.property(category, "parent").unwrap().ty;
        let members = oracle.table.union_types(parent).unwrap().to_vec();
        assert_eq!(members.len(), 2);
        assert_eq!(names(&oracle.table, members[0]), vec!["name", "parent"]);
        assert!(oracle.table.is_null(members[1]));
    }

    #[test]
    fn enums_number_their_members() {
        let p = project(&[("a.ts", "export enum Color { Red, Green = 'g', Blue = 5, Violet }")]);
        let mut oracle = DeclaredTypes::new(&p, 0);
        let color = resolve(&mut oracle, "Color");
        assert_eq!(oracle.table.display(color), "Color.Red | Color.Green | Color.Blue | Color.Violet");
        assert_eq!(oracle.table.enum_member_count("Color"), Some(4));
        let violet = oracle.resolve_member("Color", "Violet").unwrap();
        assert_eq!(oracle.table.literal_value(violet), Some(&LiteralValue::Number(OrderedFloat(6.0))));
        let green = oracle.resolve_member("Color", "Green").unwrap();
        assert!(oracle.table.is_string_literal(green));
    }

    #[test]
    fn generic_alias_with_default() {
        let p = project(&[(
            "a.ts",
            "type Page<T, M = string> = { items: T[]; meta: M };\ntype Subject = Page<number>;",
        )]);
        let mut oracle = DeclaredTypes::new(&p, 0);
        let subject = resolve(&mut oracle, "Subject");
        assert_eq!(oracle.table.display(subject), "{ items: (number)[]; meta: string; }");
    }

    #[test]
    fn recursive_generic_alias_terminates() {
        let p = project(&[("a.ts", "type Tree<T> = { value: T; kids: Tree<T>[] };\ntype Subject = Tree<string>;")]);
        let mut oracle = DeclaredTypes::new(&p, 0);
        let subject = resolve(&mut oracle, "Subject");
        assert_eq!(names(&oracle.table, subject), vec!["value", "kids"]);
    }

    #[test]
    fn interfaces_merge_heritage() {
        let p = project(&[(
            "a.ts",
            "interface A { a: string; shared: number }\ninterface B extends A { b: number; shared: string }",
        )]);
        let mut oracle = DeclaredTypes::new(&p, 0);
        let b = resolve(&mut oracle, "B");
        assert_eq!(names(&oracle.table, b), vec!["b", "shared", "a"]);
        let shared = oracle.table.property(b, "shared").unwrap().ty;
        assert!(oracle.table.is_string(shared));
    }

    #[test]
    fn values_resolve_across_files() {
        let p = project(&[
            ("models.ts", "export type User = { id: number };"),
            (
                "router.ts",
                "import { User } from './models';\nconst getUser = async (): Promise<User> => load();\nconst alias = getUser;\nfunction plain(): boolean { return true; }\nconst untyped = () => 1;",
            ),
        ]);
        let mut oracle = DeclaredTypes::new(&p, 1);
        let reference = |name: &str| Reference { name: name.into(), span: Default::default() };

        let get_user = oracle.resolve_type(&reference("getUser")).unwrap();
        let ret = oracle.table.call_signatures(get_user)[0];
        assert_eq!(oracle.table.display(ret), "Promise<{ id: number; }>");

        let alias = oracle.resolve_type(&reference("alias")).unwrap();
        assert_eq!(oracle.table.call_signatures(alias).len(), 1);

        let plain = oracle.resolve_type(&reference("plain")).unwrap();
        assert!(oracle.table.is_boolean(oracle.table.call_signatures(plain)[0]));

        assert_eq!(oracle.resolve_type(&reference("untyped")), None);
        assert_eq!(oracle.resolve_type(&reference("missing")), None);
    }

    #[test]
    fn user_declarations_shadow_builtins() {
        let p = project(&[("a.ts", "interface Date { day: number }\ntype Subject = Date;")]);
        let mut oracle = DeclaredTypes::new(&p, 0);
        let subject = resolve(&mut oracle, "Subject");
        assert_eq!(names(&oracle.table, subject), vec!["day"]);
    }
}
