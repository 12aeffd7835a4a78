//! Locating tRPC procedure chains.
//!
//! A chain starts at an identifier naming a procedure factory
//! (`publicProcedure`, `t.procedure`, ...) and continues through
//! `.name(args)` pairs:
//!
//! ```text
//! publicProcedure.use(auth).input(schema).query(async ({ input }): Promise<User> => ...)
//! ^ root          ^ segments ...                ^ terminal, first argument = handler
//! ```

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::oracle::TypeOracle;
use crate::syntax::{Handler, SourceFile, Span, Tok};
use crate::types::{TypeId, TypeTable};

pub const DEFAULT_PROCEDURES: &[&str] = &["publicProcedure", "protectedProcedure", "procedure"];

/// Block-comment token that suppresses synthesis for the handler it precedes.
pub const IGNORE_MARKER: &str = "@outputify-ignore";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcedureKind {
    Query,
    Mutation,
}

/// One `.name(args)` pair of a chain, as token indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub name: String,
    /// The `.` or `?.` before the name.
    pub dot: usize,
    pub open: usize,
    pub close: usize,
}

#[derive(Debug, Clone)]
pub struct ProcedureMatch {
    /// Token index of the factory identifier.
    pub root: usize,
    pub segments: Vec<Segment>,
    /// Segment name → index into `segments`. A repeated name points at its
    /// last occurrence.
    segments_by_name: HashMap<String, usize>,
    pub kind: ProcedureKind,
    pub handler: Handler,
    pub return_type: TypeId,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ProcedureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcedureKind::Query => "query",
            ProcedureKind::Mutation => "mutation",
        }
    }
}

impl Segment {
    /// Text between the call's parentheses, comments included.
    pub fn args_span(&self, file: &SourceFile) -> Span {
        Span::new(file.span(self.open).end, file.span(self.close).start)
    }
}

impl ProcedureMatch {
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments_by_name.get(name).map(|i| &self.segments[*i])
    }

    /// The `query`/`mutation` segment.
    pub fn terminal(&self) -> &Segment {
        let i = self.segments_by_name[self.kind.as_str()];
        &self.segments[i]
    }

    pub fn line(&self, file: &SourceFile) -> usize {
        file.line_of(file.span(self.root).start)
    }
}

pub fn default_procedures() -> Vec<String> {
    DEFAULT_PROCEDURES.iter().map(|s| s.to_string()).collect()
}

/// Call `visit` for every recognized procedure in `file`, in source order.
/// Chains that aren't procedures, have no resolvable return type, or carry
/// the ignore marker are skipped silently. The first error from `visit`
/// stops the walk.
pub fn for_each_procedure<O, F, E>(file: &SourceFile, oracle: &mut O, procedures: &[String], mut visit: F) -> Result<(), E>
where
    O: TypeOracle + ?Sized,
    F: FnMut(&TypeTable, ProcedureMatch) -> Result<(), E>,
{
    for root in 0..file.len() {
        let Some(name) = file.ident(root) else { continue };
        if !procedures.iter().any(|p| p == name) {
            continue;
        }
        let segments = walk_chain(file, root);
        if segments.is_empty() {
            continue;
        }
        if let Some(m) = match_procedure(file, oracle, root, segments) {
            visit(oracle.table(), m)?;
        }
    }
    Ok(())
}

fn match_procedure<O>(file: &SourceFile, oracle: &mut O, root: usize, segments: Vec<Segment>) -> Option<ProcedureMatch>
where
    O: TypeOracle + ?Sized,
{
    let line = file.line_of(file.span(root).start);
    let segments_by_name: HashMap<String, usize> =
        segments.iter().enumerate().map(|(i, s)| (s.name.clone(), i)).collect();

    let kind = match (segments_by_name.contains_key("query"), segments_by_name.contains_key("mutation")) {
        (true, false) => ProcedureKind::Query,
        (false, true) => ProcedureKind::Mutation,
        (true, true) => {
            debug!(path = %file.path().display(), line, "skipping chain with both query and mutation");
            return None;
        }
        (false, false) => {
            debug!(path = %file.path().display(), line, "skipping chain without query or mutation");
            return None;
        }
    };
    let terminal = &segments[segments_by_name[kind.as_str()]];

    let start = terminal.open + 1;
    if start >= terminal.close {
        debug!(path = %file.path().display(), line, "skipping {} without a handler", kind.as_str());
        return None;
    }
    if is_ignored(file, start) {
        debug!(path = %file.path().display(), line, "skipping ignored procedure");
        return None;
    }

    let handler = file.classify_handler(start, file.expression_end(start));
    let return_type = match &handler {
        Handler::Function(function) => oracle.return_type_of_signature(function),
        Handler::Reference(reference) => oracle
            .resolve_type(reference)
            .and_then(|ty| oracle.table().call_signatures(ty).first().copied()),
        Handler::Other { .. } => None,
    };
    let Some(return_type) = return_type else {
        debug!(path = %file.path().display(), line, "skipping procedure with unresolved return type");
        return None;
    };

    Some(ProcedureMatch { root, segments, segments_by_name, kind, handler, return_type })
}

/// `.name<..>(..)` pairs following `root`.
fn walk_chain(file: &SourceFile, root: usize) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut i = root + 1;
    while matches!(file.kind(i), Some(Tok::Dot | Tok::QuestionDot)) {
        let dot = i;
        let Some(name) = file.ident(dot + 1) else { break };
        let Some(open) = file.skip_angles(dot + 2) else { break };
        if !file.is(open, Tok::LParen) {
            break;
        }
        let Some(close) = file.matching(open) else { break };
        segments.push(Segment { name: name.to_string(), dot, open, close });
        i = close + 1;
    }
    segments
}

fn is_ignored(file: &SourceFile, handler_start: usize) -> bool {
    file.leading_comments(handler_start)
        .any(|(kind, text)| kind == Tok::BlockComment && text.contains(IGNORE_MARKER))
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{DeclaredTypes, Project};
    use pretty_assertions::assert_eq;

    /// (segment names, kind, displayed return type) per match.
    fn locate(src: &str) -> Vec<(Vec<String>, ProcedureKind, String)> {
        let project = Project::new(vec![SourceFile::parse("router.ts", src)]);
        let file = project.file(0);
        let mut oracle = DeclaredTypes::new(&project, 0);
        let mut found = Vec::new();
        for_each_procedure(file, &mut oracle, &default_procedures(), |table, m| {
            let names = m.segments.iter().map(|s| s.name.clone()).collect();
            found.push((names, m.kind, table.display(m.return_type)));
            Ok::<_, ()>(())
        })
        .unwrap();
        found
    }

    #[test]
    fn finds_annotated_handlers() {
        let src = r#"
            export const appRouter = router({
                hello: publicProcedure.input(z.string()).query(({ input }): string => input),
                save: protectedProcedure.use(auth).mutation(async (): Promise<boolean> => true),
            });
        "#;
        assert_eq!(
            locate(src),
            vec![
                (vec!["input".into(), "query".into()], ProcedureKind::Query, "string".into()),
                (vec!["use".into(), "mutation".into()], ProcedureKind::Mutation, "Promise<boolean>".into()),
            ]
        );
    }

    #[test]
    fn resolves_handler_references() {
        let src = r#"
            type User = { id: number };
            async function getUser(): Promise<User> { return load(); }
            const r = { user: t.procedure.query(getUser) };
        "#;
        let found = locate(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].2, "Promise<{ id: number; }>");
    }

    #[test]
    fn skips_what_it_cannot_handle() {
        let src = r#"
            const a = publicProcedure.query(() => 1);
            const b = publicProcedure.input(x);
            const c = otherFactory.query((): string => '');
            const d = publicProcedure.query((): string => '').mutation((): string => '');
            const e = publicProcedure.query(handlers.get);
            const f = publicProcedure.query();
            const procedure = t.procedure;
        "#;
        assert!(locate(src).is_empty());
    }

    #[test]
    fn ignore_marker_skips_only_its_handler() {
        let src = r#"
            router({
                a: publicProcedure.query(/* @outputify-ignore */ (): string => ''),
                b: publicProcedure.query((): number => 1),
            });
        "#;
        let found = locate(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].2, "number");
    }

    #[test]
    fn plain_comments_do_not_hide_handlers() {
        let src = r#"
            router({
                a: publicProcedure.query(/* plain note */ (): string => ''),
                b: publicProcedure.query(
                    // line note
                    /** doc */ (): number => 1,
                ),
            });
        "#;
        let found = locate(src);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].2, "string");
        assert_eq!(found[1].2, "number");
    }

    #[test]
    fn doc_comments_inside_declared_types() {
        let src = r#"
            /** A user. */
            interface User {
                /** the id */
                id: number;
                /* display name */ name: string;
            }
            const r = publicProcedure.query((): User => load());
        "#;
        let found = locate(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].2, "User");
    }

    #[test]
    fn repeated_segments_keep_the_last() {
        let src = "publicProcedure.use(a).use(b).query((): string => '')";
        let project = Project::new(vec![SourceFile::parse("r.ts", src)]);
        let mut oracle = DeclaredTypes::new(&project, 0);
        let mut uses = Vec::new();
        for_each_procedure(project.file(0), &mut oracle, &default_procedures(), |_, m| {
            uses.push(m.segment("use").map(|s| s.open));
            assert_eq!(m.terminal().name, "query");
            Ok::<_, ()>(())
        })
        .unwrap();
        // publicProcedure . use ( a ) . use ( b ) ...: the second `(` is token 8
        assert_eq!(uses, vec![Some(8)]);
    }

    #[test]
    fn callback_errors_stop_the_walk() {
        let src = "publicProcedure.query((): string => ''); publicProcedure.query((): number => 1);";
        let project = Project::new(vec![SourceFile::parse("r.ts", src)]);
        let mut oracle = DeclaredTypes::new(&project, 0);
        let mut calls = 0;
        let res = for_each_procedure(project.file(0), &mut oracle, &default_procedures(), |_, _| {
            calls += 1;
            Err("stop")
        });
        assert_eq!(res, Err("stop"));
        assert_eq!(calls, 1);
    }
}
