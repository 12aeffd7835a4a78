//! Per-file pass: locate, synthesize, rewrite, import, persist.
//!
//! A file is all-or-nothing. Any procedure failure aborts that file before
//! anything is written; other files still run.

use std::fs;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::oracle::{DeclaredTypes, Project};
use crate::procedure::{ProcedureKind, default_procedures, for_each_procedure};
use crate::rewrite::Strategy;
use crate::syntax::{Edit, SourceFile, Tok, apply_edits};
use crate::types::parse::unquote;
use crate::zod::{DEFAULT_MAX_DEPTH, Synthesizer};

/// Local name the generated validators refer to.
const ZOD_BINDING: &str = "z";

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub procedures: Vec<String>,
    pub max_depth: usize,
    /// Module `z` is imported from.
    pub zod_module: String,
}

/// Counters folded across files with `+=`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub files_scanned: usize,
    pub files_changed: usize,
    pub files_failed: usize,
    pub procedures_changed: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureReport {
    pub line: usize,
    pub kind: ProcedureKind,
    pub strategy: &'static str,
    pub validator: String,
    pub changed: bool,
    pub replaced_handwritten: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub procedures: Vec<ProcedureReport>,
    /// New text, when it differs from the original.
    #[serde(skip)]
    pub output: Option<String>,
    #[serde(skip)]
    pub summary: Summary,
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub reports: Vec<FileReport>,
    pub failures: Vec<(PathBuf, Error)>,
    pub summary: Summary,
}

/// One `import ... from '...'` statement.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ImportDecl {
    module: String,
    /// Local names introduced.
    bindings: Vec<String>,
    /// Token index of the statement's last token.
    last: usize,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl Default for Settings {
    fn default() -> Self {
        Self {
            procedures: default_procedures(),
            max_depth: DEFAULT_MAX_DEPTH,
            zod_module: "zod".to_string(),
        }
    }
}

impl AddAssign for Summary {
    fn add_assign(&mut self, rhs: Self) {
        self.files_scanned += rhs.files_scanned;
        self.files_changed += rhs.files_changed;
        self.files_failed += rhs.files_failed;
        self.procedures_changed += rhs.procedures_changed;
        self.warnings += rhs.warnings;
    }
}

/// Read and index every file up front so declarations resolve across files.
pub fn load_project(paths: &[PathBuf]) -> Result<Project> {
    let files = paths
        .iter()
        .map(|path| {
            let text = fs::read_to_string(path).map_err(|source| Error::Io { path: path.clone(), source })?;
            Ok(SourceFile::parse(path.clone(), text))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Project::new(files))
}

/// Run every file of `project`, writing changed ones back when `persist`.
pub fn process(project: &Project, settings: &Settings, persist: bool) -> Outcome {
    let mut outcome = Outcome::default();
    for index in 0..project.len() {
        let path = project.file(index).path().to_path_buf();
        let result = handle_file(project, index, settings).and_then(|report| {
            if let (true, Some(text)) = (persist, &report.output) {
                write_file(&report.path, text)?;
            }
            Ok(report)
        });
        match result {
            Ok(report) => {
                outcome.summary += report.summary;
                outcome.reports.push(report);
            }
            Err(err) => {
                debug!(path = %path.display(), %err, "file left unchanged");
                outcome.summary += Summary { files_scanned: 1, files_failed: 1, ..Summary::default() };
                outcome.failures.push((path, err));
            }
        }
    }
    outcome
}

pub fn handle_file(project: &Project, index: usize, settings: &Settings) -> Result<FileReport> {
    let file = project.file(index);
    let mut oracle = DeclaredTypes::new(project, index);
    let mut edits = Vec::new();
    let mut procedures = Vec::new();
    let mut summary = Summary { files_scanned: 1, ..Summary::default() };

    for_each_procedure(file, &mut oracle, &settings.procedures, |table, procedure| -> Result<()> {
        let line = procedure.line(file);
        let located = |source| Error::Procedure { path: file.path().to_path_buf(), line, source: Box::new(source) };
        let generated = Synthesizer::new(table)
            .with_max_depth(settings.max_depth)
            .generate(procedure.return_type)
            .map_err(located)?;
        let strategy = Strategy::choose(&procedure);
        let rewrite = strategy.apply(file, &generated);

        if rewrite.replaced_handwritten {
            warn!(path = %file.path().display(), line, "replacing hand-written output validator");
            summary.warnings += 1;
        }
        let changed = !rewrite.edit.is_noop(file.text());
        if changed {
            info!(path = %file.path().display(), line, strategy = strategy.name(), "rewrote {}", procedure.kind.as_str());
            summary.procedures_changed += 1;
            edits.push(rewrite.edit);
        }
        procedures.push(ProcedureReport {
            line,
            kind: procedure.kind,
            strategy: strategy.name(),
            validator: generated.0.to_string(),
            changed,
            replaced_handwritten: rewrite.replaced_handwritten,
        });
        Ok(())
    })?;

    let output = match edits.is_empty() {
        true => None,
        false => {
            if let Some(import) = ensure_zod_import(file, &settings.zod_module)? {
                edits.push(import);
            }
            let text = apply_edits(file.text(), edits)?;
            (text != file.text()).then_some(text)
        }
    };
    if output.is_some() {
        summary.files_changed = 1;
    }
    Ok(FileReport { path: file.path().to_path_buf(), procedures, output, summary })
}

/// Edit adding `import { z } from '<module>'`, or `None` when `z` is
/// already imported from there. `z` bound to anything else is an error.
pub fn ensure_zod_import(file: &SourceFile, module: &str) -> Result<Option<Edit>> {
    let imports = imports(file);
    let conflict = |binding: String| Error::ImportConflict {
        name: ZOD_BINDING.to_string(),
        module: module.to_string(),
        binding,
    };
    for import in &imports {
        if import.bindings.iter().any(|b| b == ZOD_BINDING) {
            if import.module == module {
                return Ok(None);
            }
            return Err(conflict(format!("an import from `{}`", import.module)));
        }
    }
    if let Some(line) = local_declaration(file, ZOD_BINDING) {
        return Err(conflict(format!("a local declaration on line {line}")));
    }

    let statement = format!("import {{ {ZOD_BINDING} }} from '{module}';");
    let edit = match imports.last() {
        Some(last) => Edit::insert(file.span(last.last).end, format!("\n{statement}")),
        None => Edit::insert(file.span(directive_prologue_end(file)).start, format!("{statement}\n")),
    };
    Ok(Some(edit))
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_file(path: &Path, text: &str) -> Result<()> {
    fs::write(path, text).map_err(|source| Error::Io { path: path.to_path_buf(), source })
}

fn imports(file: &SourceFile) -> Vec<ImportDecl> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < file.len() {
        let is_statement = file.is_ident(i, "import")
            && !(i > 0 && matches!(file.kind(i - 1), Some(Tok::Dot | Tok::QuestionDot)))
            && !matches!(file.kind(i + 1), Some(Tok::LParen | Tok::Dot));
        if is_statement {
            if let Some(decl) = import_decl(file, i) {
                i = decl.last + 1;
                out.push(decl);
                continue;
            }
        }
        i += 1;
    }
    out
}

fn import_decl(file: &SourceFile, start: usize) -> Option<ImportDecl> {
    let mut bindings = Vec::new();
    let mut i = start + 1;
    // `import type X from` but not a default import named `type`
    if file.is_ident(i, "type") && !file.is_ident(i + 1, "from") && !file.is(i + 1, Tok::Comma) {
        i += 1;
    }
    loop {
        match file.kind(i)? {
            Tok::Str => {
                let last = if file.is(i + 1, Tok::Semi) { i + 1 } else { i };
                let module = unquote(file.token_text(i));
                return Some(ImportDecl { module, bindings, last });
            }
            Tok::Ident if file.is_ident(i, "from") && file.is(i + 1, Tok::Str) => i += 1,
            Tok::Ident => {
                bindings.push(file.token_text(i).to_string());
                i += 1;
            }
            Tok::Comma => i += 1,
            Tok::Punct if file.token_text(i) == "*" && file.is_ident(i + 1, "as") => {
                bindings.push(file.ident(i + 2)?.to_string());
                i += 3;
            }
            Tok::LBrace => {
                let close = file.matching(i)?;
                bindings.extend(named_bindings(file, i + 1, close));
                i = close + 1;
            }
            _ => return None,
        }
    }
}

/// Local names of `{ a, b as c, type d }` between `start` and `end`.
fn named_bindings(file: &SourceFile, start: usize, end: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut element: Vec<usize> = Vec::new();
    for i in start..=end {
        if i < end && !file.is(i, Tok::Comma) {
            element.push(i);
            continue;
        }
        let local = match element.iter().position(|t| file.is_ident(*t, "as")) {
            Some(k) => element.get(k + 1).copied(),
            None => element.last().copied(),
        };
        if let Some(name) = local.and_then(|t| file.ident(t)) {
            out.push(name.to_string());
        }
        element.clear();
    }
    out
}

/// Line of a `const`/`let`/`var`/`function`/`class` declaring `name`.
fn local_declaration(file: &SourceFile, name: &str) -> Option<usize> {
    (0..file.len()).find_map(|i| {
        let keyword = matches!(file.ident(i), Some("const" | "let" | "var" | "function" | "class"));
        let member = i > 0 && matches!(file.kind(i - 1), Some(Tok::Dot | Tok::QuestionDot));
        (keyword && !member && file.is_ident(i + 1, name)).then(|| file.line_of(file.span(i).start))
    })
}

/// First token after leading `'use client';`-style directives.
fn directive_prologue_end(file: &SourceFile) -> usize {
    let mut i = 0;
    while file.is(i, Tok::Str) && file.is(i + 1, Tok::Semi) {
        i += 2;
    }
    i
}

// ————————————————————————————————————————————————————————————————————————————
// TESTS
// ————————————————————————————————————————————————————————————————————————————

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const GEN_STRING: &str = "/* BEGIN GENERATED CONTENT */ z.string() /* END GENERATED CONTENT */";
    const GEN_NUMBER: &str = "/* BEGIN GENERATED CONTENT */ z.number() /* END GENERATED CONTENT */";

    fn project(files: &[(&str, &str)]) -> Project {
        Project::new(files.iter().map(|(path, src)| SourceFile::parse(*path, *src)).collect())
    }

    fn handle(src: &str) -> Result<FileReport> {
        handle_file(&project(&[("router.ts", src)]), 0, &Settings::default())
    }

    #[test]
    fn import_goes_after_the_last_import() {
        let src = "import { router } from './trpc';\nimport type { Ctx } from \"./ctx\"\n\nexport const r = router({ a: publicProcedure.query((): string => '') });\n";
        let report = handle(src).unwrap();
        assert_eq!(
            report.output.unwrap(),
            format!(
                "import {{ router }} from './trpc';\nimport type {{ Ctx }} from \"./ctx\"\nimport {{ z }} from 'zod';\n\nexport const r = router({{ a: publicProcedure.output({GEN_STRING}).query((): string => '') }});\n"
            )
        );
        assert_eq!(report.summary, Summary { files_scanned: 1, files_changed: 1, procedures_changed: 1, ..Summary::default() });
    }

    #[test]
    fn import_goes_after_directives() {
        let src = "'use server';\nexport const a = publicProcedure.query((): number => 1);";
        let out = handle(src).unwrap().output.unwrap();
        assert_eq!(
            out,
            format!("'use server';\nimport {{ z }} from 'zod';\nexport const a = publicProcedure.output({GEN_NUMBER}).query((): number => 1);")
        );
    }

    #[test]
    fn existing_import_is_reused() {
        let src = "import { z } from 'zod';\nconst a = publicProcedure.input(z.string()).query((): number => 1);";
        let out = handle(src).unwrap().output.unwrap();
        assert_eq!(out.matches("import { z }").count(), 1);
        assert!(out.contains(&format!(".input(z.string()).output({GEN_NUMBER}).query(")));
    }

    #[test]
    fn conflicting_z_aborts_the_file() {
        let other = "import { z } from 'myzod';\nconst a = publicProcedure.query((): number => 1);";
        assert!(matches!(handle(other), Err(Error::ImportConflict { .. })));

        let aliased = "import * as z from './validators';\nconst a = publicProcedure.query((): number => 1);";
        assert!(matches!(handle(aliased), Err(Error::ImportConflict { .. })));

        let local = "const z = makeZ();\nconst a = publicProcedure.query((): number => 1);";
        assert!(matches!(handle(local), Err(Error::ImportConflict { .. })));
    }

    #[test]
    fn ignored_sibling_is_left_alone() {
        let src = "import { z } from 'zod';\nrouter({\n  a: publicProcedure.query(/* @outputify-ignore */ (): string => ''),\n  b: publicProcedure.query((): number => 1),\n});";
        let report = handle(src).unwrap();
        assert_eq!(
            report.output.unwrap(),
            format!("import {{ z }} from 'zod';\nrouter({{\n  a: publicProcedure.query(/* @outputify-ignore */ (): string => ''),\n  b: publicProcedure.output({GEN_NUMBER}).query((): number => 1),\n}});")
        );
        assert_eq!(report.procedures.len(), 1);
    }

    #[test]
    fn procedure_failure_aborts_the_file() {
        let src = "const a = publicProcedure.query((): string => '');\nconst b = publicProcedure.query((): () => void => noop);";
        let err = handle(src).unwrap_err();
        assert!(err.is_unsupported_shape());
        assert!(matches!(err, Error::Procedure { line: 2, .. }));
    }

    #[test]
    fn cycle_through_an_alias_fails_instead_of_validating_nothing() {
        let src = "interface Category { name: string; parent: Parent }\ntype Parent = Category;\nconst a = publicProcedure.query((): Category => load());";
        let err = handle(src).unwrap_err();
        let Error::Procedure { line, source, .. } = err else { panic!("expected a located error") };
        assert_eq!(line, 3);
        assert!(matches!(*source, Error::RecursionLimit { .. }));
    }

    #[test]
    fn comments_around_declarations_and_handlers() {
        let src = "/* Copyright header */\ninterface User {\n  /** the id */\n  id: number;\n}\nconst a = publicProcedure.query(/* note */ (): User => load());";
        let report = handle(src).unwrap();
        assert_eq!(report.procedures.len(), 1);
        assert_eq!(report.procedures[0].validator, "z.object({ id: z.number() })");
        let out = report.output.unwrap();
        assert!(out.starts_with("/* Copyright header */\nimport { z } from 'zod';\ninterface User {"), "{out}");
    }

    #[test]
    fn rewriting_is_idempotent() {
        let src = "const a = publicProcedure.input(z.string()).mutation(async (): Promise<{ ok: boolean }> => ({ ok: true }));";
        let first = handle(src).unwrap().output.unwrap();
        let second = handle(&first).unwrap();
        assert_eq!(second.output, None);
        assert_eq!(second.summary.procedures_changed, 0);
        assert!(!second.procedures[0].changed);
    }

    #[test]
    fn process_folds_summaries_and_keeps_going() {
        let p = project(&[
            ("bad.ts", "const a = publicProcedure.query((): [string?] => []);"),
            ("models.ts", "export interface User { id: number; name: string }"),
            ("good.ts", "const b = publicProcedure.query((): User => load());"),
        ]);
        let outcome = process(&p, &Settings::default(), false);
        assert_eq!(
            outcome.summary,
            Summary { files_scanned: 3, files_changed: 1, files_failed: 1, procedures_changed: 1, warnings: 0 }
        );
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].0, PathBuf::from("bad.ts"));
        let good = outcome.reports.iter().find(|r| r.path == Path::new("good.ts")).unwrap();
        assert_eq!(good.procedures[0].validator, "z.object({ id: z.number(), name: z.string() })");
    }

    #[test]
    fn import_bindings() {
        let file = SourceFile::parse("t.ts", "import React, { useState as use, type FC } from 'react';\nimport './side-effect';\nimport * as path from 'path'");
        let decls = imports(&file);
        assert_eq!(decls.len(), 3);
        assert_eq!(decls[0].bindings, vec!["React", "use", "FC"]);
        assert_eq!(decls[1].bindings, Vec::<String>::new());
        assert_eq!(decls[2].bindings, vec!["path"]);
        assert_eq!(decls[2].module, "path");
    }
}
