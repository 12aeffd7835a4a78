//! CLI: write | check | print
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use crate::config::Config;
use crate::error::Error;
use crate::file::{self, Outcome, Settings};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// add zod output validators to tRPC procedures, synthesized from the handlers' return types
#[derive(Parser, Debug)]
#[command(name = "outputify", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// add or refresh `.output(..)` validators in place
    Write(WriteOut),
    /// report files that would change without writing them; exits 1 if any would
    Check(CheckOut),
    /// print every procedure with its synthesized validator
    Print(PrintOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// config file (defaults to ./outputify.json when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// procedure-factory names that start a chain, comma separated
    #[arg(short, long, value_delimiter = ',')]
    procedures: Vec<String>,

    /// recursion limit for type synthesis
    #[arg(long)]
    max_depth: Option<usize>,

    /// module `z` is imported from
    #[arg(long)]
    zod_module: Option<String>,

    /// only report errors
    #[arg(short, long, default_value_t = false)]
    silent: bool,

    /// literal paths or quoted glob patterns (defaults to the config's `files`)
    files: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct WriteOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct CheckOut {
    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct PrintOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// emit JSON instead of text
    #[arg(long)]
    json: bool,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    /// Config file, then flags on top; plus the resolved input files.
    fn resolve(&self) -> anyhow::Result<(Settings, Vec<PathBuf>)> {
        let config = Config::discover(self.config.as_deref()).context("failed to load config")?;
        let mut settings = config.settings();
        if !self.procedures.is_empty() {
            settings.procedures = self.procedures.clone();
        }
        if let Some(max_depth) = self.max_depth {
            anyhow::ensure!(max_depth > 0, "--max-depth must be positive");
            settings.max_depth = max_depth;
        }
        if let Some(zod_module) = &self.zod_module {
            settings.zod_module = zod_module.clone();
        }
        let patterns = match self.files.is_empty() {
            true => &config.files,
            false => &self.files,
        };
        let paths = resolve_file_path_patterns(patterns).context("failed to resolve input file paths")?;
        Ok((settings, paths))
    }

    fn scan(&self, persist: bool) -> anyhow::Result<Outcome> {
        let (settings, paths) = self.resolve()?;
        if !self.silent {
            eprintln!("{} {} files", "Scanning".bold(), paths.len());
        }
        let project = file::load_project(&paths).context("failed to read input files")?;
        let outcome = file::process(&project, &settings, persist);
        for (path, err) in &outcome.failures {
            let located = match err {
                Error::Procedure { .. } | Error::Io { .. } => err.to_string(),
                _ => format!("{}: {err}", path.display()),
            };
            eprintln!("{} {located}", "error:".red().bold());
        }
        Ok(outcome)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<ExitCode> {
        match &self.cmd {
            Command::Write(target) => {
                let settings = &target.input_settings;
                let outcome = settings.scan(true)?;
                if !settings.silent {
                    let summary = outcome.summary;
                    eprintln!(
                        "{} {} files ({} procedures updated)",
                        "Modified".green().bold(),
                        summary.files_changed,
                        summary.procedures_changed
                    );
                    if summary.warnings > 0 {
                        eprintln!("{} replaced {} hand-written validators", "warning:".yellow().bold(), summary.warnings);
                    }
                }
                Ok(exit_code(&outcome, false))
            }
            Command::Check(target) => {
                let settings = &target.input_settings;
                let outcome = settings.scan(false)?;
                for report in outcome.reports.iter().filter(|r| r.output.is_some()) {
                    let updated = report.procedures.iter().filter(|p| p.changed).count();
                    println!("{} ({updated} procedures)", report.path.display());
                }
                if !settings.silent {
                    eprintln!(
                        "{} {} files would change",
                        "Checked".bold(),
                        outcome.summary.files_changed
                    );
                }
                Ok(exit_code(&outcome, true))
            }
            Command::Print(target) => {
                let outcome = target.input_settings.scan(false)?;
                if target.json {
                    let rendered = serde_json::to_string_pretty(&outcome.reports).context("failed to render report")?;
                    println!("{rendered}");
                } else {
                    for report in &outcome.reports {
                        for procedure in &report.procedures {
                            println!(
                                "{}:{} {} {}",
                                report.path.display(),
                                procedure.line,
                                procedure.kind.as_str().cyan(),
                                procedure.validator
                            );
                        }
                    }
                }
                Ok(exit_code(&outcome, false))
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// 1 on any failed file, or on any pending change when `strict`.
fn exit_code(outcome: &Outcome, strict: bool) -> ExitCode {
    let failed = outcome.summary.files_failed > 0;
    let pending = strict && outcome.summary.files_changed > 0;
    match failed || pending {
        true => ExitCode::FAILURE,
        false => ExitCode::SUCCESS,
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                let path = entry?;
                // declaration files carry no handlers
                if path.to_string_lossy().ends_with(".d.ts") {
                    continue;
                }
                matched_any = true;
                out.push(path);
            }
            anyhow::ensure!(matched_any, "glob pattern matched no files: {pattern}");
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands_and_flags() {
        let cli = CommandLineInterface::try_parse_from([
            "outputify",
            "write",
            "-p",
            "publicProcedure,adminProcedure",
            "--max-depth",
            "12",
            "src/a.ts",
            "src/b.ts",
        ])
        .unwrap();
        let Command::Write(target) = cli.cmd else { panic!("expected write") };
        let input = target.input_settings;
        assert_eq!(input.procedures, vec!["publicProcedure", "adminProcedure"]);
        assert_eq!(input.max_depth, Some(12));
        assert_eq!(input.files, vec!["src/a.ts", "src/b.ts"]);
    }

    #[test]
    fn print_takes_json_flag() {
        let cli = CommandLineInterface::try_parse_from(["outputify", "print", "--json", "-s"]).unwrap();
        let Command::Print(target) = cli.cmd else { panic!("expected print") };
        assert!(target.json);
        assert!(target.input_settings.silent);
        assert!(target.input_settings.files.is_empty());
    }

    #[test]
    fn literal_paths_pass_through() {
        let paths = resolve_file_path_patterns(["b.ts", "a.ts", "a.ts"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("a.ts"), PathBuf::from("b.ts")]);
    }

    #[test]
    fn exit_codes() {
        let mut outcome = Outcome::default();
        assert_eq!(exit_code(&outcome, true), ExitCode::SUCCESS);
        outcome.summary.files_changed = 1;
        assert_eq!(exit_code(&outcome, false), ExitCode::SUCCESS);
        assert_eq!(exit_code(&outcome, true), ExitCode::FAILURE);
    }
}
