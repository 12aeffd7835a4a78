//! The three localized edits that put a validator into a chain.
//!
//! | chain has            | strategy               | edit                                   |
//! |----------------------|------------------------|----------------------------------------|
//! | `.output(..)`        | `ReplaceOutput`        | replace the output call's arguments    |
//! | `.input(..)` only    | `InsertAfterInput`     | `.output(..)` after the input call     |
//! | neither              | `InsertBeforeTerminal` | `.output(..)` before `.query`/`.mutation` |
//!
//! Every edit is a byte-span splice, so the rest of the chain keeps its
//! formatting, and replacing marked output with the same validator is a
//! no-op.

use crate::procedure::{ProcedureMatch, Segment};
use crate::syntax::{Edit, SourceFile};
use crate::zod::{BEGIN_MARKER, END_MARKER, Generated};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    InsertAfterInput { input: Segment },
    ReplaceOutput { output: Segment },
    InsertBeforeTerminal { terminal: Segment },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub edit: Edit,
    /// The replaced arguments weren't produced by a previous run.
    pub replaced_handwritten: bool,
}

impl Strategy {
    pub fn choose(procedure: &ProcedureMatch) -> Self {
        match (procedure.segment("input"), procedure.segment("output")) {
            (_, Some(output)) => Strategy::ReplaceOutput { output: output.clone() },
            (Some(input), None) => Strategy::InsertAfterInput { input: input.clone() },
            (None, None) => Strategy::InsertBeforeTerminal { terminal: procedure.terminal().clone() },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::InsertAfterInput { .. } => "insert-after-input",
            Strategy::ReplaceOutput { .. } => "replace-output",
            Strategy::InsertBeforeTerminal { .. } => "insert-before-terminal",
        }
    }

    pub fn apply(&self, file: &SourceFile, generated: &Generated) -> Rewrite {
        match self {
            Strategy::InsertAfterInput { input } => Rewrite {
                edit: Edit::insert(file.span(input.close).end, output_call(generated)),
                replaced_handwritten: false,
            },
            Strategy::ReplaceOutput { output } => {
                let span = output.args_span(file);
                let previous = file.slice(span);
                Rewrite {
                    edit: Edit::replace(span, generated.to_string()),
                    replaced_handwritten: !(previous.contains(BEGIN_MARKER) && previous.contains(END_MARKER)),
                }
            }
            Strategy::InsertBeforeTerminal { terminal } => Rewrite {
                edit: Edit::insert(file.span(terminal.dot).start, output_call(generated)),
                replaced_handwritten: false,
            },
        }
    }
}

fn output_call(generated: &Generated) -> String {
    format!(".output({generated})")
}
