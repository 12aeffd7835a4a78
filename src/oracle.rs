//! Static type information, as consumed by the locator and the synthesizer.
pub mod decls;

pub use decls::{DeclaredTypes, Project};

use crate::syntax::{FunctionExpr, Reference};
use crate::types::{TypeId, TypeTable};

/// Resolves static types for one file's analysis pass. `None` means
/// "unresolved" and is never an error.
pub trait TypeOracle {
    /// Table every returned [`TypeId`] points into.
    fn table(&self) -> &TypeTable;
    /// Type of a bare identifier expression.
    fn resolve_type(&mut self, reference: &Reference) -> Option<TypeId>;
    /// Declared return type of a function expression.
    fn return_type_of_signature(&mut self, function: &FunctionExpr) -> Option<TypeId>;
}
