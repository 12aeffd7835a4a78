//! Synthesize zod output validators for tRPC procedures from the handlers'
//! declared return types, and splice them into the procedure chains.
//!
//! source → [`syntax`] → [`procedure`] locates chains, [`oracle`] resolves
//! the handler's return type into a [`types::TypeTable`], [`zod`] turns it
//! into a validator, and [`rewrite`] picks where it goes. [`file`] drives a
//! whole project.

pub mod cli;
pub mod config;
pub mod error;
pub mod file;
pub mod oracle;
pub mod path_de;
pub mod procedure;
pub mod rewrite;
pub mod simplify;
pub mod syntax;
pub mod types;
pub mod zod;

pub use error::{Error, Result};
