//! `outputify.json`.
//!
//! ```json
//! {
//!   "procedures": ["publicProcedure", "adminProcedure"],
//!   "maxDepth": 50,
//!   "zodModule": "zod",
//!   "files": ["./src/server/**/*.ts"]
//! }
//! ```
//!
//! Every field is optional. Command-line flags override the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::file::Settings;
use crate::procedure::default_procedures;
use crate::zod::DEFAULT_MAX_DEPTH;

pub const DEFAULT_CONFIG_FILE: &str = "outputify.json";
pub const DEFAULT_FILES: &str = "./src/**/*.ts";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    /// Procedure-factory names that start a chain.
    pub procedures: Vec<String>,
    pub max_depth: usize,
    pub zod_module: String,
    /// Paths or glob patterns scanned when none are given on the command line.
    pub files: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            procedures: default_procedures(),
            max_depth: DEFAULT_MAX_DEPTH,
            zod_module: "zod".to_string(),
            files: vec![DEFAULT_FILES.to_string()],
        }
    }
}

impl Config {
    pub fn from_json(path: &Path, src: &str) -> Result<Self> {
        let config: Config = crate::path_de::from_str_with_path(path, src)?;
        config.validate(path)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
        Self::from_json(path, &src)
    }

    /// The explicit file if given, else `outputify.json` in the working
    /// directory when it exists, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let implicit = PathBuf::from(DEFAULT_CONFIG_FILE);
        match implicit.is_file() {
            true => Self::load(&implicit),
            false => Ok(Self::default()),
        }
    }

    pub fn settings(&self) -> Settings {
        Settings {
            procedures: self.procedures.clone(),
            max_depth: self.max_depth,
            zod_module: self.zod_module.clone(),
        }
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let invalid = |message: &str| Error::Config { path: path.to_path_buf(), message: message.to_string() };
        if self.procedures.is_empty() {
            return Err(invalid("`procedures` must name at least one factory"));
        }
        if self.max_depth == 0 {
            return Err(invalid("`maxDepth` must be positive"));
        }
        if self.zod_module.trim().is_empty() {
            return Err(invalid("`zodModule` must not be empty"));
        }
        Ok(())
    }
}
