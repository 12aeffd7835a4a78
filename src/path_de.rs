use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Deserialize JSON read from `path`; failures name the JSON path of the
/// offending value.
pub fn from_str_with_path<T: DeserializeOwned>(path: &Path, src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let at = err.path().to_string();
        Error::Config {
            path: path.to_path_buf(),
            message: format!("at JSON path {at} → {}", err.into_inner()),
        }
    })
}
