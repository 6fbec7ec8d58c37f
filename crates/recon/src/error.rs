use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    CatalogueParse(String),
    /// Catalogue validation error (duplicate tag, empty field name, etc.).
    CatalogueValidation(String),
    /// Export target already exists. Prior exports are never replaced.
    OutputExists(PathBuf),
    /// CSV serialization error.
    Csv(String),
    /// IO error (file create, rename, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CatalogueParse(msg) => write!(f, "catalogue parse error: {msg}"),
            Self::CatalogueValidation(msg) => write!(f, "catalogue validation error: {msg}"),
            Self::OutputExists(path) => {
                write!(f, "refusing to overwrite existing export {}", path.display())
            }
            Self::Csv(msg) => write!(f, "CSV write error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}

impl From<csv::Error> for ReconError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}
