//! Path aliases for test resources.
//!
//! An alias is a symbolic prefix such as `@fixtures` that stands for a
//! directory. `@fixtures/oci.sql` resolves to `<fixtures dir>/oci.sql`.
//! Alias targets may themselves start with an alias; they are expanded when
//! the alias is registered.

use dbal_core::{DbalError, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Workspace root, two levels above this crate
pub const ROOT_ALIAS: &str = "@root";

/// Directory holding the bundled SQL fixtures and config
pub const FIXTURES_ALIAS: &str = "@fixtures";

/// Mapping from alias names to absolute directories
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    aliases: BTreeMap<String, PathBuf>,
}

impl AliasMap {
    /// An empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// A map with `@root` and `@fixtures` registered
    pub fn with_defaults() -> Self {
        let crate_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
        let root = crate_dir
            .parent()
            .and_then(Path::parent)
            .unwrap_or(crate_dir)
            .to_path_buf();

        let mut aliases = BTreeMap::new();
        aliases.insert(ROOT_ALIAS.to_string(), root);
        aliases.insert(FIXTURES_ALIAS.to_string(), crate_dir.join("data"));
        Self { aliases }
    }

    /// Register or replace an alias
    pub fn set(&mut self, alias: &str, target: impl AsRef<Path>) -> Result<()> {
        if !alias.starts_with('@') || alias.len() < 2 || alias.contains('/') {
            return Err(DbalError::Configuration(format!(
                "invalid alias '{}': aliases start with '@' and contain no '/'",
                alias
            )));
        }

        let target = target.as_ref();
        let resolved = match target.to_str() {
            Some(text) if text.starts_with('@') => self.resolve(text)?,
            _ => target.to_path_buf(),
        };

        tracing::debug!(alias = %alias, target = %resolved.display(), "registered path alias");
        self.aliases.insert(alias.to_string(), resolved);
        Ok(())
    }

    /// Directory an alias stands for
    pub fn get(&self, alias: &str) -> Option<&Path> {
        self.aliases.get(alias).map(PathBuf::as_path)
    }

    /// Expand a leading alias in `path`. Paths that do not start with `@`
    /// are returned unchanged.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        if !path.starts_with('@') {
            return Ok(PathBuf::from(path));
        }

        let (alias, rest) = match path.split_once('/') {
            Some((alias, rest)) => (alias, Some(rest)),
            None => (path, None),
        };

        let base = self.aliases.get(alias).ok_or_else(|| {
            DbalError::Configuration(format!("unknown path alias '{}' in '{}'", alias, path))
        })?;

        Ok(match rest {
            Some(rest) if !rest.is_empty() => base.join(rest),
            _ => base.clone(),
        })
    }
}
