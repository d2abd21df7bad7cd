//! Seam to the external variable dependency resolver.
//!
//! The resolver reads a granule's metadata descriptor (DMR) and expands a set of
//! requested variable paths into every path they depend on, such as
//! coordinates and bounds. This crate only consumes it.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

pub trait VariableResolver {
    /// Returns the requested paths plus all of their dependencies.
    fn required_variables(&self, requested: &BTreeSet<String>) -> Result<BTreeSet<String>>;
}

/// Builds a [`VariableResolver`] from a downloaded metadata descriptor.
pub trait ResolverFactory {
    type Resolver: VariableResolver;

    fn load(&self, metadata: &Path, config_file: &Path) -> Result<Self::Resolver>;
}

impl<F, R> ResolverFactory for F
where
    F: Fn(&Path, &Path) -> Result<R>,
    R: VariableResolver,
{
    type Resolver = R;

    fn load(&self, metadata: &Path, config_file: &Path) -> Result<R> {
        self(metadata, config_file)
    }
}

/// A variable requested for the subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Catalogue identifier, e.g. `V1234834148-EEDTEST`.
    pub id: String,
    pub name: String,
    /// Hierarchical path within the granule, with or without a leading `/`.
    pub full_path: String,
}

impl Variable {
    pub fn new(id: impl Into<String>, name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            full_path: full_path.into(),
        }
    }
}
