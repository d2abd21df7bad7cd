//! Variable subsetting for granules served by OPeNDAP (DAP4).
//!
//! This crate implements a `subset_granule` flow:
//! fetch the granule's metadata descriptor (`.dmr`), expand the requested
//! variables into everything they depend on, then request only those
//! variables from the service as NetCDF-4 (`.dap.nc4`).
//!
//! Dependency resolution is not done here. Supply a [`ResolverFactory`] (any
//! `Fn(&Path, &Path) -> anyhow::Result<impl VariableResolver>` works) that
//! builds a resolver from the downloaded DMR.
//!
//! ## Quick start
//! ```no_run
//! use anyhow::Result;
//! use std::collections::BTreeSet;
//! use std::path::Path;
//! use varsubset::{Subsetter, SubsetterConfig, Variable, VariableResolver};
//!
//! struct RequestedOnly;
//!
//! impl VariableResolver for RequestedOnly {
//!     fn required_variables(&self, requested: &BTreeSet<String>) -> Result<BTreeSet<String>> {
//!         Ok(requested.clone())
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let config = SubsetterConfig::from_env()?;
//!     let subsetter = Subsetter::from_config(&config, |_: &Path, _: &Path| -> Result<RequestedOnly> {
//!         Ok(RequestedOnly)
//!     })?;
//!     let path = subsetter.subset_granule(
//!         "https://opendap.earthdata.nasa.gov/collections/C1/granules/africa",
//!         &[Variable::new("V1", "sst", "sst")],
//!         Path::new("/tmp"),
//!         None,
//!     )?;
//!     println!("{}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! Downloads are retried when the server answers with a 5xx status, up to
//! [`RetryPolicy::max_attempts`] total attempts. Forbidden responses and other
//! failures are reported immediately.

#![forbid(unsafe_code)]

mod config;
mod constraint;
mod download;
mod error;
mod resolver;
mod subset;
mod transport;
mod util;

pub use config::{DEFAULT_RESOLVER_CONFIG, SubsetterConfig};
pub use constraint::{CONSTRAINT_KEY, constraint_expression, format_variable_set};
pub use download::{
    DEFAULT_ATTEMPTS, Downloader, FailureKind, RetryPolicy, classify, is_internal_server_error,
};
pub use error::{AccessStatus, SERVER_ERROR_PREFIX, SubsetError, TransportError};
pub use resolver::{ResolverFactory, Variable, VariableResolver};
pub use subset::{DATA_SUFFIX, METADATA_SUFFIX, Subsetter};
pub use transport::{FormPayload, HttpTransport, RequestMethod, Transport};
