use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info};

use crate::config::SubsetterConfig;
use crate::constraint::{CONSTRAINT_KEY, constraint_expression, format_variable_set};
use crate::download::Downloader;
use crate::error::SubsetError;
use crate::resolver::{ResolverFactory, Variable, VariableResolver};
use crate::transport::{FormPayload, HttpTransport, RequestMethod, Transport};
use crate::util::{absolute_variable_path, granule_name, move_to_unique_name};

/// Suffix appended to the granule URL to fetch its DMR.
pub const METADATA_SUFFIX: &str = ".dmr";
/// Suffix appended to the granule URL to fetch NetCDF-4 data.
pub const DATA_SUFFIX: &str = ".dap.nc4";

/// Extracts variable subsets from OPeNDAP granules.
#[derive(Debug, Clone)]
pub struct Subsetter<T, F> {
    downloader: Downloader<T>,
    resolvers: F,
    resolver_config: PathBuf,
}

impl<F: ResolverFactory> Subsetter<HttpTransport, F> {
    /// Creates a subsetter that talks HTTP using `config`.
    pub fn from_config(config: &SubsetterConfig, resolvers: F) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(transport, resolvers, config))
    }
}

impl<T: Transport, F: ResolverFactory> Subsetter<T, F> {
    pub fn new(transport: T, resolvers: F, config: &SubsetterConfig) -> Self {
        Self {
            downloader: Downloader::new(transport, config.retry),
            resolvers,
            resolver_config: config.resolver_config.clone(),
        }
    }

    pub fn downloader(&self) -> &Downloader<T> {
        &self.downloader
    }

    /// Retrieves the requested variables, and everything they depend on, from
    /// the granule at `url` into `output_dir`.
    ///
    /// `url` is the granule's OPeNDAP URL without a suffix. The returned file
    /// has a freshly generated name, so repeated calls never return the same
    /// path.
    pub fn subset_granule(
        &self,
        url: &str,
        variables: &[Variable],
        output_dir: &Path,
        access_token: Option<&str>,
    ) -> Result<PathBuf, SubsetError> {
        let granule = granule_name(url);
        info!(granule = %granule, "Performing variable subsetting on: {}", granule);

        let requested: Vec<String> = variables
            .iter()
            .map(|v| absolute_variable_path(&v.full_path))
            .collect();
        info!("Requested variables: {}", format_variable_set(&requested));

        let dmr_path = self.downloader.download(
            &format!("{}{}", url, METADATA_SUFFIX),
            output_dir,
            &RequestMethod::Get,
            access_token,
        )?;

        let resolver = self
            .resolvers
            .load(&dmr_path, &self.resolver_config)
            .map_err(SubsetError::Resolver)?;

        let requested: BTreeSet<String> = requested.into_iter().collect();
        let required = resolver
            .required_variables(&requested)
            .map_err(SubsetError::Resolver)?;
        info!("All required variables: {}", format_variable_set(&required));

        self.fetch_variables(url, &required, output_dir, access_token)
    }

    /// POSTs a DAP4 constraint expression for `required` and renames the
    /// result to a unique file name.
    pub fn fetch_variables(
        &self,
        url: &str,
        required: &BTreeSet<String>,
        output_dir: &Path,
        access_token: Option<&str>,
    ) -> Result<PathBuf, SubsetError> {
        let payload = FormPayload::new().with(CONSTRAINT_KEY, constraint_expression(required));

        let downloaded = self.downloader.download(
            &format!("{}{}", url, DATA_SUFFIX),
            output_dir,
            &RequestMethod::Post(payload),
            access_token,
        )?;

        // Transports may name files after the URL alone; move the result out
        // of the way so the next request with a different payload is fetched.
        let renamed = move_to_unique_name(output_dir, &downloaded)?;
        debug!(from = %downloaded.display(), to = %renamed.display(), "renamed subset output");
        Ok(renamed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::cell::RefCell;

    struct Fake {
        requests: RefCell<Vec<(String, RequestMethod)>>,
    }

    impl Transport for Fake {
        fn download(
            &self,
            url: &str,
            destination: &Path,
            method: &RequestMethod,
            _access_token: Option<&str>,
        ) -> Result<PathBuf, TransportError> {
            self.requests
                .borrow_mut()
                .push((url.to_string(), method.clone()));
            let name = url.rsplit('/').next().unwrap_or("download");
            let path = destination.join(name);
            std::fs::write(&path, b"").unwrap();
            Ok(path)
        }
    }

    struct Identity;

    impl VariableResolver for Identity {
        fn required_variables(&self, requested: &BTreeSet<String>) -> Result<BTreeSet<String>> {
            Ok(requested.clone())
        }
    }

    #[test]
    fn requests_metadata_then_data() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Fake {
            requests: RefCell::new(Vec::new()),
        };
        let subsetter = Subsetter::new(
            &transport,
            |_: &Path, _: &Path| -> Result<Identity> { Ok(Identity) },
            &SubsetterConfig::default(),
        );

        let out = subsetter
            .subset_granule(
                "https://opendap.example/bucket/africa",
                &[Variable::new("V1", "sst", "sst")],
                dir.path(),
                None,
            )
            .unwrap();

        let requests = transport.requests.borrow();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0, "https://opendap.example/bucket/africa.dmr");
        assert_eq!(requests[0].1, RequestMethod::Get);
        assert_eq!(requests[1].0, "https://opendap.example/bucket/africa.dap.nc4");
        assert_eq!(
            requests[1].1.payload().and_then(|p| p.get(CONSTRAINT_KEY)),
            Some("%2Fsst")
        );
        assert_eq!(out.extension().and_then(|e| e.to_str()), Some("nc4"));
        assert!(out.exists());
        assert!(dir.path().join("africa.dmr").exists());
    }

    #[test]
    fn resolver_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Fake {
            requests: RefCell::new(Vec::new()),
        };
        let subsetter = Subsetter::new(
            &transport,
            |_: &Path, _: &Path| -> Result<Identity> { anyhow::bail!("malformed DMR") },
            &SubsetterConfig::default(),
        );

        let err = subsetter
            .subset_granule("https://opendap.example/africa", &[], dir.path(), None)
            .unwrap_err();
        assert!(matches!(err, SubsetError::Resolver(_)));
        assert_eq!(transport.requests.borrow().len(), 1);
    }
}
