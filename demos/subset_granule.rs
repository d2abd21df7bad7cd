use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use varsubset::{Subsetter, SubsetterConfig, Variable, VariableResolver};

/// Requests exactly the named variables, without dependency expansion.
struct RequestedOnly;

impl VariableResolver for RequestedOnly {
    fn required_variables(&self, requested: &BTreeSet<String>) -> Result<BTreeSet<String>> {
        Ok(requested.clone())
    }
}

fn main() -> Result<()> {
    // Example program that calls the library API.
    // Usage: subset_granule <granule-url> <variable>... (token in EDL_TOKEN)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().context("missing granule URL")?;
    let variables: Vec<Variable> = args
        .enumerate()
        .map(|(i, path)| Variable::new(format!("V{}", i), path.clone(), path))
        .collect();

    let config = SubsetterConfig::from_env()?;
    let subsetter = Subsetter::from_config(&config, |_: &Path, _: &Path| -> Result<RequestedOnly> {
        Ok(RequestedOnly)
    })?;

    let output_dir = PathBuf::from("subset-output");
    std::fs::create_dir_all(&output_dir)?;

    let token = std::env::var("EDL_TOKEN").ok();
    let path = subsetter.subset_granule(&url, &variables, &output_dir, token.as_deref())?;
    println!("{}", path.display());
    Ok(())
}
