// src/bundle/list.rs

//! List installable bundles

use super::init;
use crate::config::UpdaterConfig;
use crate::manifest::ManifestLoader;
use crate::repository::{check_network, ContentSource};
use crate::version::get_current_version;
use crate::{Error, Result};
use tracing::info;

/// Return the name of every bundle the current OS version offers, in
/// MoM order.
pub fn list_bundles(config: &UpdaterConfig) -> Result<Vec<String>> {
    let _lock = init(config)?;

    let version_source = ContentSource::new(&config.version_url)?;
    if !check_network(&version_source) {
        return Err(Error::NetworkError(
            "unable to reach the update server".to_string(),
        ));
    }

    let current_version = get_current_version(&config.path_prefix)?;
    info!("Listing bundles available in version {}", current_version);

    let source = ContentSource::new(&config.content_url)?;
    let loader = ManifestLoader::new(config, &source);
    let mom = loader.load_mom(current_version)?;

    Ok(mom
        .manifests
        .iter()
        .map(|pointer| pointer.path.clone())
        .collect())
}
