// src/manifest/graph.rs

//! Manifest graph resolution
//!
//! A bundle's manifest names the bundles it requires in `includes`;
//! resolution computes the transitive closure over those edges. The
//! traversal is an explicit worklist with a visited set keyed by
//! component name, so cycles terminate and a bundle is loaded at most
//! once.

use crate::manifest::{Manifest, ManifestLoader};
use crate::subscriptions::Subscriptions;
use crate::{Error, Result};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, warn};

/// Resolve sub-manifests against a MoM.
///
/// With `bundle = Some(name)` the result is the singleton list holding
/// that bundle's manifest, with no include expansion (remove only wants
/// the one bundle's files). With `bundle = None` every currently
/// subscribed bundle and every bundle reachable through `includes` is
/// loaded, in discovery order.
pub fn recurse_manifest(
    subs: &Subscriptions,
    loader: &ManifestLoader,
    mom: &Manifest,
    bundle: Option<&str>,
) -> Result<Vec<Manifest>> {
    let mut worklist: VecDeque<String> = match bundle {
        Some(name) => VecDeque::from([name.to_string()]),
        None => subs.iter().map(|s| s.component.clone()).collect(),
    };
    let expand_includes = bundle.is_none();

    let mut visited: HashSet<String> = HashSet::new();
    let mut resolved = Vec::new();

    while let Some(name) = worklist.pop_front() {
        if !visited.insert(name.clone()) {
            continue;
        }

        let pointer = mom.search_bundle(&name).ok_or_else(|| {
            warn!("No manifest pointer for bundle \"{}\" in MoM", name);
            Error::RecurseManifest(name.clone())
        })?;

        let sub = loader.load_sub(pointer).map_err(|e| {
            warn!("Cannot load manifest for bundle \"{}\": {}", name, e);
            Error::RecurseManifest(name.clone())
        })?;

        if expand_includes {
            for include in &sub.includes {
                if !visited.contains(include) {
                    worklist.push_back(include.clone());
                }
            }
        }

        resolved.push(sub);
    }

    debug!("Resolved {} sub-manifest(s)", resolved.len());
    Ok(resolved)
}

/// True when any resolved sub-manifest lists `bundle_name` in its
/// includes. Used by remove to refuse deleting a bundle another
/// installed bundle still requires.
pub fn is_included(bundle_name: &str, submanifests: &[Manifest]) -> bool {
    submanifests
        .iter()
        .any(|sub| sub.includes.iter().any(|name| name == bundle_name))
}
