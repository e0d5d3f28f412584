use std::collections::HashSet;
use std::fs;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::{GraphConfig, UnmigratedPolicy};
use crate::error::{GraphError, Result};
use crate::image_id::ImageId;
use crate::store::resolver;

/// An image directory with live backing storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibleImage {
    pub id: ImageId,
    /// Backing storage id read from the pointer file.
    pub cache_id: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub scanned: usize,
    pub ignored: usize,
    pub missing_cache: usize,
    pub unmigrated: usize,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Eligible images in directory-listing order.
    pub eligible: Vec<EligibleImage>,
    /// Every entry name seen under `graph/`, eligible or not.
    pub present: HashSet<String>,
    pub stats: ScanStats,
}

/// List `graph/` and keep the images whose backing storage exists.
///
/// Fails fast on a missing driver, an unreadable graph directory, any
/// resolver error other than a skippable `MigrationNeeded`, and any stat
/// failure on a backing directory.
pub fn scan_eligible(config: &GraphConfig) -> Result<ScanOutcome> {
    config.driver()?;

    let graph_dir = config.graph_dir();
    let entries = fs::read_dir(&graph_dir)
        .map_err(|err| GraphError::GraphDirUnreadable(graph_dir.display().to_string(), err))?;

    let mut outcome = ScanOutcome::default();

    for entry in entries {
        let entry = entry?;
        outcome.stats.scanned += 1;

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            debug!(name = ?file_name, "Skipping non-UTF-8 entry");
            outcome.stats.ignored += 1;
            continue;
        };
        outcome.present.insert(name.to_string());

        if name.len() != ImageId::HEX_LEN {
            debug!("Skipping: {name}");
            outcome.stats.ignored += 1;
            continue;
        }

        let Ok(id) = name.parse::<ImageId>() else {
            debug!("Skipping non-hex entry: {name}");
            outcome.stats.ignored += 1;
            continue;
        };

        // Follows symlinks; a dangling link is not a directory.
        if !entry.path().is_dir() {
            debug!("Skipping non-directory entry: {name}");
            outcome.stats.ignored += 1;
            continue;
        }

        let cache = match resolver::resolve(config, &id) {
            Ok(cache) => cache,
            Err(GraphError::MigrationNeeded(_)) if config.unmigrated == UnmigratedPolicy::Skip => {
                warn!("{id} not migrated, skipping");
                outcome.stats.unmigrated += 1;
                continue;
            }
            Err(err) => {
                if matches!(err, GraphError::MigrationNeeded(_)) {
                    debug!("{id} not migrated");
                }
                return Err(err);
            }
        };

        if !cache.exists()? {
            debug!("Skipping, missing cache dir: {id}");
            outcome.stats.missing_cache += 1;
            continue;
        }

        outcome.eligible.push(EligibleImage {
            id,
            cache_id: cache.cache_id,
        });
    }

    debug!(
        scanned = outcome.stats.scanned,
        eligible = outcome.eligible.len(),
        "Scanned graph directory"
    );
    Ok(outcome)
}
