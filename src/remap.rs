use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::image_id::{ImageId, ImageIdGenerationError};
use crate::mapping::{IdMapping, MappingEntry};
use crate::store::rewriter::{self, FileRewrite, RewriteMode};
use crate::store::scanner::{self, EligibleImage, ScanStats};

const MAX_ID_ATTEMPTS_PER_IMAGE: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Policy {
    Scramble,
    Downgrade,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scramble => "scramble",
            Self::Downgrade => "downgrade",
        }
    }
}

/// One planned directory move, handed to the caller before it happens.
#[derive(Debug, Clone, Copy)]
pub struct RemapStep<'a> {
    pub policy: Policy,
    pub old_id: &'a ImageId,
    pub new_id: &'a ImageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenameFailure {
    pub old_id: ImageId,
    pub new_id: ImageId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemapReport {
    pub policy: Policy,
    pub dry_run: bool,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub scan: ScanStats,
    pub eligible: usize,
    pub unchanged: usize,
    pub remapped: Vec<MappingEntry>,
    pub rename_failures: Vec<RenameFailure>,
    pub anomalies: Vec<String>,
    pub references: Vec<FileRewrite>,
}

impl RemapReport {
    pub fn files_written(&self) -> usize {
        self.references.iter().filter(|r| r.written).count()
    }

    pub fn substitutions(&self) -> usize {
        self.references.iter().map(|r| r.replaced).sum()
    }
}

/// Accumulates renames and reference files for one run.
struct RemapRun<'a> {
    config: &'a GraphConfig,
    dry_run: bool,
    mapping: IdMapping,
    references: Vec<PathBuf>,
    rename_failures: Vec<RenameFailure>,
    anomalies: Vec<String>,
}

impl<'a> RemapRun<'a> {
    fn new(config: &'a GraphConfig, dry_run: bool) -> Result<Self> {
        Ok(Self {
            config,
            dry_run,
            mapping: IdMapping::new(),
            references: vec![config.repositories_path()?],
            rename_failures: Vec::new(),
            anomalies: Vec::new(),
        })
    }

    /// Move `old_id` to `new_id` and record the mapping only once the
    /// directory is actually in place.
    fn apply(&mut self, old_id: &ImageId, new_id: ImageId) {
        let old_path = self.config.image_dir(old_id.as_str());
        let new_path = self.config.image_dir(new_id.as_str());

        // A dry run refuses the same targets a real run would.
        let renamed = match new_path.try_exists() {
            Ok(true) => Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "target directory already exists",
            )),
            Ok(false) if self.dry_run => Ok(()),
            Ok(false) => fs::rename(&old_path, &new_path),
            Err(err) => Err(err),
        };

        if let Err(err) = renamed {
            error!(
                "Error renaming {} to {}: {err}",
                old_path.display(),
                new_path.display()
            );
            self.rename_failures.push(RenameFailure {
                old_id: old_id.clone(),
                new_id,
                error: err.to_string(),
            });
            return;
        }

        // Nothing moved in a dry run, so the metadata is still under the old name.
        let metadata = if self.dry_run {
            self.config.metadata_path(old_id)
        } else {
            self.config.metadata_path(&new_id)
        };
        self.record(old_id, new_id, metadata);
    }

    fn record(&mut self, old_id: &ImageId, new_id: ImageId, metadata: PathBuf) {
        if let Err(conflict) = self.mapping.insert(old_id.clone(), new_id) {
            error!("{conflict}");
            self.anomalies.push(conflict.to_string());
            return;
        }
        self.references.push(metadata);
    }

    fn finish(
        self,
        policy: Policy,
        started: (String, Instant),
        scan: ScanStats,
        eligible: usize,
        unchanged: usize,
    ) -> RemapReport {
        let mode = if self.dry_run {
            RewriteMode::CountOnly
        } else {
            RewriteMode::Write
        };
        let references = rewriter::rewrite_references(&self.mapping, &self.references, mode);

        let (started_at, t1) = started;
        let elapsed = t1.elapsed();
        debug!("Ran {} in {:?}", policy.as_str(), elapsed);

        RemapReport {
            policy,
            dry_run: self.dry_run,
            started_at,
            elapsed_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            scan,
            eligible,
            unchanged,
            remapped: self.mapping.entries().to_vec(),
            rename_failures: self.rename_failures,
            anomalies: self.anomalies,
            references,
        }
    }
}

fn start_clock() -> (String, Instant) {
    (Utc::now().to_rfc3339(), Instant::now())
}

/// Give every eligible image a fresh random id and propagate the change.
pub fn scramble<P>(config: &GraphConfig, dry_run: bool, on_step: P) -> Result<RemapReport>
where
    P: FnMut(RemapStep<'_>),
{
    scramble_with(config, dry_run, ImageId::generate, on_step)
}

/// Scramble with an injectable id generator.
pub fn scramble_with<G, P>(
    config: &GraphConfig,
    dry_run: bool,
    mut generate: G,
    mut on_step: P,
) -> Result<RemapReport>
where
    G: FnMut() -> std::result::Result<ImageId, ImageIdGenerationError>,
    P: FnMut(RemapStep<'_>),
{
    let started = start_clock();
    let scan = scanner::scan_eligible(config)?;
    let mut run = RemapRun::new(config, dry_run)?;

    // Names already on disk can never be handed out.
    let mut reserved = scan.present.clone();

    // Allocate every id before the first rename so a generator failure
    // leaves the tree untouched.
    let mut plan = Vec::with_capacity(scan.eligible.len());
    for image in &scan.eligible {
        let new_id = allocate_id(&image.id, &mut reserved, &mut generate)?;
        plan.push((image, new_id));
    }

    for (image, new_id) in plan {
        on_step(RemapStep {
            policy: Policy::Scramble,
            old_id: &image.id,
            new_id: &new_id,
        });
        run.apply(&image.id, new_id);
    }

    Ok(run.finish(
        Policy::Scramble,
        started,
        scan.stats,
        scan.eligible.len(),
        0,
    ))
}

fn allocate_id<G>(
    old_id: &ImageId,
    reserved: &mut HashSet<String>,
    generate: &mut G,
) -> Result<ImageId>
where
    G: FnMut() -> std::result::Result<ImageId, ImageIdGenerationError>,
{
    for _ in 0..MAX_ID_ATTEMPTS_PER_IMAGE {
        let candidate = generate()?;
        if reserved.insert(candidate.as_str().to_string()) {
            return Ok(candidate);
        }
        debug!("Generated id {candidate} collides, retrying");
    }

    Err(GraphError::IdAllocation(
        old_id.to_string(),
        MAX_ID_ATTEMPTS_PER_IMAGE,
    ))
}

/// Rename every eligible image back to its backing storage id.
pub fn downgrade<P>(config: &GraphConfig, dry_run: bool, mut on_step: P) -> Result<RemapReport>
where
    P: FnMut(RemapStep<'_>),
{
    let started = start_clock();
    let scan = scanner::scan_eligible(config)?;
    let mut run = RemapRun::new(config, dry_run)?;
    let mut unchanged = 0;

    for EligibleImage { id, cache_id } in &scan.eligible {
        if cache_id == id.as_str() {
            unchanged += 1;
            continue;
        }

        let target = match cache_id.parse::<ImageId>() {
            Ok(target) => target,
            Err(err) => {
                let message = format!("image {id} has unusable cache id '{cache_id}': {err}");
                error!("{message}");
                run.anomalies.push(message);
                continue;
            }
        };

        if run.mapping.contains_target(&target) {
            let message = format!("image {id} shares cache id {target} with another image");
            error!("{message}");
            run.anomalies.push(message);
            continue;
        }

        debug!("Moving {id} back to {target}");
        on_step(RemapStep {
            policy: Policy::Downgrade,
            old_id: id,
            new_id: &target,
        });
        run.apply(id, target);
    }

    Ok(run.finish(
        Policy::Downgrade,
        started,
        scan.stats,
        scan.eligible.len(),
        unchanged,
    ))
}
