use std::fs;
use std::io::ErrorKind;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::bytes::Regex;
use serde::Serialize;
use tracing::{debug, error};

use crate::image_id::ImageId;
use crate::mapping::IdMapping;

/// Quote + 64 hex chars + quote.
const QUOTED_ID_LEN: usize = ImageId::HEX_LEN + 2;

static QUOTED_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""[a-fA-F0-9]{64}""#).expect("quoted image id regex must compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Substitute and persist changed files.
    Write,
    /// Count would-be substitutions without touching disk.
    CountOnly,
}

/// Result of processing one reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRewrite {
    pub path: String,
    pub matches: usize,
    pub replaced: usize,
    pub written: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileRewrite {
    fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            matches: 0,
            replaced: 0,
            written: false,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Substitutions {
    pub matches: usize,
    pub replaced: usize,
}

/// Owned contents of one reference file, rewritten in place.
///
/// Substitution never changes the buffer length: every replaced span is
/// exactly `ImageId::HEX_LEN` bytes on both sides.
#[derive(Debug)]
pub struct RefBuffer {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl RefBuffer {
    pub fn read(path: &Path) -> std::io::Result<Self> {
        Ok(Self::from_bytes(path, fs::read(path)?))
    }

    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Self {
        Self {
            path: path.to_path_buf(),
            bytes,
        }
    }

    #[cfg(test)]
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[cfg(test)]
    fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Replace every quoted identifier that is a key in `mapping`.
    pub fn substitute(&mut self, mapping: &IdMapping) -> Substitutions {
        let spans: Vec<Range<usize>> = QUOTED_ID
            .find_iter(&self.bytes)
            .map(|m| m.range())
            .collect();

        let mut result = Substitutions {
            matches: spans.len(),
            replaced: 0,
        };

        for span in spans {
            if span.len() != QUOTED_ID_LEN {
                error!(
                    "Bad range {}: {} {}",
                    self.path.display(),
                    span.start,
                    span.end
                );
                continue;
            }

            let payload = span.start + 1..span.end - 1;
            let Ok(found) = std::str::from_utf8(&self.bytes[payload.clone()]) else {
                continue;
            };
            let Some(new_id) = mapping.get(found) else {
                continue;
            };

            let replacement = new_id.as_bytes();
            let target = &mut self.bytes[payload];
            if replacement.len() != target.len() {
                error!(
                    "Bad copy on {}: would write {} bytes",
                    self.path.display(),
                    replacement.len()
                );
                continue;
            }
            target.copy_from_slice(replacement);
            result.replaced += 1;
        }

        result
    }

    /// Overwrite the file with the buffer, readable by the owner only.
    pub fn persist(&self) -> std::io::Result<()> {
        fs::write(&self.path, &self.bytes)?;
        restrict_to_owner(&self.path)
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Rewrite quoted image ids in each file according to `mapping`.
///
/// Per-file failures are logged and recorded, never returned: one bad file
/// does not stop the others. Files with no substitutions are not written.
pub fn rewrite_references(
    mapping: &IdMapping,
    paths: &[PathBuf],
    mode: RewriteMode,
) -> Vec<FileRewrite> {
    paths
        .iter()
        .map(|path| rewrite_file(mapping, path, mode))
        .collect()
}

fn rewrite_file(mapping: &IdMapping, path: &Path, mode: RewriteMode) -> FileRewrite {
    let mut report = FileRewrite::new(path);

    let mut buffer = match RefBuffer::read(path) {
        Ok(buffer) => buffer,
        Err(err) => {
            if err.kind() == ErrorKind::NotFound {
                debug!("No reference file at {}", path.display());
            } else {
                error!("Error reading file {}: {err}", path.display());
            }
            report.error = Some(err.to_string());
            return report;
        }
    };

    let subs = buffer.substitute(mapping);
    report.matches = subs.matches;
    report.replaced = subs.replaced;

    if subs.matches == 0 {
        debug!("No matches found in {}", path.display());
        return report;
    }
    debug!("Found {} matches in {}", subs.matches, path.display());

    if subs.replaced == 0 || mode == RewriteMode::CountOnly {
        return report;
    }

    match buffer.persist() {
        Ok(()) => {
            report.written = true;
            debug!("Updated {} with {} changes", path.display(), subs.replaced);
        }
        Err(err) => {
            error!("Error writing file {}: {err}", path.display());
            report.error = Some(err.to_string());
        }
    }

    report
}
