use crate::config::GraphConfig;
use crate::error::Result;
use crate::output::{self, Format};
use crate::remap;

pub fn run(config: &GraphConfig, dry_run: bool, format: Format) -> Result<()> {
    let report = remap::scramble(config, dry_run, |step| output::print_step(step, format))?;
    output::print_report(&report, format)
}
