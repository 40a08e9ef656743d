/* Shared helpers for the commands: spec loading and op exclusion */

use anyhow::Context;
use regex::Regex;
use std::path::Path;
use tracing::info;
use ynl_gen::spec::{Family, SpecFile};

/* Patterns match from the start of the operation name */
pub fn compile_exclude_ops(patterns: &[String]) -> anyhow::Result<Vec<Regex>> {
  patterns
    .iter()
    .map(|pat| {
      Regex::new(&format!("^(?:{})", pat)).with_context(|| format!("invalid --exclude-op pattern '{}'", pat))
    })
    .collect()
}

/* Load, license check and resolve a family spec */
pub fn load_family(spec: &Path, exclude_ops: &[String]) -> anyhow::Result<Family> {
  let spec_file =
    SpecFile::load(spec).with_context(|| format!("failed to load spec {}", spec.display()))?;
  spec_file.check_license()?;

  let exclude = compile_exclude_ops(exclude_ops)?;
  let family = Family::new(&spec_file, &exclude)
    .with_context(|| format!("failed to resolve family from {}", spec.display()))?;

  info!(
    family = %family.name,
    attr_sets = family.attr_sets.len(),
    msgs = family.msgs.len(),
    "family resolved"
  );
  Ok(family)
}
