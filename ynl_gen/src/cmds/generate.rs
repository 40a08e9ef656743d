/* Generate command - render C for one family spec */

use super::common::load_family;
use anyhow::Context;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use ynl_gen::codegen::{CCodeGenerator, CCodeGeneratorOptions, GenMode};

/* Execute the generate command */
pub fn run(
  spec: PathBuf,
  mode: GenMode,
  header: bool,
  user_headers: Vec<String>,
  exclude_ops: Vec<String>,
  out_file: Option<PathBuf>,
  verbose: bool,
) -> anyhow::Result<()> {
  if verbose {
    println!("YNL Generator - C Code Generation");
    println!("=================================\n");
    println!("[~] Configuration:");
    println!("  Mode: {}", mode.name());
    println!("  Output: {}", if header { "header" } else { "source" });
    println!("  Spec: {}", spec.display());
    for pat in &exclude_ops {
      println!("    - excluding ops matching '{}'", pat);
    }
    println!();
  }

  let family = load_family(&spec, &exclude_ops)?;

  let options = CCodeGeneratorOptions {
    mode,
    header,
    user_headers,
    exclude_ops,
    out_file: out_file.clone(),
    spec_path: spec.clone(),
  };
  let code = CCodeGenerator::new(&family, options)
    .emit_code()
    .with_context(|| format!("failed to generate {} code for '{}'", mode.name(), family.name))?;

  match out_file {
    Some(path) => {
      let written = write_if_changed(&path, &code)?;
      if verbose {
        if written {
          println!("[~] Wrote {}", path.display());
        } else {
          println!("[~] {} is up to date", path.display());
        }
      }
    }
    None => {
      std::io::stdout().write_all(code.as_bytes()).context("failed to write to stdout")?;
    }
  }

  Ok(())
}

/* Leave the output untouched when the content did not change, so build
   systems do not see a fresh timestamp */
fn write_if_changed(path: &Path, code: &str) -> anyhow::Result<bool> {
  if let Ok(existing) = fs::read_to_string(path) {
    if existing == code {
      debug!(path = %path.display(), "output unchanged");
      return Ok(false);
    }
  }
  fs::write(path, code).with_context(|| format!("failed to write {}", path.display()))?;
  info!(path = %path.display(), bytes = code.len(), "output written");
  Ok(true)
}
