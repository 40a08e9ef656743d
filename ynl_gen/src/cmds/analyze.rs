/* Analyze command - report the resolved model of a family */

use super::common::load_family;
use anyhow::Context;
use serde::Serialize;
use std::path::PathBuf;
use ynl_gen::spec::{Family, RootSet, Struct};

#[derive(Serialize)]
struct ModelReport<'a> {
  family: &'a str,
  root_sets: &'a indexmap::IndexMap<String, RootSet>,
  /* Emission order */
  nested_structs: Vec<&'a Struct>,
  ops: Vec<&'a str>,
  ntfs: Vec<&'a str>,
}

fn build_report(family: &Family) -> ModelReport<'_> {
  ModelReport {
    family: &family.name,
    root_sets: &family.root_sets,
    nested_structs: family.pure_nested_structs.values().collect(),
    ops: family.ops().map(|op| op.name.as_str()).collect(),
    ntfs: family.ntfs().map(|op| op.name.as_str()).collect(),
  }
}

/* Execute the analyze command */
pub fn run(spec: PathBuf, exclude_ops: Vec<String>, print_ir: bool) -> anyhow::Result<()> {
  println!("YNL Generator - Model Analysis");
  println!("==============================\n");

  println!("[~] Loading {}", spec.display());
  let family = load_family(&spec, &exclude_ops)?;

  println!("[~] Family '{}' (version {})", family.name, family.version);
  println!("[~] Attribute sets: {}", family.attr_sets.len());
  for set in family.attr_sets.values() {
    let kind = if set.subset_of.is_some() { " (subset)" } else { "" };
    println!("    - {}{}: {} attr(s)", set.name, kind, set.attrs.len());
  }

  println!("[~] Root sets:");
  for (name, root) in &family.root_sets {
    println!("    - {} (request: {}, reply: {})", name, root.request.len(), root.reply.len());
  }

  println!("[~] Nested structs in emission order:");
  for st in family.pure_nested_structs.values() {
    let mut flags = Vec::new();
    if st.request {
      flags.push("request");
    }
    if st.reply {
      flags.push("reply");
    }
    println!("    - {} [{}]", st.space_name, flags.join(", "));
    if !st.inherited.is_empty() {
      println!("      inherited: {}", st.inherited.join(", "));
    }
  }

  println!("[~] Operations: {}", family.ops().count());
  println!("[~] Notifications: {}", family.ntfs().count());

  if print_ir {
    let report = build_report(&family);
    let json = serde_json::to_string_pretty(&report).context("failed to serialize model")?;
    println!("\n{}", json);
  }

  Ok(())
}
