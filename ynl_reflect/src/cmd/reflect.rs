/* Binary for decoding netlink attribute streams and printing JSON */

use anyhow::Context;
use clap::{Parser as ClapParser, ValueEnum};
use std::path::{Path, PathBuf};
use ynl_gen::spec::{Family, OpModeKind, SpecFile};
use ynl_reflect::{Decoder, Peer};

#[derive(Clone, Copy, ValueEnum)]
enum Side {
  /* Skip unknown attributes, no policy */
  Originating,
  /* Reject unknown attributes, apply the policy */
  Handling,
}

#[derive(ClapParser)]
#[command(name = "ynl-reflect")]
#[command(about = "Decode netlink attributes against a family spec and print JSON")]
struct Args {
  /* Family spec (YAML) */
  #[arg(short, long)]
  spec: PathBuf,

  /* Attribute set the stream belongs to */
  #[arg(short, long, required_unless_present = "op", conflicts_with = "op")]
  attr_set: Option<String>,

  /* Decode the request (handling side) or reply (originating side) of an operation */
  #[arg(long)]
  op: Option<String>,

  /* Use the dump message of --op instead of do */
  #[arg(long, requires = "op")]
  dump: bool,

  /* Raw attributes, without netlink or genetlink headers */
  #[arg(short, long)]
  data_file: PathBuf,

  /* Which peer decodes the stream */
  #[arg(long, value_enum, default_value = "originating")]
  side: Side,

  /* Pretty print JSON output */
  #[arg(short, long)]
  pretty: bool,
}

fn load_family(path: &Path) -> anyhow::Result<Family> {
  let spec = SpecFile::load(path).with_context(|| format!("failed to load spec {}", path.display()))?;
  spec.check_license()?;
  Family::new(&spec, &[]).with_context(|| format!("failed to resolve family from {}", path.display()))
}

fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  let family = load_family(&args.spec)?;
  let data = std::fs::read(&args.data_file)
    .with_context(|| format!("failed to read {}", args.data_file.display()))?;

  let peer = match args.side {
    Side::Originating => Peer::Originating,
    Side::Handling => Peer::Handling,
  };
  let decoder = Decoder::new(&family, peer);

  let msg = match (&args.op, &args.attr_set) {
    (Some(op), _) => {
      let kind = if args.dump { OpModeKind::Dump } else { OpModeKind::Do };
      /* the handling peer receives requests, the originating peer receives replies */
      match peer {
        Peer::Handling => decoder.decode_request(op, kind, &data)?,
        Peer::Originating => decoder.decode_reply(op, kind, &data)?,
      }
    }
    (None, Some(set)) => decoder.decode(set, &data)?,
    (None, None) => anyhow::bail!("--attr-set or --op is required"),
  };

  if args.pretty {
    println!("{}", serde_json::to_string_pretty(&msg)?);
  } else {
    println!("{}", serde_json::to_string(&msg)?);
  }

  Ok(())
}
