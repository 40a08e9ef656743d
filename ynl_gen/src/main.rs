use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use ynl_gen::codegen::GenMode;

mod cmds;

#[derive(Parser)]
#[command(name = "ynl-gen")]
#[command(about = "C code generator for generic netlink family specs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /* Generate C code from a family spec */
    Generate {
        /* Family spec (YAML) */
        #[arg(long = "spec", value_name = "FILE")]
        spec: PathBuf,

        /* Consumer of the generated code */
        #[arg(long = "mode", value_enum)]
        mode: Mode,

        /* Generate the header */
        #[arg(long = "header", conflicts_with = "source")]
        header: bool,

        /* Generate the source file */
        #[arg(long = "source")]
        source: bool,

        /* Extra header to include from the user source */
        #[arg(long = "user-header", value_name = "HEADER")]
        user_headers: Vec<String>,

        /* Leave out operations whose name matches the pattern */
        #[arg(long = "exclude-op", value_name = "PATTERN")]
        exclude_ops: Vec<String>,

        /* Output file, stdout when absent */
        #[arg(short = 'o', value_name = "FILE")]
        out_file: Option<PathBuf>,

        /* Enable verbose output */
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },

    /* Resolve a family spec and report the model */
    Analyze {
        /* Family spec (YAML) */
        #[arg(long = "spec", value_name = "FILE")]
        spec: PathBuf,

        /* Leave out operations whose name matches the pattern */
        #[arg(long = "exclude-op", value_name = "PATTERN")]
        exclude_ops: Vec<String>,

        /* Print the resolved model as JSON */
        #[arg(long = "print-ir")]
        print_ir: bool,

        /* Enable verbose output */
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
enum Mode {
    /* Requesting peer: types, parsers and request wrappers */
    User,
    /* Handling peer: policies and op tables */
    Kernel,
    /* Shared constants header */
    Uapi,
}

impl From<Mode> for GenMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::User => GenMode::User,
            Mode::Kernel => GenMode::Kernel,
            Mode::Uapi => GenMode::Uapi,
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            spec,
            mode,
            header,
            source,
            user_headers,
            exclude_ops,
            out_file,
            verbose,
        } => {
            init_tracing(verbose);
            if !header && !source {
                anyhow::bail!("--header or --source is required");
            }
            cmds::generate::run(
                spec,
                mode.into(),
                header,
                user_headers,
                exclude_ops,
                out_file,
                verbose,
            )?;
        }

        Commands::Analyze {
            spec,
            exclude_ops,
            print_ir,
            verbose,
        } => {
            init_tracing(verbose);
            cmds::analyze::run(spec, exclude_ops, print_ir)?;
        }
    }

    Ok(())
}
