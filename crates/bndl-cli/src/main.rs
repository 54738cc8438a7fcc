//! bndl CLI - inspect and extract Bundle archives.

use std::fs;
use std::path::{Path, PathBuf};

use bndl::{hash_resource_name, Bundle, MagicVersion, Platform};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bndl")]
#[command(author, version, about = "Bundle archive tool for Criterion games", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bundle-level information
    Info {
        /// Input bundle file
        input: PathBuf,
    },

    /// List resources with their types
    List {
        /// Input bundle file
        input: PathBuf,

        /// Group resources by type
        #[arg(long)]
        by_type: bool,
    },

    /// Dump the debug-name table
    Names {
        /// Input bundle file
        input: PathBuf,
    },

    /// Extract one block of a resource
    Extract {
        /// Input bundle file
        input: PathBuf,

        /// Resource name, or its ID as hex prefixed with 0x
        resource: String,

        /// Block slot (0 = main memory, 1-2 = graphics pools)
        #[arg(short, long, default_value_t = 0)]
        block: usize,

        /// Output file (defaults to <id>.bin)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn open(path: &Path) -> Result<Bundle, Box<dyn std::error::Error>> {
    // The constructor arguments are placeholders; load replaces them with
    // whatever the file says.
    let mut bundle = Bundle::new(MagicVersion::Bnd2, Platform::Pc);
    bundle.load(path)?;
    Ok(bundle)
}

fn resource_id(spec: &str) -> u32 {
    spec.strip_prefix("0x")
        .and_then(|hex| u32::from_str_radix(hex, 16).ok())
        .unwrap_or_else(|| hash_resource_name(spec))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let bundle = open(&input)?;
            println!("magic:     {:?}", bundle.magic_version());
            println!("revision:  {}", bundle.revision_number());
            println!("platform:  {:?}", bundle.platform());
            println!("flags:     0x{:08x}", bundle.flags());
            println!("resources: {}", bundle.list_resource_ids().len());
            println!("names:     {}", bundle.debug_entries().len());
        }

        Commands::List { input, by_type } => {
            let bundle = open(&input)?;
            if by_type {
                for (resource_type, ids) in bundle.list_resource_ids_by_type() {
                    println!("{resource_type}");
                    for id in ids {
                        println!("  {id:08x}");
                    }
                }
            } else {
                for id in bundle.list_resource_ids() {
                    if let Some(resource_type) = bundle.get_resource_type(id) {
                        println!("{id:08x} {resource_type}");
                    }
                }
            }
        }

        Commands::Names { input } => {
            let bundle = open(&input)?;
            for (id, info) in bundle.debug_entries() {
                println!("{id:08x} {} ({})", info.name, info.type_name);
            }
        }

        Commands::Extract {
            input,
            resource,
            block,
            output,
        } => {
            let bundle = open(&input)?;
            let id = resource_id(&resource);
            match bundle.get_binary(id, block)? {
                Some(data) => {
                    let output = output.unwrap_or_else(|| PathBuf::from(format!("{id:08x}.bin")));
                    fs::write(&output, &data)?;
                    println!("wrote {} bytes to {}", data.len(), output.display());
                }
                None => {
                    eprintln!("resource {id:08x} has no data in block {block}");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
