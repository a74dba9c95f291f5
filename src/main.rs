use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use giacc::convert::{convert, inspect, query, ConvertOptions, Destination, InPlaceStrategy};
use giacc::layout::FileType;
use giacc::{AssetMode, GiaError};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Output argument meaning "write the converted file back over the input".
const WRITE_BACK: &str = "*";

#[derive(Parser)]
#[command(name = "giacc", about = "Convert GIA asset files between Classic and Beyond mode")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a GIA file to Classic Mode
    ToClassic(ConvertArgs),
    /// Convert a GIA file to Beyond Mode
    ToBeyond(ConvertArgs),
    /// Report whether a GIA file is a Classic or Beyond Mode asset
    Query {
        input: PathBuf,
    },
    /// Show the header, footer and marker positions of a GIA file
    Info {
        input: PathBuf,
    },
}

#[derive(clap::Args)]
struct ConvertArgs {
    input:  PathBuf,
    /// Output file; "*" writes back to the input file. An existing file is overwritten.
    output: PathBuf,
    /// Edit the memory-mapped input directly when writing back, instead of
    /// replacing it with a converted copy
    #[arg(long)]
    mapped: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse_from(fold_operation(std::env::args_os()));
    init_tracing(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("ERROR: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Operation names are matched case-insensitively (`TO-CLASSIC`, `Query`).
/// The first non-flag argument is lowercased when that names a subcommand.
fn fold_operation<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    let mut args: Vec<OsString> = args.into_iter().collect();
    let cmd = Cli::command();
    let op = args
        .iter_mut()
        .skip(1)
        .find(|a| !a.to_string_lossy().starts_with('-'));
    if let Some(op) = op {
        let folded = op.to_str().map(str::to_ascii_lowercase);
        if let Some(name) = folded {
            if name == "help" || cmd.find_subcommand(&name).is_some() {
                *op = name.into();
            }
        }
    }
    args
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn run(command: Commands) -> Result<(), GiaError> {
    match command {

        // ── Convert ──────────────────────────────────────────────────────────
        Commands::ToClassic(args) => run_convert(args, AssetMode::Classic),
        Commands::ToBeyond(args)  => run_convert(args, AssetMode::Beyond),

        // ── Query ────────────────────────────────────────────────────────────
        Commands::Query { input } => {
            let mode = query(&input)?;
            println!("This asset is for {mode} Mode.");
            Ok(())
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let i = inspect(&input)?;
            let h = i.header;
            let file_type = FileType::from_u32(h.file_type).map(FileType::name).unwrap_or("?");
            println!("── GIA Asset ────────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Size           {} B", i.total_len);
            println!("  File length    {}", h.file_len);
            println!("  File version   {}", h.file_ver);
            println!("  Head magic     {}", h.magic_num);
            println!("  File type      {} ({file_type})", h.file_type);
            println!("  Content length {}", h.content_len);
            println!("  Tail magic     {}", i.footer.magic_num);
            println!("  Terminator     {} @ {}",
                hex::encode(giacc::layout::FILENAME_TERMINATOR), i.detection.terminator_index);
            if i.detection.has_tag() {
                println!("  Mode tag       {} @ {}",
                    hex::encode(giacc::layout::CLASSIC_MODE_TAG), i.detection.anchor_index);
            } else {
                println!("  Mode tag       —");
            }
            println!("  Mode           {}", i.mode());
            Ok(())
        }
    }
}

fn run_convert(args: ConvertArgs, target: AssetMode) -> Result<(), GiaError> {
    let dst = if args.output.as_os_str() == WRITE_BACK {
        Destination::WriteBack
    } else {
        Destination::Path(args.output)
    };
    let opts = ConvertOptions {
        in_place: if args.mapped { InPlaceStrategy::Mapped } else { InPlaceStrategy::default() },
    };

    let from = query(&args.input)?;
    if from == target {
        println!("This asset is already for {from} Mode.");
        println!("No changes will be made.");
    } else {
        println!("This asset is for {from} Mode.");
        println!("Converting asset to {target} Mode...");
    }

    convert(&args.input, target, dst, &opts)?;
    println!("Conversion completed.");
    Ok(())
}
