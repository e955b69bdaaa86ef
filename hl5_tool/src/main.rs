use std::{
    fs::File,
    io::{BufReader, BufWriter, Cursor, Read, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::{CommandFactory, Parser};
use hl5_lib::Diagnostics;

mod tool;

const PROG_NAME: &str = "hl5_tool";

const EXAMPLES: &str = "examples:
 * Extract a VFS archive data.vfs to a directory called vfs
    hl5_tool -xf data.vfs vfs
 * Create a VFS archive data.vfs from a directory called vfs
    hl5_tool -cf data.vfs vfs";

/// hl5_tool extracts or creates a VFS archive file used by HL5.
#[derive(Parser)]
#[command(name = PROG_NAME, disable_version_flag = true, after_help = EXAMPLES)]
struct Cli {
    /// Extract a VFS archive.
    #[arg(short = 'x', long)]
    extract: bool,

    /// Create a VFS archive.
    #[arg(short = 'c', long)]
    create: bool,

    /// Use archive file ARCHIVE instead of standard input or output.
    #[arg(short = 'f', long = "file", value_name = "ARCHIVE")]
    file: Option<PathBuf>,

    /// Only extract raw files.
    #[arg(short = 'r', long)]
    raw: bool,

    /// Do not log anything except warnings and errors.
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Output version information and exit.
    #[arg(short = 'v', long)]
    version: bool,

    /// Directory where files are read from or written to [default: the
    /// current working directory].
    dir: Option<PathBuf>,
}

const COL_CYAN: &str = "\x1b[96m";
const COL_YELLOW: &str = "\x1b[93m";
const COL_RESET: &str = "\x1b[0m";

/// Routes informational lines and warnings to stderr so that an archive
/// created on stdout stays clean.
struct CliLogger;

static LOGGER: CliLogger = CliLogger;

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        match record.level() {
            log::Level::Error => eprintln!("{}", record.args()),
            log::Level::Warn => eprintln!("{COL_YELLOW}{}{COL_RESET}", record.args()),
            _ => eprintln!("{COL_CYAN}[{}]{COL_RESET} {}", record.target(), record.args()),
        }
    }

    fn flush(&self) {}
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if cli.version {
        print_version();
        return ExitCode::SUCCESS;
    }
    if cli.extract && cli.create {
        return die("you may not specify more than one action (-xc)");
    }
    if !cli.extract && !cli.create {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    }

    log::set_logger(&LOGGER).ok();
    log::set_max_level(if cli.quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    });

    let base_dir = match cli.dir.clone() {
        Some(dir) => dir,
        None => match std::env::current_dir() {
            Ok(dir) => dir,
            Err(e) => return die(&format!("cannot determine the current directory: {e}")),
        },
    };

    let mut diag = Diagnostics::new();
    let code = match run(&cli, &base_dir, &mut diag) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{PROG_NAME}: {e:#}");
            ExitCode::FAILURE
        }
    };
    if diag.warning_count() > 0 {
        eprintln!("Program finished with {} warning(s)", diag.warning_count());
    }
    code
}

fn run(cli: &Cli, base_dir: &Path, diag: &mut Diagnostics) -> anyhow::Result<()> {
    if cli.extract {
        match &cli.file {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("cannot open archive {}", path.display()))?;
                tool::extract(&mut BufReader::new(file), base_dir, cli.raw, diag)
            }
            None => {
                // Extraction revisits offsets, so a pipe is buffered whole.
                let mut data = Vec::new();
                std::io::stdin().read_to_end(&mut data)?;
                tool::extract(&mut Cursor::new(data), base_dir, cli.raw, diag)
            }
        }
    } else {
        match &cli.file {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("cannot create archive {}", path.display()))?;
                let mut writer = BufWriter::new(file);
                tool::create(&mut writer, base_dir, diag)?;
                writer.flush()?;
                Ok(())
            }
            None => {
                let stdout = std::io::stdout();
                let mut writer = stdout.lock();
                tool::create(&mut writer, base_dir, diag)?;
                writer.flush()?;
                Ok(())
            }
        }
    }
}

fn die(message: &str) -> ExitCode {
    eprintln!("{PROG_NAME}: {message}");
    ExitCode::FAILURE
}

fn print_version() {
    println!("{PROG_NAME} {}", tool::VERSION);
    println!("License MIT: <https://opensource.org/license/mit>.");
    println!("This is free software: you are free to change and redistribute it.");
    println!("There is NO WARRANTY, to the extent permitted by law.");
}
