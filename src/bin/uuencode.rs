//! uuencode - encode a file so it can be mailed to a remote system
//!
//! # Usage
//!
//! ```text
//! uuencode [INFILE] REMOTEFILE
//! ```
//!
//! Reads INFILE (or standard input) and writes the encoded stream to
//! standard output. The header mode comes from INFILE's permission bits,
//! or from `0666` minus the umask when reading standard input.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::process;

use tracing_subscriber::EnvFilter;
use uucodec::{EncodeConfig, encode_stream};

const TOOL_NAME: &str = "uuencode";
const VERSION: &str = env!("CARGO_PKG_VERSION");

struct Cli {
    input: Option<String>,
    remote: String,
}

fn usage(status: i32) -> ! {
    if status != 0 {
        eprintln!("Try '{} --help' for more information.", TOOL_NAME);
    } else {
        print!(
            "Usage: {tool} [INFILE] REMOTEFILE\n\n\
             \x20 -h, --help      display this help and exit\n\
             \x20 -v, --version   output version information and exit\n",
            tool = TOOL_NAME
        );
    }
    process::exit(status);
}

fn parse_args() -> Cli {
    let mut operands = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => usage(0),
            "-v" | "--version" => {
                println!("{} (uucodec) {}", TOOL_NAME, VERSION);
                process::exit(0);
            }
            "--" => {
                operands.extend(args.by_ref());
                break;
            }
            s if s.len() > 1 && s.starts_with('-') => {
                eprintln!("{}: unrecognized option '{}'", TOOL_NAME, s);
                usage(1);
            }
            _ => operands.push(arg),
        }
    }

    let mut operands = operands.into_iter();
    match (operands.next(), operands.next(), operands.next()) {
        (Some(remote), None, None) => Cli {
            input: None,
            remote,
        },
        (Some(input), Some(remote), None) => Cli {
            input: Some(input),
            remote,
        },
        _ => usage(1),
    }
}

fn run(cli: Cli) -> uucodec::Result<u64> {
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());

    match cli.input {
        Some(path) => {
            let config = EncodeConfig::from_file(&path, cli.remote)?;
            let mut reader = BufReader::new(File::open(&path)?);
            encode_stream(&mut reader, &mut writer, &config.header())
        }
        None => {
            let config = EncodeConfig::from_umask(cli.remote);
            let stdin = io::stdin();
            let mut reader = stdin.lock();
            encode_stream(&mut reader, &mut writer, &config.header())
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();
    let label = cli.input.clone().unwrap_or_else(|| "stdin".to_string());

    if let Err(e) = run(cli) {
        eprintln!("{}: {}: {}", TOOL_NAME, label, e);
        process::exit(1);
    }

    if let Err(e) = io::stdout().flush() {
        eprintln!("{}: write error: {}", TOOL_NAME, e);
        process::exit(1);
    }
}
