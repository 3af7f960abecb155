//! uudecode - recreate the files described by uuencoded input
//!
//! # Usage
//!
//! ```text
//! uudecode [FILE]...
//! ```
//!
//! Each FILE (or standard input when none is given) may hold several
//! concatenated streams. Every stream is written to the name in its `begin`
//! line with the mode recorded there. The exit status is 1 if any input or
//! stream failed.

use std::fs::File;
use std::io::{self, BufReader};
use std::process;

use tracing_subscriber::EnvFilter;
use uucodec::{StreamReport, SystemHomeResolver, decode_all};

const TOOL_NAME: &str = "uudecode";
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn usage(status: i32) -> ! {
    if status != 0 {
        eprintln!("Try '{} --help' for more information.", TOOL_NAME);
    } else {
        print!(
            "Usage: {tool} [FILE]...\n\n\
             \x20 -h, --help      display this help and exit\n\
             \x20 -v, --version   output version information and exit\n",
            tool = TOOL_NAME
        );
    }
    process::exit(status);
}

fn parse_args() -> Vec<String> {
    let mut files = Vec::new();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => usage(0),
            "-v" | "--version" => {
                println!("{} (uucodec) {}", TOOL_NAME, VERSION);
                process::exit(0);
            }
            "--" => {
                files.extend(args.by_ref());
                break;
            }
            s if s.len() > 1 && s.starts_with('-') => {
                eprintln!("{}: unrecognized option '{}'", TOOL_NAME, s);
                usage(1);
            }
            _ => files.push(arg),
        }
    }

    files
}

/// Print failures; true when every stream succeeded
fn report(reports: &[StreamReport]) -> bool {
    let mut ok = true;
    for r in reports {
        if let Err(e) = &r.result {
            match &r.target {
                Some(_) if matches!(e, uucodec::UuError::Target { .. }) => {
                    eprintln!("{}: {}: {}", TOOL_NAME, r.source, e)
                }
                Some(target) => {
                    eprintln!("{}: {}: {}: {}", TOOL_NAME, r.source, target.display(), e)
                }
                None => eprintln!("{}: {}: {}", TOOL_NAME, r.source, e),
            }
            ok = false;
        }
    }
    ok
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let files = parse_args();
    let resolver = SystemHomeResolver;
    let mut success = true;

    if files.is_empty() {
        let stdin = io::stdin();
        success &= report(&decode_all(stdin.lock(), "stdin", &resolver));
    } else {
        for path in &files {
            match File::open(path) {
                Ok(file) => {
                    success &= report(&decode_all(BufReader::new(file), path, &resolver));
                }
                Err(e) => {
                    eprintln!("{}: {}: {}", TOOL_NAME, path, e);
                    success = false;
                }
            }
        }
    }

    process::exit(if success { 0 } else { 1 });
}
