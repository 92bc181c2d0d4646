//! Startup preconditions
//!
//! The watched directory and operator email come from the command line,
//! then the config file, then an interactive prompt. Whatever the source,
//! the value must validate or startup stops.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use shotwatch_core::domain::{Email, WatchedDirectory};

/// Reads one trimmed line after printing `question`
fn ask(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> Result<String> {
    write!(output, "{}: ", question)?;
    output.flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read from stdin")?;
    if read == 0 {
        bail!("No input for \"{}\" (stdin closed)", question);
    }
    Ok(line.trim().to_string())
}

/// Establishes the watched directory: absolute, existing, a directory
pub fn resolve_directory(
    from_flag: Option<PathBuf>,
    from_config: Option<PathBuf>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<WatchedDirectory> {
    let path = match from_flag.or(from_config) {
        Some(path) => path,
        None => PathBuf::from(ask(input, output, "Directory to watch")?),
    };

    WatchedDirectory::open(path).context("Invalid watch directory")
}

/// Establishes the operator email
pub fn resolve_email(
    from_flag: Option<String>,
    from_config: Option<String>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<Email> {
    let raw = match from_flag.or(from_config) {
        Some(raw) => raw,
        None => ask(input, output, "Email to share the backup folder with")?,
    };

    Email::new(raw).context("Invalid operator email")
}
