//! bspatch — thin CLI front-end over the `bsdiff40` library.
//!
//! ```text
//! bspatch <old-file> <new-file> <patch-file> [<old-extents> <new-extents>]
//! ```
//!
//! Argument parsing and process exit-code policy are the only things this
//! crate owns; everything else (header decode, sub-stream handling, the
//! interpreter loop, extent I/O) lives in `bsdiff40`.

mod style;

use std::env;
use std::path::Path;
use std::process;

use style::{BOLD, DIM, RED, RESET};

fn main() {
    let args: Vec<String> = env::args().collect();

    let result = match args.len() {
        4 => bsdiff40::apply(
            Path::new(&args[1]),
            Path::new(&args[2]),
            Path::new(&args[3]),
            None,
            None,
        ),
        6 => bsdiff40::apply(
            Path::new(&args[1]),
            Path::new(&args[2]),
            Path::new(&args[3]),
            Some(args[4].as_str()),
            Some(args[5].as_str()),
        ),
        _ => {
            print_usage(&args);
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("{RED}error:{RESET} {e}");
        process::exit(1);
    }
}

fn print_usage(args: &[String]) {
    let prog = args.first().map(String::as_str).unwrap_or("bspatch");
    eprintln!(
        r#"
{BOLD}bspatch{RESET} — apply a BSDIFF40 patch

{BOLD}USAGE:{RESET}
    {prog} <old-file> <new-file> <patch-file>
    {prog} <old-file> <new-file> <patch-file> <old-extents> <new-extents>

{DIM}Extent lists use the "off:len(,off:len)*" grammar; off == -1 marks a
sparse (zero-filled) region. Supply both extent arguments or neither.{RESET}
"#
    );
}
