//! Flatten a PDF's form layer into static page content.
//!
//! Usage:
//!   flatten <input.pdf> [--debug-boxes]
//!
//! Writes the flattened document to `flattened.pdf` in the current
//! directory. A document without a form layer is copied through unchanged.

use std::process;

use pdf_flatten::{flatten_file, FlattenOptions};

/// Fixed output file name.
const OUTPUT_FILE: &str = "flattened.pdf";

fn usage() -> ! {
    eprintln!("Usage: flatten <input.pdf> [--debug-boxes]");
    process::exit(2);
}

fn main() {
    env_logger::init();

    let mut input: Option<String> = None;
    let mut options = FlattenOptions::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--debug-boxes" => options.debug_boxes = true,
            "--help" | "-h" => usage(),
            _ if input.is_none() => input = Some(arg),
            _ => usage(),
        }
    }
    let Some(input) = input else { usage() };

    match flatten_file(&input, OUTPUT_FILE, &options) {
        Ok(summary) => {
            eprintln!(
                "{}: flattened {} widgets on {} pages -> {}",
                input, summary.flattened, summary.pages_touched, OUTPUT_FILE
            );
        },
        Err(err) => {
            eprintln!("{}: {}", input, err);
            process::exit(1);
        },
    }
}
