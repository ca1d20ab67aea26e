//! Bytecode disassembler CLI.
//!
//! Reads a node's compiled bytecode and prints one instruction per line.
//!
//! # Usage
//! ```text
//! disasm <node.bin> [OPTIONS]
//! ```
//!
//! # Options
//! - `-o, --output <file>`: Write the listing to a file instead of stdout
//! - `-x, --hex`: Treat the input as hex text rather than raw bytes

use menuvm::virtual_machine::program::disassemble;
use menuvm::{error, info};
use std::env;
use std::fs;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut hex = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
                i += 1;
            }
            "--hex" | "-x" => {
                hex = true;
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    if !Path::new(input_path).exists() {
        error!("Input file does not exist: {}", input_path);
        process::exit(1);
    }

    let raw = match fs::read(input_path) {
        Ok(b) => b,
        Err(e) => {
            error!("Failed to read {}: {}", input_path, e);
            process::exit(1);
        }
    };

    let code = if hex {
        match parse_hex(&String::from_utf8_lossy(&raw)) {
            Some(b) => b,
            None => {
                error!("Input is not valid hex: {}", input_path);
                process::exit(1);
            }
        }
    } else {
        raw
    };

    let listing = match disassemble(&code) {
        Ok(l) => l,
        Err(e) => {
            error!("Disassembly failed: {}", e);
            process::exit(1);
        }
    };

    match output_path {
        Some(path) => {
            if let Err(e) = fs::write(&path, &listing) {
                error!("Failed to write output file: {}", e);
                process::exit(1);
            }
            info!("Disassembled {} -> {} ({} bytes)", input_path, path, code.len());
        }
        None => print!("{listing}"),
    }
}

/// Decodes hex text, ignoring whitespace.
fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = text.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks(2)
        .map(|pair| {
            let s = std::str::from_utf8(pair).ok()?;
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <node.bin> [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -o, --output <file>  Write the listing to a file");
    eprintln!("  -x, --hex            Input is hex text");
    eprintln!("  -h, --help           Show this help");
}
