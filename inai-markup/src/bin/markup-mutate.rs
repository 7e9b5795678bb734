use std::fs;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use inai_markup::{try_apply_mutation, ElementMutation, ElementPath, MarkupError};

/// Apply one element mutation to a markup file and print the result.
#[derive(Parser, Debug)]
#[command(name = "markup-mutate", version)]
struct Args {
    /// HTML file (full document or body fragment)
    file: PathBuf,

    /// Structural path, e.g. `0.2.1` or `[0,2,1]`
    path: String,

    /// Mutation as JSON, e.g. '{"type":"text","value":"Hello"}'
    mutation: String,

    /// Write the result back to the file instead of printing it
    #[arg(long)]
    in_place: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("✗ {}:", args.file.display());
        print_error(&e);
        process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), MarkupError> {
    let markup = fs::read_to_string(&args.file)
        .map_err(|e| MarkupError::InvalidMutation(format!("Failed to read file: {}", e)))?;
    let path: ElementPath = args.path.parse()?;
    let mutation: ElementMutation = serde_json::from_str(&args.mutation)?;

    let out = try_apply_mutation(&markup, &path, &mutation)?;
    if args.in_place {
        fs::write(&args.file, &out)
            .map_err(|e| MarkupError::InvalidMutation(format!("Failed to write file: {}", e)))?;
        println!("✓ {} updated ({} at {})", args.file.display(), mutation.label(), path);
    } else {
        print!("{}", out);
    }
    Ok(())
}

fn print_error(error: &MarkupError) {
    match error {
        MarkupError::PathNotFound { path, depth, index } => {
            eprintln!("  Path [{}] did not resolve:", path);
            eprintln!("    no element child at index {} (depth {})", index, depth);
            eprintln!("    the markup was left unchanged");
        }
        MarkupError::EmptyPath => {
            eprintln!("  Empty path: give at least one child index");
        }
        MarkupError::InvalidStyle { property, reason } => {
            eprintln!("  Invalid style property '{}':", property);
            eprintln!("    {}", reason);
        }
        MarkupError::UnsafeAttribute { name } => {
            eprintln!("  Refusing to set attribute '{}'", name);
        }
        e => {
            eprintln!("  {}", e);
        }
    }
}
