// ============================================================================
// Capeforge CLI — headless batch rendering via command-line arguments
// ============================================================================
//
// Usage examples:
//   capeforge --input cape.json --output cape.png
//   capeforge -i designs/*.json --output-dir rendered/
//   capeforge -i cape.json -o big.png --width 800 --height 800
//
// All rendering runs synchronously on the current thread; rayon still
// parallelizes the per-layer raster work internally.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::cache::BitmapCache;
use crate::layer::LayerContent;
use crate::ops::text::FontStore;
use crate::{log_warn, persist};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Capeforge headless renderer.
///
/// Render cape documents to PNG without an interactive session.
#[derive(Parser, Debug)]
#[command(
    name = "capeforge",
    about = "Capeforge headless cape document renderer",
    long_about = "Render saved cape documents (JSON) to PNG images.\n\n\
                  Example:\n  \
                  capeforge --input cape.json --output cape.png\n  \
                  capeforge -i designs/*.json --output-dir rendered/"
)]
pub struct CliArgs {
    /// Input document(s). Glob patterns accepted (e.g. "*.json", "capes/*.json").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output file path. Only valid for single-file input.
    /// For batch input use --output-dir instead.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch rendering.
    /// Files are written here with the original stem and a .png extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override the document's canvas width before rendering.
    #[arg(long, value_name = "PX")]
    pub width: Option<u32>,

    /// Override the document's canvas height before rendering.
    #[arg(long, value_name = "PX")]
    pub height: Option<u32>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    // Resolve glob patterns / literal paths into concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch rendering.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    // Create output directory if specified
    if let Some(dir) = &args.output_dir {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "error: could not create output directory '{}': {}",
                dir.display(),
                e
            );
            return ExitCode::FAILURE;
        }
    }

    // One font store for the whole batch; resolved faces are cached across files
    let fonts = FontStore::new();

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let output_path = match build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
        ) {
            Some(p) => p,
            None => {
                eprintln!(
                    "  error: cannot determine output path for '{}'.",
                    input_path.display()
                );
                any_failure = true;
                continue;
            }
        };

        match run_one(input_path, &output_path, &fonts, args.width, args.height) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

// ============================================================================
// Per-file rendering pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    fonts: &FontStore,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut doc =
        persist::load_document_file(input).map_err(|e| format!("load failed: {}", e))?;

    if let Some(w) = width {
        doc.width = w.max(1);
    }
    if let Some(h) = height {
        doc.height = h.max(1);
    }

    // -- Step 2: Decode image-layer sources ------------------------------
    // Sources resolve relative to the document's directory. A missing or
    // undecodable source degrades to an empty layer, matching the session's
    // behavior for a failed decode.
    let base = input.parent().unwrap_or(Path::new("."));
    let mut cache = BitmapCache::new();
    for layer in &doc.layers {
        let source = match &layer.content {
            LayerContent::Image { source, .. } if !source.is_empty() => source,
            _ => continue,
        };
        let path = base.join(source);
        match std::fs::read(&path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| image::load_from_memory(&bytes).map_err(|e| e.to_string()))
        {
            Ok(img) => cache.insert(layer.id, img.to_rgba8()),
            Err(e) => {
                log_warn!("image source '{}' skipped: {}", path.display(), e);
                eprintln!(
                    "  warning: image source '{}' skipped: {}",
                    path.display(),
                    e
                );
            }
        }
    }

    // -- Step 3: Render and write ----------------------------------------
    let png = persist::export_png(&doc, &cache, fonts)
        .map_err(|e| format!("render failed: {}", e))?;
    std::fs::write(output, png).map_err(|e| format!("write failed: {}", e))?;

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            // Literal path
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        // Treat as glob pattern
        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, .png extension
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    // Write next to the input file
    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.png", stem));

    // Avoid silent overwrite of the input
    if candidate == input {
        Some(parent.join(format!("{}_out.png", stem)))
    } else {
        Some(candidate)
    }
}
