//! CLI tool for tailoring a PowerPoint deck: delete slides by note
//! tags, replace the logo placeholder, strip the annotations, and save
//! a new copy.

use anyhow::{Context, Result};
use clap::Parser;
use deck_core::{extract_tags, find_annotation_blocks, strip_annotations, DeletionFilter};
use deck_pptx::{Logo, PptxDeck};
use image::{GenericImageView, ImageFormat};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::{Path, PathBuf};

/// Tailor a PowerPoint deck: tag-based slide deletion and logo replacement.
#[derive(Parser, Debug)]
#[command(name = "deck-tailor")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the PowerPoint presentation file (.pptx)
    #[arg(long)]
    file: PathBuf,

    /// Path to the logo image file
    #[arg(long)]
    logo: PathBuf,

    /// Trim uniform background from the logo before placing it
    #[arg(long)]
    trim_logo: bool,

    /// Comma-separated list of tags; slides whose tags are all listed
    /// here are deleted
    #[arg(long, default_value = "")]
    tags: String,

    /// Output file (default: input name with a -new suffix)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Name of the picture placeholder the logo replaces
    #[arg(long, default_value = "Picture Placeholder 3")]
    placeholder: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let file = File::open(&args.file)
        .with_context(|| format!("Failed to open {}", args.file.display()))?;
    let mut deck = PptxDeck::open(BufReader::new(file))
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let all_tags = collect_all_tags(&deck)?;
    println!(
        "All tags: [{}]",
        all_tags.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    let logo = load_logo(&args.logo, args.trim_logo)?;
    let filter = DeletionFilter::from_arg(&args.tags);

    let total_slides = deck.slide_count();
    let mut deleted = 0usize;

    let slides: Vec<(usize, Option<String>)> = deck
        .slides()
        .iter()
        .map(|s| (s.number, s.notes_text.clone()))
        .collect();

    for (number, notes_text) in slides {
        log::info!("{}/{}", number, total_slides);

        let Some(notes_text) = notes_text else {
            continue;
        };

        let slide_tags = extract_tags(&notes_text)
            .with_context(|| format!("Bad annotation in notes of slide {}", number))?;

        if deck_core::should_delete_slide(&slide_tags, &filter.tags) {
            println!(
                "Deleting slide {} with matching tags [{}]",
                number,
                slide_tags.iter().cloned().collect::<Vec<_>>().join(", ")
            );
            deck.remove_slide(number)?;
            deleted += 1;
        } else if !find_annotation_blocks(&notes_text).is_empty() {
            deck.replace_notes_text(number, &strip_annotations(&notes_text))?;
        }
    }

    deck.set_logo(logo, &args.placeholder);

    let output_path = match args.output {
        Some(path) => path,
        None => derived_output_path(&args.file),
    };
    let out = File::create(&output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    deck.save(BufWriter::new(out))
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    println!(
        "Done! {} slides kept, {} deleted -> {}",
        total_slides - deleted,
        deleted,
        output_path.display()
    );

    Ok(())
}

/// Union of every slide's tag set, reported before any deletion so the
/// user can see what the deck offers to filter on.
fn collect_all_tags(deck: &PptxDeck) -> Result<BTreeSet<String>> {
    let mut all_tags = BTreeSet::new();
    for slide in deck.slides() {
        if let Some(notes) = &slide.notes_text {
            let tags = extract_tags(notes).with_context(|| {
                format!("Bad annotation in notes of slide {}", slide.number)
            })?;
            all_tags.extend(tags);
        }
    }
    Ok(all_tags)
}

/// Load the logo, optionally auto-crop its background, and encode it as
/// PNG held in memory.
fn load_logo(path: &Path, trim: bool) -> Result<Logo> {
    let mut img =
        image::open(path).with_context(|| format!("Failed to open logo {}", path.display()))?;

    if trim {
        match deck_core::trim_background(&img) {
            Some(trimmed) => img = trimmed,
            None => {
                log::warn!(
                    "Logo {} is a uniform color; nothing to trim, using it as-is",
                    path.display()
                );
            }
        }
    }

    let (width_px, height_px) = img.dimensions();
    let mut png_data = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_data), ImageFormat::Png)
        .with_context(|| "Failed to encode logo as PNG")?;

    Ok(Logo {
        png_data,
        width_px,
        height_px,
    })
}

/// `deck.pptx` -> `deck-new.pptx`, next to the input.
fn derived_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("pptx");
    let filename = format!("{}-new.{}", stem, ext);

    match input.parent() {
        Some(parent) if parent != Path::new("") => parent.join(filename),
        _ => PathBuf::from(filename),
    }
}
