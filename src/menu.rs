use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::curation::amend::{amend_captions, check_captions};
use crate::curation::bucket::{bucket_media, BUCKET_PRESETS};
use crate::curation::caption::{caption_folder, CaptionOptions};
use crate::curation::cluster::cluster_similar;
use crate::curation::dedup::{deduplicate, MatchMode};
use crate::curation::layout::ensure_subfolders;
use crate::curation::scene::extract_scenes;
use crate::curation::Resolution;
use crate::media::captioner::{CommandCaptioner, DEFAULT_CAPTION_COMMAND};
use crate::media::detect::ContentDetector;
use crate::media::frames::DecodingGrabber;
use crate::media::index::PhashIndex;
use crate::media::transcode::FfmpegCli;

/// Everything the menu can be asked to do, inputs included. Gathering the
/// inputs is separated from running the stage so each variant maps onto
/// one stage call.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SplitScenes {
        video: PathBuf,
        output_root: PathBuf,
        frames_per_scene: usize,
    },
    CaptionFolder {
        folder: PathBuf,
        overwrite: bool,
    },
    CheckCaptions {
        folder: PathBuf,
    },
    AmendCaptions {
        folder: PathBuf,
        fragment: String,
        position: String,
    },
    BucketMedia {
        images: PathBuf,
        videos: PathBuf,
    },
    Deduplicate {
        reference: PathBuf,
        compare: PathBuf,
        output: PathBuf,
        mode: MatchMode,
    },
    ClusterSimilar {
        corpus: PathBuf,
        query: PathBuf,
        output: PathBuf,
        count: usize,
    },
    Exit,
}

/// Top-level interactive loop. Stage failures are reported and the menu
/// comes back; only a confirmed exit (or unreadable input) leaves it.
pub fn run() -> Result<()> {
    loop {
        print_menu();
        let choice = read_choice()?;
        let command = match command_for(choice) {
            Ok(Some(command)) => command,
            Ok(None) => {
                println!("{}", "Invalid choice. Please select a valid option.".red());
                continue;
            }
            Err(err) => {
                println!("{}", format!("{err:#}").red());
                continue;
            }
        };
        if matches!(command, Command::Exit) {
            if prompt_confirm("Are you sure you want to exit?", None)? {
                println!("Exiting the application.");
                return Ok(());
            }
            println!("Choose another menu item.");
            continue;
        }
        if let Err(err) = execute(&command) {
            eprintln!("{}", format!("An error occurred: {err:#}").red());
        }
    }
}

fn print_menu() {
    println!("Select a function:");
    println!("1. Process a video file into scenes with captions");
    println!("2. Generate captions for a folder of images");
    println!("3. Check a folder of images for missing captions");
    println!("4. Amend existing captions with new text");
    println!("5. Resize and crop images and videos");
    println!("6. Move duplicate images out of a folder");
    println!("7. Gather images similar to a query image");
    println!("8. Exit");
}

fn read_choice() -> Result<usize> {
    let line = prompt_line("Enter the number of your choice: ")?;
    let trimmed = line.trim();
    trimmed
        .parse()
        .with_context(|| format!("menu choice '{trimmed}' is not a number"))
}

/// Gather the inputs for one menu choice. `Ok(None)` means the choice is
/// not on the menu.
fn command_for(choice: usize) -> Result<Option<Command>> {
    let command = match choice {
        1 => Command::SplitScenes {
            video: prompt_path("Enter the path to the input video file: ")?,
            output_root: prompt_path("Enter the path to the output folder: ")?,
            frames_per_scene: prompt_count("Enter the number of still frames to be saved: ")?,
        },
        2 => Command::CaptionFolder {
            folder: prompt_path("Enter the path to the folder containing images: ")?,
            overwrite: prompt_confirm("Overwrite existing captions?", Some(true))?,
        },
        3 => Command::CheckCaptions {
            folder: prompt_path("Enter the path to the folder containing images: ")?,
        },
        4 => Command::AmendCaptions {
            folder: prompt_path("Enter the folder location: ")?,
            fragment: prompt_line("Enter the text to append to each .txt file: ")?,
            position: prompt_line("Append as 'prefix' or 'suffix'? ")?.to_lowercase(),
        },
        5 => Command::BucketMedia {
            images: prompt_path("Enter the images folder path: ")?,
            videos: prompt_path("Enter the videos folder path: ")?,
        },
        6 => Command::Deduplicate {
            reference: prompt_path("Enter the path to the reference folder: ")?,
            compare: prompt_path("Enter the path to the compare folder: ")?,
            output: prompt_path("Enter the path to the output folder: ")?,
            mode: prompt_match_mode()?,
        },
        7 => Command::ClusterSimilar {
            corpus: prompt_path("Enter the path to the folder containing images: ")?,
            query: prompt_path("Enter the path to the query image: ")?,
            output: prompt_path("Enter the path to the output folder: ")?,
            count: prompt_count("Enter the number of similar images to gather: ")?,
        },
        8 => Command::Exit,
        _ => return Ok(None),
    };
    Ok(Some(command))
}

fn execute(command: &Command) -> Result<()> {
    match command {
        Command::SplitScenes {
            video,
            output_root,
            frames_per_scene,
        } => {
            let base = video
                .file_stem()
                .and_then(|stem| stem.to_str())
                .with_context(|| format!("{} has no usable file name", video.display()))?;
            let run_root = output_root.join(base);
            let folders = ensure_subfolders(&run_root, &["videos", "images"])?;
            extract_scenes(
                video,
                &folders[0],
                &folders[1],
                *frames_per_scene,
                &ContentDetector::default(),
                &FfmpegCli,
                &DecodingGrabber,
            )?;
            println!(
                "{}",
                "Scene splitting and image extraction completed.".green()
            );
            if prompt_confirm("Caption the extracted frames now?", Some(true))? {
                run_caption(&folders[1], CaptionOptions::default())?;
            }
            Ok(())
        }
        Command::CaptionFolder { folder, overwrite } => {
            run_caption(
                folder,
                CaptionOptions {
                    overwrite: *overwrite,
                },
            )
        }
        Command::CheckCaptions { folder } => {
            let missing = check_captions(folder)?;
            if missing.is_empty() {
                println!("{}", "Every image has a caption.".green());
            } else {
                println!("{} images are missing captions:", missing.len());
                for name in missing {
                    println!("  {name}");
                }
            }
            Ok(())
        }
        Command::AmendCaptions {
            folder,
            fragment,
            position,
        } => {
            let report = amend_captions(folder, fragment, position);
            for name in &report.modified {
                println!("Modified: {name}");
            }
            for error in &report.errors {
                println!("{}", error.red());
            }
            if report.errors.is_empty() {
                println!("All .txt caption files have been edited and saved.");
            }
            Ok(())
        }
        Command::BucketMedia { images, videos } => {
            for root in [images, videos] {
                ensure_subfolders(root, &BUCKET_PRESETS)?;
            }
            for root in [images, videos] {
                for preset in BUCKET_PRESETS {
                    let target = Resolution::parse(preset)?;
                    let report = bucket_media(root, &root.join(preset), target, &FfmpegCli)?;
                    for entry in &report.processed {
                        println!("{}", format!("Successfully processed: {entry}").green());
                    }
                    for error in &report.errors {
                        println!("{}", error.red());
                    }
                }
            }
            Ok(())
        }
        Command::Deduplicate {
            reference,
            compare,
            output,
            mode,
        } => {
            let report = deduplicate(reference, compare, output, *mode)?;
            println!(
                "{}",
                format!(
                    "Moved {} duplicate images to {}",
                    report.moved.len(),
                    output.display()
                )
                .green()
            );
            for error in &report.errors {
                println!("{}", error.red());
            }
            Ok(())
        }
        Command::ClusterSimilar {
            corpus,
            query,
            output,
            count,
        } => {
            let mut index = PhashIndex::default();
            let report = cluster_similar(corpus, query, output, *count, &mut index)?;
            println!(
                "{}",
                format!(
                    "Gathered {} similar images into {}",
                    report.moved.len(),
                    output.display()
                )
                .green()
            );
            for entry in &report.skipped {
                println!("{}", format!("Skipped {entry}").red());
            }
            Ok(())
        }
        Command::Exit => Ok(()),
    }
}

fn run_caption(folder: &Path, options: CaptionOptions) -> Result<()> {
    let mut captioner = CommandCaptioner::new(DEFAULT_CAPTION_COMMAND)?;
    caption_folder(folder, options, &mut captioner)?;
    println!(
        "{}",
        format!(
            "Generated captions for video images and saved to {}",
            folder.display()
        )
        .green()
    );
    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    let read = std::io::stdin()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        anyhow::bail!("stdin closed");
    }
    // Only the line ending comes off; leading and trailing spaces are
    // meaningful for caption fragments.
    while line.ends_with('\n') || line.ends_with('\r') {
        line.pop();
    }
    Ok(line)
}

fn prompt_path(prompt: &str) -> Result<PathBuf> {
    Ok(PathBuf::from(prompt_line(prompt)?.trim()))
}

fn prompt_count(prompt: &str) -> Result<usize> {
    prompt_line(prompt)?
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid input. Please enter an integer"))
}

fn prompt_match_mode() -> Result<MatchMode> {
    let answer = prompt_line("Match by 'name' or 'content'? [name]: ")?;
    match answer.trim().to_lowercase().as_str() {
        "" | "name" => Ok(MatchMode::FileName),
        "content" => Ok(MatchMode::ContentHash),
        _ => Err(anyhow!("Invalid input. Please enter 'name' or 'content'.")),
    }
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> Result<bool> {
    let hint = match default {
        Some(true) => "(Y/n)",
        Some(false) => "(y/N)",
        None => "(Y/N)",
    };
    loop {
        let answer = prompt_line(&format!("{prompt} {hint}: "))?;
        match (answer.trim().to_lowercase().as_str(), default) {
            ("y", _) => return Ok(true),
            ("n", _) => return Ok(false),
            ("", Some(value)) => return Ok(value),
            _ => println!("Invalid input. Please enter 'Y' or 'N'."),
        }
    }
}
