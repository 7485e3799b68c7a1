use std::path::{Path, PathBuf};
use std::process;
use std::sync::mpsc;

use clap::{Parser, Subcommand};
use notify::{Event, RecursiveMode, Watcher};

use scroll_cue::error::CueError;
use scroll_cue::story::Story;

#[derive(Parser)]
#[command(name = "scroll-cue", version)]
#[command(about = "Scroll-triggered reveals and audio cues for narrative pages")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a story file (default: the built-in narrative)
    Check {
        /// Story JSON file
        file: Option<PathBuf>,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },

    /// Scroll a simulated page through offsets and report what happens
    Simulate {
        /// Story JSON file
        file: Option<PathBuf>,

        /// Scroll offsets in pixels, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        at: Vec<f64>,

        /// Print frames as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a story as normalized JSON
    Dump {
        /// Story JSON file
        file: Option<PathBuf>,

        /// Indent the output
        #[arg(long)]
        pretty: bool,
    },

    /// Re-check a story file whenever it changes
    Watch {
        /// Story JSON file
        file: PathBuf,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,
    },
}

pub fn run() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check { file, strict } => {
            let story = load_or_exit(file.as_deref());
            if !check(&story, file.as_deref(), strict) {
                process::exit(1);
            }
        }

        Commands::Simulate { file, at, json } => {
            let story = load_or_exit(file.as_deref());
            let frames = match scroll_cue::simulate(&story, &at) {
                Ok(f) => f,
                Err(e) => {
                    print_error(&e);
                    process::exit(1);
                }
            };

            if json {
                match serde_json::to_string_pretty(&frames) {
                    Ok(s) => println!("{s}"),
                    Err(e) => {
                        eprintln!("error: cannot encode frames: {e}");
                        process::exit(1);
                    }
                }
                return;
            }

            for frame in &frames {
                println!("@ {}px", frame.offset);
                println!("  visible:  {}", frame.visible.len());
                if let Some(chapter) = &frame.chapter {
                    println!("  chapter:  {chapter}");
                }
                for cue in &frame.cues {
                    println!("  cue:      {cue}");
                }
                println!("  playing:  {}", join_or_dash(&frame.playing));
                println!("  fired:    {}", join_or_dash(&frame.fired));
            }
        }

        Commands::Dump { file, pretty } => {
            let story = load_or_exit(file.as_deref());
            match story.to_json(pretty) {
                Ok(s) => println!("{s}"),
                Err(e) => {
                    print_error(&e);
                    process::exit(1);
                }
            }
        }

        Commands::Watch { file, strict } => {
            if let Err(e) = watch(&file, strict) {
                eprintln!("error: watcher failed: {e}");
                process::exit(1);
            }
        }
    }
}

fn load_or_exit(file: Option<&Path>) -> Story {
    let result = match file {
        Some(path) => scroll_cue::load_story(path),
        None => Story::narrative(),
    };
    result.unwrap_or_else(|e| {
        print_error(&e);
        process::exit(1);
    })
}

/// Print warnings and a summary line. Returns false if the story fails.
fn check(story: &Story, file: Option<&Path>, strict: bool) -> bool {
    let name = file.map_or_else(|| "<narrative>".to_string(), |p| p.display().to_string());
    let warnings = story.warnings();
    for w in &warnings {
        eprintln!("warning: {w}");
    }
    match scroll_cue::check_story(story, strict) {
        Ok(_) if warnings.is_empty() => {
            eprintln!("{name}: ok ({} rules)", story.rules.len());
            true
        }
        Ok(_) => {
            eprintln!("{name}: {} warning(s)", warnings.len());
            true
        }
        Err(e) => {
            print_error(&e);
            false
        }
    }
}

fn watch(path: &Path, strict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        if let Ok(event) = res {
            if event.kind.is_modify() || event.kind.is_create() {
                let _ = tx.send(());
            }
        }
    })?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    watcher.watch(dir, RecursiveMode::NonRecursive)?;

    eprintln!("scroll-cue watch");
    eprintln!("  file: {}", path.display());
    eprintln!("  watching for changes...");
    recheck(path, strict);

    while rx.recv().is_ok() {
        // Editors often write in bursts.
        while rx.try_recv().is_ok() {}
        recheck(path, strict);
    }
    Ok(())
}

fn recheck(path: &Path, strict: bool) {
    match scroll_cue::load_story(path) {
        Ok(story) => {
            check(&story, Some(path), strict);
        }
        Err(e) => print_error(&e),
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn print_error(e: &CueError) {
    eprintln!("error: {e}");

    if let (Some(span), Some(source)) = (&e.span, &e.source_text) {
        if span.start <= source.len() {
            eprintln!();
            eprintln!("  | {source}");
            eprintln!(
                "  | {}{}",
                " ".repeat(span.start),
                "^".repeat(span.len().max(1))
            );
        }
    }
}
