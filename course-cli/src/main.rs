//! Course manager CLI - inspect and manage a course root.
//!
//! Usage:
//!   courses --root <dir> <command>
//!   courses --config dirs.json <command>
//!
//! Examples:
//!   courses --root ~/courses tree --all      # print the whole tree
//!   courses --root ~/courses mkdir fields    # create a folder
//!   courses --root ~/courses show fields/row1.course
//!   courses --root ~/courses export fields pack.zip
//!   courses --root ~/courses browse          # interactive browser

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
};

use course_core::{
    export_bundle, import_bundle, CourseDirs, CourseManager, CourseSerializer, DirectoryEntity,
    JsonCourseSerializer, ViewEntryKind,
};

/// Course manager CLI
#[derive(Parser, Debug)]
#[command(name = "courses")]
#[command(about = "Inspect and manage a course root")]
struct Args {
    /// Course root directory
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// JSON config file with user_data_root, namespace and world_id
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the course tree
    Tree {
        /// Unfold every directory
        #[arg(short, long)]
        all: bool,
    },
    /// Create a directory under the course root
    Mkdir {
        /// Root-relative path of the new directory
        path: PathBuf,
    },
    /// Delete a course file or an empty directory
    Rm {
        /// Root-relative path
        path: PathBuf,
    },
    /// Summarize a course document
    Show {
        /// Root-relative path of the course file
        path: PathBuf,
    },
    /// Export a directory of courses as a ZIP bundle
    Export {
        /// Root-relative source directory ("" for the root itself)
        dir: PathBuf,
        /// Bundle file to write
        bundle: PathBuf,
    },
    /// Import a ZIP bundle into a directory
    Import {
        /// Bundle file to read
        bundle: PathBuf,
        /// Root-relative target directory ("" for the root itself)
        dir: PathBuf,
    },
    /// Browse the tree interactively
    Browse {
        /// Display window size
        #[arg(short, long, default_value_t = 12)]
        window: usize,
    },
}

fn resolve_root(args: &Args) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(root) = &args.root {
        return Ok(root.clone());
    }
    if let Some(config) = &args.config {
        let dirs = CourseDirs::from_json_file(config)?;
        return Ok(dirs.course_root());
    }
    Err("pass --root <dir> or --config <file>".into())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let root = resolve_root(&args)?;
    let mut manager = CourseManager::open(&root)?;

    match args.command {
        Command::Tree { all } => {
            if all {
                manager.unfold_all();
            }
            if let Some(view) = manager.view() {
                print!("{view}");
            }
        }
        Command::Mkdir { path } => {
            let parent = path.parent().unwrap_or_else(|| Path::new(""));
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or("invalid directory name")?;
            manager.create_directory(parent, name)?;
            println!("created {}", path.display());
        }
        Command::Rm { path } => {
            let deleted = if root.join(&path).is_dir() {
                manager.delete_directory(&path)?
            } else {
                manager.delete_course(&path)?
            };
            if deleted {
                println!("deleted {}", path.display());
            } else {
                println!("not deleted: {}", path.display());
            }
        }
        Command::Show { path } => {
            let bytes = std::fs::read(root.join(&path))?;
            let course = JsonCourseSerializer.deserialize(&bytes)?;
            println!("name:      {}", course.name);
            println!("waypoints: {}", course.waypoint_count());
            println!("fieldwork: {}", course.fieldwork);
        }
        Command::Export { dir, bundle } => {
            let mut source = DirectoryEntity::open_root(&root.join(&dir))?;
            source.refresh()?;
            let name = bundle
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "bundle".to_string());
            let file = File::create(&bundle)?;
            export_bundle(&source, &name, file)?;
            println!("exported {} to {}", dir.display(), bundle.display());
        }
        Command::Import { bundle, dir } => {
            let target = root.join(&dir);
            std::fs::create_dir_all(&target)?;
            let manifest = import_bundle(File::open(&bundle)?, &target)?;
            manager.refresh()?;
            println!(
                "imported bundle \"{}\" ({} courses) into {}",
                manifest.name,
                manifest.courses.len(),
                dir.display()
            );
        }
        Command::Browse { window } => browse(&mut manager, window.max(1))?,
    }

    Ok(())
}

/// Interactive raw-mode tree browser.
///
/// Up/Down move the cursor (scrolling the window at the edges), Enter or
/// Space toggles a directory's fold, PageUp/PageDown shift the window,
/// `r` re-scans the disk, `q` quits.
fn browse(manager: &mut CourseManager, window: usize) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    enable_raw_mode()?;
    execute!(stdout, terminal::EnterAlternateScreen, cursor::Hide)?;

    let result = browse_loop(manager, window, &mut stdout);

    execute!(stdout, cursor::Show, terminal::LeaveAlternateScreen)?;
    disable_raw_mode()?;
    result
}

fn browse_loop(
    manager: &mut CourseManager,
    window: usize,
    stdout: &mut std::io::Stdout,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut cursor_offset = 0usize;

    loop {
        execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0))?;
        write!(
            stdout,
            "courses {}..{} of {}  [arrows move, enter toggle, r rescan, q quit]\r\n\r\n",
            manager.window_start(),
            (manager.window_start() + window - 1).min(manager.entry_count()),
            manager.entry_count()
        )?;

        for offset in 0..window {
            match manager.entry_at_offset(offset) {
                Some(entry) => {
                    let marker = if offset == cursor_offset { '>' } else { ' ' };
                    let tag = match entry.kind {
                        ViewEntryKind::Directory if entry.folded => "+ ",
                        ViewEntryKind::Directory => "- ",
                        ViewEntryKind::File => "  ",
                    };
                    write!(
                        stdout,
                        "{} {:indent$}{}{}\r\n",
                        marker,
                        "",
                        tag,
                        entry.name,
                        indent = entry.indent() * 2
                    )?;
                }
                // Empty slot: nothing to display.
                None => write!(stdout, "\r\n")?,
            }
        }
        stdout.flush()?;

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let ctrl_c = key.modifiers.contains(KeyModifiers::CONTROL)
                && key.code == KeyCode::Char('c');
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => break,
                _ if ctrl_c => break,
                KeyCode::Up => {
                    if cursor_offset > 0 {
                        cursor_offset -= 1;
                    } else {
                        let start = manager.window_start();
                        manager.set_window_start(start.saturating_sub(1).max(1));
                    }
                }
                KeyCode::Down => {
                    if cursor_offset + 1 < window
                        && manager.entry_at_offset(cursor_offset + 1).is_some()
                    {
                        cursor_offset += 1;
                    } else {
                        manager.set_window_start(manager.window_start() + 1);
                    }
                }
                KeyCode::PageUp => {
                    let start = manager.window_start();
                    manager.set_window_start(start.saturating_sub(window).max(1));
                }
                KeyCode::PageDown => {
                    manager.set_window_start(manager.window_start() + window);
                }
                KeyCode::Enter | KeyCode::Char(' ') => {
                    let target = manager
                        .entry_at_offset(cursor_offset)
                        .filter(|e| e.kind == ViewEntryKind::Directory)
                        .map(|e| e.path.clone());
                    if let Some(path) = target {
                        manager.toggle_fold(&path);
                    }
                }
                KeyCode::Char('r') => manager.refresh()?,
                _ => {}
            }
        }

        // Keep the cursor on a real entry after folds and rescans.
        while cursor_offset > 0 && manager.entry_at_offset(cursor_offset).is_none() {
            cursor_offset -= 1;
        }
    }

    Ok(())
}
