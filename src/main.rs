extern crate log;
extern crate pretty_env_logger;

use std::path::{Path, PathBuf};
use std::process::exit;
use std::sync::atomic::AtomicBool;

use clap::{arg, command, ArgMatches, Command};

use crate::annotate::Annotator;
use crate::archive::DirectoryArchiver;
use crate::assignment::Assignment;
use crate::capture::DirectoryFrameSource;
use crate::session::ScanSession;
use crate::store::{JsonFileStore, ResultStore};
use crate::types::StudentId;

mod annotate;
mod archive;
mod assignment;
mod bubbles;
mod capture;
mod debug;
mod detect;
mod geometry;
mod grade;
mod image_utils;
mod infer;
mod locate;
mod preprocess;
mod rectify;
mod session;
mod store;
#[cfg(test)]
mod test_support;
mod types;

fn main() {
    pretty_env_logger::init_custom_env("LOG");

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("scan", sub)) => run_scan(sub),
        Some(("stats", sub)) => run_stats(sub),
        Some(("export", sub)) => run_export(sub),
        Some(("student", sub)) => run_student(sub),
        _ => {
            eprintln!("No subcommand given; try 'scan'.");
            exit(1);
        }
    }
}

fn cli() -> Command {
    command!()
        .subcommand_required(true)
        .subcommand(
            Command::new("scan")
                .about("Grade OMR sheets from a directory of captured frames")
                .arg(arg!(frames: <FRAMES_DIR> "Directory of captured frames").required(true))
                .arg(arg!(-a --assignment <PATH> "Path to the assignment JSON file").required(true))
                .arg(store_arg())
                .arg(
                    arg!(--images <DIR> "Directory for annotated result images")
                        .required(false)
                        .default_value("images"),
                )
                .arg(arg!(--font <PATH> "TTF font for the score overlay").required(false))
                .arg(arg!(-d --debug "Write per-stage debug images")),
        )
        .subcommand(
            Command::new("stats")
                .about("Show score statistics for an assignment")
                .arg(arg!(-a --assignment <ID> "Assignment id").required(true))
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("export")
                .about("Export an assignment's results to CSV")
                .arg(arg!(-a --assignment <ID> "Assignment id").required(true))
                .arg(
                    arg!(-o --out <PATH> "Output CSV path")
                        .required(false)
                        .default_value("export.csv"),
                )
                .arg(store_arg()),
        )
        .subcommand(
            Command::new("student")
                .about("List all results recorded for a student")
                .arg(arg!(student: <STUDENT_ID> "Student id").required(true))
                .arg(store_arg()),
        )
}

fn store_arg() -> clap::Arg {
    arg!(--store <PATH> "Path to the results store")
        .required(false)
        .default_value("data/markscan.json")
}

fn open_store(matches: &ArgMatches) -> JsonFileStore {
    let path = matches.get_one::<String>("store").expect("store has a default");
    match JsonFileStore::open(Path::new(path)) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Error opening results store: {:?}", e);
            exit(1);
        }
    }
}

fn assignment_id(matches: &ArgMatches) -> i64 {
    let raw = matches
        .get_one::<String>("assignment")
        .expect("assignment id is required");
    match raw.parse() {
        Ok(id) => id,
        Err(_) => {
            eprintln!("'{}' is not an assignment id", raw);
            exit(1);
        }
    }
}

fn run_scan(matches: &ArgMatches) {
    let assignment_path = matches
        .get_one::<String>("assignment")
        .expect("assignment path is required");
    let frames_dir = matches
        .get_one::<String>("frames")
        .expect("frames directory is required");
    let images_dir = matches
        .get_one::<String>("images")
        .expect("images has a default");

    let assignment = match Assignment::load(Path::new(assignment_path)) {
        Ok(assignment) => assignment,
        Err(e) => {
            eprintln!("Error loading assignment: {:?}", e);
            exit(1);
        }
    };

    let mut source = match DirectoryFrameSource::open(Path::new(frames_dir)) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error opening frame source: {:?}", e);
            exit(1);
        }
    };
    println!("{} frames queued from {}", source.len(), frames_dir);

    let debug_dir = if matches.get_flag("debug") {
        let dir = PathBuf::from(images_dir).join("debug");
        if let Err(e) = std::fs::create_dir_all(&dir) {
            eprintln!("Error creating debug directory: {}", e);
            exit(1);
        }
        Some(dir)
    } else {
        None
    };

    let mut store = open_store(matches);
    let archiver = DirectoryArchiver::new(images_dir);
    let annotator = match matches.get_one::<String>("font") {
        Some(font_path) => Annotator::new(Some(Path::new(font_path))),
        None => Annotator::without_font(),
    };
    let quit = AtomicBool::new(false);

    let mut session = ScanSession::new(&assignment, &mut store, &archiver, &annotator, debug_dir);
    match session.run(&mut source, &quit) {
        Ok(summary) => {
            println!(
                "Scan complete: {} sheets graded for assignment {}.",
                summary.processed, summary.assignment_id
            );
        }
        Err(e) => {
            eprintln!("Scan session failed: {:?}", e);
            exit(1);
        }
    }
}

fn run_stats(matches: &ArgMatches) {
    let store = open_store(matches);
    let id = assignment_id(matches);

    match store.statistics(id) {
        Ok(Some(stats)) => {
            println!("Total sessions: {}", stats.total_sessions);
            println!("Average score: {:.2}%", stats.average_score);
            println!("Highest score: {:.2}%", stats.max_score);
            println!("Lowest score: {:.2}%", stats.min_score);
            println!("Grade distribution:");
            println!("  A (90-100%): {}", stats.a_grades);
            println!("  B (80-89%):  {}", stats.b_grades);
            println!("  C (70-79%):  {}", stats.c_grades);
            println!("  D (60-69%):  {}", stats.d_grades);
            println!("  F (<60%):    {}", stats.f_grades);
        }
        Ok(None) => println!("No sessions recorded for assignment {}.", id),
        Err(e) => {
            eprintln!("Error reading statistics: {:?}", e);
            exit(1);
        }
    }
}

fn run_export(matches: &ArgMatches) {
    let store = open_store(matches);
    let id = assignment_id(matches);
    let out = matches.get_one::<String>("out").expect("out has a default");

    match store.export_csv(id, Path::new(out)) {
        Ok(rows) => println!("{} results exported to {}.", rows, out),
        Err(e) => {
            eprintln!("Error exporting results: {:?}", e);
            exit(1);
        }
    }
}

fn run_student(matches: &ArgMatches) {
    let store = open_store(matches);
    let raw = matches
        .get_one::<String>("student")
        .expect("student id is required");
    let student = StudentId::from(raw.clone());

    match store.student_results(&student) {
        Ok(results) if results.is_empty() => {
            println!("No results found for student {}.", student);
        }
        Ok(results) => {
            for result in results {
                println!(
                    "{}: {:.2}% ({}/{} correct)",
                    result.assignment_name, result.score, result.correct_count, result.total_questions
                );
            }
        }
        Err(e) => {
            eprintln!("Error reading student results: {:?}", e);
            exit(1);
        }
    }
}
