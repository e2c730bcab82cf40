use crate::config::AppSettings;
use crate::errors::{AppError, AppResult};
use crate::models::{Record, RecordPatch};
use crate::render;
use crate::tracker::Tracker;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "med-tracker", version, about = "Track a personal medication list")]
pub struct Cli {
    /// Medication list file (JSON)
    #[arg(long, env = "MED_TRACKER_DATA", value_name = "path", global = true)]
    pub data_file: Option<PathBuf>,
    /// Settings file (YAML); defaults to ./med-tracker.yaml when present
    #[arg(long, value_name = "path", global = true)]
    pub config: Option<PathBuf>,
    /// Directory for rolling log files
    #[arg(long, value_name = "directory", global = true)]
    pub log_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn apply_overrides(&self, settings: &mut AppSettings) {
        if let Some(data_file) = &self.data_file {
            settings.data_file = data_file.clone();
        }
        if let Some(log_dir) = &self.log_dir {
            settings.log_dir = log_dir.clone();
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactive session; loads on start and saves on exit (default)
    Session,
    #[command(flatten)]
    List(ListCommand),
}

/// Commands over the medication list shared by one-shot and session modes.
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum ListCommand {
    /// Show medications, optionally only those matching a query
    List { query: Option<String> },
    /// Add a medication at the end of the list
    Add(AddArgs),
    /// Remove the medication at a position
    Remove(PositionArg),
    /// Change fields of the medication at a position
    Edit(EditArgs),
    /// Mark a medication as taken now
    Take(PositionArg),
    /// Clear the taken mark of a medication
    Untake(PositionArg),
    /// Move a medication to another position
    Move(MoveArgs),
    /// Show totals and completion rate
    Stats,
    /// Show the medications already taken
    Taken,
    /// Write the list to a JSON file
    Export(PathArg),
    /// Replace the list with the contents of a JSON file
    Import(PathArg),
}

impl ListCommand {
    pub fn mutates(&self) -> bool {
        !matches!(self, Self::List { .. } | Self::Stats | Self::Taken | Self::Export(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AddArgs {
    pub name: String,
    #[arg(short, long, default_value = "")]
    pub dosage: String,
    #[arg(short, long, default_value = "")]
    pub frequency: String,
    #[arg(short, long, default_value = "")]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct EditArgs {
    pub position: usize,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(short, long)]
    pub dosage: Option<String>,
    #[arg(short, long)]
    pub frequency: Option<String>,
    #[arg(short, long)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct PositionArg {
    /// 1-based position as shown by `list`
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct MoveArgs {
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct PathArg {
    pub path: PathBuf,
}

/// Runs a single command against the data file: load, apply, save when the
/// list changed.
pub fn run_once<W: Write>(tracker: &mut Tracker, command: ListCommand, out: &mut W) -> AppResult<()> {
    tracker.load_on_startup()?;
    let mutates = command.mutates();
    execute(tracker, command, out)?;
    if mutates {
        tracker.save()?;
    }
    Ok(())
}

pub fn execute<W: Write>(tracker: &mut Tracker, command: ListCommand, out: &mut W) -> AppResult<()> {
    match command {
        ListCommand::List { query } => {
            let rows = match query.as_deref() {
                Some(query) => tracker.store().find(query).collect(),
                None => tracker.visible(),
            };
            writeln!(out, "{}", render::records_table(&rows))?;
        }
        ListCommand::Add(args) => {
            let index = tracker.add(Record::new(args.name, args.dosage, args.frequency, args.notes))?;
            writeln!(out, "Added '{}' at position {}.", name_at(tracker, index), index + 1)?;
        }
        ListCommand::Remove(arg) => {
            let index = index_of(tracker, arg.position)?;
            let name = tracker.remove(index)?;
            writeln!(out, "Removed '{}'.", name)?;
        }
        ListCommand::Edit(args) => {
            let index = index_of(tracker, args.position)?;
            let patch = RecordPatch {
                name: args.name,
                dosage: args.dosage,
                frequency: args.frequency,
                notes: args.notes,
            };
            if patch.is_empty() {
                return Err(AppError::Cli("edit needs at least one of --name, --dosage, --frequency, --notes".to_string()));
            }
            tracker.edit(index, patch)?;
            writeln!(out, "Updated '{}'.", name_at(tracker, index))?;
        }
        ListCommand::Take(arg) => set_taken(tracker, arg.position, true, out)?,
        ListCommand::Untake(arg) => set_taken(tracker, arg.position, false, out)?,
        ListCommand::Move(args) => {
            let from = index_of(tracker, args.from)?;
            let to = index_of(tracker, args.to)?;
            tracker.move_record(from, to)?;
            writeln!(out, "Moved '{}' to position {}.", name_at(tracker, to), to + 1)?;
        }
        ListCommand::Stats => writeln!(out, "{}", render::stats(&tracker.stats()))?,
        ListCommand::Taken => writeln!(out, "{}", render::taken_list(&tracker.taken_records()))?,
        ListCommand::Export(arg) => {
            let count = tracker.export(&arg.path)?;
            writeln!(out, "Exported {} medications to {}.", count, arg.path.display())?;
        }
        ListCommand::Import(arg) => {
            let count = tracker.import(&arg.path)?;
            writeln!(out, "Imported {} medications from {}.", count, arg.path.display())?;
        }
    }
    Ok(())
}

fn set_taken<W: Write>(tracker: &mut Tracker, position: usize, value: bool, out: &mut W) -> AppResult<()> {
    let index = index_of(tracker, position)?;
    let changed = tracker.set_taken(index, value)?;
    let name = name_at(tracker, index);
    match (changed, value) {
        (true, true) => {
            let at = tracker
                .store()
                .get(index)
                .and_then(|record| record.last_taken_at.clone())
                .unwrap_or_default();
            writeln!(out, "Marked '{}' as taken at {}.", name, at)?;
        }
        (true, false) => writeln!(out, "Cleared taken mark of '{}'.", name)?,
        (false, true) => writeln!(out, "'{}' is already marked as taken.", name)?,
        (false, false) => writeln!(out, "'{}' is not marked as taken.", name)?,
    }
    Ok(())
}

/// Converts a 1-based position from the command line into a list index.
pub fn index_of(tracker: &Tracker, position: usize) -> AppResult<usize> {
    let len = tracker.store().len();
    if position == 0 || position > len {
        return Err(AppError::Cli(format!(
            "no medication at position {} (list has {})",
            position, len
        )));
    }
    Ok(position - 1)
}

fn name_at(tracker: &Tracker, index: usize) -> String {
    tracker
        .store()
        .get(index)
        .map(|record| record.name.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn tracker_in(root: &std::path::Path) -> Tracker {
        Tracker::new(AppSettings {
            data_file: root.join("medications.json"),
            ..AppSettings::default()
        })
    }

    fn run(tracker: &mut Tracker, args: &[&str]) -> AppResult<String> {
        let cli = Cli::try_parse_from(std::iter::once("med-tracker").chain(args.iter().copied()))
            .map_err(|error| AppError::Cli(error.to_string()))?;
        let Some(Command::List(command)) = cli.command else {
            panic!("expected a list command");
        };
        let mut out = Vec::new();
        run_once(tracker, command, &mut out)?;
        Ok(String::from_utf8(out).expect("utf8 output"))
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["med-tracker", "list", "--data-file", "x.json"]).expect("parse");
        assert_eq!(cli.data_file, Some(PathBuf::from("x.json")));
        let mut settings = AppSettings::default();
        cli.apply_overrides(&mut settings);
        assert_eq!(settings.data_file, PathBuf::from("x.json"));
        assert!(matches!(cli.command, Some(Command::List(ListCommand::List { query: None }))));
    }

    #[test]
    fn no_subcommand_means_session() {
        let cli = Cli::try_parse_from(["med-tracker"]).expect("parse");
        assert!(cli.command.is_none());
    }

    #[test]
    fn one_shot_commands_persist_between_runs() {
        let root = tempfile::tempdir().expect("temp dir");

        let out = run(&mut tracker_in(root.path()), &["add", "Aspirin", "-d", "1 tablet", "-f", "Daily"]).expect("add");
        assert_eq!(out.trim(), "Added 'Aspirin' at position 1.");
        run(&mut tracker_in(root.path()), &["add", "Zinc", "--notes", "with food"]).expect("add");
        run(&mut tracker_in(root.path()), &["move", "2", "1"]).expect("move");
        let out = run(&mut tracker_in(root.path()), &["take", "2"]).expect("take");
        assert!(out.starts_with("Marked 'Aspirin' as taken at "));

        let out = run(&mut tracker_in(root.path()), &["list"]).expect("list");
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[2].starts_with("1 | Zinc"));
        assert!(lines[3].starts_with("2 | Aspirin"));

        let out = run(&mut tracker_in(root.path()), &["stats"]).expect("stats");
        assert!(out.contains("Completion rate: 50.0%"));
    }

    #[test]
    fn positions_are_validated_before_reaching_the_store() {
        let root = tempfile::tempdir().expect("temp dir");
        let mut tracker = tracker_in(root.path());
        let error = run(&mut tracker, &["remove", "1"]).expect_err("empty list");
        assert!(error.to_string().contains("no medication at position 1 (list has 0)"));
        let error = run(&mut tracker, &["take", "0"]).expect_err("zero position");
        assert!(matches!(error, AppError::Cli(_)));
    }

    #[test]
    fn edit_requires_a_field() {
        let root = tempfile::tempdir().expect("temp dir");
        run(&mut tracker_in(root.path()), &["add", "Aspirin"]).expect("add");
        let error = run(&mut tracker_in(root.path()), &["edit", "1"]).expect_err("empty edit");
        assert!(matches!(error, AppError::Cli(_)));
        let out = run(&mut tracker_in(root.path()), &["edit", "1", "--name", "Aspirin 100"]).expect("edit");
        assert_eq!(out.trim(), "Updated 'Aspirin 100'.");
    }

    #[test]
    fn read_only_commands_do_not_create_the_data_file() {
        let root = tempfile::tempdir().expect("temp dir");
        run(&mut tracker_in(root.path()), &["list"]).expect("list");
        assert!(!root.path().join("medications.json").exists());
    }
}
