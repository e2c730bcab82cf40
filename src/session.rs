use crate::cli::{self, ListCommand};
use crate::errors::AppResult;
use crate::models::StoreEvent;
use crate::render;
use crate::tracker::Tracker;
use clap::{CommandFactory, Parser, Subcommand};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{BufRead, Write};
use std::sync::mpsc;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""([^"]*)"|'([^']*)'|(\S+)"#).expect("valid token regex"));

#[derive(Debug, Parser)]
#[command(name = "session", no_binary_name = true, disable_help_subcommand = true)]
pub struct SessionLine {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    #[command(flatten)]
    List(ListCommand),
    /// Restore the most recently removed medication at the end of the list
    Undo,
    /// Filter `list` output by name or notes; no query clears the filter
    Search { query: Option<String> },
    /// Show the actions taken in this session
    History,
    /// Write the list to the data file now
    Save,
    /// Show this help
    Help,
    /// Save and leave the session
    #[command(alias = "exit")]
    Quit,
}

/// Splits a command line into arguments, honouring single and double quotes.
pub fn tokenize(line: &str) -> Vec<String> {
    TOKEN_RE
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Interactive loop: loads the data file, executes one command per input
/// line, and saves on `quit` or end of input. Command failures are reported
/// and never end the session.
pub fn run<R: BufRead, W: Write>(tracker: &mut Tracker, input: R, out: &mut W) -> AppResult<()> {
    let (sender, events) = mpsc::channel();
    let subscription = tracker.subscribe(move |event| {
        let _ = sender.send(event.clone());
    });

    match tracker.load_on_startup() {
        Ok(0) => {}
        Ok(count) => writeln!(
            out,
            "Loaded {} medications from {}.",
            count,
            tracker.settings().data_file.display()
        )?,
        Err(error) => writeln!(out, "error: {}", error)?,
    }
    writeln!(out, "Type `help` for the list of commands.")?;

    for line in input.lines() {
        let line = line?;
        let tokens = tokenize(&line);
        if tokens.is_empty() {
            continue;
        }

        let command = match SessionLine::try_parse_from(&tokens) {
            Ok(parsed) => parsed.command,
            Err(error) => {
                writeln!(out, "{}", error.to_string().trim_end())?;
                continue;
            }
        };
        if matches!(command, SessionCommand::Quit) {
            break;
        }

        if let Err(error) = dispatch(tracker, command, out) {
            tracing::warn!(command = %line, error = %error, "session command failed");
            writeln!(out, "error: {}", error)?;
        }
        for event in events.try_iter() {
            if event == StoreEvent::AllTaken {
                writeln!(out, "All medications have been taken!")?;
            }
        }
    }

    tracker.unsubscribe(subscription);
    match tracker.save_on_shutdown() {
        Ok(()) => writeln!(out, "Saved {} medications.", tracker.store().len())?,
        Err(error) => writeln!(out, "error: {}", error)?,
    }
    Ok(())
}

fn dispatch<W: Write>(tracker: &mut Tracker, command: SessionCommand, out: &mut W) -> AppResult<()> {
    match command {
        SessionCommand::List(command) => cli::execute(tracker, command, out)?,
        SessionCommand::Undo => {
            let index = tracker.undo()?;
            let name = tracker
                .store()
                .get(index)
                .map(|record| record.name.clone())
                .unwrap_or_default();
            writeln!(out, "Restored '{}' at position {}.", name, index + 1)?;
        }
        SessionCommand::Search { query } => {
            tracker.search(query.as_deref().unwrap_or_default());
            writeln!(out, "{}", render::records_table(&tracker.visible()))?;
        }
        SessionCommand::History => {
            let history = tracker.history();
            if history.is_empty() {
                writeln!(out, "No actions yet.")?;
            } else {
                writeln!(out, "{}", history.render())?;
            }
        }
        SessionCommand::Save => {
            tracker.save()?;
            writeln!(out, "Saved to {}.", tracker.settings().data_file.display())?;
        }
        SessionCommand::Help => {
            writeln!(out, "{}", SessionLine::command().render_help().to_string().trim_end())?;
        }
        SessionCommand::Quit => {}
    }
    Ok(())
}
