//! Command line surface: argument decoding, usage text and command dispatch.

use std::io::Write;

use log::{debug, LevelFilter};
use structopt::clap::AppSettings;
use structopt::StructOpt;

use crate::report::{format_change, write_catalogs, write_catalogs_json};
use crate::{
    change_mode, display_catalogs, DisplayModeError, DisplayResult, DisplayService,
    ParseTargetError, TargetSpec,
};

pub const USAGE: &str = "Usage:

  displaymode [flags] <command> [arguments...]

Commands:
  t <width> <height> [@<refresh>] [display]
      sets the resolution of a display (default 0, the main display) to
      width x height, optionally at the given refresh rate in Hz

  d
      prints available resolutions for every active display
      (* marks the current mode, ! marks modes not meant for the desktop)

  h
      prints this message

  v
      prints version and copyright notice

Flags:
  -j, --json       prints the d listing as JSON
  -n, --dry-run    selects the mode for t without applying it
  -v, --verbose    logs diagnostics to stderr, repeat for more detail
";

/// Raw command line, as split by structopt
#[derive(Debug, StructOpt)]
#[structopt(
    name = "displaymode",
    about = "Lists and changes display resolutions",
    setting = AppSettings::AllowNegativeNumbers
)]
pub struct Opt {
    /// Logs diagnostics to stderr, repeat for more detail
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    /// Prints the `d` listing as JSON
    #[structopt(short, long)]
    pub json: bool,

    /// Selects the mode for `t` without applying it
    #[structopt(short = "n", long)]
    pub dry_run: bool,

    /// One of `t`, `d`, `h` or `v`
    #[structopt(name = "COMMAND")]
    pub command: Option<String>,

    /// Arguments of the command
    #[structopt(name = "ARGS")]
    pub args: Vec<String>,
}

impl Opt {
    /// Log level selected by the number of `-v` flags
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }

    /// Decodes the single-letter command and its arguments
    pub fn command(&self) -> Command {
        Command::decode(self.command.as_deref(), &self.args)
    }
}

/// What the invocation asks for
#[derive(Debug)]
pub enum Command {
    /// No command given
    Missing,
    /// A command that is not one of the known letters
    Invalid(String),
    /// `t` with arguments that do not describe a mode
    InvalidMode(ParseTargetError),
    /// `t`
    ChangeMode(TargetSpec),
    /// `d`
    ListModes,
    /// `h`
    Help,
    /// `v`
    Version,
}

impl Command {
    pub fn decode<S: AsRef<str>>(command: Option<&str>, args: &[S]) -> Command {
        let command = match command {
            Some(command) => command,
            None => return Command::Missing,
        };

        let decoded = match command {
            "t" => match TargetSpec::from_args(args) {
                Ok(target) => Command::ChangeMode(target),
                Err(err) => Command::InvalidMode(err),
            },
            "d" => Command::ListModes,
            "h" => Command::Help,
            "v" => Command::Version,
            _ => Command::Invalid(command.to_string()),
        };

        let takes_no_args =
            matches!(decoded, Command::ListModes | Command::Help | Command::Version);
        if takes_no_args && !args.is_empty() {
            debug!("Ignoring {} argument(s) after '{}'", args.len(), command);
        }

        decoded
    }
}

/// Runs one invocation, writing results to `out`.
///
/// Errors are returned unprinted; see [`write_error`].
pub fn run<S: DisplayService, W: Write>(service: &mut S, opt: &Opt, out: &mut W) -> DisplayResult {
    match opt.command() {
        Command::Missing => Err(DisplayModeError::MissingCommand),
        Command::Invalid(command) => Err(DisplayModeError::InvalidCommand(command)),
        Command::InvalidMode(err) => Err(err.into()),
        Command::Help => {
            writeln!(out, "{}", USAGE)?;
            Ok(())
        }
        Command::Version => {
            writeln!(out, "displaymode {}", env!("CARGO_PKG_VERSION"))?;
            writeln!(out, "Copyright 2019 Dean Scarff")?;
            Ok(())
        }
        Command::ListModes => {
            let catalogs = display_catalogs(service)?;
            if opt.json {
                write_catalogs_json(out, &catalogs).map_err(std::io::Error::from)?;
            } else {
                write_catalogs(out, &catalogs)?;
            }
            Ok(())
        }
        Command::ChangeMode(target) => {
            let change = change_mode(service, &target, opt.dry_run)?;
            writeln!(out, "{}", format_change(&change, target.refresh_rate.is_some()))?;
            Ok(())
        }
    }
}

/// Writes the diagnostic for a failed invocation. Usage errors are followed by a usage reminder.
pub fn write_error<W: Write>(err: &DisplayModeError, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "{}", err)?;
    if !err.is_usage() {
        return Ok(());
    }

    if let DisplayModeError::InvalidMode(_) = err {
        writeln!(out, "Run 'displaymode h' for usage.")
    } else {
        writeln!(out)?;
        writeln!(out, "{}", USAGE)
    }
}
