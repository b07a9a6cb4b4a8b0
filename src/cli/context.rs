//! Shell state, dispatch, and argument helpers shared by every command.

use std::{
    collections::{HashMap, HashSet},
    io,
    path::PathBuf,
    sync::Arc,
};

use chrono::NaiveDate;
use strsim::levenshtein;
use uuid::Uuid;

use crate::{
    config::{Config, ConfigManager},
    core::{
        context::LedgerContext,
        services::RosterService,
        utils::PathResolver,
    },
    currency::{format_money, Money},
    errors::LedgerError,
    ledger::{BillingMonth, Room, Student},
    storage::{JsonStore, LedgerStore},
};

use super::commands::{self, CommandRegistry};
use super::output;

const BACKUP_RETENTION: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliMode {
    Interactive,
    Script,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopControl {
    Continue,
    Exit,
}

pub type CommandResult = Result<(), CommandError>;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("Input error: {0}")]
    Input(String),
    #[error("Command failed: {0}")]
    Command(String),
}

impl From<rustyline::error::ReadlineError> for CliError {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        CliError::Input(err.to_string())
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::Input(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{0}")]
    InvalidArguments(String),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("exit requested")]
    ExitRequested,
}

impl From<CommandError> for CliError {
    fn from(err: CommandError) -> Self {
        CliError::Command(err.to_string())
    }
}

pub struct ShellContext {
    pub mode: CliMode,
    pub registry: CommandRegistry,
    pub config: Config,
    pub config_manager: ConfigManager,
    pub store: Arc<JsonStore>,
    pub ledger: LedgerContext,
    pub last_command: Option<String>,
    pub running: bool,
}

impl ShellContext {
    pub fn new(mode: CliMode) -> Result<Self, CliError> {
        Self::with_base_dir(mode, PathResolver::base_dir())
    }

    pub fn with_base_dir(mode: CliMode, base: PathBuf) -> Result<Self, CliError> {
        let config_manager = ConfigManager::with_base_dir(base.clone())?;
        let config = config_manager.load()?;
        if !config_manager.path().exists() {
            config_manager.save(&config)?;
        }
        let store = Arc::new(JsonStore::with_options(
            &base,
            &config.book,
            BACKUP_RETENTION,
            config.billing.lock_timeout(),
        )?);
        let shared: Arc<dyn LedgerStore> = store.clone();
        let ledger = LedgerContext::new(shared, config.billing.clone());
        tracing::debug!(base = %base.display(), book = %config.book, ?mode, "shell ready");

        Ok(Self {
            mode,
            registry: CommandRegistry::new(commands::all_definitions()),
            config,
            config_manager,
            store,
            ledger,
            last_command: None,
            running: true,
        })
    }

    pub fn prompt(&self) -> String {
        format!("hostel-ledger({})> ", self.config.book)
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.registry.names().collect()
    }

    pub(crate) fn dispatch(
        &mut self,
        command: &str,
        raw: &str,
        args: &[&str],
    ) -> Result<LoopControl, CommandError> {
        let Some(handler) = self.registry.get(command).map(|definition| definition.handler) else {
            self.suggest_command(raw);
            return Ok(LoopControl::Continue);
        };
        match handler(self, args) {
            Ok(()) => Ok(LoopControl::Continue),
            Err(CommandError::ExitRequested) => Ok(LoopControl::Exit),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn process_line(&mut self, line: &str) -> Result<LoopControl, CommandError> {
        let tokens = match super::shell::parse_command_line(line) {
            Ok(tokens) => tokens,
            Err(err) => {
                output::warning(err);
                return Ok(LoopControl::Continue);
            }
        };
        let Some(raw) = tokens.first() else {
            return Ok(LoopControl::Continue);
        };
        if raw.starts_with('#') {
            return Ok(LoopControl::Continue);
        }
        let command = raw.to_lowercase();
        let args: Vec<&str> = tokens.iter().skip(1).map(String::as_str).collect();
        self.last_command = Some(line.trim().to_string());

        match self.dispatch(&command, raw, &args) {
            Ok(LoopControl::Exit) => {
                self.running = false;
                Ok(LoopControl::Exit)
            }
            other => other,
        }
    }

    pub(crate) fn suggest_command(&self, input: &str) {
        output::warning(format!(
            "Unknown command `{}`. Type `help` to see available commands.",
            input
        ));
        let best = self
            .registry
            .names()
            .map(|name| (levenshtein(name, &input.to_lowercase()), name))
            .min_by_key(|(distance, _)| *distance);
        if let Some((distance, name)) = best {
            if distance <= 3 {
                output::hint(format!("Did you mean `{}`?", name));
            }
        }
    }

    pub(crate) fn report_error(&self, err: CommandError) {
        match err {
            CommandError::ExitRequested => {}
            CommandError::InvalidArguments(message) => {
                output::error(message);
                output::hint("Use `help <command>` for usage details.");
            }
            CommandError::Ledger(err) if err.is_fatal() => {
                output::error(&err);
                output::hint("Postings for this student are blocked until the ledger is repaired.");
            }
            other => output::error(other),
        }
    }

    pub(crate) fn money(&self, amount: Money) -> String {
        format_money(amount, &self.config.currency, &self.config.locale)
    }

    pub(crate) fn student(&self, query: &str) -> Result<Student, CommandError> {
        Ok(RosterService::find_student(&self.ledger, query)?)
    }

    pub(crate) fn room(&self, number: &str) -> Result<Room, CommandError> {
        RosterService::find_room(&self.ledger, number)?
            .ok_or_else(|| CommandError::Ledger(LedgerError::RoomNotFound(number.to_string())))
    }

    pub(crate) fn room_number(&self, room_id: Option<Uuid>) -> String {
        room_id
            .and_then(|id| self.ledger.store.room(id).ok().flatten())
            .map(|room| room.number)
            .unwrap_or_else(|| "-".into())
    }

    pub(crate) fn today(&self) -> NaiveDate {
        self.ledger.clock.today()
    }
}

/// Positional arguments plus `--name value` options and bare `--switch` flags.
#[derive(Debug, Default)]
pub(crate) struct ParsedArgs<'a> {
    positional: Vec<&'a str>,
    options: HashMap<&'a str, Vec<&'a str>>,
    switches: HashSet<&'a str>,
}

impl<'a> ParsedArgs<'a> {
    pub(crate) fn parse(args: &[&'a str], switches: &[&str]) -> Result<Self, CommandError> {
        let mut parsed = ParsedArgs::default();
        let mut iter = args.iter().copied();
        while let Some(arg) = iter.next() {
            let Some(name) = arg.strip_prefix("--") else {
                parsed.positional.push(arg);
                continue;
            };
            if switches.contains(&name) {
                parsed.switches.insert(name);
                continue;
            }
            let value = iter.next().ok_or_else(|| {
                CommandError::InvalidArguments(format!("option `--{name}` needs a value"))
            })?;
            parsed.options.entry(name).or_default().push(value);
        }
        Ok(parsed)
    }

    pub(crate) fn positional(&self, index: usize, name: &str) -> Result<&'a str, CommandError> {
        self.positional
            .get(index)
            .copied()
            .ok_or_else(|| CommandError::InvalidArguments(format!("missing <{name}>")))
    }

    pub(crate) fn optional(&self, index: usize) -> Option<&'a str> {
        self.positional.get(index).copied()
    }

    pub(crate) fn rest(&self, from: usize) -> &[&'a str] {
        self.positional.get(from..).unwrap_or(&[])
    }

    pub(crate) fn option(&self, name: &str) -> Option<&'a str> {
        self.options.get(name).and_then(|values| values.last().copied())
    }

    pub(crate) fn options(&self, name: &str) -> &[&'a str] {
        self.options.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn has(&self, name: &str) -> bool {
        self.switches.contains(name)
    }
}

pub(crate) fn parse_money(input: &str) -> Result<Money, CommandError> {
    input
        .parse()
        .map_err(|_| CommandError::InvalidArguments(format!("invalid amount `{}`", input)))
}

pub(crate) fn parse_date(input: &str) -> Result<NaiveDate, CommandError> {
    NaiveDate::parse_from_str(input, "%Y-%m-%d").map_err(|_| {
        CommandError::InvalidArguments(format!("invalid date `{}` (use YYYY-MM-DD)", input))
    })
}

pub(crate) fn parse_month(input: &str) -> Result<BillingMonth, CommandError> {
    input.parse().map_err(|_| {
        CommandError::InvalidArguments(format!("invalid month `{}` (use YYYY-MM)", input))
    })
}

pub(crate) fn parse_optional_date(input: Option<&str>) -> Result<Option<NaiveDate>, CommandError> {
    input.map(parse_date).transpose()
}

pub(crate) fn short_id(id: Uuid) -> String {
    let mut short = id.simple().to_string();
    short.truncate(8);
    short
}
