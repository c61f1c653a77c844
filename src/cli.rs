use std::{path::PathBuf, str::FromStr};

use thiserror::Error;

use crate::models::reminder::{
    NewReminder, ParseRecurrenceError, Recurrence, ReminderId, ReminderUpdate,
};

pub const MEDICINE_SUGGESTIONS: [&str; 10] = [
    "Paracetamol",
    "Ibuprofen",
    "Amoxicillin",
    "Metformin",
    "Aspirin",
    "Cetirizine",
    "Azithromycin",
    "Omeprazole",
    "Atorvastatin",
    "Vitamin C",
];

pub const HELP_TEXT: &str = "\
Commands:
  add <medicine> <HH:MM> [once|daily|weekly] [sms <phone>]
  list
  edit <id> [name=<medicine>] [time=<HH:MM>] [recurrence=<once|daily|weekly>] [sms=on|off] [phone=<phone>]
  remove <id>
  export [file]
  import <file>
  sms-now <phone> <message>
  meds [prefix]
  logout | quit";

/// Medicine names starting with `prefix`, ignoring case.
pub fn suggest_medicines(prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.trim().to_lowercase();
    MEDICINE_SUGGESTIONS
        .iter()
        .copied()
        .filter(|name| name.to_lowercase().starts_with(&prefix))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(NewReminder),
    List,
    Edit { id: ReminderId, update: ReminderUpdate },
    Remove(ReminderId),
    Export(Option<PathBuf>),
    Import(PathBuf),
    SmsNow { phone: String, message: String },
    Meds(String),
    Help,
    Logout,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}, type `help` for a list")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("invalid reminder id {0:?}")]
    InvalidId(String),

    #[error("unknown field {0:?}, expected name, time, recurrence, sms or phone")]
    UnknownField(String),

    #[error(transparent)]
    Recurrence(#[from] ParseRecurrenceError),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let name = words.next().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = words.collect();

        match name.to_ascii_lowercase().as_str() {
            "add" => parse_add(&args),
            "list" | "ls" => Ok(Command::List),
            "edit" => parse_edit(&args),
            "remove" | "rm" | "delete" => match args.as_slice() {
                [id] => Ok(Command::Remove(parse_id(id)?)),
                _ => Err(CommandError::Usage("remove <id>")),
            },
            "export" => match args.as_slice() {
                [] => Ok(Command::Export(None)),
                [path] => Ok(Command::Export(Some(PathBuf::from(path)))),
                _ => Err(CommandError::Usage("export [file]")),
            },
            "import" => match args.as_slice() {
                [path] => Ok(Command::Import(PathBuf::from(path))),
                _ => Err(CommandError::Usage("import <file>")),
            },
            "sms-now" => match args.as_slice() {
                [phone, message @ ..] if !message.is_empty() => Ok(Command::SmsNow {
                    phone: (*phone).to_owned(),
                    message: message.join(" "),
                }),
                _ => Err(CommandError::Usage("sms-now <phone> <message>")),
            },
            "meds" => Ok(Command::Meds(args.join(" "))),
            "help" | "?" => Ok(Command::Help),
            "logout" | "quit" | "exit" => Ok(Command::Logout),
            _ => Err(CommandError::Unknown(name.to_owned())),
        }
    }
}

fn parse_id(value: &str) -> Result<ReminderId, CommandError> {
    value
        .parse()
        .map_err(|_| CommandError::InvalidId(value.to_owned()))
}

fn looks_like_time(word: &str) -> bool {
    word.contains(':') && word.chars().all(|c| c.is_ascii_digit() || c == ':')
}

/// The medicine name runs up to the first word that looks like a time, so
/// names with spaces need no quoting. A missing name or time is left empty
/// for reminder validation to report.
fn parse_add(args: &[&str]) -> Result<Command, CommandError> {
    let time_index = args.iter().position(|word| looks_like_time(word));
    let (name, rest) = match time_index {
        Some(index) => (&args[..index], &args[index..]),
        None => (args, &[][..]),
    };

    let mut new_reminder = NewReminder {
        medicine_name: name.join(" "),
        time: rest.first().map(|t| (*t).to_owned()).unwrap_or_default(),
        recurrence: Recurrence::Once,
        send_sms: false,
        phone: String::new(),
    };

    let mut options = rest.iter().skip(1);
    while let Some(option) = options.next() {
        if option.eq_ignore_ascii_case("sms") {
            new_reminder.send_sms = true;
            new_reminder.phone = options.next().map(|p| (*p).to_owned()).unwrap_or_default();
        } else {
            new_reminder.recurrence = option.parse()?;
        }
    }

    Ok(Command::Add(new_reminder))
}

fn parse_edit(args: &[&str]) -> Result<Command, CommandError> {
    let (id, fields) = args
        .split_first()
        .ok_or(CommandError::Usage("edit <id> [field=value]..."))?;
    let id = parse_id(id)?;

    // Words without `=` continue the previous value, e.g. `name=Vitamin C`.
    let mut pairs: Vec<(String, String)> = Vec::new();
    for word in fields {
        if let Some((key, value)) = word.split_once('=') {
            pairs.push((key.to_ascii_lowercase(), value.to_owned()));
        } else if let Some((_, value)) = pairs.last_mut() {
            value.push(' ');
            value.push_str(word);
        } else {
            return Err(CommandError::Usage("edit <id> [field=value]..."));
        }
    }

    let mut update = ReminderUpdate::default();
    for (key, value) in pairs {
        match key.as_str() {
            "name" | "medicine" => update.medicine_name = Some(value),
            "time" => update.time = Some(value),
            "recurrence" => {
                if !value.trim().is_empty() {
                    update.recurrence = Some(value.parse()?);
                }
            }
            "sms" => update.send_sms = Some(matches!(value.as_str(), "on" | "yes" | "true")),
            "phone" => update.phone = Some(value),
            _ => return Err(CommandError::UnknownField(key)),
        }
    }

    Ok(Command::Edit { id, update })
}
