//! Line-oriented control console
//!
//! Each stdin line is one command:
//!
//! ```text
//! load /uploads/2024-05-01T10:00:00     upload ./talk.mp4
//! reset | clear | shuffle | sort        remove-words | remove-spaces | forget
//! move <id> <index>                     copy <transcript-index> <index>
//! play | pause | toggle                 loop on|off
//! knob <index> <value>                  volume <value>
//! list | status | help | quit
//! ```

use std::path::PathBuf;

use splice_core::sequence::{DragSource, FilterKind};
use splice_core::sync::{Command, Mutation};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  load <url>               load a video by base URL
  upload <path>            upload a video for transcription, then load it
  reset | clear            rebuild the sequence from the transcript / empty it
  shuffle | sort           reorder the sequence
  remove-words | remove-spaces | forget
  move <id> <index>        move a sequence block
  copy <source> <index>    copy transcript block <source> into the sequence
  play | pause | toggle
  loop on|off
  knob <index> <value>     set a mixer knob (0..1)
  volume <value>           same as knob 0
  list | status | help | quit";

/// A parsed console line
#[derive(Debug)]
pub enum ConsoleCommand {
    Session(Command),
    Load(String),
    Upload(PathBuf),
    List,
    Status,
    Help,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

fn arg<T: std::str::FromStr>(
    value: Option<&str>,
    usage: &'static str,
) -> Result<T, ParseError> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or(ParseError::Usage(usage))
}

/// Parse one console line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, ParseError> {
    let mut words = line.split_whitespace();
    let Some(name) = words.next() else {
        return Ok(None);
    };
    let first = words.next();
    let second = words.next();

    let command = match name {
        "load" => ConsoleCommand::Load(arg(first, "load <url>")?),
        "upload" => ConsoleCommand::Upload(arg(first, "upload <path>")?),
        "reset" => ConsoleCommand::Session(Command::Mutate(Mutation::Reset)),
        "clear" => ConsoleCommand::Session(Command::Mutate(Mutation::Clear)),
        "shuffle" => ConsoleCommand::Session(Command::Mutate(Mutation::Shuffle)),
        "sort" => ConsoleCommand::Session(Command::Mutate(Mutation::Sort)),
        "remove-words" | "remove-spaces" | "forget" => {
            let kind: FilterKind = name.parse().map_err(|_| ParseError::Unknown(name.into()))?;
            ConsoleCommand::Session(Command::Mutate(Mutation::Filter(kind)))
        }
        "move" => {
            let id = arg(first, "move <id> <index>")?;
            let index = arg(second, "move <id> <index>")?;
            ConsoleCommand::Session(Command::Mutate(Mutation::Move {
                source: DragSource::Editor(id),
                destination: Some(index),
            }))
        }
        "copy" => {
            let source = arg(first, "copy <source> <index>")?;
            let index = arg(second, "copy <source> <index>")?;
            ConsoleCommand::Session(Command::Mutate(Mutation::Move {
                source: DragSource::Transcript(source),
                destination: Some(index),
            }))
        }
        "play" => ConsoleCommand::Session(Command::Play),
        "pause" => ConsoleCommand::Session(Command::Pause),
        "toggle" => ConsoleCommand::Session(Command::Toggle),
        "loop" => match first {
            Some("on") => ConsoleCommand::Session(Command::SetLooping(true)),
            Some("off") => ConsoleCommand::Session(Command::SetLooping(false)),
            _ => return Err(ParseError::Usage("loop on|off")),
        },
        "knob" => ConsoleCommand::Session(Command::SetKnob {
            index: arg(first, "knob <index> <value>")?,
            value: arg(second, "knob <index> <value>")?,
        }),
        "volume" => ConsoleCommand::Session(Command::SetKnob {
            index: 0,
            value: arg(first, "volume <value>")?,
        }),
        "list" => ConsoleCommand::List,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(ParseError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}
