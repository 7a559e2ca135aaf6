//! Line commands accepted by the driver.

use depot_core::{DomainError, DomainResult};
use depot_inventory::SortMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    List,
    Search(String),
    Sort(SortMode),
    /// Item text (display name or `name[@damage]`) and optional count.
    Withdraw { item: String, count: Option<u32> },
    DepositAll,
    Usage,
    Help,
    Quit,
}

impl Command {
    /// Parse one input line; blank lines yield `None`.
    pub fn parse(line: &str) -> DomainResult<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };

        let command = match verb.to_lowercase().as_str() {
            "refresh" | "r" => Self::Refresh,
            "list" | "ls" => Self::List,
            "search" | "find" => Self::Search(rest.to_string()),
            "sort" => Self::Sort(rest.parse()?),
            "withdraw" | "get" => parse_withdraw(rest)?,
            "deposit" | "put" => Self::DepositAll,
            "usage" | "df" => Self::Usage,
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => return Err(DomainError::validation(format!("unknown command `{other}`"))),
        };
        Ok(Some(command))
    }
}

/// `withdraw <item words...> [count]`: a trailing number is the count.
fn parse_withdraw(rest: &str) -> DomainResult<Command> {
    let mut words: Vec<&str> = rest.split_whitespace().collect();
    let count = match words.last().map(|w| w.parse::<u32>()) {
        Some(Ok(n)) if words.len() > 1 => {
            words.pop();
            Some(n)
        }
        _ => None,
    };
    if words.is_empty() {
        return Err(DomainError::validation("withdraw needs an item"));
    }
    Ok(Command::Withdraw {
        item: words.join(" "),
        count,
    })
}

pub const HELP: &str = "\
commands:
  refresh                     rescan every backend
  list                        show stored items
  search <text>               filter by display name (empty clears)
  sort quantity|name          change ordering
  withdraw <item> [count]     default count is one full stack
  deposit                     store everything in the local inventory
  usage                       slot and unit totals
  quit";
