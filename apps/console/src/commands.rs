//! Console input parsed into session commands.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Connectors,
    Connect { connector: String },
    Disconnect,
    Value,
    Increase { amount: String },
    Transfer { recipient: String, amount: String },
    Status { json: bool },
    StopTracking,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Connectors => "connectors",
            ConsoleCommand::Connect { .. } => "connect",
            ConsoleCommand::Disconnect => "disconnect",
            ConsoleCommand::Value => "value",
            ConsoleCommand::Increase { .. } => "increase",
            ConsoleCommand::Transfer { .. } => "transfer",
            ConsoleCommand::Status { .. } => "status",
            ConsoleCommand::StopTracking => "stop",
            ConsoleCommand::Help => "help",
            ConsoleCommand::Quit => "quit",
        }
    }
}

pub const HELP: &str = "\
commands:
  connectors                   list wallet connectors
  connect <connector>          connect a wallet (e.g. argentX, braavos)
  disconnect                   disconnect the wallet
  value                        re-read your current value
  increase <amount>            increase your value
  transfer <recipient> <amount>
                               transfer value to another address
  status [--json]              show session state
  stop                         stop tracking the pending transaction
  help                         show this help
  quit                         exit";

/// Parses one input line. Missing amounts are passed on empty so the session
/// reports them the same way as an empty form field.
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let rest: Vec<&str> = words.collect();
    let arg = |idx: usize| rest.get(idx).map(|s| s.to_string()).unwrap_or_default();

    let command = match head.to_ascii_lowercase().as_str() {
        "connectors" => ConsoleCommand::Connectors,
        "connect" => {
            if rest.is_empty() {
                return Err("usage: connect <connector>".to_string());
            }
            ConsoleCommand::Connect { connector: arg(0) }
        }
        "disconnect" => ConsoleCommand::Disconnect,
        "value" | "refresh" => ConsoleCommand::Value,
        "increase" => ConsoleCommand::Increase { amount: arg(0) },
        "transfer" => ConsoleCommand::Transfer {
            recipient: arg(0),
            amount: arg(1),
        },
        "status" => ConsoleCommand::Status {
            json: rest.contains(&"--json"),
        },
        "stop" => ConsoleCommand::StopTracking,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(Some(command))
}
