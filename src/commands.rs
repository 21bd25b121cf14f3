/// Shell commands and autocomplete logic

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
  Search,
  Sort,
  Delete,
  Refresh,
  List,
  Clear,
  Help,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub kind: CommandKind,
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub usage: &'static str,
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    kind: CommandKind::Search,
    name: "search",
    aliases: &["s", "find", "f"],
    usage: "search [id=N] [policyNumber=X] [key=value...]",
    description: "Search policies (id beats policy number beats filters)",
  },
  Command {
    kind: CommandKind::Sort,
    name: "sort",
    aliases: &["o", "order"],
    usage: "sort <field>",
    description: "Sort results; repeat to flip direction",
  },
  Command {
    kind: CommandKind::Delete,
    name: "delete",
    aliases: &["d", "del", "rm"],
    usage: "delete <id>",
    description: "Delete a policy after confirmation",
  },
  Command {
    kind: CommandKind::Refresh,
    name: "refresh",
    aliases: &["r", "reload"],
    usage: "refresh",
    description: "Re-run the last search against the backend",
  },
  Command {
    kind: CommandKind::List,
    name: "list",
    aliases: &["l", "ls", "all"],
    usage: "list",
    description: "List every policy",
  },
  Command {
    kind: CommandKind::Clear,
    name: "clear",
    aliases: &["c", "reset"],
    usage: "clear",
    description: "Forget the current search and results",
  },
  Command {
    kind: CommandKind::Help,
    name: "help",
    aliases: &["h", "?"],
    usage: "help",
    description: "Show this help",
  },
  Command {
    kind: CommandKind::Quit,
    name: "quit",
    aliases: &["q", "exit"],
    usage: "quit",
    description: "Exit pdesk",
  },
];

/// Match priority, lower is better. Fuzzy matches start at 4.
fn ranked(input: &str) -> Vec<(&'static Command, u32)> {
  let input_lower = input.to_lowercase();
  let mut matches: Vec<(&'static Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    if cmd.name == input_lower {
      matches.push((cmd, 0));
    } else if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
    } else if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
    } else if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
    } else if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
    } else if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  matches.sort_by_key(|(_, priority)| *priority);
  matches
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  if input.is_empty() {
    return COMMANDS.iter().collect();
  }
  ranked(input).into_iter().map(|(cmd, _)| cmd).collect()
}

/// Resolve typed input to a command by name, alias or prefix. Fuzzy matches don't count.
pub fn resolve(input: &str) -> Option<&'static Command> {
  if input.is_empty() {
    return None;
  }
  ranked(input)
    .into_iter()
    .find(|(_, priority)| *priority <= 3)
    .map(|(cmd, _)| cmd)
}
