//! Available commands and autocomplete logic

use crate::routes::Route;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  Command {
    name: "orders",
    aliases: &["o", "list", "home"],
    description: "Order list",
  },
  Command {
    name: "new",
    aliases: &["n", "add", "create"],
    description: "Create an order",
  },
  Command {
    name: "edit",
    aliases: &["e"],
    description: "Edit order <id>",
  },
  Command {
    name: "stats",
    aliases: &["s", "statistics"],
    description: "Order statistics",
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit shop-order-tracker",
  },
];

/// What a submitted command line asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandTarget {
  Navigate(Route),
  Quit,
}

/// Resolve a submitted command line such as `edit 12`.
pub fn resolve(input: &str) -> Option<CommandTarget> {
  let mut words = input.split_whitespace();
  let word = words.next()?.to_lowercase();
  let arg = words.next();

  let cmd = COMMANDS
    .iter()
    .find(|c| c.name == word || c.aliases.contains(&word.as_str()))?;

  match cmd.name {
    "orders" => Some(CommandTarget::Navigate(Route::OrderList)),
    "new" => Some(CommandTarget::Navigate(Route::NewOrder)),
    "edit" => arg
      .and_then(|id| id.parse::<i64>().ok())
      .map(|id| CommandTarget::Navigate(Route::EditOrder(id))),
    "stats" => Some(CommandTarget::Navigate(Route::Stats)),
    "quit" => Some(CommandTarget::Quit),
    _ => None,
  }
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_input_returns_all() {
    let suggestions = get_suggestions("");
    assert_eq!(suggestions.len(), COMMANDS.len());
  }

  #[test]
  fn test_exact_match() {
    let suggestions = get_suggestions("stats");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "stats");
  }

  #[test]
  fn test_alias_match() {
    let suggestions = get_suggestions("n");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "new");
  }

  #[test]
  fn test_prefix_match() {
    let suggestions = get_suggestions("ord");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "orders");
  }

  #[test]
  fn test_fuzzy_match() {
    let suggestions = get_suggestions("tat");
    assert!(!suggestions.is_empty());
    assert_eq!(suggestions[0].name, "stats");
  }

  #[test]
  fn test_resolve_navigation() {
    assert_eq!(
      resolve("orders"),
      Some(CommandTarget::Navigate(Route::OrderList))
    );
    assert_eq!(resolve("add"), Some(CommandTarget::Navigate(Route::NewOrder)));
    assert_eq!(
      resolve("edit 12"),
      Some(CommandTarget::Navigate(Route::EditOrder(12)))
    );
    assert_eq!(resolve(" Q "), Some(CommandTarget::Quit));
  }

  #[test]
  fn test_resolve_rejects_bad_input() {
    assert_eq!(resolve("edit"), None);
    assert_eq!(resolve("edit twelve"), None);
    assert_eq!(resolve("reports"), None);
    assert_eq!(resolve(""), None);
  }
}
