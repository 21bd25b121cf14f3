//! Line-based interactive console over a `SearchSession`.

use color_eyre::Result;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::debug;

use crate::cache::CacheStorage;
use crate::commands::{get_suggestions, resolve, CommandKind, COMMANDS};
use crate::error::ValidationError;
use crate::output::{extract_host, render_table, summary};
use crate::policy::filter::FilterCriteria;
use crate::policy::service::{DeleteOutcome, PolicyService, SearchRequest};
use crate::query::QueryState;
use crate::session::SearchSession;
use crate::sort::SortField;

/// A parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
  Search(SearchRequest),
  Sort(SortField),
  Delete(i64),
  Refresh,
  List,
  Clear,
  Help,
  Quit,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
  #[error("unknown command: {0}")]
  UnknownCommand(String),
  #[error("usage: {0}")]
  Usage(&'static str),
  #[error(transparent)]
  Invalid(#[from] ValidationError),
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<Action>, ParseError> {
  let mut words = line.split_whitespace();
  let Some(head) = words.next() else {
    return Ok(None);
  };
  let command = resolve(head).ok_or_else(|| ParseError::UnknownCommand(head.to_string()))?;
  let args: Vec<&str> = words.collect();

  let action = match command.kind {
    CommandKind::Search => Action::Search(parse_search(&args, command.usage)?),
    CommandKind::Sort => match args.as_slice() {
      [field] => Action::Sort(field.parse()?),
      _ => return Err(ParseError::Usage(command.usage)),
    },
    CommandKind::Delete => match args.as_slice() {
      [id] => Action::Delete(id.parse().map_err(|_| ValidationError::InvalidValue {
        field: "id",
        value: id.to_string(),
      })?),
      _ => return Err(ParseError::Usage(command.usage)),
    },
    CommandKind::Refresh => Action::Refresh,
    CommandKind::List => Action::List,
    CommandKind::Clear => Action::Clear,
    CommandKind::Help => Action::Help,
    CommandKind::Quit => Action::Quit,
  };
  Ok(Some(action))
}

/// `key=value` pairs; `id` selects the id lookup, `fresh` bypasses the cache.
fn parse_search(args: &[&str], usage: &'static str) -> Result<SearchRequest, ParseError> {
  let mut id = None;
  let mut fresh = false;
  let mut pairs = Vec::new();
  for arg in args {
    if *arg == "fresh" {
      fresh = true;
      continue;
    }
    let Some((key, value)) = arg.split_once('=') else {
      return Err(ParseError::Usage(usage));
    };
    if key.eq_ignore_ascii_case("id") {
      id = Some(value.to_string());
    } else {
      pairs.push((key, value));
    }
  }

  let request = SearchRequest {
    id,
    fresh,
    ..SearchRequest::with_filters(FilterCriteria::from_pairs(pairs)?)
  };
  request.parsed_id()?;
  Ok(request)
}

fn help_text() -> String {
  let mut text = String::from("Commands:\n");
  for cmd in COMMANDS {
    text.push_str(&format!("  {:<48} {}\n", cmd.usage, cmd.description));
  }
  text.push_str("\nFilter keys: ");
  text.push_str(&FilterCriteria::KEYS.join(", "));
  text.push_str("\nSort fields: ");
  let fields: Vec<String> = SortField::ALL
    .iter()
    .map(|f| format!("{} ({})", f.name(), f.kind().label()))
    .collect();
  text.push_str(&fields.join(", "));
  text.push('\n');
  text
}

pub struct Shell<S: CacheStorage + 'static> {
  service: PolicyService<S>,
  session: SearchSession<S>,
  lines: Lines<BufReader<Stdin>>,
}

impl<S: CacheStorage + 'static> Shell<S> {
  pub fn new(service: PolicyService<S>) -> Self {
    Self {
      session: SearchSession::new(service.clone()),
      service,
      lines: BufReader::new(tokio::io::stdin()).lines(),
    }
  }

  async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
    print!("{}", text);
    std::io::stdout().flush()?;
    Ok(self.lines.next_line().await?)
  }

  pub async fn run(mut self) -> Result<()> {
    println!(
      "pdesk connected to {}. Type 'help' for commands.",
      extract_host(self.service.base_url())
    );

    loop {
      // Pick up invalidations from our own mutations before prompting
      if self.session.tick() && self.session.is_loading() {
        self.show_results().await;
      }

      let Some(line) = self.prompt("pdesk> ").await? else {
        break;
      };

      let action = match parse_line(&line) {
        Ok(Some(action)) => action,
        Ok(None) => continue,
        Err(ParseError::UnknownCommand(input)) => {
          let suggestions: Vec<&str> = get_suggestions(&input).iter().map(|c| c.name).collect();
          if suggestions.is_empty() {
            println!("Unknown command '{}'. Type 'help'.", input);
          } else {
            println!("Unknown command '{}'. Did you mean: {}?", input, suggestions.join(", "));
          }
          continue;
        }
        Err(e) => {
          println!("{}", e);
          continue;
        }
      };
      debug!(?action, "shell action");

      match action {
        Action::Quit => break,
        Action::Help => print!("{}", help_text()),
        Action::Search(request) => {
          self.session.search(request);
          self.show_results().await;
        }
        Action::Refresh => {
          if self.session.refresh() {
            self.show_results().await;
          } else {
            println!("Nothing to refresh. Run a search first.");
          }
        }
        Action::Sort(field) => {
          self.session.sort_by(field);
          print!("{}", render_table(self.session.records(), self.session.sort_state()));
        }
        Action::Clear => {
          self.session.clear();
          println!("Search cleared.");
        }
        Action::List => match self.service.list(false).await {
          Ok(result) => {
            let records = self.session.sort_state().apply(&result.data);
            print!("{}", render_table(&records, self.session.sort_state()));
            println!("{}", summary(records.len(), result.source, result.age()));
          }
          Err(e) => println!("{}", e),
        },
        Action::Delete(id) => self.delete(id).await?,
      }
    }
    Ok(())
  }

  async fn delete(&mut self, id: i64) -> Result<()> {
    let answer = self.prompt(&format!("Delete policy {}? [y/N] ", id)).await?;
    let confirmed = answer
      .map(|a| matches!(a.trim().to_lowercase().as_str(), "y" | "yes"))
      .unwrap_or(false);

    match self.session.delete(id, confirmed).await {
      Ok(DeleteOutcome::Deleted) => println!("Policy {} deleted.", id),
      Ok(DeleteOutcome::Declined) => println!("Delete cancelled."),
      Err(e) => println!("Delete failed: {}", e),
    }
    Ok(())
  }

  async fn show_results(&mut self) {
    let footer = match self.session.settle().await {
      Some(QueryState::Success(outcome)) => {
        summary(outcome.records.len(), outcome.source, outcome.age())
      }
      Some(QueryState::Error(e)) => {
        println!("Search failed: {}", e);
        return;
      }
      _ => return,
    };
    print!("{}", render_table(self.session.records(), self.session.sort_state()));
    println!("{}", footer);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_blank_line() {
    assert_eq!(parse_line("   "), Ok(None));
  }

  #[test]
  fn test_search_with_filters_and_id() {
    let action = parse_line("s id=7 lastName=Doe status=ACTIVE").unwrap();
    let Some(Action::Search(request)) = action else {
      panic!("expected search, got {:?}", action);
    };
    assert_eq!(request.id.as_deref(), Some("7"));
    assert_eq!(request.filters.last_name.as_deref(), Some("Doe"));
    assert!(!request.fresh);
  }

  #[test]
  fn test_search_fresh_flag() {
    let Ok(Some(Action::Search(request))) = parse_line("search fresh policy_number=AP-1") else {
      panic!("expected search");
    };
    assert!(request.fresh);
    assert_eq!(request.policy_number(), Some("AP-1"));
  }

  #[test]
  fn test_search_rejects_bad_input() {
    assert_eq!(parse_line("search Doe"), Err(ParseError::Usage(COMMANDS[0].usage)));
    assert!(matches!(
      parse_line("search colour=red"),
      Err(ParseError::Invalid(ValidationError::UnknownFilter(_)))
    ));
    assert!(matches!(
      parse_line("search id=abc"),
      Err(ParseError::Invalid(ValidationError::InvalidValue { field: "id", .. }))
    ));
  }

  #[test]
  fn test_sort_and_delete() {
    assert_eq!(
      parse_line("order premium_amount"),
      Ok(Some(Action::Sort(SortField::PremiumAmount)))
    );
    assert!(matches!(
      parse_line("sort colour"),
      Err(ParseError::Invalid(ValidationError::UnknownSortField(_)))
    ));
    assert_eq!(parse_line("rm 12"), Ok(Some(Action::Delete(12))));
    assert!(matches!(parse_line("delete"), Err(ParseError::Usage(_))));
  }

  #[test]
  fn test_unknown_command() {
    assert_eq!(
      parse_line("frobnicate"),
      Err(ParseError::UnknownCommand("frobnicate".to_string()))
    );
  }

  #[test]
  fn test_help_lists_every_command_and_field() {
    let text = help_text();
    for cmd in COMMANDS {
      assert!(text.contains(cmd.usage));
    }
    assert!(text.contains("premiumAmount (number)"));
    assert!(text.contains("lastName"));
  }
}
