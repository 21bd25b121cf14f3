mod cache;
mod commands;
mod config;
mod error;
mod logging;
mod output;
mod policy;
mod query;
mod session;
mod shell;
mod sort;

use chrono::NaiveDate;
use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::output::{render_table, summary};
use crate::policy::cached_client::CachedPolicyClient;
use crate::policy::filter::FilterCriteria;
use crate::policy::service::{DeleteOutcome, PolicyService, SearchRequest};
use crate::policy::types::{PolicyDraft, PolicyStatus, PolicyType};
use crate::sort::{SortDirection, SortField, SortState};

#[derive(Parser, Debug)]
#[command(name = "pdesk")]
#[command(about = "Console for the insurance policy admin backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: ./pdesk.yaml, then $XDG_CONFIG_HOME/pdesk/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List every policy
  List {
    #[command(flatten)]
    view: ViewArgs,
  },
  /// Show policies by id
  Get {
    #[arg(required = true)]
    ids: Vec<i64>,
  },
  /// Search by id, policy number, or filters (in that order of precedence)
  Search {
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    number: Option<String>,
    #[command(flatten)]
    filters: FilterArgs,
    #[command(flatten)]
    view: ViewArgs,
  },
  /// Create a policy
  Create {
    #[arg(long)]
    number: String,
    #[command(flatten)]
    fields: PolicyFields,
  },
  /// Change fields of an existing policy
  Update {
    id: i64,
    #[command(flatten)]
    fields: PolicyFields,
  },
  /// Delete a policy
  Delete {
    id: i64,
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
  },
  /// Interactive console
  Shell,
}

#[derive(ClapArgs, Debug)]
struct ViewArgs {
  /// Sort column, e.g. premiumAmount or last_name
  #[arg(long)]
  sort: Option<SortField>,
  /// Sort descending
  #[arg(long, requires = "sort")]
  desc: bool,
  /// Bypass the cache and report backend errors
  #[arg(long)]
  fresh: bool,
}

impl ViewArgs {
  fn sort_state(&self) -> SortState {
    SortState {
      field: self.sort,
      direction: if self.desc {
        SortDirection::Descending
      } else {
        SortDirection::Ascending
      },
    }
  }
}

#[derive(ClapArgs, Debug)]
struct FilterArgs {
  #[arg(long)]
  start_date: Option<String>,
  #[arg(long)]
  end_date: Option<String>,
  #[arg(long)]
  status: Option<String>,
  #[arg(long = "type")]
  policy_type: Option<String>,
  #[arg(long)]
  make: Option<String>,
  #[arg(long)]
  min_premium: Option<String>,
  #[arg(long)]
  max_premium: Option<String>,
  #[arg(long)]
  first_name: Option<String>,
  #[arg(long)]
  last_name: Option<String>,
}

impl FilterArgs {
  fn into_criteria(self, policy_number: Option<String>) -> FilterCriteria {
    FilterCriteria {
      start_date: self.start_date,
      end_date: self.end_date,
      status: self.status,
      policy_type: self.policy_type,
      vehicle_make: self.make,
      min_premium: self.min_premium,
      max_premium: self.max_premium,
      first_name: self.first_name,
      last_name: self.last_name,
      policy_number,
    }
  }
}

#[derive(ClapArgs, Debug)]
struct PolicyFields {
  #[arg(long)]
  first_name: Option<String>,
  #[arg(long)]
  last_name: Option<String>,
  #[arg(long)]
  make: Option<String>,
  #[arg(long)]
  model: Option<String>,
  #[arg(long)]
  year: Option<i32>,
  #[arg(long = "type")]
  policy_type: Option<PolicyType>,
  #[arg(long)]
  status: Option<PolicyStatus>,
  #[arg(long)]
  premium: Option<f64>,
  /// YYYY-MM-DD
  #[arg(long)]
  start: Option<NaiveDate>,
  /// YYYY-MM-DD, must be after --start
  #[arg(long)]
  end: Option<NaiveDate>,
}

impl PolicyFields {
  fn into_draft(self, policy_number: String) -> PolicyDraft {
    PolicyDraft {
      policy_number,
      first_name: self.first_name,
      last_name: self.last_name,
      vehicle_make: self.make,
      vehicle_model: self.model,
      vehicle_year: self.year,
      policy_type: self.policy_type,
      status: self.status,
      premium_amount: self.premium,
      start_date: self.start,
      end_date: self.end,
    }
  }
}

async fn confirm(question: &str) -> Result<bool> {
  eprint!("{} [y/N] ", question);
  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  let answer = lines.next_line().await?.unwrap_or_default();
  Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

async fn run(command: Command, service: PolicyService) -> Result<()> {
  match command {
    Command::List { view } => {
      let result = service.list(view.fresh).await?;
      let sort = view.sort_state();
      print!("{}", render_table(&sort.apply(&result.data), sort));
      eprintln!("{}", summary(result.data.len(), result.source, result.age()));
    }
    Command::Get { ids } => {
      let results = futures::future::join_all(ids.iter().map(|id| service.get(*id))).await;
      let mut found = Vec::new();
      for (id, result) in ids.iter().zip(results) {
        match result? {
          Some(record) => found.push(record),
          None => eprintln!("Policy {} not found.", id),
        }
      }
      if !found.is_empty() {
        print!("{}", render_table(&found, SortState::default()));
      }
    }
    Command::Search {
      id,
      number,
      filters,
      view,
    } => {
      let request = SearchRequest {
        id,
        filters: filters.into_criteria(number),
        fresh: view.fresh,
      };
      let outcome = service.search(&request).await?;
      debug!(strategy = ?outcome.strategy, results = outcome.records.len(), "search done");
      let sort = view.sort_state();
      print!("{}", render_table(&sort.apply(&outcome.records), sort));
      eprintln!("{}", summary(outcome.records.len(), outcome.source, outcome.age()));
    }
    Command::Create { number, fields } => {
      let created = service.create(&fields.into_draft(number)).await?;
      println!("Created policy {} ({}).", created.id, created.policy_number);
    }
    Command::Update { id, fields } => {
      // The policy number is kept from the stored record
      let changes = fields.into_draft(String::new());
      let updated = service
        .update(id, changes)
        .await?
        .ok_or_else(|| eyre!("Policy {} not found", id))?;
      println!("Updated policy {} ({}).", updated.id, updated.policy_number);
    }
    Command::Delete { id, yes } => {
      let confirmed = yes || confirm(&format!("Delete policy {}?", id)).await?;
      match service.delete(id, confirmed).await? {
        DeleteOutcome::Deleted => println!("Policy {} deleted.", id),
        DeleteOutcome::Declined => println!("Delete cancelled."),
      }
    }
    Command::Shell => shell::Shell::new(service).run().await?,
  }
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;
  debug!(url = %config.api.url, cache = config.cache.enabled, "configuration loaded");

  let service = PolicyService::new(CachedPolicyClient::new(&config)?);
  run(args.command, service).await
}
