//! Command-line parsing for the `flowline` binary.

use flowline_core::search::SearchScope;
use flowline_core::{CoreError, PipelineStage, TaskStatus};

pub const USAGE: &str = "\
Usage: flowline <command> [args]

Commands:
  leads [filter]                 List leads, optionally filtered by name or company
  pipeline                       Lead count and value per pipeline stage
  dashboard                      Headline figures
  tasks [filter]                 Task board, optionally filtered by title or description
  move-lead <id> <stage>         Move a lead to another pipeline stage
  task-status <id> <status>      Move a task to another board column
  delete-lead <id>               Delete a lead (asks for confirmation)
  search <query> [all|leads|tasks]
  help                           Show this message";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Leads { filter: Option<String> },
    Pipeline,
    Dashboard,
    Tasks { filter: Option<String> },
    MoveLead { id: String, stage: PipelineStage },
    TaskStatus { id: String, status: TaskStatus },
    DeleteLead { id: String },
    Search { query: String, scope: SearchScope },
    Help,
}

#[derive(Debug, thiserror::Error)]
pub enum UsageError {
    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("missing argument <{0}>")]
    Missing(&'static str),

    #[error("unexpected argument {0:?}")]
    Unexpected(String),

    #[error(transparent)]
    Invalid(#[from] CoreError),
}

impl Command {
    /// Parse the arguments following the program name.
    pub fn parse<I>(args: I) -> Result<Self, UsageError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let Some(name) = args.next() else {
            return Ok(Command::Help);
        };

        let command = match name.as_str() {
            "leads" => Command::Leads {
                filter: args.next(),
            },
            "pipeline" => Command::Pipeline,
            "dashboard" => Command::Dashboard,
            "tasks" => Command::Tasks {
                filter: args.next(),
            },
            "move-lead" => Command::MoveLead {
                id: required(&mut args, "id")?,
                stage: required(&mut args, "stage")?.parse()?,
            },
            "task-status" => Command::TaskStatus {
                id: required(&mut args, "id")?,
                status: required(&mut args, "status")?.parse()?,
            },
            "delete-lead" => Command::DeleteLead {
                id: required(&mut args, "id")?,
            },
            "search" => Command::Search {
                query: required(&mut args, "query")?,
                scope: match args.next() {
                    Some(scope) => scope.parse()?,
                    None => SearchScope::All,
                },
            },
            "help" | "-h" | "--help" => Command::Help,
            other => return Err(UsageError::UnknownCommand(other.to_string())),
        };

        match args.next() {
            Some(extra) => Err(UsageError::Unexpected(extra)),
            None => Ok(command),
        }
    }
}

fn required(
    args: &mut impl Iterator<Item = String>,
    what: &'static str,
) -> Result<String, UsageError> {
    args.next().ok_or(UsageError::Missing(what))
}
