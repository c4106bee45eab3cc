//! `flowline` -- terminal client for the Flowline CRM.
//!
//! Signs in with the configured account, loads leads and tasks, and runs a
//! single command against them.
//!
//! # Environment variables
//!
//! | Variable                        | Required | Default | Description                      |
//! |---------------------------------|----------|---------|----------------------------------|
//! | `FLOWLINE_URL`                  | yes      | --      | Hosted project base URL          |
//! | `FLOWLINE_ANON_KEY`             | yes      | --      | Public API key                   |
//! | `FLOWLINE_ACCESS_TOKEN`         | no       | --      | Bearer token; skips password     |
//! | `FLOWLINE_REFRESH_TOKEN`        | no       | --      | Used when the token has expired  |
//! | `FLOWLINE_EMAIL`                | yes*     | --      | Account email                    |
//! | `FLOWLINE_PASSWORD`             | yes*     | --      | Account password                 |
//!
//! \* Only when no access token is given.
//! | `FLOWLINE_REQUEST_TIMEOUT_SECS` | no       | `30`    | HTTP request timeout in seconds  |

use std::io::{BufRead, Write};

use anyhow::Context;
use flowline_cli::command::{Command, USAGE};
use flowline_cli::config::{self, SignIn};
use flowline_cli::render;
use flowline_client::{
    ClientError, ConfirmGate, CrmWorkspace, DeleteOutcome, SessionHandle, StatusChange,
};
use flowline_core::{metrics, search};
use flowline_remote::{AuthClient, RemoteConfig, RestClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Yes/no prompt on the controlling terminal.
struct StdinConfirm;

impl ConfirmGate for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        print!("{prompt} [y/N] ");
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if std::io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = match Command::parse(std::env::args().skip(1)) {
        Ok(Command::Help) => {
            println!("{USAGE}");
            return Ok(());
        }
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    let remote = RemoteConfig::from_env().context("invalid remote configuration")?;
    let sign_in = config::sign_in_from_env().context("missing credentials")?;
    tracing::info!(project_url = %remote.project_url, "Loaded configuration");

    let auth = AuthClient::new(&remote)?;
    let (session, owned) = match sign_in {
        SignIn::Password(credentials) => {
            let session = auth
                .sign_in_with_password(&credentials)
                .await
                .context("sign-in failed")?;
            (session, true)
        }
        SignIn::Token(session) if session.is_expired() && session.refresh_token.is_some() => {
            let session = auth.refresh(&session).await.context("token refresh failed")?;
            (session, false)
        }
        SignIn::Token(session) => (session, false),
    };

    let workspace = CrmWorkspace::over_rest(
        RestClient::new(&remote)?,
        SessionHandle::signed_in(session.clone()),
    );
    let result = run(&workspace, command).await;

    workspace.close();
    if owned {
        if let Err(e) = auth.sign_out(&session).await {
            tracing::warn!(error = %e, "Sign-out failed");
        }
    }
    if let Err(e) = &result {
        let sign_in_again = e
            .chain()
            .filter_map(|cause| cause.downcast_ref::<ClientError>())
            .any(ClientError::requires_sign_in);
        if sign_in_again {
            eprintln!("The session was rejected. Sign in again or set a fresh FLOWLINE_ACCESS_TOKEN.");
        }
    }
    result
}

async fn run(workspace: &CrmWorkspace, command: Command) -> anyhow::Result<()> {
    workspace.load_all().await.context("failed to load workspace")?;

    match command {
        Command::Leads { filter } => {
            let leads = workspace.leads.snapshot();
            let shown = search::filter_leads(&leads.items, filter.as_deref().unwrap_or_default());
            print!("{}", render::leads(&shown));
        }
        Command::Pipeline => print!("{}", render::pipeline(&workspace.pipeline())),
        Command::Dashboard => print!("{}", render::dashboard(&workspace.dashboard())),
        Command::Tasks { filter } => {
            let tasks = workspace.tasks.snapshot();
            let shown: Vec<_> =
                search::filter_tasks(&tasks.items, filter.as_deref().unwrap_or_default())
                    .into_iter()
                    .cloned()
                    .collect();
            print!("{}", render::task_board(&metrics::task_board(&shown)));
        }
        Command::MoveLead { id, stage } => {
            report(workspace.leads.update_status(&id, stage)?, "lead", &id).await?;
        }
        Command::TaskStatus { id, status } => {
            report(workspace.tasks.update_status(&id, status)?, "task", &id).await?;
        }
        Command::DeleteLead { id } => match workspace.leads.delete(&id, &StdinConfirm).await? {
            DeleteOutcome::Deleted => println!("Deleted lead {id}."),
            DeleteOutcome::Declined => println!("Kept lead {id}."),
        },
        Command::Search { query, scope } => {
            print!("{}", render::search_hits(&workspace.search(&query, scope, None)));
        }
        Command::Help => println!("{USAGE}"),
    }
    Ok(())
}

async fn report(change: StatusChange, entity: &str, id: &str) -> anyhow::Result<()> {
    match change {
        StatusChange::Absent => println!("No {entity} with id {id}."),
        StatusChange::Unchanged => println!("Nothing to change."),
        StatusChange::Closed => println!("Workspace closed, nothing sent."),
        StatusChange::Applied(pending) => {
            let outcome = pending.settled().await;
            println!("{}", render::write_outcome(&outcome));
            anyhow::ensure!(outcome.is_confirmed(), "{entity} {id} was not saved");
        }
    }
    Ok(())
}
