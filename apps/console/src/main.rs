mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    DecisionDraft, FindingsSession, HttpFindingsApi, ProviderBanner, SessionEvent,
};
use shared::domain::{DecisionKind, UserId};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use crate::config::{load_settings, Settings, DEFAULT_CONFIG_FILE};

#[derive(Parser, Debug)]
#[command(about = "Operator console for the live SoD findings stream")]
struct Args {
    /// Settings file; missing files are ignored.
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    /// Overrides the configured backend root.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one findings scan and print rows as they arrive.
    Scan,
    /// Scan, then preview removing one conflicting role.
    Simulate {
        #[arg(long)]
        user: String,
        #[arg(long)]
        role: String,
    },
    /// Scan, then record a remediation decision.
    Decide {
        #[arg(long)]
        user: String,
        /// accept_risk, revoke_role or investigate
        #[arg(long)]
        decision: DecisionKind,
        #[arg(long = "role")]
        roles: Vec<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Upload assignment and policy CSV files.
    Ingest {
        #[arg(long)]
        assignments: PathBuf,
        #[arg(long)]
        policies: Option<PathBuf>,
    },
    /// Download the audit evidence document.
    Evidence {
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(&args.config)?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .init();

    let api = HttpFindingsApi::new(
        &settings.server_url,
        Duration::from_secs(settings.request_timeout_secs),
    )
    .with_context(|| format!("cannot use server url {}", settings.server_url))?;

    match args.command {
        Command::Scan => {
            let session = new_session(&api, &settings);
            scan(&session, &api).await?;
        }
        Command::Simulate { user, role } => {
            let session = new_session(&api, &settings);
            scan(&session, &api).await?;
            let view = session
                .simulate(&UserId::new(user), Some(role.as_str()))
                .await?;
            println!("\n{view}");
        }
        Command::Decide {
            user,
            decision,
            roles,
            notes,
        } => {
            let session = new_session(&api, &settings);
            scan(&session, &api).await?;
            let form = session.open_decision(&UserId::new(user)).await?;
            let draft = build_draft(form.draft, decision, roles, notes);
            let response = session.submit_decision(draft).await?;
            println!("\n{}", response.message);
            if let Some(total) = response.total_decisions {
                println!("Decisions recorded this session on the server: {total}");
            }
        }
        Command::Ingest {
            assignments,
            policies,
        } => {
            let summary = api.ingest(&assignments, policies.as_deref()).await?;
            println!(
                "Assignments: {} valid of {} ({} corrupt)",
                summary.valid_assignment_rows,
                summary.total_assignment_rows,
                summary.corrupt_assignment_rows
            );
            println!(
                "Policies: {} valid of {} ({} corrupt)",
                summary.valid_policies, summary.total_policy_rows, summary.corrupt_policies
            );
            println!(
                "Users: {} processed, {} active, {} inactive",
                summary.users_processed, summary.active_users, summary.inactive_users
            );
        }
        Command::Evidence { out } => {
            let evidence = api.evidence().await?;
            match ProviderBanner::from_evidence(&evidence) {
                Some(banner) => println!("{banner}"),
                None => warn!("evidence document carries no llm_status metadata"),
            }
            let pretty = serde_json::to_string_pretty(&evidence)?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, pretty)
                        .await
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Evidence written to {}", path.display());
                }
                None => println!("{pretty}"),
            }
        }
    }

    Ok(())
}

fn new_session(api: &HttpFindingsApi, settings: &Settings) -> Arc<FindingsSession> {
    FindingsSession::new(Arc::new(api.clone()), settings.decided_by.clone())
}

fn build_draft(
    draft: DecisionDraft,
    decision: DecisionKind,
    roles: Vec<String>,
    notes: Option<String>,
) -> DecisionDraft {
    let mut draft = roles
        .into_iter()
        .fold(draft.with_decision(decision), |draft, role| draft.select_role(role));
    if let Some(notes) = notes {
        draft = draft.with_notes(notes);
    }
    draft
}

/// Runs one stream cycle, printing each row as it is appended.
async fn scan(session: &Arc<FindingsSession>, api: &HttpFindingsApi) -> Result<()> {
    let mut events = session.subscribe_events();
    let cycle = session.start_stream(Box::new(api.findings_source()?)).await;

    loop {
        match events.recv().await {
            Ok(SessionEvent::RowAppended { cycle: current, row }) if current == cycle => {
                println!("{row}");
            }
            Ok(SessionEvent::StreamFinished { cycle: current, .. }) if current == cycle => break,
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console: fell behind the session event feed");
            }
            Err(RecvError::Closed) => break,
        }
    }

    let snapshot = session.snapshot().await;
    if let Some(statistics) = &snapshot.statistics {
        println!("{statistics}");
    }
    println!("{}", snapshot.status_line);
    Ok(())
}
