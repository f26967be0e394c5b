//! Operator command line.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;

use legalcity_enterprise::app::{self, Components};
use legalcity_enterprise::config::Config;
use legalcity_enterprise::db::AuditQuery;
use legalcity_enterprise::enterprise::case_id;
use legalcity_enterprise::enterprise::migration::MigrationOptions;
use legalcity_enterprise::enterprise::phase::RolloutPhase;
use legalcity_enterprise::enterprise::rbac::Actor;
use legalcity_enterprise::enterprise::types::Role;
use legalcity_enterprise::web::{self, AuthState, GatewayState};

#[derive(Debug, Parser)]
#[command(name = "legalcity-enterprise", version)]
#[command(about = "LegalCity enterprise case core: identifiers, migration, audit and rollout")]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the admin HTTP gateway until interrupted.
    Serve,
    /// Assign secure identifiers to legacy cases.
    Migrate {
        /// Count candidates without writing anything.
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        batch_size: Option<usize>,
        /// Dry run, migrate, validate, then initialize the rollout phase.
        #[arg(long, conflicts_with = "dry_run")]
        full: bool,
        /// Where the rollback file is written.
        #[arg(long, default_value = ".")]
        rollback_dir: PathBuf,
    },
    /// Restore cases from a rollback file written by `migrate`.
    Rollback {
        #[arg(long)]
        file: PathBuf,
    },
    /// Report identifier anomalies across all cases.
    Validate,
    Phase {
        #[command(subcommand)]
        command: PhaseCommand,
    },
    CaseId {
        #[command(subcommand)]
        command: CaseIdCommand,
    },
    Audit {
        #[command(subcommand)]
        command: AuditCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum PhaseCommand {
    /// Current phase, association rates and recommendations.
    Status,
    /// Store SOFT_WARNINGS if no phase is set yet.
    Init,
    Transition {
        #[arg(long)]
        to: String,
        #[arg(long)]
        reason: String,
        /// Administrator recorded as the actor in the audit ledger.
        #[arg(long)]
        actor_id: i64,
    },
}

#[derive(Debug, Subcommand)]
pub enum CaseIdCommand {
    Generate {
        #[arg(long)]
        practice_area: String,
    },
    Validate { id: String },
}

#[derive(Debug, Subcommand)]
pub enum AuditCommand {
    /// Recompute checksums of stored ledger entries.
    Verify {
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        // Identifier commands need neither configuration nor a database.
        Command::CaseId { command } => run_case_id(command),
        command => run_with_database(command).await,
    }
}

async fn run_with_database(command: Command) -> anyhow::Result<()> {
    let mut config = Config::from_env().context("failed to load configuration")?;
    let components = Components::from_config(&config)
        .await
        .with_context(|| format!("failed to open {}", config.database.path.display()))?;

    match command {
        Command::Serve => {
            let addr: SocketAddr = config
                .gateway
                .bind_addr()
                .parse()
                .with_context(|| format!("invalid gateway address {}", config.gateway.bind_addr()))?;
            let token = config.gateway.auth_token.take();
            if token.is_none() {
                tracing::warn!("GATEWAY_AUTH_TOKEN is not set, protected routes will reject every request");
            }
            let state = Arc::new(GatewayState::from_components(&components));
            let handle = web::start_server(addr, state, AuthState::new(token)).await?;
            println!("Admin gateway listening on http://{}", handle.addr);

            tokio::signal::ctrl_c()
                .await
                .context("failed to listen for ctrl-c")?;
            handle.shutdown().await;
        }
        Command::Migrate {
            dry_run,
            batch_size,
            full,
            rollback_dir,
        } => {
            let mut components = components;
            if let Some(size) = batch_size {
                if size == 0 {
                    bail!("--batch-size must be at least 1");
                }
                components.batch_size = size;
            }

            if full {
                let report = app::run_enterprise_migration(&components, &rollback_dir).await?;
                print_json(&report)?;
                if report.phase.is_none() {
                    bail!("validation issues detected, review before proceeding");
                }
                return Ok(());
            }

            let result = components
                .migrations
                .migrate(MigrationOptions {
                    dry_run,
                    batch_size: components.batch_size,
                })
                .await?;
            if !dry_run && !result.rollback_data.is_empty() {
                let path = app::save_rollback_file(&rollback_dir, &result.rollback_data)?;
                println!("Rollback data saved to {}", path.display());
            }
            print_json(&result)?;
        }
        Command::Rollback { file } => {
            let entries = app::load_rollback_file(&file)?;
            let report = components.migrations.rollback(&entries).await;
            print_json(&report)?;
            if !report.failures.is_empty() {
                bail!("{} case(s) could not be restored", report.failures.len());
            }
        }
        Command::Validate => {
            let validation = components.migrations.validate().await?;
            print_json(&validation)?;
            if !validation.is_clean() {
                bail!("identifier anomalies found");
            }
        }
        Command::Phase { command } => match command {
            PhaseCommand::Status => print_json(&components.phases.status().await?)?,
            PhaseCommand::Init => {
                let phase = components.phases.ensure_initialized().await?;
                println!("{phase}");
            }
            PhaseCommand::Transition {
                to,
                reason,
                actor_id,
            } => {
                let target: RolloutPhase = to.trim().to_ascii_uppercase().parse()?;
                let actor = Actor::new(actor_id, Role::Admin);
                let (transition, receipt) = components
                    .phases
                    .transition_audited(target, &actor, &reason)
                    .await?;
                // The process exits right after; let the ledger write land.
                receipt.settle().await;
                print_json(&transition)?;
            }
        },
        Command::Audit { command } => match command {
            AuditCommand::Verify { limit } => {
                let report = components
                    .ledger
                    .verify_stored(&AuditQuery {
                        limit,
                        ..Default::default()
                    })
                    .await?;
                print_json(&report)?;
                if !report.is_intact() {
                    bail!("{} audit entries failed verification", report.tampered.len());
                }
            }
        },
        Command::CaseId { command } => run_case_id(command)?,
    }
    Ok(())
}

fn run_case_id(command: CaseIdCommand) -> anyhow::Result<()> {
    match command {
        CaseIdCommand::Generate { practice_area } => {
            let identifier = case_id::generate_from_str(&practice_area.to_ascii_uppercase())?;
            println!("{}", identifier.display_id);
        }
        CaseIdCommand::Validate { id } => {
            if case_id::validate(&id) {
                println!("valid");
            } else {
                bail!("invalid case id: {id}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn migrate_flags_parse() {
        let cli = Cli::try_parse_from([
            "legalcity-enterprise",
            "--log-json",
            "migrate",
            "--batch-size",
            "25",
            "--rollback-dir",
            "/tmp/rb",
        ])
        .unwrap();
        assert!(cli.log_json);
        let Command::Migrate {
            dry_run,
            batch_size,
            full,
            rollback_dir,
        } = cli.command
        else {
            panic!("expected migrate");
        };
        assert!(!dry_run && !full);
        assert_eq!(batch_size, Some(25));
        assert_eq!(rollback_dir, PathBuf::from("/tmp/rb"));
    }

    #[test]
    fn full_and_dry_run_conflict() {
        assert!(
            Cli::try_parse_from(["legalcity-enterprise", "migrate", "--full", "--dry-run"]).is_err()
        );
    }

    #[test]
    fn phase_transition_requires_every_field() {
        assert!(
            Cli::try_parse_from([
                "legalcity-enterprise",
                "phase",
                "transition",
                "--to",
                "GATED_CREATION"
            ])
            .is_err()
        );
        let cli = Cli::try_parse_from([
            "legalcity-enterprise",
            "phase",
            "transition",
            "--to",
            "GATED_CREATION",
            "--reason",
            "adoption above target",
            "--actor-id",
            "1",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Phase {
                command: PhaseCommand::Transition { actor_id: 1, .. }
            }
        ));
    }

    #[test]
    fn case_id_commands_run_offline() {
        assert!(run_case_id(CaseIdCommand::Generate {
            practice_area: "family".to_string()
        })
        .is_ok());
        assert!(run_case_id(CaseIdCommand::Generate {
            practice_area: "ASTROLOGY".to_string()
        })
        .is_err());
        assert!(run_case_id(CaseIdCommand::Validate {
            id: "LC-2024-0001".to_string()
        })
        .is_err());
    }
}
