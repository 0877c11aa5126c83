//! # Dutyroll — weekly duty rotation
//!
//! Usage:
//!   dutyroll serve                        # Run the weekly trigger until ctrl-c
//!   dutyroll shuffle                      # Reshuffle this week now
//!   dutyroll schedule                     # Show this week's schedule
//!   dutyroll my-tasks 123456789           # One member's tasks
//!   dutyroll set-notification 0 9         # Remind on Monday at 09:00
//!   dutyroll member add 123456789 Alice   # Roster administration

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dutyroll_core::{DutyrollConfig, RotationOutcome};
use dutyroll_scheduler::{RotaDb, RotationEngine, RotationService, dispatch, format};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dutyroll", version, about = "🧹 Dutyroll — weekly duty rotation")]
struct Cli {
    /// Config file (default: ~/.dutyroll/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database path, overrides the config file
    #[arg(long)]
    db_path: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Arm the weekly trigger and run until interrupted
    Serve,
    /// Reshuffle the current week's assignments
    Shuffle {
        /// Also send the new schedule to the group and each member
        #[arg(long)]
        notify: bool,
    },
    /// Show the current week's schedule
    Schedule,
    /// Show one member's tasks this week
    MyTasks { external_id: i64 },
    /// Set the weekly reminder slot (day 0=Mon..6=Sun, hour 0-23)
    SetNotification { day: u32, hour: u32 },
    /// Send the current schedule to the group now
    Notify,
    /// Manage members
    #[command(subcommand)]
    Member(MemberCommand),
    /// Manage tasks
    #[command(subcommand)]
    Task(TaskCommand),
}

#[derive(Subcommand)]
enum MemberCommand {
    Add {
        external_id: i64,
        name: String,
        #[arg(long)]
        username: Option<String>,
    },
    Remove { external_id: i64 },
    List,
}

#[derive(Subcommand)]
enum TaskCommand {
    Add { name: String, required_people: u32 },
    Remove { name: String },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "dutyroll=debug,dutyroll_scheduler=debug"
    } else {
        "dutyroll=info,dutyroll_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => {
            let mut config = DutyrollConfig::load_from(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => DutyrollConfig::load()?,
    };
    if let Some(db_path) = &cli.db_path {
        config.database.path = db_path.clone();
    }

    let db_path = config.database.resolved_path();
    let db = Arc::new(
        RotaDb::open(&db_path).with_context(|| format!("opening {}", db_path.display()))?,
    );
    let engine = Arc::new(RotationEngine::new(db.clone(), db.clone()));
    let notifier = dispatch::notifier_from_config(&config.telegram);
    let service = RotationService::new(
        engine.clone(),
        db.clone(),
        notifier,
        config.notification.default_slot()?,
    );

    match cli.command {
        Command::Serve => serve(&service).await?,
        Command::Shuffle { notify } => {
            let outcome = engine.run_rotation().await.context("rotation failed")?;
            println!("{}", format::rotation_text(&outcome, engine.current_period()));
            if notify && matches!(outcome, RotationOutcome::Assigned(_)) {
                service.send_weekly_notification().await?;
                let sent = service.notify_members().await?;
                println!("📨 Notified {sent} members");
            }
        }
        Command::Schedule => {
            let lookup = engine.get_current_schedule()?;
            println!("{}", format::lookup_text(&lookup, engine.current_period()));
        }
        Command::MyTasks { external_id } => {
            let tasks = engine.get_assignments_for(external_id)?;
            match format::member_tasks(&tasks) {
                Some(text) => println!("{text}"),
                None => println!("✨ No tasks assigned this week."),
            }
        }
        Command::SetNotification { day, hour } => {
            let slot = service.configure_trigger(day, hour)?;
            println!("✅ Notifications set to {slot}");
        }
        Command::Notify => {
            if !service.send_weekly_notification().await? {
                anyhow::bail!("notification delivery failed, see log");
            }
        }
        Command::Member(cmd) => member_command(&db, cmd)?,
        Command::Task(cmd) => task_command(&db, cmd)?,
    }

    Ok(())
}

async fn serve(service: &RotationService) -> Result<()> {
    let slot = service.start()?;
    tracing::info!("🧹 Dutyroll running; next reminder on {}", slot);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    service.shutdown().await;
    Ok(())
}

fn member_command(db: &RotaDb, cmd: MemberCommand) -> Result<()> {
    match cmd {
        MemberCommand::Add {
            external_id,
            name,
            username,
        } => {
            let member = db.add_member(external_id, &name, username.as_deref())?;
            println!("✅ Added member: {} ({})", member.name, member.external_id);
        }
        MemberCommand::Remove { external_id } => {
            if db.deactivate_member(external_id)? {
                println!("✅ Removed member {external_id}");
            } else {
                println!("⚠️ Member with ID {external_id} not found.");
            }
        }
        MemberCommand::List => {
            let members = db.list_members()?;
            if members.is_empty() {
                println!("📋 No members registered yet.");
            }
            for m in members {
                let status = if m.active { "✅" } else { "❌" };
                println!("{status} {} ({})", m.name, m.external_id);
            }
        }
    }
    Ok(())
}

fn task_command(db: &RotaDb, cmd: TaskCommand) -> Result<()> {
    match cmd {
        TaskCommand::Add {
            name,
            required_people,
        } => {
            let task = db.add_task(&name, required_people)?;
            println!("✅ Added task: {} (requires {} people)", task.name, task.required_people);
        }
        TaskCommand::Remove { name } => {
            if db.deactivate_task(&name)? {
                println!("✅ Removed task: {name}");
            } else {
                println!("⚠️ Task '{name}' not found.");
            }
        }
        TaskCommand::List => {
            let tasks = db.list_tasks()?;
            if tasks.is_empty() {
                println!("📋 No tasks created yet.");
                return Ok(());
            }
            let mut total = 0;
            for t in &tasks {
                let status = if t.active { "✅" } else { "❌" };
                println!("{status} {} - {} people", t.name, t.required_people);
                if t.active {
                    total += t.required_people;
                }
            }
            println!("Total: {total} people needed");
        }
    }
    Ok(())
}
