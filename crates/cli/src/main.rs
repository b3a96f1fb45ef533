//! Operator CLI for the LIS session & workflow layer.
//!
//! Drives the same stores and orchestrator the screens use, against a live
//! backend: pick a work room, browse the request list, and commit a handover
//! transition. Session state lives in a directory so it survives between
//! invocations the way the browser session survives reloads.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use lis_api_client::{HistoryFilter, LabApi, RestClient};
use lis_session::{
    CurrentRoomContext, CurrentRoomSelection, FileStorage, SessionStorage, TabDescriptor,
    TabSessionStore,
};
use lis_types::{
    ActionType, ReceptionCode, ServiceId, StainingMethodId, StateId, StoredServiceRequestId,
    UserId,
};
use lis_workflow::{SelectedRequest, TransitionDraft, TransitionOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "lis")]
#[command(about = "LIS workflow client")]
struct Cli {
    /// Lab backend base URL
    #[arg(long, env = "LIS_API_URL", default_value = "http://127.0.0.1:8080")]
    api_url: String,

    /// Bearer token issued by the auth layer
    #[arg(long, env = "LIS_API_TOKEN")]
    token: Option<String>,

    /// Directory holding durable session state
    #[arg(long, env = "LIS_SESSION_DIR", default_value = ".lis-session")]
    session_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List workflow states in order
    States,
    /// List departments and their rooms
    Rooms,
    /// Select the current work room
    UseRoom {
        /// Room id or room code
        room: String,
    },
    /// List workflow history for the current room
    History {
        /// Narrow to one workflow state id
        #[arg(long)]
        state: Option<String>,
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// End date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Reception code filter
        #[arg(long)]
        code: Option<String>,
    },
    /// Commit a handover transition for one request
    Handover {
        /// Stored service request id
        request: String,
        /// Reception code of the sample
        reception_code: String,
        /// Target workflow state id
        #[arg(long)]
        to_state: String,
        /// Workflow action
        #[arg(long, default_value = "START")]
        action: ActionType,
        /// Staining method id
        #[arg(long)]
        staining_method: String,
        /// Classification flag (mandatory for special-category codes)
        #[arg(long)]
        flag: Option<String>,
        /// Handover note, propagated to every child service
        #[arg(long)]
        note: Option<String>,
        /// Child service ids the note is written to
        #[arg(long = "service")]
        services: Vec<String>,
        /// Acting operator user id
        #[arg(long, env = "LIS_USER_ID")]
        user: String,
    },
    /// Clear all session state (tabs and room selection)
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let storage: Arc<dyn SessionStorage> = Arc::new(
        FileStorage::new(&cli.session_dir).context("failed to open session directory")?,
    );
    let mut api = RestClient::new(&cli.api_url);
    if let Some(token) = &cli.token {
        api = api.with_bearer_token(token);
    }
    let api = Arc::new(api);

    match cli.command {
        Commands::States => {
            let states = api.workflow_states().await?;
            for state in states {
                println!("{:>3}  {}  {}", state.state_order, state.code, state.name);
            }
        }
        Commands::Rooms => {
            let departments = api.departments().await?;
            for department in departments {
                println!("{} ({})", department.name, department.code);
                for room in department.rooms {
                    println!("  {}  {} ({})", room.id, room.name, room.code);
                }
            }
        }
        Commands::UseRoom { room } => {
            let departments = api.departments().await?;
            let found = departments.iter().find_map(|department| {
                department
                    .rooms
                    .iter()
                    .find(|r| r.id.as_str() == room || r.code == room)
                    .map(|r| (department, r))
            });
            let Some((department, picked)) = found else {
                bail!("no room matching {room:?}; run `lis rooms` to see the choices");
            };
            let selection = CurrentRoomSelection::from_parts(
                picked.id.as_str(),
                &picked.code,
                &picked.name,
                department.id.as_str(),
                &department.code,
                &department.name,
            )?;
            let context = CurrentRoomContext::load(Arc::clone(&storage));
            context.set_room(selection);
            println!("working from {} / {}", department.name, picked.name);
        }
        Commands::History {
            state,
            from,
            to,
            code,
        } => {
            let room = current_room(&storage)?;
            let tabs = TabSessionStore::load(Arc::clone(&storage));
            tabs.open_tab(
                TabDescriptor::new("/workflow-history", "Workflow history").in_room(room.clone()),
            );

            let mut filter = HistoryFilter::for_room(room.room_id.clone());
            filter.state_id = state.as_deref().map(StateId::new).transpose()?;
            filter.date_from = from;
            filter.date_to = to;
            filter.code = code;

            let entries = api.workflow_history(&filter).await?;
            if entries.is_empty() {
                println!("no requests for room {}", room.room_name);
            }
            for entry in entries {
                println!(
                    "{}  {}  {}  [{} services]",
                    entry.reception_code,
                    entry.stored_service_request_id,
                    entry.patient_name.as_deref().unwrap_or("-"),
                    entry.services.len()
                );
            }
        }
        Commands::Handover {
            request,
            reception_code,
            to_state,
            action,
            staining_method,
            flag,
            note,
            services,
            user,
        } => {
            let room_context = Arc::new(CurrentRoomContext::load(Arc::clone(&storage)));
            if room_context.current().is_none() {
                bail!("no work room selected; run `lis use-room` first");
            }

            let draft = TransitionDraft {
                request: Some(SelectedRequest {
                    stored_service_request_id: StoredServiceRequestId::new(&request)?,
                    reception_code: ReceptionCode::new(&reception_code)?,
                    services: services
                        .iter()
                        .map(ServiceId::new)
                        .collect::<Result<Vec<_>, _>>()?,
                }),
                to_state_id: Some(StateId::new(&to_state)?),
                action_type: action,
                staining_method_id: Some(StainingMethodId::new(&staining_method)?),
                flag,
                note,
                actor_user_id: UserId::new(&user)?,
            };

            let orchestrator = TransitionOrchestrator::new(Arc::clone(&api), room_context);
            let outcome = orchestrator.commit(&draft).await?;
            println!(
                "request {} now in state {}",
                outcome.receipt.stored_service_request_id, outcome.receipt.state_id
            );
        }
        Commands::Logout => {
            TabSessionStore::load(Arc::clone(&storage)).reset();
            CurrentRoomContext::load(storage).clear();
            println!("session cleared");
        }
    }

    Ok(())
}

fn current_room(storage: &Arc<dyn SessionStorage>) -> Result<CurrentRoomSelection> {
    let context = CurrentRoomContext::load(Arc::clone(storage));
    context
        .current()
        .context("no work room selected; run `lis use-room` first")
}
