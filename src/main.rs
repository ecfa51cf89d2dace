use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use grant_lifecycle::proposal::DateRange;
use grant_lifecycle::{
    config, init_telemetry, roles, transition_metrics, ActorContext, ChannelEventPublisher,
    CreateProposalInput, InMemoryProposalRepository, ProposalService, ProposalState,
    ProposalTransition, ProposalWorkflow, TransitionProposalInput,
};

#[derive(Parser)]
#[command(name = "grant-lifecycle")]
#[command(about = "Grant proposal lifecycle workflow engine")]
#[command(long_about = "Inspect the grant proposal workflow graph, state policies and role gates, \
                       and simulate a proposal moving through its lifecycle.")]
struct Cli {
    /// Emit info-level logs instead of warnings only
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every state with its display name, SLA and required roles
    States,
    /// Show the transitions available from a state
    Transitions {
        /// State code, e.g. OSP_REVIEW
        #[arg(long)]
        from: ProposalState,
    },
    /// Print every edge of the workflow
    Graph {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Drive a proposal through the in-memory service and print its history
    Simulate {
        /// Roles of the acting user (the proposal's PI)
        #[arg(long, value_delimiter = ',', default_value = "PI,PROPOSAL_CREATOR")]
        roles: Vec<String>,
        /// Transition codes to apply in order, e.g. START,SUBMIT_FOR_REVIEW
        #[arg(long, value_delimiter = ',', required = true)]
        steps: Vec<ProposalTransition>,
    },
    /// Print the effective configuration as TOML
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = config()?;

    let mut observability = settings.observability.clone();
    if !cli.verbose {
        observability.log_level = "warn".to_string();
    }
    init_telemetry(&observability)?;

    let workflow = ProposalWorkflow::with_policy(settings.authorization.unlisted_state_policy);

    match cli.command {
        Commands::States => states_command(&workflow),
        Commands::Transitions { from } => transitions_command(&workflow, from),
        Commands::Graph { json } => graph_command(&workflow, json),
        Commands::Simulate { roles, steps } => tokio::runtime::Runtime::new()?
            .block_on(async { simulate_command(roles, steps).await }),
        Commands::Config => {
            print!("{}", settings.to_toml()?);
            Ok(())
        }
    }
}

fn states_command(workflow: &ProposalWorkflow) -> Result<()> {
    println!("{:<22} {:<26} {:>5}  REQUIRED ROLES", "STATE", "NAME", "SLA");
    for state in ProposalState::ALL {
        let meta = workflow.state_metadata(state);
        let sla = if meta.sla_hours > 0 {
            format!("{}h", meta.sla_hours)
        } else {
            "-".to_string()
        };
        let required: Vec<&str> = meta.required_roles.iter().map(String::as_str).collect();
        let marker = if state.is_terminal() { " (terminal)" } else { "" };
        println!(
            "{:<22} {:<26} {:>5}  {}{}",
            state.code(),
            meta.display_name,
            sla,
            required.join(","),
            marker
        );
    }
    Ok(())
}

fn transitions_command(workflow: &ProposalWorkflow, from: ProposalState) -> Result<()> {
    let available = workflow.available_transitions(from);
    if available.is_empty() {
        println!("{} has no outgoing transitions", from.code());
        return Ok(());
    }
    for transition in available {
        let to = workflow.next_state(from, transition)?;
        println!("{} --{}--> {}", from.code(), transition.code(), to.code());
    }
    Ok(())
}

fn graph_command(workflow: &ProposalWorkflow, json: bool) -> Result<()> {
    let edges = workflow.all_transitions();
    if json {
        println!("{}", serde_json::to_string_pretty(&edges)?);
    } else {
        for edge in &edges {
            println!("{:<22} {:<20} {}", edge.from.code(), edge.transition.code(), edge.to.code());
        }
        println!("{} edges", edges.len());
    }
    Ok(())
}

async fn simulate_command(
    actor_roles: Vec<String>,
    steps: Vec<ProposalTransition>,
) -> Result<()> {
    let settings = config()?;
    let (publisher, mut events) = ChannelEventPublisher::new(settings.events.channel_capacity);
    let service = ProposalService::from_config(
        Arc::new(InMemoryProposalRepository::new()),
        Arc::new(publisher),
        settings,
    );

    let actor = ActorContext::new(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), actor_roles);
    let now = Utc::now();
    let proposal = service
        .create_proposal(
            &actor,
            CreateProposalInput {
                title: "Simulated proposal".to_string(),
                short_title: String::new(),
                abstract_text: String::new(),
                principal_investigator_id: actor.actor_id,
                sponsor_id: uuid::Uuid::new_v4(),
                department: String::new(),
                project_period: DateRange::new(now, now + Duration::days(365)),
                sponsor_deadline: Some(now + Duration::days(30)),
                internal_deadline: None,
                research_area: String::new(),
                keywords: Vec::new(),
            },
        )
        .await
        .context("failed to create proposal")?;
    println!("Created {} in {}", proposal.proposal_number(), proposal.state().code());

    let mut current = proposal;
    for transition in steps {
        let input = TransitionProposalInput {
            expected_version: current.version(),
            ..TransitionProposalInput::new(current.id(), transition)
        };
        match service.transition_proposal(&actor, input).await {
            Ok(updated) => current = updated,
            Err(e) => {
                println!("Stopped at {}: {} [{}]", current.state().code(), e, e.error_code());
                break;
            }
        }
    }

    println!();
    for (i, record) in current.history().iter().enumerate() {
        println!(
            "{:>2}. {} --{}--> {}",
            i + 1,
            record.from_state.code(),
            record.transition.code(),
            record.to_state.code()
        );
    }
    println!("Final state {} at version {}", current.state().code(), current.version());

    let permitted = service.available_transitions(&actor, current.id()).await?;
    let permitted: Vec<&str> = permitted.iter().map(|t| t.code()).collect();
    println!("Next permitted: {}", if permitted.is_empty() { "-".to_string() } else { permitted.join(", ") });

    // Publishing runs on background tasks; drop the service so the channel closes once they finish.
    drop(service);
    let mut published = 0;
    while let Ok(Some(_)) =
        tokio::time::timeout(std::time::Duration::from_millis(200), events.recv()).await
    {
        published += 1;
    }
    println!("{published} events published");

    if actor_roles_missing(&actor) {
        println!("Hint: add reviewer roles with --roles, e.g. {},{}", roles::OSP_OFFICER, roles::OSP_DIRECTOR);
    }
    transition_metrics().log_stats();
    Ok(())
}

fn actor_roles_missing(actor: &ActorContext) -> bool {
    actor.roles.iter().all(|r| r == roles::PI || r == roles::PROPOSAL_CREATOR)
}
