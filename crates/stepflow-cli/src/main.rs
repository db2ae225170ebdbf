//! Stepflow CLI — define, validate and run workflows from the terminal.
//!
//! Reuses the same core engine (stepflow-core) and server bootstrap
//! (stepflow-server) as the HTTP API.

use clap::{Parser, Subcommand};

use stepflow_cli::commands;
use stepflow_core::models::run::RunStatus;

/// Stepflow CLI — workflow execution engine
#[derive(Parser)]
#[command(name = "stepflow", version, about = "Stepflow CLI — workflow execution engine")]
pub struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "STEPFLOW_DB_PATH", default_value = "stepflow.db")]
    db: String,

    /// Directory of YAML workflow templates
    #[arg(long, env = "STEPFLOW_TEMPLATE_DIR")]
    templates: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the Stepflow HTTP server
    Server {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to listen on
        #[arg(long, default_value_t = 3210)]
        port: u16,
    },

    /// Manage and run workflows
    Workflow {
        #[command(subcommand)]
        action: WorkflowAction,
    },

    /// Inspect workflow runs
    Run {
        #[command(subcommand)]
        action: RunAction,
    },

    /// Inspect skills discovered from the working directory and home
    Skills {
        #[command(subcommand)]
        action: SkillsAction,
    },
}

#[derive(Subcommand)]
enum WorkflowAction {
    /// List stored workflows
    List {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        enabled: Option<bool>,
    },
    /// Show a workflow as JSON
    Show { id: String },
    /// Create a workflow from a YAML file
    Create {
        #[arg(long)]
        file: String,
    },
    /// Delete a workflow and its runs
    Delete {
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Validate a workflow YAML file without storing it
    Validate {
        #[arg(long)]
        file: String,
    },
    /// List available workflow templates
    Templates,
    /// Create a workflow from a template
    FromTemplate {
        template_id: String,
        /// Name for the new workflow (defaults to the template name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Run a stored workflow
    Run {
        id: String,
        /// Agent session to notify with a run summary
        #[arg(long)]
        notify: Option<String>,
    },
    /// List runs of a workflow, newest first
    Runs { id: String },
}

#[derive(Subcommand)]
enum RunAction {
    /// Show a run record
    Show { id: String },
    /// Cancel a pending or running run
    Cancel { id: String },
}

#[derive(Subcommand)]
enum SkillsAction {
    /// List discovered skills
    List,
    /// Show a skill and its instructions
    Show { name: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "stepflow_cli=debug,stepflow_core=debug"
    } else {
        "stepflow_cli=info,stepflow_core=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    // API keys for the text generator may live in .env files
    commands::load_dotenv();

    let result = match cli.command {
        Some(Commands::Server { host, port }) => {
            commands::server::run(host, port, cli.db, cli.templates).await
        }
        Some(Commands::Workflow { action }) => run_workflow_action(&cli.db, cli.templates.as_deref(), action).await,
        Some(Commands::Run { action }) => {
            match commands::init_state(&cli.db, cli.templates.as_deref()).await {
                Ok(state) => match action {
                    RunAction::Show { id } => commands::run::show(&state, &id).await.map(|_| ()),
                    RunAction::Cancel { id } => commands::run::cancel(&state, &id).await.map(|_| ()),
                },
                Err(e) => Err(e),
            }
        }
        Some(Commands::Skills { action }) => {
            match commands::init_state(&cli.db, cli.templates.as_deref()).await {
                Ok(state) => match action {
                    SkillsAction::List => {
                        commands::skills::list(&state);
                        Ok(())
                    }
                    SkillsAction::Show { name } => commands::skills::show(&state, &name).map(|_| ()),
                },
                Err(e) => Err(e),
            }
        }
        None => {
            // No subcommand — show help
            use clap::CommandFactory;
            Cli::command().print_help().ok();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_workflow_action(
    db: &str,
    templates: Option<&str>,
    action: WorkflowAction,
) -> Result<(), String> {
    // Validation needs no database
    if let WorkflowAction::Validate { file } = &action {
        return commands::workflow::validate(file).map(|_| ());
    }

    let state = commands::init_state(db, templates).await?;
    match action {
        WorkflowAction::List { category, enabled } => {
            commands::workflow::list(&state, category, enabled).await.map(|_| ())
        }
        WorkflowAction::Show { id } => commands::workflow::show(&state, &id).await.map(|_| ()),
        WorkflowAction::Create { file } => {
            commands::workflow::create(&state, &file).await.map(|_| ())
        }
        WorkflowAction::Delete { id, yes } => {
            commands::workflow::delete(&state, &id, yes).await.map(|_| ())
        }
        WorkflowAction::Validate { .. } => Ok(()),
        WorkflowAction::Templates => {
            commands::workflow::templates(&state);
            Ok(())
        }
        WorkflowAction::FromTemplate { template_id, name } => {
            commands::workflow::from_template(&state, &template_id, name)
                .await
                .map(|_| ())
        }
        WorkflowAction::Run { id, notify } => {
            let run = commands::workflow::run(&state, &id, notify).await?;
            match run.status {
                RunStatus::Failed => Err(run.error.unwrap_or_else(|| "Run failed".to_string())),
                _ => Ok(()),
            }
        }
        WorkflowAction::Runs { id } => commands::workflow::runs(&state, &id).await.map(|_| ()),
    }
}
