use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tablecraft_core::api::Api;
use tablecraft_core::config::TablecraftConfig;
use tablecraft_core::diagram::DiagramAdapter;
use tablecraft_core::http::HttpClient;
use tablecraft_core::log::init_tracing;
use tablecraft_core::storage::FileStorage;
use tablecraft_core::token::TokenStore;
use tablecraft_core::{DatasetHistoryPoller, ProjectSession};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "tablecraft", version, about = "Design schemas and generate synthetic datasets")]
struct Cli {
    /// Path to tablecraft.toml (defaults to TABLECRAFT_CONFIG or ./tablecraft.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in and store the access token
    Login {
        #[arg(long, env = "TABLECRAFT_EMAIL")]
        email: String,
        #[arg(long, env = "TABLECRAFT_PASSWORD")]
        password: String,
    },
    Logout,
    /// List projects
    Projects,
    /// Print a project's tables and relations as JSON
    Schema { project: String },
    /// Print the diagram nodes and edges as JSON
    Diagram { project: String },
    /// Import SQL DDL into a project
    Import {
        project: String,
        file: PathBuf,
        #[arg(long)]
        replace: bool,
    },
    /// Submit a generation job
    Generate {
        project: String,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        export_type: Option<String>,
        /// Restrict to these table ids
        #[arg(long = "table")]
        tables: Vec<String>,
    },
    /// List generation jobs of a project
    Datasets { project: String },
    /// Download a generated dataset
    Download {
        project: String,
        dataset: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Follow a project's dataset history until interrupted
    Watch { project: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => TablecraftConfig::from_path(path)?,
        None => TablecraftConfig::new()?,
    };
    init_tracing(&config.logging.level);

    let storage = Arc::new(FileStorage::new(config.storage.path.clone()));
    let tokens = TokenStore::load(storage)?;
    let api = Api::new(HttpClient::new(&config.api, config.auth.clone(), tokens)?);

    match cli.command {
        Command::Login { email, password } => {
            let session = api.auth.login(&email, &password).await?;
            match session.user {
                Some(user) => println!("Signed in as {}", user.email),
                None => println!("Signed in"),
            }
        }
        Command::Logout => {
            api.auth.logout().await?;
            println!("Signed out");
        }
        Command::Projects => {
            for project in api.projects.list().await? {
                println!("{}\t{}", project.id, project.name);
            }
        }
        Command::Schema { project } => {
            let session = ProjectSession::open(api, project).await?;
            println!("{}", serde_json::to_string_pretty(&session.schema().snapshot())?);
        }
        Command::Diagram { project } => {
            let session = ProjectSession::open(api, project).await?;
            let diagram = DiagramAdapter::from_store(session.schema());
            let view = serde_json::json!({
                "nodes": diagram.nodes(),
                "edges": diagram.edges(),
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Import {
            project,
            file,
            replace,
        } => {
            let sql = std::fs::read_to_string(&file)?;
            let mut session = ProjectSession::new(api, project)
                .with_generation_config(config.generation.clone());
            session.import_sql(&sql, replace).await?;
            println!(
                "Imported {} tables, {} relations",
                session.schema().tables().len(),
                session.schema().relations().len()
            );
        }
        Command::Generate {
            project,
            model,
            export_type,
            tables,
        } => {
            let session = ProjectSession::open(api, project)
                .await?
                .with_generation_config(config.generation.clone());
            let mut options = session.default_generation_options();
            if let Some(model) = model {
                options.model_name = model;
            }
            if let Some(export_type) = export_type {
                options.export_type = export_type;
            }
            if !tables.is_empty() {
                options.table_ids = Some(tables);
            }
            let dataset = session.generate(&options).await?;
            println!("{}\t{:?}", dataset.id, dataset.status);
        }
        Command::Datasets { project } => {
            for dataset in api.datasets.list(&project).await? {
                let created = dataset
                    .created_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_default();
                println!("{}\t{:?}\t{}", dataset.id, dataset.status, created);
            }
        }
        Command::Download {
            project,
            dataset,
            out,
        } => {
            let meta = api.datasets.get(&project, &dataset).await?;
            let name = api.projects.get(&project).await?.name;
            let bytes = api.datasets.download(&project, &dataset).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(meta.download_file_name(&name)));
            std::fs::write(&path, &bytes)?;
            info!(path = %path.display(), size = bytes.len(), "Dataset saved");
            println!("{}", path.display());
        }
        Command::Watch { project } => {
            let poller = DatasetHistoryPoller::spawn(
                api.datasets.clone(),
                project,
                config.polling.history_interval(),
            );
            let mut updates = poller.subscribe();
            loop {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => break,
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let datasets = updates.borrow_and_update().clone();
                        for dataset in &datasets {
                            println!("{}\t{:?}", dataset.id, dataset.status);
                        }
                        println!("--");
                    }
                }
            }
        }
    }

    Ok(())
}
