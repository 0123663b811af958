//! formwork - evaluate declarative form pages from the command line
//!
//! This is the binary entry point. All logic lives in the library.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, WrapErr};

use formwork::demo::demo_api_client;
use formwork::{bootstrap, parse_set, run_inspect, InspectRequest};
use formwork_core::Record;
use formwork_engine::config::{init_config_dir, load_settings, CONFIG_FILENAME, FORMWORK_DIR};

/// formwork - declarative form and page engine
#[derive(Parser, Debug)]
#[command(name = "formwork")]
#[command(about = "Evaluate declarative form pages headlessly", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate a page against an entity and print an NDJSON report
    Inspect {
        /// Registered page id
        #[arg(long)]
        page: String,

        /// JSON file holding the entity (empty entity when omitted)
        #[arg(long, value_name = "FILE")]
        entity: Option<PathBuf>,

        /// Evaluation mode passed to predicates
        #[arg(long, default_value = "edit")]
        mode: String,

        /// Override a field before evaluation (repeatable)
        #[arg(long = "set", value_name = "FIELD=JSON")]
        sets: Vec<String>,

        /// Trigger an action after evaluation
        #[arg(long)]
        action: Option<String>,

        /// Grant a permission for access-based visibility (repeatable)
        #[arg(long = "permission", value_name = "NAME")]
        permissions: Vec<String>,

        /// Directory holding `.formwork/config.toml`
        #[arg(long, value_name = "PATH")]
        project: Option<PathBuf>,
    },

    /// List registered pages and their routes
    Pages,

    /// Write a default `.formwork/config.toml`
    InitConfig {
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

fn current_dir_or_dot() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    formwork_core::logging::init()?;

    let args = Args::parse();
    let registries = bootstrap()?;

    match args.command {
        Command::Inspect {
            page,
            entity,
            mode,
            sets,
            action,
            permissions,
            project,
        } => {
            let entity = match entity {
                Some(path) => read_entity(&path)?,
                None => Record::new(),
            };
            let project = project.unwrap_or_else(current_dir_or_dot);

            let mut request = InspectRequest::new(page, entity);
            request.mode = mode;
            request.action = action;
            request.permissions = permissions;
            request.settings = load_settings(&project);
            request.sets = sets
                .iter()
                .map(|raw| parse_set(raw))
                .collect::<Result<_, _>>()?;

            let mut stdout = std::io::stdout().lock();
            run_inspect(registries, Some(demo_api_client()), request, &mut stdout).await?;
        }
        Command::Pages => {
            for page in registries.pages.get_all() {
                let route = page.route.as_deref().unwrap_or("-");
                println!("{}\t{}\t{}", page.id, route, page.form.id);
            }
        }
        Command::InitConfig { path } => {
            let path = path.unwrap_or_else(current_dir_or_dot);
            init_config_dir(&path)?;
            eprintln!(
                "Wrote {}",
                path.join(FORMWORK_DIR).join(CONFIG_FILENAME).display()
            );
        }
    }

    Ok(())
}

fn read_entity(path: &Path) -> color_eyre::Result<Record> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("reading entity file {}", path.display()))?;
    match serde_json::from_str(&text)? {
        serde_json::Value::Object(record) => Ok(record),
        _ => Err(eyre!("entity file {} must hold a JSON object", path.display())),
    }
}
