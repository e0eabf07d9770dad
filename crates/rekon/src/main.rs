use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use rekon_engine::config::ConfigLoader;
use rekon_engine::{Attribute, MapStore, ObjectHandle, ObjectResolver, Session, SnapshotEngine};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rekon", version, about = "Resolve mapped UI objects against a captured snapshot")]
struct Args {
    /// Captured application tree (YAML)
    #[arg(long)]
    snapshot: PathBuf,

    /// Application maps (YAML)
    #[arg(long)]
    map: PathBuf,

    /// Resolver configuration; defaults to ./rekon.yaml, then ~/.rekon/config.yaml
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve a window, or a child when one is given
    Resolve {
        map_name: String,
        window: String,
        child: Option<String>,
        #[arg(long)]
        ignore_cache: bool,
        /// List every structural match of the child
        #[arg(long, conflicts_with = "name")]
        all: bool,
        /// Put this name in place of the child's trailing `*`
        #[arg(long, requires = "child")]
        name: Option<String>,
    },
    /// Children of an element as resolution sees them
    Children { id: u64 },
    /// Read one identifying attribute of an element
    Probe {
        id: u64,
        #[arg(value_enum)]
        attribute: AttributeArg,
    },
    /// Follow a `->` path of sub-items from an element
    Path { id: u64, path: String },
    /// First mappable child whose property contains a value
    Match {
        id: u64,
        property: String,
        value: String,
        /// Require an exact, case-sensitive value
        #[arg(long)]
        exact: bool,
    },
    /// Poll until an object resolves, or one of its properties has a value
    Wait {
        map_name: String,
        window: String,
        child: Option<String>,
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
        #[arg(long, requires = "equals")]
        property: Option<String>,
        #[arg(long, requires = "property")]
        equals: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AttributeArg {
    Caption,
    Name,
    Text,
    Id,
}

impl From<AttributeArg> for Attribute {
    fn from(arg: AttributeArg) -> Self {
        match arg {
            AttributeArg::Caption => Attribute::Caption,
            AttributeArg::Name => Attribute::Name,
            AttributeArg::Text => Attribute::Text,
            AttributeArg::Id => Attribute::Id,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ConfigLoader::load_from(path).await,
        None => ConfigLoader::load_default().await,
    }
    .context("loading resolver configuration")?;
    let engine = SnapshotEngine::load(&args.snapshot)
        .await
        .with_context(|| format!("loading snapshot {}", args.snapshot.display()))?;
    let store = MapStore::load(&args.map)
        .await
        .with_context(|| format!("loading maps {}", args.map.display()))?;
    tracing::debug!(maps = store.map_names().count(), "maps loaded");

    let resolver = ObjectResolver::new(&engine, &store);
    let mut session = Session::new(config);
    let handle = |id| ObjectHandle::new(id, None);

    let output = match args.command {
        Command::Resolve {
            map_name,
            window,
            child,
            ignore_cache,
            all,
            name,
        } => match (child, name) {
            (Some(child), Some(name)) => {
                let found = resolver
                    .resolve_wildcard_child(
                        &mut session,
                        &map_name,
                        &window,
                        &child,
                        &name,
                        ignore_cache,
                    )
                    .await?;
                json!({ "found": found })
            }
            (Some(child), None) => {
                let mut matches = Vec::new();
                let found = resolver
                    .resolve_child(
                        &mut session,
                        &map_name,
                        &window,
                        &child,
                        ignore_cache,
                        all.then_some(&mut matches),
                    )
                    .await?;
                if all {
                    json!({ "found": found, "matches": matches })
                } else {
                    json!({ "found": found })
                }
            }
            (None, _) => {
                let found = resolver
                    .resolve_window(&mut session, &map_name, &window, ignore_cache)
                    .await?;
                json!({ "found": found })
            }
        },
        Command::Children { id } => {
            json!({ "children": resolver.children(&handle(id)).await })
        }
        Command::Probe { id, attribute } => {
            let attribute = Attribute::from(attribute);
            let value = resolver.probe(&handle(id), attribute).await;
            json!({ "attribute": attribute.to_string(), "value": value })
        }
        Command::Path { id, path } => {
            let found = resolver.resolve_path(&mut session, &handle(id), &path).await;
            json!({ "found": found })
        }
        Command::Match {
            id,
            property,
            value,
            exact,
        } => {
            let found = resolver
                .find_property_matched_child(&handle(id), &property, &value, exact)
                .await;
            json!({ "found": found })
        }
        Command::Wait {
            map_name,
            window,
            child,
            timeout_ms,
            property,
            equals,
        } => {
            let timeout = Duration::from_millis(timeout_ms);
            match property.zip(equals) {
                Some((property, expected)) => {
                    let matched = resolver
                        .wait_for_property(
                            &mut session,
                            &map_name,
                            &window,
                            child.as_deref(),
                            &property,
                            &expected,
                            timeout,
                        )
                        .await?;
                    json!({ "matched": matched })
                }
                None => {
                    let found = resolver
                        .wait_for_object(&mut session, &map_name, &window, child.as_deref(), timeout)
                        .await?;
                    json!({ "found": found })
                }
            }
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
