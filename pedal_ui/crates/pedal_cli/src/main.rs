use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use pedal_client::{ClientConfig, EngineConnection};
use pedal_core::app_model::AppModel;
use pedal_core::observable::OnChangedHandler;
use pedal_core::property_client::{file_name_only, request_file_list};
use pedal_core::protocol::{FileProperty, FileType, InstanceId, PedalboardNode, TypedValue};
use pedal_core::remote::RemoteService;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::LocalSet;
use tracing::info;
use tracing_subscriber::EnvFilter;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser, Debug)]
#[command(name = "pedal_cli")]
struct Args {
    /// Engine websocket url; overrides PEDAL_WS_URL.
    #[arg(long)]
    ws_url: Option<String>,

    /// Per-request timeout; overrides PEDAL_REQUEST_TIMEOUT_MS.
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the preset list; `*` marks the loaded preset.
    Presets,
    /// Print the pedalboard tree.
    Board {
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Move the preset at position FROM to position TO (zero-based).
    Move { from: usize, to: usize },
    Rename { instance_id: InstanceId, name: String },
    Duplicate { instance_id: InstanceId },
    Delete { instance_id: InstanceId },
    Load { instance_id: InstanceId },
    GetProperty {
        instance_id: InstanceId,
        property_uri: String,
    },
    SetPath {
        instance_id: InstanceId,
        property_uri: String,
        path: String,
    },
    /// Print a patch property every time the engine reports a change.
    Watch {
        instance_id: InstanceId,
        property_uri: String,
        /// Stop after this long instead of waiting for Ctrl-C.
        #[arg(long, value_name = "MS")]
        for_ms: Option<u64>,
    },
    /// List the files a file property may choose from.
    Files {
        directory: String,
        /// Accepted extensions; all files when omitted.
        #[arg(long = "ext")]
        extensions: Vec<String>,
    },
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = args.ws_url.as_deref() {
        config = config.with_ws_url(url)?;
    }
    if let Some(ms) = args.timeout_ms {
        config.request_timeout = Duration::from_millis(ms);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    LocalSet::new().block_on(&runtime, run(args.command, config))
}

async fn run(command: Command, config: ClientConfig) -> anyhow::Result<()> {
    let ws_url = config.ws_url.clone();
    let (connection, mut events) = pedal_client::spawn(config);
    let model = Rc::new(AppModel::new(connection.clone()));

    tokio::time::timeout(HANDSHAKE_TIMEOUT, events.until_ready(&connection, &model))
        .await
        .map_err(|_| anyhow!("no handshake from {ws_url} within {HANDSHAKE_TIMEOUT:?}"))??;
    info!("connected to {ws_url}");
    events.pump(connection.clone(), model.clone());

    let result = execute(command, &connection, &model).await;
    connection.disconnect();
    result
}

async fn execute(
    command: Command,
    connection: &Rc<EngineConnection>,
    model: &Rc<AppModel>,
) -> anyhow::Result<()> {
    match command {
        Command::Presets => print_presets(model),
        Command::Board { json } => {
            let board = model.pedalboard.get();
            if json {
                println!("{}", serde_json::to_string_pretty(&board)?);
            } else {
                println!("{}", board.name);
                print_nodes(&board.items, 1);
            }
        }
        Command::Move { from, to } => {
            let mut presets = model.presets.get();
            presets.move_preset(from, to)?;
            model.presets.update_presets(presets).await?;
            print_presets(model);
        }
        Command::Rename { instance_id, name } => {
            let editor = model.preset_editor();
            editor.select(instance_id);
            editor.rename_selected(&name).await?;
        }
        Command::Duplicate { instance_id } => {
            let editor = model.preset_editor();
            editor.select(instance_id);
            let copy = editor.duplicate_selected().await?;
            println!("{copy}");
        }
        Command::Delete { instance_id } => {
            let editor = model.preset_editor();
            editor.select(instance_id);
            let next = editor.delete_selected().await?;
            println!("{next}");
        }
        Command::Load { instance_id } => {
            model.presets.load_preset(instance_id).await?;
            print_presets(model);
        }
        Command::GetProperty {
            instance_id,
            property_uri,
        } => {
            let value = model
                .service()
                .get_patch_property(instance_id, &property_uri)
                .await?;
            println!("{}", serde_json::to_string(&value)?);
        }
        Command::SetPath {
            instance_id,
            property_uri,
            path,
        } => {
            model
                .service()
                .set_patch_property(instance_id, &property_uri, TypedValue::path(path))
                .await?;
        }
        Command::Watch {
            instance_id,
            property_uri,
            for_ms,
        } => {
            let watcher = model.property_watcher();
            let print: OnChangedHandler<Option<TypedValue>> =
                Rc::new(|value: &Option<TypedValue>| match value {
                    Some(TypedValue::Path { value }) => {
                        println!("{value} ({})", file_name_only(value))
                    }
                    Some(other) => println!("{}", serde_json::to_string(other).unwrap_or_default()),
                    None => {}
                });
            watcher.value().add_on_changed_handler(print);
            watcher.subscribe(instance_id, &property_uri);
            match for_ms {
                Some(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                None => tokio::signal::ctrl_c()
                    .await
                    .context("waiting for Ctrl-C")?,
            }
            watcher.unsubscribe();
        }
        Command::Files {
            directory,
            extensions,
        } => {
            let property = FileProperty {
                name: directory.clone(),
                patch_property: String::new(),
                directory,
                file_types: extensions
                    .iter()
                    .map(|ext| {
                        let ext = ext.trim_start_matches('.');
                        FileType {
                            label: ext.to_uppercase(),
                            mime_type: String::new(),
                            file_extension: format!(".{ext}"),
                        }
                    })
                    .collect(),
            };
            for file in request_file_list(connection.as_ref(), &property).await? {
                println!("{file}");
            }
        }
    }
    Ok(())
}

fn print_presets(model: &AppModel) {
    let presets = model.presets.get();
    for entry in &presets.presets {
        let mark = if presets.selected_instance_id == Some(entry.instance_id) {
            '*'
        } else {
            ' '
        };
        println!("{mark} {:>4}  {}", entry.instance_id, entry.name);
    }
}

fn print_nodes(nodes: &[PedalboardNode], depth: usize) {
    let indent = "  ".repeat(depth);
    for node in nodes {
        match node {
            PedalboardNode::Item(item) => {
                let label = if item.is_empty_slot() {
                    "(empty)"
                } else {
                    item.plugin_name.as_str()
                };
                let state = if item.is_enabled { "" } else { " [bypassed]" };
                println!("{indent}{:>4}  {label}{state}", item.instance_id);
            }
            PedalboardNode::Split(split) => {
                println!(
                    "{indent}{:>4}  split ({:?})",
                    split.instance_id,
                    split.split_type()
                );
                println!("{indent}  top:");
                print_nodes(&split.top_chain, depth + 2);
                println!("{indent}  bottom:");
                print_nodes(&split.bottom_chain, depth + 2);
            }
        }
    }
}
