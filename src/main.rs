//! Tilt CLI - task-to-test lifecycle and tag consistency for agent execution records.

use clap::Parser;
use std::process;
use std::time::Instant;
use tilt::action_log;
use tilt::cli::{
    Cli, Commands, RecordCommands, SettingsCommands, SystemCommands, TagCommands, TestCommands,
};
use tilt::commands::{self, Output};
use tilt::config::{self, ConfigOverrides, ResolvedConfig};
use tilt::storage::Storage;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    let config = match config::resolve_config(&build_overrides(&cli)) {
        Ok(config) => config,
        Err(e) => {
            report_error(&e, human);
            process::exit(1);
        }
    };

    init_tracing(config.log_level());

    // Serialize command for logging
    let (cmd_name, args_json) = serialize_command(&cli.command);

    let start = Instant::now();
    let result = run_command(cli.command, &config, human);
    let duration = start.elapsed().as_millis() as u64;

    let (success, error) = match &result {
        Ok(_) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };

    action_log::log_action(
        config.data_dir(),
        config.action_log_enabled(),
        &cmd_name,
        args_json,
        success,
        error,
        duration,
    );

    if let Err(e) = result {
        report_error(&e, human);
        process::exit(1);
    }
}

/// Collect CLI flags that participate in config precedence.
fn build_overrides(cli: &Cli) -> ConfigOverrides {
    let mut overrides = ConfigOverrides::new();
    overrides.data_dir = cli.data_dir.clone();

    match &cli.command {
        Commands::Serve {
            host,
            port,
            fixture,
        } => {
            overrides.server_host = host.clone();
            overrides.server_port = *port;
            overrides.fixture_path = fixture.clone();
        }
        Commands::System {
            command: SystemCommands::Bootstrap { fixture },
        } => {
            overrides.fixture_path = fixture.clone();
        }
        _ => {}
    }

    overrides
}

/// Initialize diagnostics on stderr. RUST_LOG wins over the configured level.
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let json = std::env::var("TILT_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn report_error(e: &tilt::Error, human: bool) {
    if human {
        eprintln!("Error: {}", e);
    } else {
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
    }
}

fn open_storage(config: &ResolvedConfig) -> tilt::Result<Storage> {
    Storage::open_with_timeout(config.data_dir(), config.request_timeout())
}

fn run_command(command: Commands, config: &ResolvedConfig, human: bool) -> tilt::Result<()> {
    match command {
        Commands::Tag { command } => {
            let mut storage = open_storage(config)?;
            match command {
                TagCommands::List => {
                    let result = commands::tag_list(&storage)?;
                    output(&result, human);
                }
                TagCommands::Create { name, color } => {
                    let result = commands::tag_create(&mut storage, &name, color)?;
                    output(&result, human);
                }
                TagCommands::Delete { name } => {
                    let result = commands::tag_delete(&mut storage, &name)?;
                    output(&result, human);
                    if !result.success {
                        return Err(tilt::Error::Other(format!(
                            "Tag '{}' was only partially deleted",
                            result.name
                        )));
                    }
                }
            }
        }

        Commands::Test { command } => {
            let mut storage = open_storage(config)?;
            match command {
                TestCommands::List { tag } => {
                    let result = commands::test_list(&storage, tag.as_deref())?;
                    output(&result, human);
                }
                TestCommands::Create { name, tags, steps } => {
                    let result = commands::test_create(&mut storage, &name, tags, steps)?;
                    output(&result, human);
                }
                TestCommands::Show { id } => {
                    let result = commands::test_show(&storage, &id)?;
                    output(&result, human);
                }
                TestCommands::Update {
                    id,
                    name,
                    tags,
                    steps,
                } => {
                    let result = commands::test_update(&mut storage, &id, name, tags, steps)?;
                    output(&result, human);
                }
                TestCommands::Delete { id } => {
                    let result = commands::test_delete(&mut storage, &id)?;
                    output(&result, human);
                }
                TestCommands::BulkTag { tag, action, ids } => {
                    let action = action.parse()?;
                    let result = commands::bulk_tag(&mut storage, &ids, &tag, action)?;
                    output(&result, human);
                }
            }
        }

        Commands::Record { command } => {
            let mut storage = open_storage(config)?;
            match command {
                RecordCommands::List { status } => {
                    let result = commands::record_list(&storage, status.as_deref())?;
                    output(&result, human);
                }
                RecordCommands::Create {
                    instructions,
                    label,
                    source,
                } => {
                    let result = commands::record_create(&mut storage, label, &instructions, source)?;
                    output(&result, human);
                }
                RecordCommands::Show { id } => {
                    let result = commands::record_show(&storage, &id)?;
                    output(&result, human);
                }
                RecordCommands::Start { id } => {
                    let result = commands::record_start(&mut storage, &id)?;
                    output(&result, human);
                }
                RecordCommands::Complete { id, result } => {
                    let payload = result.as_deref().map(commands::parse_payload);
                    let result = commands::record_complete(&mut storage, &id, payload)?;
                    output(&result, human);
                }
                RecordCommands::Fail { id, error } => {
                    let payload = commands::parse_payload(&error);
                    let result = commands::record_fail(&mut storage, &id, payload)?;
                    output(&result, human);
                }
            }
        }

        Commands::System { command } => {
            let mut storage = open_storage(config)?;
            match command {
                SystemCommands::Bootstrap { .. } => {
                    let result = commands::bootstrap(&mut storage, config.fixture_path())?;
                    output(&result, human);
                }
                SystemCommands::Reset => {
                    let result = commands::reset_all(&mut storage)?;
                    output(&result, human);
                }
                SystemCommands::Export {
                    tagged_only,
                    output: path,
                } => {
                    let result = commands::export_to(&storage, tagged_only, path.as_deref())?;
                    output(&result, human);
                }
                SystemCommands::Status => {
                    let result = commands::system_status(&storage)?;
                    output(&result, human);
                }
                SystemCommands::AppState => {
                    let result = commands::app_state_show(&storage)?;
                    output(&result, human);
                }
            }
        }

        Commands::Settings { command } => {
            let mut storage = open_storage(config)?;
            match command {
                SettingsCommands::Get { key } => {
                    let result = commands::setting_get(&storage, &key)?;
                    output(&result, human);
                }
                SettingsCommands::Set { key, value } => {
                    let result =
                        commands::setting_set(&mut storage, &key, commands::parse_payload(&value))?;
                    output(&result, human);
                }
                SettingsCommands::List => {
                    let result = commands::setting_list(&storage)?;
                    output(&result, human);
                }
            }
        }

        Commands::Serve { .. } => run_server(config)?,
    }

    Ok(())
}

#[cfg(feature = "server")]
fn run_server(config: &ResolvedConfig) -> tilt::Result<()> {
    tracing::info!(
        port = config.server_port.value,
        port_source = %config.server_port.source,
        fixture = %config.fixture_path().display(),
        fixture_source = %config.fixture_path.source,
        "starting server"
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(tilt::server::start_server(config))
}

#[cfg(not(feature = "server"))]
fn run_server(_config: &ResolvedConfig) -> tilt::Result<()> {
    Err(tilt::Error::Other(
        "tilt was built without the `server` feature".to_string(),
    ))
}

/// Print output in JSON or human-readable format.
fn output<T: Output>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}

/// Command name and arguments for the action log.
fn serialize_command(command: &Commands) -> (String, serde_json::Value) {
    match command {
        Commands::Tag { command } => match command {
            TagCommands::List => ("tag list".to_string(), serde_json::json!({})),
            TagCommands::Create { name, color } => (
                "tag create".to_string(),
                serde_json::json!({ "name": name, "color": color }),
            ),
            TagCommands::Delete { name } => (
                "tag delete".to_string(),
                serde_json::json!({ "name": name }),
            ),
        },

        Commands::Test { command } => match command {
            TestCommands::List { tag } => {
                ("test list".to_string(), serde_json::json!({ "tag": tag }))
            }
            TestCommands::Create { name, tags, steps } => (
                "test create".to_string(),
                serde_json::json!({ "name": name, "tags": tags, "steps": steps }),
            ),
            TestCommands::Show { id } => ("test show".to_string(), serde_json::json!({ "id": id })),
            TestCommands::Update {
                id,
                name,
                tags,
                steps,
            } => (
                "test update".to_string(),
                serde_json::json!({ "id": id, "name": name, "tags": tags, "steps": steps }),
            ),
            TestCommands::Delete { id } => {
                ("test delete".to_string(), serde_json::json!({ "id": id }))
            }
            TestCommands::BulkTag { tag, action, ids } => (
                "test bulk-tag".to_string(),
                serde_json::json!({ "tag": tag, "action": action, "ids": ids }),
            ),
        },

        Commands::Record { command } => match command {
            RecordCommands::List { status } => (
                "record list".to_string(),
                serde_json::json!({ "status": status }),
            ),
            RecordCommands::Create {
                instructions,
                label,
                source,
            } => (
                "record create".to_string(),
                serde_json::json!({ "instructions": instructions, "label": label, "source": source }),
            ),
            RecordCommands::Show { id } => {
                ("record show".to_string(), serde_json::json!({ "id": id }))
            }
            RecordCommands::Start { id } => {
                ("record start".to_string(), serde_json::json!({ "id": id }))
            }
            RecordCommands::Complete { id, result } => (
                "record complete".to_string(),
                serde_json::json!({ "id": id, "result": result }),
            ),
            RecordCommands::Fail { id, error } => (
                "record fail".to_string(),
                serde_json::json!({ "id": id, "error": error }),
            ),
        },

        Commands::System { command } => match command {
            SystemCommands::Bootstrap { fixture } => (
                "system bootstrap".to_string(),
                serde_json::json!({ "fixture": fixture }),
            ),
            SystemCommands::Reset => ("system reset".to_string(), serde_json::json!({})),
            SystemCommands::Export {
                tagged_only,
                output,
            } => (
                "system export".to_string(),
                serde_json::json!({ "tagged_only": tagged_only, "output": output }),
            ),
            SystemCommands::Status => ("system status".to_string(), serde_json::json!({})),
            SystemCommands::AppState => ("system app-state".to_string(), serde_json::json!({})),
        },

        Commands::Settings { command } => match command {
            SettingsCommands::Get { key } => (
                "settings get".to_string(),
                serde_json::json!({ "key": key }),
            ),
            SettingsCommands::Set { key, value } => (
                "settings set".to_string(),
                serde_json::json!({ "key": key, "value": value }),
            ),
            SettingsCommands::List => ("settings list".to_string(), serde_json::json!({})),
        },

        Commands::Serve {
            host,
            port,
            fixture,
        } => (
            "serve".to_string(),
            serde_json::json!({ "host": host, "port": port, "fixture": fixture }),
        ),
    }
}
