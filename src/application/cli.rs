use std::io;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use clap::Arg;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;

/// What main should do after argument parsing.
pub enum Dispatch {
    Run {
        task: Option<String>,
        code: Option<String>,
    },
    Serve,
    Exit,
}

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = std::path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if !config_file_path.parent().unwrap().exists() {
        fs::create_dir_all(config_file_path.parent().unwrap()).await?;
    }

    let mut file = fs::File::create(config_file_path.clone()).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created config file at {config_file_path_str}");

    return Ok(());
}

fn config_arg(key: ConfigKey, env: &'static str, help: &'static str) -> Arg {
    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env)
        .num_args(1)
        .help(help);
}

pub fn build() -> Command {
    return Command::new("easel")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(false)
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("EASEL_CONFIG_FILE")
                .num_args(1)
                .help("Path to a TOML configuration file"),
        )
        .arg(config_arg(
            ConfigKey::ApiKey,
            "OPENROUTER_API_KEY",
            "OpenRouter API key used for every gateway call",
        ))
        .arg(config_arg(
            ConfigKey::GatewayUrl,
            "EASEL_GATEWAY_URL",
            "Gateway base URL [default: https://openrouter.ai/api]",
        ))
        .arg(config_arg(
            ConfigKey::InterpreterModel,
            "EASEL_INTERPRETER_MODEL",
            "Model used to interpret tasks and supervise refinements [default: anthropic/claude-opus-4.5]",
        ))
        .arg(config_arg(
            ConfigKey::ImageModel,
            "EASEL_IMAGE_MODEL",
            "Model used to synthesize images [default: google/gemini-3-pro-image-preview]",
        ))
        .arg(config_arg(
            ConfigKey::ReviewModel,
            "EASEL_REVIEW_MODEL",
            "Model used for the final publication review [default: anthropic/claude-opus-4.5]",
        ))
        .arg(config_arg(
            ConfigKey::ImageTemperature,
            "EASEL_IMAGE_TEMPERATURE",
            "Sampling temperature for image synthesis, 0.0 to 1.0 [default: 0.7]",
        ))
        .arg(config_arg(
            ConfigKey::MaxIterations,
            "EASEL_MAX_ITERATIONS",
            "Maximum refinement iterations; total images is one more than this [default: 2]",
        ))
        .arg(config_arg(
            ConfigKey::OutputDir,
            "EASEL_OUTPUT_DIR",
            "Directory where generated figures are saved [default: ./figures]",
        ))
        .arg(config_arg(
            ConfigKey::ServerHost,
            "EASEL_SERVER_HOST",
            "Bind address for the HTTP API [default: 127.0.0.1]",
        ))
        .arg(config_arg(
            ConfigKey::ServerPort,
            "EASEL_SERVER_PORT",
            "Bind port for the HTTP API [default: 8080]",
        ))
        .subcommand(
            Command::new("run")
                .about("Run the interactive figure generation pipeline in the terminal")
                .arg(
                    Arg::new("task")
                        .long("task")
                        .num_args(1)
                        .help("Task description for the figure; prompted for when omitted"),
                )
                .arg(
                    Arg::new("task-file")
                        .long("task-file")
                        .num_args(1)
                        .help("Read the task description from a file"),
                )
                .arg(
                    Arg::new("code-file")
                        .long("code-file")
                        .num_args(1)
                        .help("Attach a source file for the interpreter to ground the figure in"),
                ),
        )
        .subcommand(Command::new("serve").about("Start the HTTP API"))
        .subcommand(
            Command::new("config")
                .about("Configuration file commands")
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("create").about("Create a default config file if none exists"),
                )
                .subcommand(
                    Command::new("default").about("Print the default config file to stdout"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(
                    Arg::new("shell")
                        .value_parser(clap::value_parser!(Shell))
                        .required(true),
                ),
        );
}

async fn read_optional_file(matches: &ArgMatches, arg: &str) -> Result<Option<String>> {
    if let Some(path) = matches.get_one::<String>(arg) {
        let content = fs::read_to_string(path)
            .await
            .map_err(|err| return anyhow!("could not read {path}: {err}"))?;
        return Ok(Some(content));
    }

    return Ok(None);
}

pub async fn parse() -> Result<Dispatch> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("completions", sub_matches)) => {
            if let Some(shell) = sub_matches.get_one::<Shell>("shell").copied() {
                let mut cmd = build();
                print_completions(shell, &mut cmd);
            }
            return Ok(Dispatch::Exit);
        }
        Some(("config", sub_matches)) => {
            match sub_matches.subcommand() {
                Some(("create", _)) => create_config_file().await?,
                Some(("default", _)) => println!("{}", Config::serialize_default(build())),
                _ => {}
            }
            return Ok(Dispatch::Exit);
        }
        Some(("serve", sub_matches)) => {
            Config::load(vec![&matches, sub_matches]).await?;
            return Ok(Dispatch::Serve);
        }
        Some(("run", sub_matches)) => {
            Config::load(vec![&matches, sub_matches]).await?;

            let task = match sub_matches.get_one::<String>("task") {
                Some(task) => Some(task.to_string()),
                None => read_optional_file(sub_matches, "task-file").await?,
            };
            let code = read_optional_file(sub_matches, "code-file").await?;

            return Ok(Dispatch::Run { task, code });
        }
        _ => {
            Config::load(vec![&matches]).await?;
            return Ok(Dispatch::Run {
                task: None,
                code: None,
            });
        }
    }
}
