//! tubecache CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tubecache::{
    app::{App, FollowOutcome},
    commands::{
        cmd_comments, cmd_init, cmd_list_videos, cmd_remove_video, cmd_resume, cmd_state,
        cmd_status, cmd_stored_comments, cmd_video, print_comment_page, print_init_report,
        print_resume, print_state, print_status, print_stored_page, print_video, print_videos,
        CommentsOptions,
    },
    config::Config,
    error::{ErrorResponse, Result, SuccessResponse},
    meta::MetaDb,
    progress::LogWriterFactory,
};

#[derive(Parser)]
#[command(name = "tubecache")]
#[command(version, about = "Ingest and cache video metadata and comments from an upstream video API", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize tubecache configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Fetch video details (cached after the first call)
    Video {
        /// Upstream video ID
        video_id: String,
    },

    /// Serve a page of comments, starting ingestion on first use
    ///
    /// The video must have been fetched with 'tubecache video' first.
    Comments {
        video_id: String,

        /// Comments per page
        #[arg(long)]
        per_page: Option<u32>,

        /// Page number (1-indexed)
        #[arg(long)]
        page: Option<u32>,

        /// Fetch one upstream page starting at this token
        #[arg(long)]
        page_token: Option<String>,

        /// Wait for the whole comment chain to finish
        #[arg(long)]
        follow: bool,
    },

    /// Page through comments stored in the database
    Stored {
        video_id: String,

        #[arg(long)]
        per_page: Option<u32>,

        #[arg(long)]
        page: Option<u32>,
    },

    /// Show a video's ingestion state
    State { video_id: String },

    /// Resume a stalled comment chain
    Resume {
        video_id: String,

        /// Wait for the chain to finish
        #[arg(long)]
        follow: bool,
    },

    /// List stored videos
    Videos {
        /// Output only video IDs (one per line, for scripting)
        #[arg(long)]
        ids_only: bool,
    },

    /// Remove a video, its comments and its cache entries
    Remove { video_id: String },

    /// Show configuration and database statistics
    #[command(visible_alias = "stats")]
    Status,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let json = cli.json;
    if let Err(e) = run(cli).await {
        if json {
            match serde_json::to_string_pretty(&ErrorResponse::from_error(&e)) {
                Ok(body) => println!("{}", body),
                Err(ser) => error!("Could not serialize error response: {}", ser),
            }
        }
        error!("{}", e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, log_json: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let json_layer = log_json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!log_json).then(|| fmt::layer().with_writer(LogWriterFactory));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn emit<T: Serialize>(json: bool, message: &str, data: &T, print: impl FnOnce(&T)) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&SuccessResponse::new(message, data))?
        );
    } else {
        print(data);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        let base_dir = cli.config.as_deref().map(base_dir_for);
        let report = cmd_init(base_dir, force).await?;
        let api_key_env = Config::default().upstream.api_key_env;
        return emit(cli.json, "Initialized", &report, |r| {
            print_init_report(r, &api_key_env)
        });
    }

    // Handle completions command (doesn't need config/db)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "tubecache", &mut std::io::stdout());
        print_completion_extras(shell);
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let json = cli.json;

    // Commands that only read local state
    match &cli.command {
        Commands::Status => {
            let db = MetaDb::connect(&config).await?;
            let status = cmd_status(&config, &db).await?;
            return emit(json, "Status", &status, print_status);
        }
        Commands::Videos { ids_only } => {
            let db = MetaDb::connect(&config).await?;
            let videos = cmd_list_videos(&db).await?;
            if *ids_only {
                for info in &videos {
                    println!("{}", info.video.video_id);
                }
                return Ok(());
            }
            return emit(json, "Videos", &videos, |v| print_videos(v));
        }
        _ => {}
    }

    let app = App::build(config).await?;
    let result = handle_command(&app, cli.command, json).await;
    app.shutdown();
    result
}

async fn handle_command(app: &App, command: Commands, json: bool) -> Result<()> {
    let service = &app.service;

    match command {
        Commands::Video { video_id } => {
            let video = cmd_video(service, &video_id).await?;
            emit(json, "Video details fetched", &video, print_video)?;
        }

        Commands::Comments {
            video_id,
            per_page,
            page,
            page_token,
            follow,
        } => {
            let options = CommentsOptions {
                page_token,
                per_page,
                page,
            };
            let mut comments = cmd_comments(service, &video_id, options.clone()).await?;

            if follow && app.follow(&video_id, !json).await? == FollowOutcome::Complete {
                // re-read the window now that every page is cached
                let reread = CommentsOptions {
                    page_token: None,
                    ..options
                };
                comments = cmd_comments(service, &video_id, reread).await?;
            }

            emit(json, "Comments fetched", &comments, |c| {
                print_comment_page(&video_id, c)
            })?;
        }

        Commands::Stored {
            video_id,
            per_page,
            page,
        } => {
            let comments = cmd_stored_comments(service, &video_id, per_page, page).await?;
            emit(json, "Stored comments", &comments, |c| {
                print_stored_page(&video_id, c)
            })?;
        }

        Commands::State { video_id } => {
            let state = cmd_state(service, &video_id).await?;
            emit(json, "Ingestion state", &state, print_state)?;
        }

        Commands::Resume { video_id, follow } => {
            let outcome = cmd_resume(service, &video_id).await?;
            if follow && app.follow(&video_id, !json).await? == FollowOutcome::Stalled {
                warn!("Run 'tubecache resume {}' again to continue", video_id);
            }
            emit(json, "Resume requested", &outcome, |o| print_resume(&video_id, o))?;
        }

        Commands::Remove { video_id } => {
            cmd_remove_video(service, &video_id).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&SuccessResponse::new("Video removed", &video_id))?
                );
            } else {
                println!("✓ Video '{}' removed", video_id);
            }
        }

        Commands::Init { .. }
        | Commands::Completions { .. }
        | Commands::Status
        | Commands::Videos { .. } => unreachable!(),
    }

    Ok(())
}

/// Directory holding the config file: a `.toml` path means its parent
fn base_dir_for(path: &Path) -> PathBuf {
    if path.extension().is_some_and(|e| e == "toml") {
        path.parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir)
    } else {
        path.to_path_buf()
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => Config::load(p),
        Some(dir) => Config::load_from(Some(dir.to_path_buf())),
        None => Config::load_from(None),
    }
}

fn print_completion_extras(shell: Shell) {
    match shell {
        Shell::Bash => {
            println!();
            println!("# Dynamic completion of stored video IDs");
            println!("_tubecache_dynamic() {{");
            println!("    local cur=\"${{COMP_WORDS[COMP_CWORD]}}\"");
            println!("    local prev=\"${{COMP_WORDS[COMP_CWORD-1]}}\"");
            println!("    case \"$prev\" in");
            println!("        comments|stored|state|resume|remove)");
            println!(
                "            COMPREPLY=( $(compgen -W \"$(tubecache videos --ids-only 2>/dev/null)\" -- \"$cur\") )"
            );
            println!("            return 0 ;;");
            println!("    esac");
            println!("    _tubecache \"$@\"");
            println!("}}");
            println!("complete -F _tubecache_dynamic -o bashdefault -o default tubecache");
        }
        Shell::Fish => {
            println!();
            println!("# Dynamic completion of stored video IDs");
            println!(
                "complete -c tubecache -n '__fish_seen_subcommand_from comments stored state resume remove' -a '(tubecache videos --ids-only 2>/dev/null)'"
            );
        }
        _ => {}
    }
}
