//! Debate Arena CLI - scripted audio debates
//!
//! Generates a debate through the Debate Arena service and narrates its turns
//! back to back with subtitles.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use debate_arena_core::config::BASE_URL_ENV;
use debate_arena_core::voices::{self, Voice};
use debate_arena_core::{
    ArenaError, ClipStore, Config, GenerationError, GenerationInput, GenerationPhase,
    GenerationPipeline, HttpDebateService, Identity, PlaybackScheduler, PlaybackUpdate,
    RodioOutput, Speaker, default_config,
};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "debate-arena",
    version,
    about = "AI Debate Arena - listen to generated debates",
    long_about = "A CLI tool that generates scripted debates between two personas and narrates them turn by turn."
)]
struct Cli {
    /// Generation service base URL (overrides DEBATE_ARENA_API_BASE_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_base: Option<String>,

    /// Path to a TOML config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a debate and play it (default)
    Run(RunArgs),
    /// List the voices offered by the service
    Voices,
    /// Check that the service is up
    Health,
}

#[derive(Args, Clone, Default)]
struct RunArgs {
    /// The topic to debate
    #[arg(value_name = "TOPIC")]
    topic: Option<String>,

    /// Fixed persona label for side A
    #[arg(long, value_name = "NAME")]
    persona_a: Option<String>,

    /// Fixed persona label for side B
    #[arg(long, value_name = "NAME")]
    persona_b: Option<String>,

    /// Catalog voice id for side A
    #[arg(long, value_name = "VOICE_ID", conflicts_with = "persona_a")]
    voice_a: Option<String>,

    /// Catalog voice id for side B
    #[arg(long, value_name = "VOICE_ID", conflicts_with = "persona_b")]
    voice_b: Option<String>,

    /// Number of turns (2-20)
    #[arg(short, long, value_name = "TURNS")]
    turns: Option<u32>,

    /// Ask for a lighter, humorous debate
    #[arg(long)]
    humor: bool,

    /// Turn to start playback from
    #[arg(long, default_value = "0", value_name = "INDEX")]
    start_at: usize,

    /// Print the transcript without playing audio
    #[arg(long)]
    no_play: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };

    let env_base = env::var(BASE_URL_ENV).ok();
    let base_url = config.base_url(cli.api_base.as_deref(), env_base.as_deref());
    debug!(%base_url, "Resolved generation service");
    let service = HttpDebateService::new(&base_url, &config.service)?;

    match cli.command {
        Some(Command::Voices) => list_voices(&service).await,
        Some(Command::Health) => check_health(&service).await,
        Some(Command::Run(args)) => run_debate(service, &config, args).await,
        None => run_debate(service, &config, cli.run).await,
    }
}

async fn list_voices(service: &HttpDebateService) -> Result<(), Box<dyn std::error::Error>> {
    let voices = service.voices().await.map_err(ArenaError::from)?;
    if voices.is_empty() {
        println!("{}", "No voices available.".yellow());
        return Ok(());
    }

    println!("{}", "Voices:".bold());
    for voice in &voices {
        println!(
            "  {} {} {}",
            voice.voice_id.dimmed(),
            voice.display_name().bright_cyan(),
            format!("({})", voice.name).dimmed()
        );
    }
    Ok(())
}

async fn check_health(service: &HttpDebateService) -> Result<(), Box<dyn std::error::Error>> {
    if service.health().await? {
        println!("{} {}", "Service healthy:".green().bold(), service.base_url());
    } else {
        println!("{} {}", "Service degraded:".yellow().bold(), service.base_url());
    }
    Ok(())
}

async fn run_debate(
    service: HttpDebateService,
    config: &Config,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let (persona_a, persona_b) = resolve_identities(&service, config, &args).await;
    let input = GenerationInput {
        topic: args
            .topic
            .clone()
            .unwrap_or_else(|| config.defaults.topic.clone()),
        persona_a,
        persona_b,
        turns: args.turns.unwrap_or(config.defaults.turns),
        humor_mode: Some(args.humor || config.defaults.humor_mode),
    };

    let pipeline = GenerationPipeline::new(service);
    let store = match generate_with_progress(&pipeline, &input).await {
        Ok(store) => store,
        Err(GenerationError::Validation(e)) => {
            eprintln!("{} {}", "Error:".red().bold(), ArenaError::from(e));
            eprintln!("Enter a valid topic and choose two different voices.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), ArenaError::from(e));
            std::process::exit(1);
        }
    };

    print_transcript(&store);

    if args.no_play {
        return Ok(());
    }

    let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
    let output = RodioOutput::open(tx)?;
    let mut scheduler = PlaybackScheduler::new(output).with_callback(create_console_callback());
    scheduler.replace_store(store);

    if let Err(e) = scheduler.play_from(args.start_at) {
        eprintln!("{}", ArenaError::from(e).to_string().red().bold());
        std::process::exit(1);
    }

    let outcome = tokio::select! {
        result = scheduler.run(&mut events) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            eprintln!("{}", ArenaError::from(e).to_string().red().bold());
            std::process::exit(1);
        }
        None => scheduler.stop(),
    }

    Ok(())
}

/// One side's identity choices: explicit persona, explicit voice, config default.
type SideChoice<'a> = (Option<&'a str>, Option<&'a str>, Option<&'a str>);

/// Only sides without a fixed persona fall back to the voice catalog.
fn needs_catalog((persona, voice, default_persona): SideChoice<'_>) -> bool {
    persona.is_none() && (voice.is_some() || default_persona.is_none())
}

/// Pick one side's identity from its explicit persona, explicit voice, the
/// config default, or the catalog default, in that order.
fn pick_identity(
    speaker: Speaker,
    (persona, voice, default_persona): SideChoice<'_>,
    catalog: &[Voice],
    catalog_default: Option<&str>,
) -> Identity {
    match (persona, voice, default_persona) {
        (Some(label), _, _) => Identity::persona(label),
        (None, Some(id), _) => voices::identity_for(catalog, Some(id), speaker),
        (None, None, Some(label)) => Identity::persona(label),
        (None, None, None) => voices::identity_for(catalog, catalog_default, speaker),
    }
}

async fn resolve_identities(
    service: &HttpDebateService,
    config: &Config,
    args: &RunArgs,
) -> (Identity, Identity) {
    let side_a: SideChoice<'_> = (
        args.persona_a.as_deref(),
        args.voice_a.as_deref(),
        config.defaults.persona_a.as_deref(),
    );
    let side_b: SideChoice<'_> = (
        args.persona_b.as_deref(),
        args.voice_b.as_deref(),
        config.defaults.persona_b.as_deref(),
    );

    let catalog: Vec<Voice> = if needs_catalog(side_a) || needs_catalog(side_b) {
        match service.voices().await {
            Ok(voices) => voices,
            Err(e) => {
                eprintln!("{} {}", "Warning:".yellow().bold(), ArenaError::from(e));
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let (default_a, default_b) = voices::default_selection(&catalog);
    (
        pick_identity(Speaker::PersonaA, side_a, &catalog, default_a.as_deref()),
        pick_identity(Speaker::PersonaB, side_b, &catalog, default_b.as_deref()),
    )
}

/// Generate while printing the estimated phase once per second.
async fn generate_with_progress(
    pipeline: &GenerationPipeline<HttpDebateService>,
    input: &GenerationInput,
) -> Result<Arc<ClipStore>, GenerationError> {
    let mut progress = pipeline.subscribe();

    let printer = async {
        while progress.changed().await.is_ok() {
            let state = progress.borrow_and_update().clone();
            match state.phase {
                GenerationPhase::InFlight => {
                    if let Some(label) = state.phase_label() {
                        eprint!(
                            "\r{} {} {}   ",
                            "⏳".bright_blue(),
                            label.bright_white(),
                            format!("(elapsed: {}s)", state.elapsed_seconds).dimmed()
                        );
                    }
                }
                GenerationPhase::Succeeded | GenerationPhase::Failed => {
                    eprintln!();
                    break;
                }
                GenerationPhase::Idle => {}
            }
        }
    };

    let (result, ()) = tokio::join!(pipeline.submit(input), printer);
    result
}

fn print_transcript(store: &ClipStore) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Debate Arena".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), store.topic().bright_white());
    println!();
    println!("{}", "Turns:".bold());
    for turn in store.turns() {
        println!(
            "  {}. {}: {}",
            turn.index + 1,
            turn.display_label.bright_cyan(),
            turn.text
        );
    }
    println!();
    println!("{}", "─".repeat(70).dimmed());
}

/// Create a callback that prints subtitles to the console as turns start.
fn create_console_callback() -> Box<dyn Fn(PlaybackUpdate) + Send + Sync> {
    Box::new(move |update| match update {
        PlaybackUpdate::TurnStarted {
            index,
            speaker,
            label,
            text,
        } => {
            let name = match speaker {
                Speaker::PersonaA => label.bright_cyan().bold(),
                Speaker::PersonaB => label.bright_magenta().bold(),
            };
            println!("{} {} {}", "▶".bright_cyan(), name, format!("#{}", index + 1).dimmed());
            for line in wrap_words(&text, 66) {
                println!("  {}", line);
            }
            println!();
        }
        PlaybackUpdate::Completed => {
            println!("{}", "═".repeat(70).bright_blue());
            println!("{}", "  Debate concluded.".bright_green().bold());
            println!("{}", "═".repeat(70).bright_blue());
        }
        PlaybackUpdate::Stopped => {
            println!("{}", "  Playback stopped.".yellow());
        }
        // Reported once by the caller from the returned error.
        PlaybackUpdate::Failed { .. } => {}
    })
}

/// Break `text` into lines of at most `width` characters, never splitting a word.
fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let line_chars = line.chars().count();
        if line_chars > 0 && line_chars + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_words_respects_width_in_chars() {
        let lines = wrap_words("débat sur l'énergie nucléaire et climat", 12);
        assert!(lines.iter().all(|line| line.chars().count() <= 12));
        assert_eq!(lines.join(" "), "débat sur l'énergie nucléaire et climat");
        assert!(wrap_words("   ", 10).is_empty());
    }

    fn catalog() -> Vec<Voice> {
        vec![
            Voice {
                voice_id: "v1".to_string(),
                name: "Rachel - calm".to_string(),
            },
            Voice {
                voice_id: "v2".to_string(),
                name: "Adam - deep".to_string(),
            },
        ]
    }

    #[test]
    fn test_one_sided_persona_is_kept() {
        let catalog = catalog();
        let (default_a, default_b) = voices::default_selection(&catalog);
        let side_a: SideChoice<'_> = (Some("Scientist"), None, None);
        let side_b: SideChoice<'_> = (None, None, None);

        assert!(!needs_catalog(side_a));
        assert!(needs_catalog(side_b));

        let a = pick_identity(Speaker::PersonaA, side_a, &catalog, default_a.as_deref());
        let b = pick_identity(Speaker::PersonaB, side_b, &catalog, default_b.as_deref());
        assert_eq!(a.label, "Scientist");
        assert_eq!(a.voice_id, None);
        assert_eq!(b.voice_id.as_deref(), Some("v2"));
    }

    #[test]
    fn test_explicit_voice_beats_config_persona() {
        let catalog = catalog();
        let side_a: SideChoice<'_> = (Some("Economist"), None, None);
        let side_b: SideChoice<'_> = (None, Some("v1"), Some("Historian"));

        assert!(needs_catalog(side_b));
        let a = pick_identity(Speaker::PersonaA, side_a, &catalog, None);
        let b = pick_identity(Speaker::PersonaB, side_b, &catalog, Some("v2"));
        assert_eq!(a.label, "Economist");
        assert_eq!(b.voice_id.as_deref(), Some("v1"));

        let config_only: SideChoice<'_> = (None, None, Some("Historian"));
        assert!(!needs_catalog(config_only));
        let b = pick_identity(Speaker::PersonaB, config_only, &[], None);
        assert_eq!(b.label, "Historian");
    }

    #[test]
    fn test_cli_parses_run_flags_without_subcommand() {
        let cli = Cli::try_parse_from([
            "debate-arena",
            "Should cities ban cars?",
            "--persona-a",
            "Scientist",
            "--persona-b",
            "Economist",
            "--turns",
            "8",
        ])
        .unwrap();

        assert!(cli.command.is_none());
        assert_eq!(cli.run.topic.as_deref(), Some("Should cities ban cars?"));
        assert_eq!(cli.run.turns, Some(8));
        assert_eq!(cli.run.persona_b.as_deref(), Some("Economist"));
    }

    #[test]
    fn test_cli_parses_voices_subcommand() {
        let cli = Cli::try_parse_from(["debate-arena", "--api-base", "http://x", "voices"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Voices)));
        assert_eq!(cli.api_base.as_deref(), Some("http://x"));
    }
}
