mod config;
mod output;
mod simulate;
mod store;

use clap::Parser;
use peerround_core::{feedback_for, standings, ActivityRounds, RoundEngine};
use std::io::{self, BufRead, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::output::ActivityStatus;
use crate::store::{ActivityFile, FileStore};

pub fn bail(msg: impl std::fmt::Display) -> ! {
    eprintln!("Error: {msg}");
    std::process::exit(1);
}

#[derive(Parser)]
#[command(
    name = "peerround",
    version,
    about = "Pair peer-review submissions and assign evaluators, round by round"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Log round progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (default: ~/.config/peerround/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a default config file at ~/.config/peerround/config.toml
    Init,
    /// Create a new activity file
    Create(CreateArgs),
    /// Advance an activity to its next round and assign evaluators
    Advance(AdvanceArgs),
    /// Record an evaluator's verdict for the current round
    Record(RecordArgs),
    /// Show the current round and who still has to submit
    Status(ActivityArgs),
    /// Show wins, losses and ranks so far
    Standings(ActivityArgs),
    /// Show the feedback a participant has received, round by round
    Feedback(FeedbackArgs),
    /// Mark (or unmark) feedback as helpful
    Star(StarArgs),
    /// Clear every round and evaluation, keeping the participants
    Reset(ActivityArgs),
    /// Run a whole activity in memory with scripted verdicts
    Simulate(SimulateArgs),
}

#[derive(Parser)]
struct ActivityArgs {
    /// Activity file (JSON)
    #[arg(long)]
    activity: PathBuf,
}

#[derive(Parser)]
struct CreateArgs {
    /// Activity file to create (JSON)
    #[arg(long)]
    activity: PathBuf,

    /// Activity id (default: the file name without extension)
    #[arg(long)]
    id: Option<String>,

    /// File with one participant per line, or a JSON array
    #[arg(long)]
    participants: Option<PathBuf>,

    /// Inline participant key (repeatable)
    #[arg(long = "participant")]
    inline_participants: Vec<String>,
}

#[derive(Parser)]
struct AdvanceArgs {
    /// Activity file (JSON)
    #[arg(long)]
    activity: PathBuf,

    /// Seed for tie-breaking (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Parser)]
struct RecordArgs {
    /// Activity file (JSON)
    #[arg(long)]
    activity: PathBuf,

    /// Participant submitting the evaluation
    #[arg(long)]
    evaluator: String,

    /// The participant in the evaluator's pair who won
    #[arg(long)]
    winner: String,

    /// Feedback for one member of the pair, as <participant>=<text> (repeatable)
    #[arg(long = "comment", value_parser = parse_comment)]
    comments: Vec<(String, String)>,
}

#[derive(Parser)]
struct FeedbackArgs {
    /// Activity file (JSON)
    #[arg(long)]
    activity: PathBuf,

    /// Author whose received feedback to show
    #[arg(long)]
    participant: String,
}

#[derive(Parser)]
struct StarArgs {
    /// Activity file (JSON)
    #[arg(long)]
    activity: PathBuf,

    /// Author who received the feedback
    #[arg(long)]
    participant: String,

    /// Evaluator who wrote it
    #[arg(long)]
    evaluator: String,

    /// Round it was written in
    #[arg(long)]
    round: usize,
}

/// Split `--comment` values at the first '='.
fn parse_comment(value: &str) -> Result<(String, String), String> {
    let (subject, text) = value
        .split_once('=')
        .ok_or_else(|| format!("expected <participant>=<text>, got \"{value}\""))?;
    let subject = subject.trim();
    if subject.is_empty() {
        return Err("comment is missing the participant before '='".to_string());
    }
    Ok((subject.to_string(), text.trim().to_string()))
}

#[derive(Parser)]
struct SimulateArgs {
    /// Number of simulated participants
    #[arg(long)]
    participants: Option<usize>,

    /// Number of rounds to run
    #[arg(long)]
    rounds: Option<usize>,

    /// Seed for tie-breaking (overrides the config file)
    #[arg(long)]
    seed: Option<u64>,
}

/// Parse a string as either a JSON array of strings or plain text (one participant per line).
fn parse_participants_from_str(content: &str) -> Vec<String> {
    let trimmed = content.trim();
    if trimmed.starts_with('[') {
        let keys: Vec<String> = serde_json::from_str(trimmed)
            .unwrap_or_else(|e| bail(format!("File looks like JSON but failed to parse: {e}")));
        keys.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    } else {
        trimmed
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Load participants from all sources: --participants file, --participant inline args, or stdin.
fn load_participants(args: &CreateArgs) -> Vec<String> {
    let mut keys = Vec::new();

    if let Some(ref path) = args.participants {
        let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
            bail(format!("Failed to read participants file {}: {e}", path.display()))
        });
        keys = parse_participants_from_str(&content);
    }

    keys.extend(args.inline_participants.iter().cloned());

    // From stdin (only if no file and no inline participants)
    if keys.is_empty() {
        let stdin = io::stdin();
        if stdin.is_terminal() {
            bail("No participants provided. Use --participants <file>, --participant <key>, or pipe them via stdin.");
        }
        let content: String = stdin
            .lock()
            .lines()
            .map(|l| l.unwrap_or_else(|e| bail(format!("Failed to read from stdin: {e}"))))
            .collect::<Vec<_>>()
            .join("\n");
        keys = parse_participants_from_str(&content);
    }

    let mut seen = std::collections::HashSet::new();
    keys.retain(|k| {
        let fresh = seen.insert(k.clone());
        if !fresh {
            warn!(participant = %k, "listed more than once; keeping the first");
        }
        fresh
    });

    if keys.len() < peerround_core::constants::MIN_PARTICIPANTS {
        bail(format!(
            "Need at least {} participants, got {}",
            peerround_core::constants::MIN_PARTICIPANTS,
            keys.len()
        ));
    }
    keys
}

fn default_activity_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| bail(format!("Cannot derive an activity id from {}; pass --id", path.display())))
}

fn init_tracing(verbose: bool, log_level: Option<&str>) {
    let default = if verbose { "info" } else { log_level.unwrap_or("warn") };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

async fn load_activity(store: &FileStore) -> ActivityFile {
    store
        .load()
        .await
        .unwrap_or_else(|e| bail(format!("Failed to load activity {}: {e}", store.path().display())))
}

async fn save_activity(store: &FileStore, activity: &ActivityFile) {
    store
        .save(activity)
        .await
        .unwrap_or_else(|e| bail(format!("Failed to save activity {}: {e}", store.path().display())))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(config::config_path);
    let cfg = config::load_config(&config_path);
    init_tracing(cli.verbose, cfg.log_level.as_deref());

    match cli.command {
        Commands::Init => {
            let path = config::create_default_config();
            println!("Created config at {}", path.display());
            println!("Edit it to set your default seed, simulation size, etc.");
        }
        Commands::Create(args) => run_create(args, cli.json).await,
        Commands::Advance(args) => {
            let seed = args.seed.or(cfg.seed);
            run_advance(&args.activity, seed, cli.json).await
        }
        Commands::Record(args) => run_record(args, cli.json).await,
        Commands::Status(args) => run_status(&args.activity, cli.json).await,
        Commands::Standings(args) => run_standings(&args.activity, cli.json).await,
        Commands::Feedback(args) => run_feedback(args, cli.json).await,
        Commands::Star(args) => run_star(args).await,
        Commands::Reset(args) => run_reset(&args.activity).await,
        Commands::Simulate(args) => {
            let participants = args.participants.or(cfg.participants).unwrap_or(10);
            let rounds = args.rounds.or(cfg.rounds).unwrap_or(5);
            let seed = args.seed.or(cfg.seed);
            run_simulate(participants, rounds, seed, cli.json).await
        }
    }
}

async fn run_create(args: CreateArgs, json: bool) {
    let id = args.id.clone().unwrap_or_else(|| default_activity_id(&args.activity));
    let participants = load_participants(&args);
    let activity = ActivityFile::new(id, participants);

    let store = FileStore::new(&args.activity);
    store
        .create(&activity)
        .await
        .unwrap_or_else(|e| bail(format!("Failed to create activity {}: {e}", args.activity.display())));
    info!(activity = %activity.id, participants = activity.participants.len(), "activity created");

    if json {
        output::print_json(&activity);
    } else {
        println!(
            "Created activity \"{}\" with {} participants at {}",
            activity.id,
            activity.participants.len(),
            args.activity.display(),
        );
    }
}

async fn run_advance(path: &Path, seed: Option<u64>, json: bool) {
    let store = FileStore::new(path);
    let mut activity = load_activity(&store).await;

    let pending = activity.pending_evaluators().len();
    if pending > 0 {
        warn!(
            round = activity.current_round,
            pending, "advancing before every evaluator has submitted"
        );
    }

    // Offset the seed by the round so a seeded activity does not replay the
    // same shuffles every time it is resumed from disk.
    let round_seed = seed.map(|s| s.wrapping_add(activity.current_round as u64));
    let mut rounds = match round_seed {
        Some(s) => ActivityRounds::with_seed(s),
        None => ActivityRounds::new(),
    };
    if let Some(state) = activity.engine.take() {
        let engine = match round_seed {
            Some(s) => RoundEngine::restore_with_seed(state, s),
            None => RoundEngine::restore(state),
        };
        rounds.insert(&activity.id, engine);
    }

    let outcome = rounds
        .advance_round(&store, &activity.id)
        .await
        .unwrap_or_else(|e| bail(e));

    activity.current_round = outcome.round;
    activity.assignment = outcome.assignment.clone();
    activity.engine = rounds.engine(&activity.id).map(RoundEngine::state);
    save_activity(&store, &activity).await;

    if json {
        output::print_json(&outcome);
    } else {
        output::print_round(&activity.id, &outcome);
    }
}

async fn run_record(args: RecordArgs, json: bool) {
    let store = FileStore::new(&args.activity);
    let mut activity = load_activity(&store).await;

    let outcome = activity
        .record(&args.evaluator, &args.winner, &args.comments)
        .unwrap_or_else(|e| bail(e))
        .clone();
    save_activity(&store, &activity).await;
    info!(evaluator = %outcome.evaluator, winner = %outcome.winner, round = ?outcome.round, "evaluation recorded");

    if json {
        output::print_json(&outcome);
    } else {
        println!(
            "Recorded: {} judged {} vs {}, winner {}",
            outcome.evaluator, outcome.left, outcome.right, outcome.winner,
        );
    }
}

async fn run_status(path: &Path, json: bool) {
    let store = FileStore::new(path);
    let activity = load_activity(&store).await;
    let status = ActivityStatus {
        id: &activity.id,
        round: activity.current_round,
        participants: activity.participants.len(),
        evaluations: activity.evaluations.len(),
        assignment: &activity.assignment,
        pending: activity.pending_evaluators(),
    };

    if json {
        output::print_json(&status);
    } else {
        output::print_status(&status);
    }
}

async fn run_standings(path: &Path, json: bool) {
    let store = FileStore::new(path);
    let activity = load_activity(&store).await;
    let table = standings(&activity.participants, &activity.evaluations);

    if json {
        output::print_json(&table);
    } else {
        output::print_standings(&table);
    }
}

async fn run_feedback(args: FeedbackArgs, json: bool) {
    let store = FileStore::new(&args.activity);
    let activity = load_activity(&store).await;
    if !activity.participants.contains(&args.participant) {
        bail(format!("{} is not a participant in \"{}\"", args.participant, activity.id));
    }
    let received = feedback_for(&args.participant, &activity.evaluations);

    if json {
        output::print_json(&received);
    } else {
        output::print_feedback(&args.participant, &received);
    }
}

async fn run_star(args: StarArgs) {
    let store = FileStore::new(&args.activity);
    let mut activity = load_activity(&store).await;
    let starred = activity
        .toggle_star(&args.participant, &args.evaluator, args.round)
        .unwrap_or_else(|e| bail(e));
    save_activity(&store, &activity).await;

    let state = if starred { "Starred" } else { "Unstarred" };
    println!("{state} feedback from {} in round {}", args.evaluator, args.round);
}

async fn run_reset(path: &Path) {
    let store = FileStore::new(path);
    let mut activity = load_activity(&store).await;
    activity.reset();
    save_activity(&store, &activity).await;
    println!("Reset activity \"{}\"; the next advance starts round 1", activity.id);
}

async fn run_simulate(participants: usize, rounds: usize, seed: Option<u64>, json: bool) {
    let report = simulate::run_simulation(participants, rounds, seed)
        .await
        .unwrap_or_else(|e| bail(e));

    if json {
        output::print_json(&report);
    } else {
        output::print_simulation(&report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_participants() {
        let keys = parse_participants_from_str("  a@x.test\n\nb@x.test \n c@x.test\n");
        assert_eq!(keys, vec!["a@x.test", "b@x.test", "c@x.test"]);
    }

    #[test]
    fn test_parse_json_participants() {
        let keys = parse_participants_from_str(r#"["a@x.test", " ", "b@x.test"]"#);
        assert_eq!(keys, vec!["a@x.test", "b@x.test"]);
    }

    #[test]
    fn test_parse_comment_splits_at_first_equals() {
        assert_eq!(
            parse_comment("a@x.test=use = sparingly").unwrap(),
            ("a@x.test".to_string(), "use = sparingly".to_string())
        );
        assert!(parse_comment("no separator").is_err());
        assert!(parse_comment("=text").is_err());
    }

    #[test]
    fn test_record_accepts_repeated_comments() {
        let cli = Cli::try_parse_from([
            "peerround", "record", "--activity", "a.json", "--evaluator", "c", "--winner", "a",
            "--comment", "a=clear", "--comment", "b=vague",
        ])
        .unwrap();
        match cli.command {
            Commands::Record(args) => assert_eq!(args.comments.len(), 2),
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn test_default_activity_id_is_file_stem() {
        assert_eq!(default_activity_id(Path::new("/tmp/essay-week3.json")), "essay-week3");
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "peerround", "advance", "--activity", "a.json", "--seed", "9", "--json",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Advance(args) => assert_eq!(args.seed, Some(9)),
            _ => panic!("expected advance"),
        }
    }
}
