use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use binvcs::{Metadata, OpenOptions, Repo, StateDiff};

#[derive(Parser, Debug)]
#[command(name = "binvcs", version, about = "Version binary workspaces by content hash")]
struct Cli {
    /// Workspace root.
    #[arg(short = 'C', long, env = "BINVCS_WORKSPACE", default_value = ".")]
    workspace: PathBuf,

    /// Extra exclude pattern (repeatable).
    #[arg(long = "exclude", global = true)]
    exclude: Vec<String>,

    /// Ignore the workspace's .binvcsignore file.
    #[arg(long, global = true)]
    no_ignore_file: bool,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the repository.
    Init,
    /// Snapshot the workspace for a session.
    Capture {
        #[arg(short, long)]
        session: String,
        /// Message stored under the `message` key.
        #[arg(short, long)]
        message: Option<String>,
        /// Extra metadata as key=value (repeatable).
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
    },
    /// List states in chain order.
    Log,
    /// Diff two states.
    Diff { from: String, to: String },
    /// Show uncommitted changes for a session.
    Status {
        #[arg(short, long)]
        session: String,
    },
    /// Print per-file versions of a session revision as JSON.
    Versions {
        #[arg(short, long)]
        session: String,
        #[arg(short, long)]
        revision: Option<u32>,
        path: Option<String>,
    },
    /// List files of a state, optionally filtered by a glob.
    Ls { state: String, pattern: Option<String> },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {:?}", s))
}

fn print_diff(diff: &StateDiff) {
    if diff.is_empty() {
        println!("no changes");
        return;
    }
    for action in diff.actions() {
        let tag = match action.kind {
            binvcs::ChangeKind::Added => "A",
            binvcs::ChangeKind::Removed => "D",
            binvcs::ChangeKind::Modified => "M",
            binvcs::ChangeKind::Unchanged => " ",
        };
        println!("{} {}", tag, action.path);
    }
}

fn run(cli: Cli) -> binvcs::Result<()> {
    let options = OpenOptions {
        create: matches!(cli.command, Command::Init),
        exclude: cli.exclude.clone(),
        exclude_from: None,
        use_ignore_file: !cli.no_ignore_file,
    };
    let mut repo = Repo::open(&cli.workspace, options)?;

    match cli.command {
        Command::Init => {
            println!("initialized {}", repo.repo_dir().display());
        }
        Command::Capture {
            session,
            message,
            data,
        } => {
            let mut metadata = Metadata::new();
            if let Some(message) = message {
                metadata.insert("message".into(), message.into());
            }
            for (k, v) in data {
                metadata.insert(k, v.into());
            }
            let capture = repo.capture(&session, metadata)?;
            println!(
                "{} revision {} -> {}{}",
                session,
                capture.revision,
                capture.state_id,
                if capture.created { "" } else { " (reused)" }
            );
            print_diff(&capture.changes);
        }
        Command::Log => {
            for state in repo.chain() {
                let message = state
                    .data()
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                println!(
                    "{}  {}  [{}]  {}",
                    state.state_id(),
                    state.timestamp(),
                    state.session_list().join(","),
                    message
                );
            }
        }
        Command::Diff { from, to } => print_diff(&repo.diff(&from, &to)?),
        Command::Status { session } => print_diff(&repo.status(&session)?),
        Command::Versions {
            session,
            revision,
            path,
        } => {
            let session = repo.session(&session)?;
            let table = session.detail_file_version(revision, path.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&table)?);
        }
        Command::Ls { state, pattern } => {
            let tree = repo.chain().state(&state)?.state_tree();
            match pattern {
                Some(p) => tree.glob(&p).iter().for_each(|path| println!("{}", path)),
                None => tree
                    .leaves()
                    .iter()
                    .for_each(|(path, hash)| println!("{}  {}", hash, path)),
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("binvcs: {}", e);
            ExitCode::FAILURE
        }
    }
}
