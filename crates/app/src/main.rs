use std::fmt;
use std::sync::Arc;

use backend::http::wire::test_from_json;
use backend::{Backend, HttpBackendConfig, InMemoryBackend};
use exam_core::format_clock;
use exam_core::model::{OptionLabel, QuestionId, TestId, UserId};
use services::{
    Clock, ExamSessionService, SessionCommand, SessionConfig, SessionController, SessionEvent,
    SessionIdentity,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidId { flag: &'static str, raw: String },
    MissingSource,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::MissingSource => {
                write!(f, "either --file or --api with --test-id is required")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_id(flag: &'static str, raw: String) -> Result<u64, ArgsError> {
    raw.trim()
        .parse()
        .map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run --file <test.json> [--user <id>]");
    eprintln!("  cargo run -p app -- run --api <base_url> --test-id <id> [--user <id>]");
    eprintln!();
    eprintln!("Commands during a test:");
    eprintln!("  a <question> <label>   choose an option, e.g. `a 3 b`");
    eprintln!("  submit | back | yes | no | quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_TEST_FILE, EXAM_API_URL, EXAM_API_TOKEN, EXAM_TEST_ID, EXAM_USER_ID");
    eprintln!("  EXAM_TICK_MS, EXAM_SUBMIT_TIMEOUT_SECS, EXAM_ALWAYS_CONFIRM, RUST_LOG");
}

enum Source {
    File(String),
    Api { config: HttpBackendConfig, test_id: TestId },
}

struct Args {
    source: Source,
    user: Option<UserId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut file = std::env::var("EXAM_TEST_FILE").ok();
        let mut api = HttpBackendConfig::from_env();
        let mut test_id = std::env::var("EXAM_TEST_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(TestId::new);
        let mut user = std::env::var("EXAM_USER_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(UserId::new);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--file" => file = Some(require_value(args, "--file")?),
                "--api" => {
                    let url = require_value(args, "--api")?;
                    let mut config = HttpBackendConfig::new(url);
                    config.api_token = api.and_then(|c| c.api_token);
                    api = Some(config);
                }
                "--test-id" => {
                    let value = require_value(args, "--test-id")?;
                    test_id = Some(TestId::new(parse_id("--test-id", value)?));
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user = Some(UserId::new(parse_id("--user", value)?));
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let source = match (file, api, test_id) {
            (Some(path), _, _) => Source::File(path),
            (None, Some(config), Some(test_id)) => Source::Api { config, test_id },
            _ => return Err(ArgsError::MissingSource),
        };
        Ok(Self { source, user })
    }
}

/// Which prompt a bare `yes` / `no` answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    None,
    Submit,
    Leave,
}

fn parse_command(line: &str, pending: Pending) -> Option<SessionCommand> {
    let mut words = line.split_whitespace();
    let command = match words.next()? {
        "a" | "answer" => {
            let question = words.next()?.parse::<u64>().ok()?;
            let label = words.next()?.parse::<OptionLabel>().ok()?;
            SessionCommand::SelectAnswer {
                question: QuestionId::new(question),
                label,
            }
        }
        "submit" => SessionCommand::Submit,
        "back" => SessionCommand::Leave,
        "quit" => SessionCommand::Shutdown,
        "yes" | "y" => match pending {
            Pending::Submit => SessionCommand::ConfirmSubmit,
            Pending::Leave => SessionCommand::ConfirmLeave,
            Pending::None => return None,
        },
        "no" | "n" => match pending {
            Pending::Submit => SessionCommand::CancelSubmit,
            Pending::Leave => SessionCommand::CancelLeave,
            Pending::None => return None,
        },
        _ => return None,
    };
    Some(command)
}

/// Result of handing a command to the session task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Forward {
    Sent,
    Busy,
    Closed,
}

/// Never waits on the command channel: the session task may itself be blocked
/// on delivering events to this loop.
fn forward(commands: &mpsc::Sender<SessionCommand>, command: SessionCommand) -> Forward {
    match commands.try_send(command) {
        Ok(()) => Forward::Sent,
        Err(TrySendError::Full(_)) => Forward::Busy,
        Err(TrySendError::Closed(_)) => Forward::Closed,
    }
}

fn print_paper(session: &SessionController) {
    let definition = session.definition();
    for section in definition.sections() {
        println!("== {section}");
        for question in definition.questions().iter().filter(|q| q.section == section) {
            println!("[{}] {} ({} marks)", question.id, question.text, question.marks);
            for option in &question.options {
                println!("    {}) {}", option.label, option.text);
            }
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1).peekable();
    if argv.peek().map(String::as_str) == Some("run") {
        argv.next();
    }
    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let (backend, test_id) = match parsed.source {
        Source::File(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let definition = test_from_json(&raw)?;
            let test_id = definition.id();
            let repo = InMemoryBackend::new();
            repo.insert_test(definition)?;
            (Backend::in_memory(repo), test_id)
        }
        Source::Api { config, test_id } => (Backend::http(config), test_id),
    };

    let identity = match parsed.user {
        Some(user) => SessionIdentity::signed_in(user),
        None => SessionIdentity::anonymous(),
    };
    let service =
        ExamSessionService::from_backend(Clock::default_clock(), &backend, Arc::new(identity))
            .with_config(SessionConfig::from_env());

    let mut session = service.open_session(test_id).await?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!(
        "{} - {} questions, {} minutes. Press Enter to start, or type `back` to leave.",
        session.definition().title(),
        session.definition().question_count(),
        session.definition().nominal_duration_minutes()
    );
    let first = lines.next_line().await?.unwrap_or_default();
    if first.trim() == "back" {
        session.on_leave_requested();
        return Ok(());
    }
    let duration = session.accept_instructions().map_err(|e| e.user_message())?;
    println!("Time allowed: {}", format_clock(duration));
    print_paper(&session);

    let mut handle = service.spawn(session);
    let mut pending = Pending::None;
    let mut stdin_open = true;
    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let Some(line) = line? else {
                    stdin_open = false;
                    continue;
                };
                match parse_command(&line, pending) {
                    Some(command) => {
                        let answers_prompt = matches!(
                            command,
                            SessionCommand::ConfirmSubmit
                                | SessionCommand::CancelSubmit
                                | SessionCommand::ConfirmLeave
                                | SessionCommand::CancelLeave
                        );
                        match forward(&handle.commands, command) {
                            Forward::Sent => {
                                if answers_prompt {
                                    pending = Pending::None;
                                }
                            }
                            Forward::Busy => println!("Still working, try again."),
                            Forward::Closed => break,
                        }
                    }
                    None => println!("?"),
                }
            }
            event = handle.events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::Tick { remaining_secs } => {
                        if remaining_secs % 60 == 0 || remaining_secs <= 10 {
                            println!("{} left", format_clock(remaining_secs));
                        }
                    }
                    SessionEvent::TimeUp => println!("Time is up."),
                    SessionEvent::ConfirmSubmit { answered, total } => {
                        pending = Pending::Submit;
                        println!("{answered} of {total} answered. Submit anyway? (yes/no)");
                    }
                    SessionEvent::ConfirmLeave => {
                        pending = Pending::Leave;
                        println!("Leaving will submit your test. Continue? (yes/no)");
                    }
                    SessionEvent::Submitting { .. } => println!("Submitting..."),
                    SessionEvent::Submitted { ack } => {
                        println!("Submitted.");
                        if let Some(reference) = ack.reference {
                            println!("Reference: {reference}");
                        }
                    }
                    SessionEvent::SubmitFailed { message } | SessionEvent::Error { message } => {
                        println!("{message}");
                    }
                    SessionEvent::LeaveAllowed => println!("Bye."),
                }
            }
        }
    }

    let session = handle.task.await?;
    info!(status = %session.status(), "session closed");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
