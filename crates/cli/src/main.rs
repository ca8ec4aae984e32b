use clap::{Parser, Subcommand};
use lib::api::BackendClient;
use lib::relay::{RelayRequest, RelayResponse};
use lib::storage::{CourseSet, LocalStorage};
use lib::ui::{AuthStatus, QuerySubmission, Session};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "canvasqa")]
#[command(about = "Canvas course Q&A CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Create the configuration directory with a default config and an empty storage file.
    Init {
        /// Config file path (default: CANVASQA_CONFIG_PATH or ~/.canvasqa/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Run the relay (HTTP + WebSocket) that brokers sign-in and queries for the UI.
    Relay {
        /// Config file path (default: CANVASQA_CONFIG_PATH or ~/.canvasqa/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// WebSocket and HTTP port (default from config or 15152)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Check that the relay is up.
    Ping {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Sign in through the relay and print the result.
    Login {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Fetch courses for a Canvas access token and remember them.
    Courses {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Canvas access token (default: stored token, CANVAS_ACCESS_TOKEN or backend.canvasToken)
        #[arg(long, short, value_name = "TOKEN")]
        token: Option<String>,
    },

    /// Send a free-form query through the relay and print the backend's JSON.
    Query {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Query text
        text: Vec<String>,
    },

    /// Ask questions about one of the stored courses (interactive).
    Ask {
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Course name (default: the only stored course)
        #[arg(long, value_name = "NAME")]
        course: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("canvasqa {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Init { config }) => {
            if let Err(e) = run_init(config) {
                log::error!("init failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Relay { config, port }) => {
            if let Err(e) = run_relay(config, port).await {
                log::error!("relay failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ping { config }) => {
            if let Err(e) = run_ping(config).await {
                log::error!("ping failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Login { config }) => {
            if let Err(e) = run_login(config).await {
                log::error!("login failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Courses { config, token }) => {
            if let Err(e) = run_courses(config, token).await {
                log::error!("courses failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Query { config, text }) => {
            if let Err(e) = run_query(config, text.join(" ")).await {
                log::error!("query failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { config, course }) => {
            if let Err(e) = run_ask(config, course).await {
                log::error!("ask failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

fn run_init(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path.unwrap_or_else(lib::config::default_config_path);
    let dir = lib::init::init_config_dir(&path)?;
    println!("initialized configuration at {}", dir.display());
    Ok(())
}

async fn run_relay(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, _) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.relay.port = p;
    }
    log::info!("starting relay on {}:{}", config.relay.bind, config.relay.port);
    lib::relay::run_relay(config).await
}

/// Send one request to the configured relay. A `success: false` response becomes an error.
async fn relay_request(
    config_path: Option<PathBuf>,
    request: RelayRequest,
) -> anyhow::Result<RelayResponse> {
    let (config, _) = lib::config::load_config(config_path)?;
    let token = lib::config::resolve_relay_token(&config);
    let url = config.relay.ws_url(token.as_deref());
    let res = lib::relay::request_once(&url, &request).await?;
    if !res.success {
        anyhow::bail!("{}", res.error.unwrap_or_else(|| "unknown error".to_string()));
    }
    Ok(res)
}

async fn run_ping(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let res = relay_request(config_path, RelayRequest::Ping).await?;
    println!("{}", res.message.as_deref().unwrap_or("alive"));
    Ok(())
}

/// First and last few characters only.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

async fn run_login(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let res = relay_request(config_path, RelayRequest::StartOAuth).await?;
    let token = res.token.unwrap_or_default();
    println!("signed in (token {})", mask_token(&token));
    Ok(())
}

fn print_courses(set: &CourseSet) {
    for course in &set.courses {
        if course.course_code.is_empty() {
            println!("{}\t{}", course.id, course.name);
        } else {
            println!("{}\t{}\t{}", course.id, course.course_code, course.name);
        }
    }
}

async fn run_courses(config_path: Option<PathBuf>, token: Option<String>) -> anyhow::Result<()> {
    let (config, path) = lib::config::load_config(config_path)?;
    let mut storage = LocalStorage::load(lib::config::resolve_storage_path(&config, &path));
    let token = token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| lib::config::resolve_canvas_token(&config))
        .or_else(|| storage.load_course_set().map(|s| s.course_token));
    let Some(token) = token else {
        anyhow::bail!("no Canvas token (pass --token, set CANVAS_ACCESS_TOKEN or backend.canvasToken)");
    };

    let backend = BackendClient::from_config(&config);
    let courses = backend.fetch_courses(&token).await?;
    if courses.is_empty() {
        anyhow::bail!("No courses found for this Canvas token");
    }
    let set = CourseSet {
        courses,
        course_token: token,
    };
    storage.save_course_set(&set)?;
    print_courses(&set);
    Ok(())
}

async fn run_query(config_path: Option<PathBuf>, text: String) -> anyhow::Result<()> {
    let res = relay_request(config_path, RelayRequest::SendQuery { query: text }).await?;
    let data = res.data.unwrap_or(serde_json::Value::Null);
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

fn pick_course(set: &CourseSet, wanted: Option<String>) -> anyhow::Result<String> {
    match wanted {
        Some(name) => Ok(name),
        None if set.courses.len() == 1 => Ok(set.courses[0].name.clone()),
        None => {
            print_courses(set);
            anyhow::bail!("Please select a course (--course NAME)")
        }
    }
}

async fn run_ask(config_path: Option<PathBuf>, course: Option<String>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let (config, path) = lib::config::load_config(config_path.clone())?;
    let storage = LocalStorage::load(lib::config::resolve_storage_path(&config, &path));
    let Some(set) = storage.load_course_set() else {
        anyhow::bail!("no stored courses; run `canvasqa courses --token <TOKEN>` first");
    };

    let signed_in = relay_request(config_path, RelayRequest::StartOAuth).await?;
    let session = Session {
        auth_status: AuthStatus::Success,
        bearer_token: signed_in.token,
    };
    let backend = BackendClient::from_config(&config);
    let mut submission = QuerySubmission::default();
    submission.selected_course = Some(pick_course(&set, course)?);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
            break;
        }

        submission.question = input.to_string();
        match submission.submit(&backend, &session, &set).await {
            Ok(Some(answer)) => println!("< {}", answer.trim()),
            Ok(None) => eprintln!("ask error: {}", submission.error().unwrap_or("unknown error")),
            Err(e) => eprintln!("{}", e),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib::api::Course;

    #[test]
    fn mask_token_hides_middle() {
        assert_eq!(mask_token("ya29.a0AfH6SMBxyz1234"), "ya29.a...1234");
        assert_eq!(mask_token("short"), "*****");
    }

    #[test]
    fn pick_course_defaults_to_only_course() {
        let set = CourseSet {
            courses: vec![Course {
                id: "1".into(),
                name: "Intro CS".into(),
                course_code: "CS101".into(),
            }],
            course_token: "t".into(),
        };
        assert_eq!(pick_course(&set, None).unwrap(), "Intro CS");
        assert_eq!(pick_course(&set, Some("Other".into())).unwrap(), "Other");
    }

    #[test]
    fn cli_parses_ask_course() {
        let cli = Cli::try_parse_from(["canvasqa", "ask", "--course", "Intro CS"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Ask { course: Some(c), .. }) if c == "Intro CS"));
    }
}
