use clap::{Parser, Subcommand};
use mcpool::{ClientConfig, Connection, ConnectionOption, ConnectionPool, CounterOptions, Value};
use tracing::{error, info};
use tracing::Level;
use tracing_appender::non_blocking;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[derive(Parser)]
#[command(name = "mcpool")]
#[command(about = "Pooled memcached client")]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Server as host[:port][/weight]; repeatable, overrides the config file
    #[arg(short, long)]
    server: Vec<String>,

    /// Use the binary protocol
    #[arg(short, long)]
    binary: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Print a stored value
    Get { key: String },
    /// Store a value unconditionally
    Set {
        key: String,
        value: String,
        #[arg(short, long, default_value_t = 0)]
        expire: u32,
    },
    /// Store a value only if the key is absent
    Add {
        key: String,
        value: String,
        #[arg(short, long, default_value_t = 0)]
        expire: u32,
    },
    /// Store a value only if the key exists
    Replace {
        key: String,
        value: String,
        #[arg(short, long, default_value_t = 0)]
        expire: u32,
    },
    /// Remove one or more keys
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Increment a counter
    Incr {
        key: String,
        #[arg(short, long, default_value_t = 1)]
        delta: u64,
        #[arg(short, long, default_value_t = 1)]
        initial: u64,
    },
    /// Decrement a counter
    Decr {
        key: String,
        #[arg(short, long, default_value_t = 1)]
        delta: u64,
        #[arg(short, long, default_value_t = 0)]
        initial: u64,
    },
    /// Invalidate every item on every server
    Flush {
        #[arg(short, long, default_value_t = 0)]
        expire: u32,
    },
    /// Check that every server answers
    Ping,
}

/// Verbosity from RUST_LOG; warnings only unless asked otherwise
fn log_level() -> Level {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|value| value.trim().parse::<Level>().ok())
        .unwrap_or(Level::WARN)
}

fn init_logging() {
    let (writer, guard) = non_blocking(std::io::stderr());
    // Dropping the guard would lose buffered lines on exit
    let _ = LOG_GUARD.set(guard);

    let _ = tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(log_level())
        .compact()
        .try_init();
}

/// Combine the config file and command line flags into pool options
fn build_options(args: &Args) -> Result<ConnectionOption, Box<dyn std::error::Error>> {
    let mut options = Vec::new();

    match &args.config {
        Some(path) if args.server.is_empty() => {
            let config = ClientConfig::from_yaml_file(path)?;
            info!("Loaded {} server(s) from {}", config.servers.len(), path);
            options.push(config.to_options());
        }
        _ => {
            if args.server.is_empty() {
                return Err("no servers given; use --server or --config".into());
            }
            options.extend(
                args.server
                    .iter()
                    .map(|server| ConnectionOption::literal(format!("--SERVER={}", server))),
            );
        }
    }

    if args.binary {
        options.push(ConnectionOption::binary_protocol());
    }
    Ok(ConnectionOption::Composite(options))
}

/// Run one command and render its outcome as a line of output
fn run_command(
    conn: &mut Connection,
    command: &Command,
) -> Result<String, Box<dyn std::error::Error>> {
    let output = match command {
        Command::Get { key } => match conn.get(key)? {
            Some(Value::Text(text)) => text,
            Some(Value::Bytes(bytes)) => format!("<{} bytes>", bytes.len()),
            None => "(not found)".to_string(),
        },
        Command::Set { key, value, expire } => {
            conn.set(key, value.as_str(), *expire)?;
            "STORED".to_string()
        }
        Command::Add { key, value, expire } => {
            conn.add(key, value.as_str(), *expire)?;
            "STORED".to_string()
        }
        Command::Replace { key, value, expire } => {
            conn.replace(key, value.as_str(), *expire)?;
            "STORED".to_string()
        }
        Command::Delete { keys } => {
            conn.remove_many(keys, 0)?;
            "DELETED".to_string()
        }
        Command::Incr {
            key,
            delta,
            initial,
        } => {
            let options = CounterOptions::increment().delta(*delta).initial(*initial);
            conn.increment_with(key, options)?.to_string()
        }
        Command::Decr {
            key,
            delta,
            initial,
        } => {
            let options = CounterOptions::decrement().delta(*delta).initial(*initial);
            conn.decrement_with(key, options)?.to_string()
        }
        Command::Flush { expire } => {
            conn.flush(*expire)?;
            "OK".to_string()
        }
        Command::Ping => {
            if conn.ping() {
                "PONG".to_string()
            } else {
                return Err("one or more servers did not answer".into());
            }
        }
    };
    Ok(output)
}

fn run(args: &Args) -> Result<String, Box<dyn std::error::Error>> {
    let options = build_options(args)?;
    let pool = ConnectionPool::try_new(options)?;
    info!("Using pool configuration: {}", pool.configuration());

    let mut conn = pool.connection()?;
    let output = run_command(&mut conn, &args.command);
    conn.release();
    output
}

fn main() {
    init_logging();
    let args = Args::parse();

    match run(&args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            error!("Command failed: {}", e);
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
