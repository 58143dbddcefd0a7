use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueHint};
use dap_session::config::SessionConfig;
use dap_session::notification::{Notification, SessionObserver};
use dap_session::session::actor::{SessionActor, SessionHandle};
use dap_session::session::SessionController;
use dap_session::transport::TcpConnector;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, Level, Metadata};
use tracing_subscriber::{filter, fmt::writer::BoxMakeWriter, prelude::*};

/// Debug a program through a Debug Adapter Protocol backend.
///
/// Commands are read from stdin, one per line: `run`, `continue`, `next`,
/// `step`, `finish`, `pause`, `break <file>:<line>`, `delete <file>:<line>`,
/// `frame <level>`, `locals`, `bt`, `restart`, `kill` and `quit`.
#[derive(Parser, Debug)]
#[command(name = "dap-session")]
struct Options {
    /// The executable to debug.
    #[arg(value_hint = ValueHint::FilePath)]
    target: Option<String>,

    /// A JSON file with the session configuration. Flags override its values.
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// The debug adapter to start before connecting.
    #[arg(long, value_hint = ValueHint::ExecutablePath)]
    adapter: Option<String>,

    /// Arguments for the debug adapter.
    #[arg(long = "adapter-arg")]
    adapter_args: Vec<String>,

    /// Breakpoints to set before starting, as `<file>:<line>`.
    #[arg(short, long = "break")]
    breakpoints: Vec<String>,

    /// How long `kill` waits for the backend before killing it.
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Log the protocol traffic.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let options = Options::parse();
    init_logger(if options.verbose {
        Level::TRACE
    } else {
        Level::INFO
    });

    let config = match load_config(&options) {
        Ok(config) => config,
        Err(error) => {
            error!("{error}");
            std::process::exit(2);
        }
    };

    let (sender, mut notifications) = mpsc::unbounded_channel::<Notification>();
    let observer: Arc<dyn SessionObserver> = Arc::new(sender);
    let controller = SessionController::new(config, Arc::new(TcpConnector), observer);
    let (handle, task) = SessionActor::spawn(controller);

    tokio::spawn(async move {
        while let Some(notification) = notifications.recv().await {
            print_notification(&notification);
        }
    });

    for location in &options.breakpoints {
        match parse_location(location) {
            Some((file, line)) => {
                if let Err(error) = handle.add_breakpoint(file, line).await {
                    error!("{error}");
                }
            }
            None => error!("`{location}` is not a valid breakpoint location."),
        }
    }
    if let Some(target) = &options.target {
        if handle.set_target(target.as_str()).is_err() {
            return;
        }
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                error!("Can't read a command: {error}");
                break;
            }
        };
        if !execute(&handle, options.target.as_deref(), line.trim()).await {
            break;
        }
    }

    drop(handle);
    if let Err(error) = task.await {
        error!("The session task failed: {error}");
    }
}

fn load_config(options: &Options) -> Result<SessionConfig, dap_session::errors::SessionError> {
    let mut config = match &options.config {
        Some(path) => SessionConfig::from_json_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(host) = &options.host {
        config.adapter.host = host.clone();
    }
    if let Some(port) = options.port {
        config.adapter.port = port;
    }
    if let Some(adapter) = &options.adapter {
        config.adapter.program = Some(adapter.clone());
        config.adapter.args = options.adapter_args.clone();
    }
    if let Some(grace_ms) = options.grace_ms {
        config.terminate_grace_ms = grace_ms;
    }
    Ok(config)
}

/// Runs one command line. Returns `false` once the user wants to quit.
async fn execute(handle: &SessionHandle, target: Option<&str>, line: &str) -> bool {
    let (command, argument) = line
        .split_once(' ')
        .map_or((line, ""), |(command, argument)| (command, argument.trim()));
    let result = match command {
        "" => Ok(()),
        "run" | "r" => handle.start_debug(target.unwrap_or_default()).await,
        "continue" | "c" => handle.continue_exec(None).await,
        "next" | "n" => handle.step_over(None).await,
        "step" | "s" => handle.step_in(None).await,
        "finish" => handle.step_out(None).await,
        "pause" => handle.pause(None).await,
        "restart" => handle.restart().await,
        "kill" => handle.terminate().await,
        "quit" | "q" => return false,
        "break" | "b" | "delete" | "d" => match parse_location(argument) {
            Some((file, line)) if command.starts_with('b') => {
                handle.add_breakpoint(file, line).await
            }
            Some((file, line)) => handle.remove_breakpoint(file, line).await,
            None => {
                println!("Usage: {command} <file>:<line>");
                Ok(())
            }
        },
        "frame" | "f" => match argument.parse() {
            Ok(level) => handle.select_frame(level).await.map(|frame| {
                if frame.is_none() {
                    println!("No frame at level {level}.");
                }
            }),
            Err(_) => {
                println!("Usage: frame <level>");
                Ok(())
            }
        },
        "locals" => match handle.snapshot().await {
            Ok(snapshot) if !snapshot.current_frame.is_sentinel() => handle
                .locals(snapshot.current_frame.frame_id)
                .await
                .map(|variables| print_variables(&variables)),
            Ok(_) => {
                println!("The debuggee is not stopped.");
                Ok(())
            }
            Err(error) => Err(error),
        },
        "bt" => handle.snapshot().await.map(|snapshot| {
            for frame in &snapshot.call_stack {
                println!("{frame}");
            }
        }),
        other => {
            println!("Unknown command `{other}`.");
            Ok(())
        }
    };
    if let Err(error) = result {
        println!("{error}");
    }
    debug!("Handled `{line}`.");
    true
}

fn parse_location(location: &str) -> Option<(&str, i64)> {
    let (file, line) = location.rsplit_once(':')?;
    Some((file, line.parse().ok()?))
}

fn print_notification(notification: &Notification) {
    match notification {
        Notification::Log(line) => println!("{line}"),
        Notification::RunStateChanged { to, .. } => println!("[{to}]"),
        Notification::CallStack(frames) => {
            for frame in frames {
                println!("{frame}");
            }
        }
        Notification::Locals { variables, .. } => print_variables(variables),
        Notification::Breakpoints(breakpoints) => {
            for breakpoint in breakpoints {
                println!(
                    "Breakpoint {}:{}{}",
                    breakpoint.file_name,
                    breakpoint.line,
                    if breakpoint.verified { "" } else { " (pending)" },
                );
            }
        }
        Notification::NavigateTo(location) => println!("=> {}:{}", location.file, location.line),
        Notification::ClearNavigation => {}
        Notification::Notice(notice) => println!("{notice}"),
    }
}

fn print_variables(variables: &[dap_session::types::Variable]) {
    for variable in variables {
        match &variable.type_field {
            Some(type_name) => println!("{}: {} = {}", variable.name, type_name, variable.value),
            None => println!("{} = {}", variable.name, variable.value),
        }
    }
}

fn init_logger(level: Level) {
    let console_log = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(BoxMakeWriter::new(std::io::stderr))
        .with_filter(filter::filter_fn(|metadata| {
            // For external packages, show only the error logs.
            metadata.level() <= &Level::ERROR
                || metadata
                    .module_path()
                    .unwrap_or_default()
                    .starts_with("dap_session")
        }))
        .with_filter(filter::filter_fn(level_for("dap_session", level)));
    tracing_subscriber::registry().with(console_log).init();
}
fn level_for(module: &'static str, level: Level) -> impl Fn(&Metadata) -> bool {
    move |metadata| {
        if metadata
            .module_path()
            .unwrap_or_default()
            .starts_with(module)
        {
            metadata.level() <= &level
        } else {
            true
        }
    }
}
