//! Admin console: line commands read from stdin

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Notify;
use tracing::{info, warn};

use super::service::BrandService;
use crate::error::{CliError, Result};

/// Parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Re-read config and replace the dispatcher
    Reload,
    /// Enqueue everyone for the current template
    Broadcast,
    /// Jump to a template index
    Index(i64),
    /// Print service status
    Status,
    /// Shut the service down
    Stop,
    /// List commands
    Help,
}

pub const HELP: &str = "commands: reload | broadcast | index <n> | status | stop | help";

/// Parse one console line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut parts = line.split_whitespace();
    let Some(word) = parts.next() else {
        return Ok(None);
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "reload" => ConsoleCommand::Reload,
        "broadcast" => ConsoleCommand::Broadcast,
        "status" => ConsoleCommand::Status,
        "stop" | "quit" | "exit" => ConsoleCommand::Stop,
        "help" | "?" => ConsoleCommand::Help,
        "index" | "setindex" => {
            let raw = parts
                .next()
                .ok_or_else(|| CliError::invalid_argument("index", "missing index"))?;
            let index = raw.parse::<i64>().map_err(|_| {
                CliError::invalid_argument("index", format!("'{raw}' is not a number"))
            })?;
            ConsoleCommand::Index(index)
        }
        _ => return Err(CliError::unknown_command(line.trim())),
    };

    if parts.next().is_some() {
        return Err(CliError::invalid_argument(word, "unexpected extra arguments"));
    }
    Ok(Some(command))
}

/// Execute `command`, returning the text to show the operator
pub fn execute(service: &BrandService, command: ConsoleCommand, shutdown: &Notify) -> String {
    match command {
        ConsoleCommand::Reload => match service.reload() {
            Ok(report) => format!(
                "configuration reloaded: {} template(s), {} recipient(s) queued",
                report.templates, report.queued
            ),
            Err(e) => format!("reload failed: {e}"),
        },
        ConsoleCommand::Broadcast => {
            let queued = service.dispatcher().broadcast_current();
            format!("broadcast queued for {queued} recipient(s)")
        }
        ConsoleCommand::Index(index) => {
            let dispatcher = service.dispatcher();
            if dispatcher.set_index(index) {
                format!("index set to {index}: {}", dispatcher.current_template())
            } else {
                format!(
                    "index {index} ignored (valid: 0..{})",
                    dispatcher.templates().len()
                )
            }
        }
        ConsoleCommand::Status => {
            let status = service.status();
            serde_json::to_string_pretty(&status)
                .unwrap_or_else(|e| format!("status unavailable: {e}"))
        }
        ConsoleCommand::Stop => {
            shutdown.notify_one();
            "stopping".to_string()
        }
        ConsoleCommand::Help => HELP.to_string(),
    }
}

/// Read commands from `input` until EOF or `stop`
pub async fn run_console<R>(input: R, service: Arc<BrandService>, shutdown: Arc<Notify>)
where
    R: AsyncBufRead + Unpin,
{
    info!("Admin console ready ({HELP})");
    let mut lines = input.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!(error = %e, "Console input failed");
                break;
            }
        };

        match parse_command(&line) {
            Ok(Some(command)) => {
                println!("{}", execute(&service, command, &shutdown));
                if command == ConsoleCommand::Stop {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::registry::ConnectionRegistry;
    use contracts::ServiceConfig;
    use dispatcher::ManualScheduler;

    fn service(messages: &[&str]) -> BrandService {
        let mut config = ServiceConfig::default();
        config.brand.messages = messages.iter().map(|m| m.to_string()).collect();
        BrandService::start(
            config,
            "unused.toml",
            Arc::new(ManualScheduler::new()),
            Arc::new(ConnectionRegistry::new(500)),
        )
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("reload").unwrap(), Some(ConsoleCommand::Reload));
        assert_eq!(parse_command("  STATUS ").unwrap(), Some(ConsoleCommand::Status));
        assert_eq!(parse_command("index 3").unwrap(), Some(ConsoleCommand::Index(3)));
        assert_eq!(parse_command("index -1").unwrap(), Some(ConsoleCommand::Index(-1)));
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_command("index abc"),
            Err(CliError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_command("index"),
            Err(CliError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_command("reload now"),
            Err(CliError::InvalidArgument { .. })
        ));
        assert!(matches!(
            parse_command("dance"),
            Err(CliError::UnknownCommand { .. })
        ));
    }

    #[test]
    fn test_execute_index() {
        let service = service(&["A", "B", "C"]);
        let shutdown = Notify::new();

        let out = execute(&service, ConsoleCommand::Index(2), &shutdown);
        assert_eq!(out, "index set to 2: C");
        let out = execute(&service, ConsoleCommand::Index(3), &shutdown);
        assert!(out.contains("ignored"));
        assert_eq!(service.dispatcher().current_index(), 2);
    }

    #[test]
    fn test_execute_status_is_json() {
        let service = service(&["A"]);
        let out = execute(&service, ConsoleCommand::Status, &Notify::new());
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["template"], "A");
        assert_eq!(value["rotation_active"], false);
    }

    #[tokio::test]
    async fn test_console_stops_on_stop() {
        let service = Arc::new(service(&["A"]));
        let shutdown = Arc::new(Notify::new());
        let input: &[u8] = b"help\nbogus\nstop\nreload\n";

        run_console(input, service, Arc::clone(&shutdown)).await;
        // the stored permit completes immediately
        shutdown.notified().await;
    }
}
