//! Interactive result inspector.
//!
//! Reads commands line by line from any async reader and writes replies to
//! any async writer, so the same loop serves a terminal and tests.

use std::path::PathBuf;

use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::export::export_results;
use crate::output::Output;
use crate::validator::{SequentialRun, ValidationEngine};

const PROMPT: &str = "validator> ";
const DEFAULT_LIST_LEN: usize = 10;

/// A parsed inspector command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    List(usize),
    Show(usize),
    Definition(usize),
    Failed,
    Export(PathBuf),
    Next,
    Help,
    Quit,
    Empty,
    /// Input that could not be understood, with the reply to give
    Invalid(String),
}

impl ShellCommand {
    pub fn parse(line: &str) -> Self {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return ShellCommand::Empty;
        };
        let argument = words.next();

        match verb.to_lowercase().as_str() {
            "quit" | "q" | "exit" => ShellCommand::Quit,
            "help" | "?" => ShellCommand::Help,
            "failed" => ShellCommand::Failed,
            "next" => ShellCommand::Next,
            "list" => match argument.map(str::parse::<usize>) {
                None => ShellCommand::List(DEFAULT_LIST_LEN),
                Some(Ok(n)) => ShellCommand::List(n),
                Some(Err(_)) => ShellCommand::Invalid("Usage: list [n]".to_string()),
            },
            "show" => id_argument(argument, "show", ShellCommand::Show),
            "def" => id_argument(argument, "def", ShellCommand::Definition),
            "export" => match argument {
                Some(file) => ShellCommand::Export(PathBuf::from(file)),
                None => ShellCommand::Invalid("Usage: export <filename>".to_string()),
            },
            other => ShellCommand::Invalid(format!(
                "Unknown command: {}\nType 'help' for available commands",
                other
            )),
        }
    }
}

fn id_argument(
    argument: Option<&str>,
    verb: &str,
    build: fn(usize) -> ShellCommand,
) -> ShellCommand {
    match argument {
        None => ShellCommand::Invalid(format!("Usage: {} <endpoint_id>", verb)),
        Some(raw) => match raw.parse::<usize>() {
            Ok(id) => build(id),
            Err(_) => ShellCommand::Invalid(format!("Invalid endpoint ID: {}", raw)),
        },
    }
}

/// Inspector over the results of one engine
pub struct Inspector<'e> {
    engine: &'e ValidationEngine,
    output: Output,
    cursor: Option<SequentialRun<'e>>,
}

impl<'e> Inspector<'e> {
    /// `cursor` enables `next`; pass it only for sequential runs
    pub fn new(
        engine: &'e ValidationEngine,
        output: Output,
        cursor: Option<SequentialRun<'e>>,
    ) -> Self {
        Self {
            engine,
            output,
            cursor,
        }
    }

    pub fn help(&self) -> String {
        let mut text = String::from("Commands:\n");
        text.push_str("  list [n] - List n endpoints (default: 10)\n");
        text.push_str("  show <id> - Show detailed result for endpoint ID\n");
        text.push_str("  def <id> - Show the contract definition for endpoint ID\n");
        text.push_str("  failed - List all failed endpoints\n");
        text.push_str("  export <file> - Export results to JSON file\n");
        if self.cursor.is_some() {
            text.push_str("  next - Validate the next endpoint (sequential mode only)\n");
        }
        text.push_str("  help - Show this help\n");
        text.push_str("  quit - Exit interactive mode\n");
        text
    }

    /// Serve commands until `quit` or end of input
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if self.engine.aggregate().is_empty() && self.cursor.is_none() {
            out.write_all(b"No validation results available. Run validation first.\n")
                .await?;
            return out.flush().await;
        }

        let banner = format!(
            "\n{rule}\nINTERACTIVE MODE\n{rule}\n{help}\n",
            rule = "=".repeat(60),
            help = self.help()
        );
        out.write_all(banner.as_bytes()).await?;

        let mut lines = input.lines();
        loop {
            out.write_all(PROMPT.as_bytes()).await?;
            out.flush().await?;

            let Some(line) = lines.next_line().await? else {
                out.write_all(b"\nExiting interactive mode...\n").await?;
                break;
            };

            let command = ShellCommand::parse(&line);
            if command == ShellCommand::Quit {
                break;
            }

            let reply = self.execute(command).await;
            if !reply.is_empty() {
                out.write_all(reply.as_bytes()).await?;
                if !reply.ends_with('\n') {
                    out.write_all(b"\n").await?;
                }
            }
        }

        out.flush().await
    }

    /// Carry out one command and return the text to show
    pub async fn execute(&mut self, command: ShellCommand) -> String {
        match command {
            ShellCommand::Empty | ShellCommand::Quit => String::new(),
            ShellCommand::Invalid(reply) => reply,
            ShellCommand::Help => self.help(),
            ShellCommand::List(n) => self.list(n),
            ShellCommand::Failed => self.failed(),
            ShellCommand::Show(id) => match self.engine.aggregate().get(id) {
                Some(result) => self.output.format_detail(&result),
                None => format!("No result for endpoint {}", id),
            },
            ShellCommand::Definition(id) => match self.engine.operation(id) {
                Some(operation) => self.output.format_definition(
                    id,
                    operation.method,
                    &operation.path,
                    self.engine
                        .store()
                        .operation_definition(&operation.path, operation.method),
                ),
                None => format!("No endpoint with ID {}", id),
            },
            ShellCommand::Export(path) => {
                match export_results(&self.engine.summary(), &path).await {
                    Ok(()) => format!("Results exported to {}", path.display()),
                    Err(e) => format!("Error: {}", e),
                }
            }
            ShellCommand::Next => self.next().await,
        }
    }

    fn list(&self, n: usize) -> String {
        let mut results = self.engine.summary().results;
        results.sort_by_key(|result| result.endpoint_id);

        let mut text = String::new();
        for result in results.iter().take(n) {
            text.push_str(&self.output.format_result_line(result));
            text.push('\n');
        }
        if text.is_empty() {
            text.push_str("No results yet\n");
        }
        text
    }

    fn failed(&self) -> String {
        let mut failed = self.engine.aggregate().failed();
        if failed.is_empty() {
            return "No failed endpoints\n".to_string();
        }
        failed.sort_by_key(|result| result.endpoint_id);

        let mut text = format!("Failed endpoints ({}):\n", failed.len());
        for result in &failed {
            text.push_str(&self.output.format_result_line(result));
            text.push('\n');
        }
        text
    }

    async fn next(&mut self) -> String {
        let total = self.engine.operations().len();
        let Some(cursor) = self.cursor.as_mut() else {
            return "Error: 'next' command is only available in sequential mode (use --sequential flag)"
                .to_string();
        };
        if cursor.is_exhausted() {
            return format!(
                "No more endpoints to validate. Reached end ({} endpoints).",
                total
            );
        }

        let id = cursor.position();
        let mut text = format!("\nValidating next endpoint (#{})...\n", id);
        if let Some(result) = cursor.next_result().await {
            text.push_str(&self.output.format_result_line(&result));
            text.push('\n');
            if result.errors.len() > 1 {
                text.push_str(&format!("  (+{} more errors)\n", result.errors.len() - 1));
            }
            text.push_str(&format!("Type 'show {}' for details\n", id));
        }
        text
    }
}
