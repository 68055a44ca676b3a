//! Interactive SQL shell.

use crate::commands::format_result;
use colored::Colorize;
use mywire_client::Connection;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{Config, Editor};

const HELP_TEXT: &str = r#"
Statements end with ';'. A statement may span several lines.

Shell commands:
  help, \h          Show this help
  ping, \p          Ping the server
  status, \s        Show connection status
  use <db>          Change the default database
  quit, exit, \q    Exit the shell
"#;

pub async fn run(connection: &Connection, as_json: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "mywire shell".bold().cyan());
    println!(
        "Connected to {} (server {}, id {})",
        connection.config().address(),
        connection.server_version(),
        connection.thread_id().unwrap_or_default()
    );

    let config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .build();
    let mut rl: Editor<(), DefaultHistory> = Editor::with_config(config)?;

    let history_path = std::env::var("HOME")
        .map(|h| std::path::PathBuf::from(h).join(".mywire_history"))
        .unwrap_or_else(|_| ".mywire_history".into());
    let _ = rl.load_history(&history_path);

    println!("Type 'help' for available commands.\n");

    let mut buffer = String::new();
    loop {
        let prompt = if buffer.is_empty() {
            format!("{} ", "mysql>".cyan())
        } else {
            format!("{} ", "    ->".cyan())
        };
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim();
                if buffer.is_empty() {
                    if line.is_empty() {
                        continue;
                    }
                    match shell_command(connection, line).await {
                        Some(Ok(Some(output))) => {
                            println!("{}\n", output);
                            continue;
                        }
                        Some(Ok(None)) => break,
                        Some(Err(e)) => {
                            println!("{}: {}\n", "Error".red(), e);
                            continue;
                        }
                        None => {}
                    }
                }

                if !buffer.is_empty() {
                    buffer.push('\n');
                }
                buffer.push_str(line);
                let Some(sql) = complete_statement(&buffer) else {
                    continue;
                };
                buffer.clear();

                match connection.query(sql).await {
                    Ok(result) => println!("{}\n", format_result(&result, as_json)),
                    Err(e) => println!("{} ({}): {}\n", "Error".red(), e.code(), e),
                }
                if connection.is_closed() {
                    println!("{}", "Connection closed by server.".red());
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                buffer.clear();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                println!("{}: {:?}", "Error".red(), err);
                break;
            }
        }
    }

    let _ = rl.save_history(&history_path);
    println!("{}", "Bye.".dimmed());
    Ok(())
}

/// Handles a shell command; `None` means the line is SQL.
async fn shell_command(
    connection: &Connection,
    line: &str,
) -> Option<Result<Option<String>, mywire_client::ClientError>> {
    let trimmed = line.trim_end_matches(';');
    let mut parts = trimmed.split_whitespace();
    let cmd = parts.next()?.to_lowercase();

    let result = match cmd.as_str() {
        "help" | "?" | "\\h" => Ok(Some(HELP_TEXT.to_string())),
        "quit" | "exit" | "\\q" => Ok(None),
        "ping" | "\\p" => connection
            .ping()
            .await
            .map(|()| Some("PONG".green().to_string())),
        "status" | "\\s" => Ok(Some(format!(
            "address: {}\nserver: {}\nthread id: {}\nstate: {}",
            connection.config().address(),
            connection.server_version(),
            connection.thread_id().unwrap_or_default(),
            connection.state()
        ))),
        "use" => {
            let database = parts.next()?;
            connection
                .change_database(database)
                .await
                .map(|()| Some(format!("Database changed to {}", database.cyan())))
        }
        _ => return None,
    };
    Some(result)
}

/// Returns the buffered statement once it ends with `;`.
fn complete_statement(buffer: &str) -> Option<String> {
    let trimmed = buffer.trim_end();
    let statement = trimmed.strip_suffix(';')?;
    Some(statement.trim().to_string())
}
