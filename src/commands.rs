//! Command execution and result formatting.

use crate::Commands;
use colored::Colorize;
use mywire_client::{Connection, ConnectionConfig, QueryResult, ResultSet};
use serde_json::{json, Map, Value};

/// Executes a one-shot command and returns the formatted output.
pub async fn execute(
    connection: &Connection,
    cmd: Commands,
    as_json: bool,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Repl | Commands::Config => Ok(String::new()),

        Commands::Ping => {
            connection.ping().await?;
            Ok("PONG".green().to_string())
        }

        Commands::Info => {
            let info = json!({
                "serverVersion": connection.server_version(),
                "threadId": connection.thread_id(),
                "address": connection.config().address(),
                "tls": connection.config().ssl.is_some(),
            });
            Ok(format_json(&info))
        }

        Commands::Query { sql } => {
            let sql = read_sql_arg(&sql)?;
            let result = connection.query(sql).await?;
            Ok(format_result(&result, as_json))
        }
    }
}

/// Renders a query result as tables or JSON.
pub fn format_result(result: &QueryResult, as_json: bool) -> String {
    if as_json {
        let sets: Vec<Value> = result.results.iter().map(result_set_json).collect();
        return format_json(&Value::Array(sets));
    }
    result
        .results
        .iter()
        .map(format_table)
        .collect::<Vec<_>>()
        .join("\n")
}

fn result_set_json(set: &ResultSet) -> Value {
    if let Some(ok) = &set.ok {
        return json!({
            "affectedRows": ok.affected_rows,
            "insertId": ok.insert_id,
            "warningCount": ok.warning_count,
            "message": ok.message,
        });
    }
    let rows: Vec<Value> = set
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::new();
            for (index, field) in set.fields.iter().enumerate() {
                let value = row
                    .get(index)
                    .map(|v| Value::String(v.into_owned()))
                    .unwrap_or(Value::Null);
                object.insert(field.name.clone(), value);
            }
            Value::Object(object)
        })
        .collect();
    json!({
        "fields": set.fields.iter().map(|f| f.name.clone()).collect::<Vec<_>>(),
        "rows": rows,
    })
}

fn format_table(set: &ResultSet) -> String {
    if let Some(ok) = &set.ok {
        return format!(
            "{}, {} row(s) affected{}",
            "Query OK".green(),
            ok.affected_rows,
            if ok.warning_count > 0 {
                format!(", {} warning(s)", ok.warning_count)
            } else {
                String::new()
            }
        );
    }

    let cells: Vec<Vec<String>> = set
        .rows
        .iter()
        .map(|row| {
            (0..set.fields.len())
                .map(|i| row.get(i).map(|v| v.into_owned()).unwrap_or_else(|| "NULL".to_string()))
                .collect()
        })
        .collect();
    let mut widths: Vec<usize> = set.fields.iter().map(|f| f.name.chars().count()).collect();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let separator = widths
        .iter()
        .map(|w| "-".repeat(w + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{}+", separator);
    let line = |values: Vec<String>| {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:<width$} ", v, width = w))
            .collect();
        format!("|{}|", padded.join("|"))
    };

    let mut output = String::new();
    output.push_str(&separator);
    output.push('\n');
    output.push_str(&line(set.fields.iter().map(|f| f.name.clone()).collect()).bold().to_string());
    output.push('\n');
    output.push_str(&separator);
    output.push('\n');
    for row in cells {
        output.push_str(&line(row));
        output.push('\n');
    }
    output.push_str(&separator);
    output.push('\n');
    output.push_str(&format!("{} row(s) in set", set.rows.len()).dimmed().to_string());
    output
}

/// Summarizes the resolved settings; the password is masked.
pub fn describe_config(config: &ConnectionConfig) -> String {
    let value = json!({
        "host": config.host,
        "port": config.port,
        "user": config.user,
        "password": if config.password.is_empty() { "" } else { "****" },
        "database": config.database,
        "charset": config.charset,
        "connectTimeout": config.connect_timeout_ms(),
        "ssl": config.ssl.is_some(),
        "debug": config.debug,
        "multipleStatements": config.multiple_statements,
        "maxPacketSize": config.max_packet_size,
    });
    format_json(&value)
}

/// Reads a SQL argument (either inline or @file.sql).
fn read_sql_arg(arg: &str) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        Ok(std::fs::read_to_string(path)?)
    } else {
        Ok(arg.to_string())
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
