//! PesaDB interactive SQL shell
//!
//! Runs statements against an embedded catalog, the same engine the query
//! server uses.

use anyhow::Result;
use clap::Parser;
use pesadb::logging::init_logging;
use pesadb::{Catalog, EngineConfig, QueryResult, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "pesadb-cli", version, about = "Interactive SQL shell for PesaDB")]
struct Args {
    /// Directory holding database snapshots
    #[arg(long, env = "PESADB_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Database to open
    #[arg(long, env = "PESADB_DATABASE", default_value = "pesa")]
    db: String,

    /// Keep everything in memory, never write snapshots
    #[arg(long)]
    in_memory: bool,

    /// Log level
    #[arg(long, env = "PESADB_LOG_LEVEL", default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = if args.in_memory {
        EngineConfig::in_memory()
    } else {
        EngineConfig::with_data_dir(&args.data_dir)
    };

    println!("PesaDB v{}", VERSION);
    if config.persist {
        println!("Database: {} ({})", args.db, config.snapshot_path(&args.db).display());
    } else {
        println!("Database: {} (in memory)", args.db);
    }
    println!("Type '.help' for help, '.exit' to quit\n");

    let catalog = Catalog::new(config);
    interactive_mode(&catalog, &args.db)?;
    catalog.flush_all()?;
    Ok(())
}

fn interactive_mode(catalog: &Catalog, db: &str) -> Result<()> {
    let stdin = io::stdin();
    let mut buffer = String::new();
    let mut multiline_sql = String::new();

    loop {
        if multiline_sql.is_empty() {
            print!("pesadb> ");
        } else {
            print!("     -> ");
        }
        io::stdout().flush()?;

        buffer.clear();
        if stdin.lock().read_line(&mut buffer)? == 0 {
            break;
        }

        let input = buffer.trim();

        if input.starts_with('.') {
            if !multiline_sql.is_empty() {
                eprintln!("Warning: incomplete SQL statement discarded");
                multiline_sql.clear();
            }

            match input {
                ".exit" | ".quit" => break,
                ".help" => print_interactive_help(),
                ".tables" => list_tables(catalog, db),
                ".schema" => {
                    for table in table_names(catalog, db) {
                        show_table_schema(catalog, db, &table);
                        println!();
                    }
                }
                cmd if cmd.starts_with(".schema ") => {
                    show_table_schema(catalog, db, cmd[8..].trim());
                }
                _ => {
                    eprintln!("Unknown command: {}", input);
                    println!("Type '.help' for available commands");
                }
            }
            continue;
        }

        if input.is_empty() {
            continue;
        }

        multiline_sql.push_str(input);
        multiline_sql.push(' ');

        // A statement is complete once a line ends with ';'
        if input.ends_with(';') {
            match catalog.execute(db, multiline_sql.trim()) {
                Ok(result) => display_result(result),
                Err(e) => eprintln!("{}", e),
            }
            multiline_sql.clear();
        }
    }

    Ok(())
}

fn display_result(result: QueryResult) {
    match result {
        QueryResult::Definition { message } => println!("{}", message),
        QueryResult::Modification { affected_rows } => {
            println!("{} row(s) affected", affected_rows)
        }
        QueryResult::Select { columns, rows } => display_table(&columns, &rows),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Text(s) if s.chars().count() > 50 => {
            format!("{}...", s.chars().take(47).collect::<String>())
        }
        other => other.to_string(),
    }
}

fn display_table(columns: &[String], rows: &[Vec<Value>]) {
    if rows.is_empty() {
        println!("No results");
        return;
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.iter().map(format_value).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let rule = |left: &str, mid: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        println!("{}{}{}", left, segments.join(mid), right);
    };
    let line = |values: &[String]| {
        let padded: Vec<String> = values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!(" {:w$} ", v, w = w))
            .collect();
        println!("│{}│", padded.join("│"));
    };

    rule("┌", "┬", "┐");
    line(columns);
    rule("├", "┼", "┤");
    for row in &cells {
        line(row);
    }
    rule("└", "┴", "┘");

    println!("\n{} row(s) returned", rows.len());
}

fn print_interactive_help() {
    println!(
        r#"
Commands:
  .help              Show this help
  .exit, .quit       Leave the shell
  .tables            List tables
  .schema            Show every table's columns
  .schema <table>    Show one table's columns

SQL examples:
  CREATE TABLE transactions (id STRING PRIMARY KEY, amount FLOAT, category STRING, date STRING);
  CREATE INDEX idx_category ON transactions (category);
  INSERT INTO transactions (id, amount, category, date) VALUES ('t1', 250.0, 'food', '2024-03-01T08:00:00');
  SELECT category, SUM(amount) AS total FROM transactions GROUP BY category ORDER BY total DESC;
  UPDATE transactions SET amount = 300 WHERE id = 't1';
  DELETE FROM transactions WHERE date < DATE_SUB(NOW(), INTERVAL 1 YEAR);
"#
    );
}

fn table_names(catalog: &Catalog, db: &str) -> Vec<String> {
    match catalog.execute(db, "SHOW TABLES") {
        Ok(result) => result
            .select_rows()
            .map(|(_, rows)| {
                rows.iter()
                    .filter_map(|row| row.first())
                    .map(|v| v.to_string())
                    .collect()
            })
            .unwrap_or_default(),
        Err(e) => {
            eprintln!("{}", e);
            Vec::new()
        }
    }
}

fn list_tables(catalog: &Catalog, db: &str) {
    let tables = table_names(catalog, db);
    if tables.is_empty() {
        println!("No tables found");
    } else {
        println!("Tables:");
        for table in tables {
            println!("  {}", table);
        }
    }
}

fn show_table_schema(catalog: &Catalog, db: &str, table: &str) {
    let schema = match catalog.table_schema(db, table) {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    println!("Table: {}", schema.name);
    println!("┌─────────────────┬──────────┬─────────────┬──────────────────────┐");
    println!("│ Column          │ Type     │ Primary key │ References           │");
    println!("├─────────────────┼──────────┼─────────────┼──────────────────────┤");
    for col in &schema.columns {
        let references = col
            .references
            .as_ref()
            .map(|r| format!("{}({})", r.table, r.column))
            .unwrap_or_default();
        println!(
            "│ {:15} │ {:8} │ {:11} │ {:20} │",
            col.name,
            col.col_type.sql_name(),
            if col.primary_key { "YES" } else { "" },
            references
        );
    }
    println!("└─────────────────┴──────────┴─────────────┴──────────────────────┘");

    for index in &schema.indexes {
        println!("Index {} on ({})", index.name, index.column);
    }
}
