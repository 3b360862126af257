//! mssql-schema CLI - SQL Server schema introspection and DDL generation.

use clap::{Parser, Subcommand};
use mssql_schema::{
    adapter, check_requirements, CallResult, ColumnSpec, Config, Connection, DriverKind,
    MssqlDialect, ProcedureParam, RoutineKind, SchemaDialect, SchemaError, TableSchema,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "mssql-schema")]
#[command(about = "SQL Server schema introspection and DDL generation")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "connection.yaml")]
    config: PathBuf,

    /// Output JSON to stdout
    #[arg(long, visible_alias = "json", global = true)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "warn")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Connected(ConnectedCommand),

    /// Print CREATE TABLE for a YAML list of column specs (no connection)
    Ddl {
        /// YAML file containing a list of column specs
        #[arg(short, long)]
        file: PathBuf,

        /// Table name, optionally schema-qualified [default: file stem]
        #[arg(short, long)]
        table: Option<String>,
    },

    /// Check that the native pieces a driver needs are installed
    CheckRequirements {
        /// Driver kind: auto, odbc, freetds, tds (default: from config)
        #[arg(long)]
        driver: Option<String>,
    },
}

/// Commands that need an open connection.
#[derive(Subcommand)]
enum ConnectedCommand {
    /// List tables
    Tables {
        /// Restrict to one schema
        #[arg(long)]
        schema: Option<String>,

        /// Include views
        #[arg(long)]
        views: bool,
    },

    /// List schemas
    Schemas,

    /// List stored procedures
    Procedures {
        #[arg(long)]
        schema: Option<String>,
    },

    /// List functions
    Functions {
        #[arg(long)]
        schema: Option<String>,
    },

    /// Show columns, keys and relations of a table
    Describe {
        /// Table name, optionally schema-qualified
        table: String,
    },

    /// Call a stored procedure
    Call {
        /// Procedure name, optionally schema-qualified
        procedure: String,

        /// Parameter as name:type=value or name:direction:type=value
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Test the database connection
    HealthCheck,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), SchemaError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(SchemaError::Config)?;

    let command = match &cli.command {
        Commands::Ddl { file, table } => return print_ddl(file, table.as_deref()),
        Commands::CheckRequirements { driver } => {
            return check_driver(&cli.config, driver.as_deref())
        }
        Commands::Connected(command) => command,
    };

    if let ConnectedCommand::Call { params, .. } = command {
        for p in params {
            ProcedureParam::parse(p)?;
        }
    }

    let config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    let conn = adapter::open(&config.connection).await?;
    if let Some(report) = conn.env_report() {
        for warning in &report.warnings {
            eprintln!("warning: {}", warning);
        }
    }

    let result = run_connected(command, cli.output_json, &conn).await;
    conn.close().await;
    result
}

/// Check an explicit driver without reading the config, else the configured one.
fn check_driver(config_path: &Path, driver: Option<&str>) -> Result<(), SchemaError> {
    let (kind, odbc_driver) = match driver {
        Some(name) => (parse_driver(name)?, None),
        None => {
            let config = Config::load(config_path)?;
            info!("Loaded configuration from {:?}", config_path);
            (config.connection.driver, config.connection.odbc_driver)
        }
    };
    check_requirements(kind, odbc_driver.as_deref())?;
    println!("Driver '{}' requirements satisfied", kind.resolve());
    Ok(())
}

async fn run_connected(
    command: &ConnectedCommand,
    json: bool,
    conn: &Connection,
) -> Result<(), SchemaError> {
    let provider = conn.provider();

    match command {
        ConnectedCommand::Tables { schema, views } => {
            let names = provider.find_table_names(schema.as_deref(), *views).await?;
            if json {
                let list: Vec<_> = names.values().collect();
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else {
                for info in names.values() {
                    let suffix = if info.is_view { " (view)" } else { "" };
                    println!("{}{}", info.name, suffix);
                }
            }
        }

        ConnectedCommand::Schemas => {
            print_names(json, &provider.find_schema_names().await?)?;
        }

        ConnectedCommand::Procedures { schema } => {
            let names = provider.find_procedure_names(schema.as_deref()).await?;
            print_names(json, &names)?;
        }

        ConnectedCommand::Functions { schema } => {
            let names = provider.find_function_names(schema.as_deref()).await?;
            print_names(json, &names)?;
        }

        ConnectedCommand::Describe { table } => {
            let schema = provider.load_table(table).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&schema)?);
            } else {
                print_table(&schema);
            }
        }

        ConnectedCommand::Call { procedure, params } => {
            let mut params = params
                .iter()
                .map(|p| ProcedureParam::parse(p))
                .collect::<Result<Vec<_>, _>>()?;
            // Resolve against the catalog so a missing procedure is reported as such
            provider
                .load_routine(procedure, RoutineKind::Procedure)
                .await?;
            let result = conn.invoker().call(procedure, &mut params).await?;
            print_call(json, &params, &result)?;
        }

        ConnectedCommand::HealthCheck => {
            let start = std::time::Instant::now();
            conn.health_check().await?;
            let latency_ms = start.elapsed().as_millis();
            if json {
                let report = serde_json::json!({
                    "connected": true,
                    "driver": conn.kind().to_string(),
                    "latency_ms": latency_ms,
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Health Check Results:");
                println!("  SQL Server ({}): OK ({}ms)", conn.kind(), latency_ms);
            }
        }
    }

    Ok(())
}

fn parse_driver(name: &str) -> Result<DriverKind, SchemaError> {
    DriverKind::parse(name).ok_or_else(|| {
        SchemaError::Config(format!(
            "unknown driver '{}' (expected auto, odbc, freetds or tds)",
            name
        ))
    })
}

fn print_ddl(file: &Path, table: Option<&str>) -> Result<(), SchemaError> {
    let stem = file.file_stem().map(|s| s.to_string_lossy().into_owned());
    let table = table.map(str::to_string).or(stem).ok_or_else(|| {
        SchemaError::Config(format!("cannot derive a table name from {:?}", file))
    })?;
    let content = std::fs::read_to_string(file)?;
    let columns: Vec<ColumnSpec> = serde_yaml::from_str(&content)?;
    let sql = MssqlDialect::new().create_table_sql(&table, &columns)?;
    println!("{}", sql);
    Ok(())
}

fn print_names(json: bool, names: &[String]) -> Result<(), SchemaError> {
    if json {
        println!("{}", serde_json::to_string_pretty(names)?);
    } else {
        for name in names {
            println!("{}", name);
        }
    }
    Ok(())
}

fn print_table(table: &TableSchema) {
    println!("{} ({})", table.display_name, table.raw_name);
    for column in table.columns.values() {
        let mut flags = Vec::new();
        if column.is_primary_key {
            flags.push("PK".to_string());
        }
        if column.auto_increment {
            flags.push("identity".to_string());
        }
        if !column.allow_null {
            flags.push("not null".to_string());
        }
        if let (Some(table), Some(field)) = (&column.ref_table, &column.ref_fields) {
            flags.push(format!("-> {}.{}", table, field));
        }
        println!(
            "  {:<30} {:<20} {:<10} {}",
            column.name,
            column.db_type,
            column.r#type,
            flags.join(", ")
        );
    }
    if !table.relations.is_empty() {
        println!("\nRelations:");
        for relation in &table.relations {
            println!(
                "  {:<10} {} ({} -> {}.{})",
                relation.kind, relation.name, relation.field, relation.ref_table, relation.ref_field
            );
        }
    }
}

fn print_call(
    json: bool,
    params: &[ProcedureParam],
    result: &CallResult,
) -> Result<(), SchemaError> {
    let outputs: serde_json::Map<String, serde_json::Value> = params
        .iter()
        .filter(|p| p.is_output())
        .map(|p| Ok((p.name.clone(), serde_json::to_value(&p.value)?)))
        .collect::<Result<_, SchemaError>>()?;

    if json {
        let report = serde_json::json!({ "outputs": outputs, "result": result });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (idx, rs) in result.sets().iter().enumerate() {
        println!("Result set {} ({} rows)", idx + 1, rs.len());
        for row in rs.to_json_rows() {
            println!("  {}", serde_json::Value::Object(row));
        }
    }
    for (name, value) in &outputs {
        println!("@{} = {}", name, value);
    }
    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so stdout stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    Ok(())
}
