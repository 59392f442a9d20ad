use clap::Parser;

use aqlc::aql_parser::ast::{ConstantValue, Expr};
use aqlc::{Compiler, CompilerConfig, QueryOptions};

/// aqlc - compile AQL analytics queries to ClickHouse SQL
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// AQL query to compile
    query: String,

    /// Tenant the emitted SQL is scoped to
    #[arg(long, default_value_t = 1)]
    tenant_id: u64,

    /// Which output to print: "backend" or "aql"
    #[arg(long, default_value = "backend")]
    dialect: String,

    /// Read person columns off the events row instead of joining
    #[arg(long)]
    person_on_events: bool,

    /// LIMIT injected on the outermost query when none is written
    #[arg(long, default_value_t = 100)]
    default_limit: u64,

    /// Placeholder values, as name=value (value parsed as number, bool, or
    /// string). May be repeated.
    #[arg(long = "placeholder", value_name = "NAME=VALUE")]
    placeholders: Vec<String>,
}

fn parse_placeholder(spec: &str) -> Result<(String, Expr), String> {
    let (name, value) = spec
        .split_once('=')
        .ok_or_else(|| format!("invalid placeholder '{}', expected name=value", spec))?;
    let constant = if let Ok(i) = value.parse::<i64>() {
        ConstantValue::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        ConstantValue::Float(f)
    } else if let Ok(b) = value.parse::<bool>() {
        ConstantValue::Bool(b)
    } else {
        ConstantValue::String(value.to_string())
    };
    Ok((name.to_string(), Expr::constant(constant)))
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = CompilerConfig {
        default_limit: cli.default_limit,
        person_on_events: cli.person_on_events,
        ..CompilerConfig::default()
    };
    let compiler = match Compiler::new(config) {
        Ok(compiler) => compiler,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let mut options = QueryOptions::for_tenant(cli.tenant_id);
    for spec in &cli.placeholders {
        match parse_placeholder(spec) {
            Ok((name, expr)) => {
                options.placeholders.insert(name, expr);
            }
            Err(e) => {
                eprintln!("{}", e);
                std::process::exit(1);
            }
        }
    }

    match compiler.compile(&cli.query, &options) {
        Ok(compiled) => {
            match cli.dialect.as_str() {
                "aql" => println!("{}", compiled.aql_sql),
                _ => println!("{}", compiled.backend_sql),
            }
            if !compiled.bound_values.is_empty() {
                match serde_json::to_string_pretty(&compiled.bound_values) {
                    Ok(json) => println!("{}", json),
                    Err(e) => eprintln!("Failed to serialize bound values: {}", e),
                }
            }
        }
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    }
}
