//! tabmatch CLI - match rows across two CSV files and transform the result
//!
//! # Main Commands
//!
//! ```bash
//! tabmatch run source.csv target.csv -r rules.json -o out.csv   # match + transform
//! tabmatch match source.csv target.csv -r rules.json            # match only
//! tabmatch transform merged.csv -r rules.json                   # transform only
//! tabmatch serve                                                # HTTP preview server
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! tabmatch inspect input.csv         # Show detected encoding, separator and columns
//! tabmatch validate-rules rules.json # Check a rule set against the schema
//! tabmatch example-rules             # Print an example rule set
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tabmatch::export::{export_table, write_delimited, write_json};
use tabmatch::logging::{LogLevel, LOG_BROADCASTER};
use tabmatch::pipeline::{load_table, match_only, run_files, transform_only};
use tabmatch::{example_rule_set, parse_csv_file_auto, validate_rule_set, AppConfig, RuleSet, Table};

#[derive(Parser)]
#[command(name = "tabmatch")]
#[command(about = "Match rows across two tables and transform the result", long_about = None)]
struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log level (debug, info, success, warning, error)
    #[arg(long, global = true)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Csv,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Match source rows to target rows, then apply the transform rules
    Run {
        /// Source CSV file
        source: PathBuf,

        /// Target CSV file
        target: PathBuf,

        /// Rule set JSON file
        #[arg(short, long)]
        rules: PathBuf,

        /// Output file, format from extension (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Format used when writing to stdout
        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Match only: merge each source row with its best target row
    Match {
        source: PathBuf,
        target: PathBuf,

        #[arg(short, long)]
        rules: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Transform only: apply the rule set's transform rules to one CSV
    Transform {
        input: PathBuf,

        #[arg(short, long)]
        rules: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(short, long, value_enum, default_value = "csv")]
        format: OutputFormat,
    },

    /// Show what the CSV importer detects in a file
    Inspect {
        input: PathBuf,

        /// Rows to preview
        #[arg(short = 'n', long, default_value = "5")]
        rows: usize,
    },

    /// Validate a rule set JSON file against the schema
    ValidateRules { input: PathBuf },

    /// Print an example rule set
    ExampleRules,

    /// Start the HTTP preview server
    Serve {
        /// Port to listen on (default: TABMATCH_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    let level = match (cli.quiet, cli.log_level) {
        (_, Some(level)) => level,
        (true, None) => LogLevel::Warning,
        (false, None) => config.log_level,
    };
    LOG_BROADCASTER.set_level(level);

    let result = match cli.command {
        Commands::Run {
            source,
            target,
            rules,
            output,
            format,
        } => cmd_run(&source, &target, &rules, output.as_deref(), format),

        Commands::Match {
            source,
            target,
            rules,
            output,
            format,
        } => cmd_match(&source, &target, &rules, output.as_deref(), format),

        Commands::Transform {
            input,
            rules,
            output,
            format,
        } => cmd_transform(&input, &rules, output.as_deref(), format),

        Commands::Inspect { input, rows } => cmd_inspect(&input, rows),

        Commands::ValidateRules { input } => cmd_validate_rules(&input),

        Commands::ExampleRules => cmd_example_rules(),

        Commands::Serve { port } => {
            let config = match port {
                Some(port) => config.with_port(port),
                None => config,
            };
            tabmatch::server::start_server(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_run(
    source: &Path,
    target: &Path,
    rules: &Path,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let result = run_files(source, target, rules)?;
    write_output(&result.table, output, format)?;

    if !result.transform_errors.is_empty() {
        eprintln!("⚠️  {} transform rule(s) were skipped", result.transform_errors.len());
    }
    Ok(())
}

fn cmd_match(
    source: &Path,
    target: &Path,
    rules: &Path,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rule_set = RuleSet::load(rules)?;
    let (source_table, _) = load_table(source)?;
    let (target_table, _) = load_table(target)?;

    let report = match_only(&source_table, &target_table, &rule_set)?;
    write_output(&report.table, output, format)
}

fn cmd_transform(
    input: &Path,
    rules: &Path,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let rule_set = RuleSet::load(rules)?;
    let (table, _) = load_table(input)?;

    let outcome = transform_only(&table, &rule_set.transform_rules)?;
    write_output(&outcome.table, output, format)
}

fn cmd_inspect(input: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    let result = parse_csv_file_auto(input)?;

    println!("📄 {}", input.display());
    println!("   Encoding:  {}", result.encoding);
    println!("   Separator: '{}'", format_delimiter(result.delimiter));
    println!("   Rows:      {}", result.table.row_count());
    println!("   Columns ({}):", result.headers.len());
    for (i, col) in result.headers.iter().enumerate() {
        println!("   [{:2}] {}", i + 1, col);
    }
    println!();

    let stdout = std::io::stdout();
    write_delimited(&result.table.head(rows), stdout.lock(), b',')?;
    Ok(())
}

fn cmd_validate_rules(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let content = fs::read_to_string(input)?;
    let doc: serde_json::Value = serde_json::from_str(&content)?;

    if let Err(errors) = validate_rule_set(&doc) {
        eprintln!("❌ {} is not a valid rule set:", input.display());
        for err in errors.iter().take(10) {
            eprintln!("   - {}", err);
        }
        std::process::exit(1);
    }

    let rules = RuleSet::from_value(&doc)?;
    eprintln!(
        "✅ Valid rule set: {} match rule(s), {} transform rule(s)",
        rules.match_rules.len(),
        rules.transform_rules.len()
    );
    Ok(())
}

fn cmd_example_rules() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", example_rule_set().to_json()?);
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(table: &Table, path: Option<&Path>, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            export_table(table, p)?;
            eprintln!("💾 {} rows written to: {}", table.row_count(), p.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            match format {
                OutputFormat::Csv => write_delimited(table, &mut stdout, b',')?,
                OutputFormat::Json => {
                    write_json(table, &mut stdout)?;
                    writeln!(stdout)?;
                }
            }
        }
    }
    Ok(())
}
