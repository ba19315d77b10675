use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use crossterm::style::Stylize;
use heimdall::config::Config;
use heimdall::data::data_exporter::{ExportOptions, OutputFormat};
use heimdall::data::datatable_loaders::LoadOptions;
use heimdall::error::HeimdallError;
use heimdall::services::{
    ConvertService, ExportService, InputFile, QueryExecutionResult, QueryFileRequest,
    QueryFileService,
};
use heimdall::utils::logging;
use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

#[derive(Parser)]
#[command(
    name = "heimdall",
    version,
    about = "Query CSV and spreadsheet files with SQL and export the results",
    after_help = r#"EXAMPLES
  $ heimdall query-file -i users.csv -s "SELECT * FROM table_0 WHERE age > 30"
  $ heimdall f -i users.csv:u -i orders.xlsx:o -f json \
      -s "SELECT u.name, o.total FROM u JOIN o ON u.id = o.user_id"
  $ heimdall convert -i report.xlsx -f csv -o report.csv
  $ heimdall export -d app.db -s "SELECT * FROM users" -f markdown

Tables are named table_0, table_1, ... in argument order unless given as path:alias."#,
    arg_required_else_help = true
)]
struct Cli {
    /// Config file (default: <config dir>/heimdall/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace); HEIMDALL_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run SQL against one or more CSV/spreadsheet files
    #[command(visible_aliases = ["f", "fly"])]
    QueryFile {
        /// Input file, optionally aliased as path:alias (repeatable)
        #[arg(short = 'i', long = "file", required = true)]
        files: Vec<String>,

        /// SQL statement to run
        #[arg(short, long)]
        sql: String,

        /// Fail when any table loads with coercion failures or truncated rows
        #[arg(long)]
        strict: bool,

        /// Print each table's inferred schema to stderr
        #[arg(long)]
        show_schema: bool,

        #[command(flatten)]
        load: LoadArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Convert a CSV/spreadsheet file to another format
    #[command(visible_alias = "con")]
    Convert {
        /// Input file
        #[arg(short = 'i', long = "file")]
        file: String,

        #[command(flatten)]
        load: LoadArgs,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Run SQL against a SQLite database file and export the result
    #[command(visible_aliases = ["ex", "query"])]
    Export {
        /// SQLite database file, opened read-only
        #[arg(short, long)]
        database: PathBuf,

        /// SQL statement to run
        #[arg(short, long)]
        sql: String,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Write a commented default config file if none exists
    Init,
}

#[derive(Args)]
struct LoadArgs {
    /// Rows to skip before the header
    #[arg(long)]
    skip_rows: Option<usize>,

    /// Number of header rows (multi-row headers are flattened)
    #[arg(long)]
    header_rows: Option<usize>,

    /// Worksheet to read from spreadsheet inputs (default: first sheet)
    #[arg(long)]
    sheet: Option<String>,

    /// Rows sampled for type inference, 0 for the whole file
    #[arg(long)]
    sample_rows: Option<usize>,

    /// Field delimiter for CSV inputs
    #[arg(long)]
    delimiter: Option<char>,
}

#[derive(Args)]
struct OutputArgs {
    /// json, yaml, markdown, csv, xlsx, html or text
    #[arg(short, long)]
    format: Option<String>,

    /// Write to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Columns to include, in order (repeatable)
    #[arg(short = 'c', long = "include")]
    include: Vec<String>,
}

impl LoadArgs {
    fn apply(&self, mut options: LoadOptions) -> Result<LoadOptions> {
        if let Some(skip) = self.skip_rows {
            options.skip_rows = skip;
        }
        if let Some(rows) = self.header_rows {
            options.header_rows = rows;
        }
        if let Some(sheet) = &self.sheet {
            options.sheet = Some(sheet.clone());
        }
        if let Some(sample) = self.sample_rows {
            options.sample_rows = Some(sample).filter(|n| *n > 0);
        }
        if let Some(delimiter) = self.delimiter {
            let byte = u8::try_from(delimiter)
                .ok()
                .filter(|b| b.is_ascii())
                .with_context(|| format!("delimiter must be a single ASCII character, got {:?}", delimiter))?;
            options.delimiter = Some(byte);
        }
        Ok(options)
    }
}

impl OutputArgs {
    /// Explicit flag, then the output file extension, then the configured default
    fn format(&self, config: &Config) -> String {
        if let Some(format) = &self.format {
            return format.clone();
        }
        self.output
            .as_deref()
            .and_then(OutputFormat::from_path)
            .unwrap_or(config.output.default_format)
            .to_string()
    }

    fn export_options(&self, config: &Config) -> ExportOptions {
        let mut options = config.export_options();
        if !self.include.is_empty() {
            options.include = Some(self.include.clone());
        }
        options
    }

    /// Refuse binary output to a terminal before doing any work
    fn check_target(&self, format: &str) -> Result<()> {
        let format: OutputFormat = format.parse()?;
        if format.is_binary() && self.output.is_none() && std::io::stdout().is_terminal() {
            anyhow::bail!("{} output is binary; use --output <file> or redirect stdout", format);
        }
        Ok(())
    }

    fn write(&self, bytes: &[u8]) -> Result<()> {
        match &self.output {
            Some(path) => write_file(path, bytes),
            None => {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(bytes)?;
                stdout.flush()?;
                Ok(())
            }
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    eprintln!("{}", format!("Wrote {} bytes to {}", bytes.len(), path.display()).green());
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn report_loads(result: &QueryExecutionResult, show_schema: bool) {
    if show_schema {
        for table in &result.tables {
            eprintln!(
                "{} {} ({} rows): {}",
                "table".cyan(),
                table.name.clone().bold(),
                table.rows,
                table.schema
            );
        }
    }
    for report in result.reports.iter().filter(|r| !r.is_clean()) {
        eprintln!("{} {}", "warning:".yellow().bold(), report.summary());
    }
}

fn report_status(result: &QueryExecutionResult) {
    eprintln!("{}", result.stats.status_message().dark_grey());
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "Effective configuration");

    match cli.command {
        Command::QueryFile {
            files,
            sql,
            strict,
            show_schema,
            load,
            output,
        } => {
            let format = output.format(&config);
            output.check_target(&format)?;
            let inputs = files
                .iter()
                .map(|f| f.parse::<InputFile>())
                .collect::<heimdall::Result<Vec<_>>>()?;

            let service = QueryFileService::new(load.apply(config.load_options())?, config.coercer());
            let request = QueryFileRequest {
                inputs,
                sql,
                format,
                export: output.export_options(&config),
                strict,
            };

            let mut buffer = Vec::new();
            let result = service.run(&request, &mut buffer)?;
            report_loads(&result, show_schema);
            output.write(&buffer)?;
            report_status(&result);
        }
        Command::Convert { file, load, output } => {
            let format = output.format(&config);
            output.check_target(&format)?;
            let input: InputFile = file.parse()?;

            let service = ConvertService::new(load.apply(config.load_options())?, config.coercer());
            let mut buffer = Vec::new();
            let result = service.run(&input, &format, &output.export_options(&config), &mut buffer)?;
            report_loads(&result, false);
            output.write(&buffer)?;
            report_status(&result);
        }
        Command::Export {
            database,
            sql,
            output,
        } => {
            let format = output.format(&config);
            output.check_target(&format)?;

            let mut buffer = Vec::new();
            let result = ExportService::run_on_database(
                &database,
                &sql,
                &format,
                &output.export_options(&config),
                &mut buffer,
            )?;
            output.write(&buffer)?;
            report_status(&result);
        }
        Command::Config { action } => {
            let path = match cli.config {
                Some(path) => path,
                None => Config::get_config_path()?,
            };
            match action {
                ConfigAction::Path => println!("{}", path.display()),
                ConfigAction::Init => {
                    if Config::init_at(&path)? {
                        eprintln!("{}", format!("Created {}", path.display()).green());
                    } else {
                        eprintln!("{}", format!("{} already exists", path.display()).yellow());
                    }
                }
            }
        }
    }

    Ok(())
}

/// Exit status by error category
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<HeimdallError>() {
        Some(HeimdallError::UnsupportedFormat(_)) | Some(HeimdallError::UnknownColumn(_)) => 2,
        Some(HeimdallError::Schema(_))
        | Some(HeimdallError::Io(_))
        | Some(HeimdallError::Csv(_))
        | Some(HeimdallError::DuplicateTable(_))
        | Some(HeimdallError::TableNotFound(_)) => 3,
        Some(HeimdallError::Query(_)) => 4,
        Some(HeimdallError::Encoding(_)) => 5,
        None => 1,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {:#}", "error:".red().bold(), err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}
