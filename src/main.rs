use account_views::sink::to_json_string;
use account_views::{
    load_csv_workbook, load_json_workbook, HtmlSink, JsonFileSink, ProcessingOptions, ViewProcessor,
    ViewSink, Workbook,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum InputFormat {
    /// A single JSON workbook
    Json,
    /// A directory of CSV sheets named like "dados (Real).csv" and "plano (Main).csv"
    CsvDir,
}

/// Resolves charts of accounts against raw data sources.
#[derive(Debug, Parser)]
#[command(name = "account-views", version)]
struct Cli {
    /// Workbook to read
    #[arg(long, required_unless_present = "print_schema")]
    input: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "json")]
    format: InputFormat,

    /// JSON file with processing options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Existing HTML page whose data variable is patched
    #[arg(long, conflicts_with = "output")]
    html: Option<PathBuf>,

    /// JSON file to write the views to
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the JSON schema of the workbook feed and exit
    #[arg(long)]
    print_schema: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if cli.print_schema {
        println!("{}", Workbook::schema_as_json()?);
        return Ok(());
    }

    let options = match &cli.options {
        Some(path) => ProcessingOptions::from_json_file(path)
            .with_context(|| format!("loading options from {}", path.display()))?,
        None => ProcessingOptions::default(),
    };

    let input = cli.input.context("--input is required")?;
    let workbook = match cli.format {
        InputFormat::Json => load_json_workbook(&input)?,
        InputFormat::CsvDir => load_csv_workbook(&input, &options)?,
    };

    let sink: Option<Box<dyn ViewSink>> = match (&cli.html, &cli.output) {
        (Some(page), _) => Some(Box::new(HtmlSink::new(
            page,
            options.js_variable_name.clone(),
            options.json_indent,
        ))),
        (None, Some(path)) => Some(Box::new(JsonFileSink::new(path, options.json_indent))),
        (None, None) => None,
    };

    let document = match &sink {
        Some(sink) => ViewProcessor::process_into(&workbook, &options, &**sink)?,
        None => {
            let document = ViewProcessor::process(&workbook, &options)?;
            println!("{}", to_json_string(&document, options.json_indent)?);
            document
        }
    };

    info!(
        "Done: {} views calculated at {}",
        document.calculated_views.len(),
        document.timestamp_local
    );
    Ok(())
}
