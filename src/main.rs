// src/main.rs
mod extractors;
mod gateway;
mod pdf;
mod pipeline;
mod storage;
mod utils;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use extractors::locator::heading_for;
use extractors::section::{FixedPageStrategy, SectionStrategy, SectionTarget, UntilTotalStrategy};
use extractors::table::{StructureTableStrategy, TableStrategy, TextTableStrategy};
use gateway::{Classifier, GatewayClient, GatewayConfig};
use pdf::{DoclingCli, LopdfBackend, PdfBackend, PdftotextBackend};
use pipeline::{ExtractionSet, HeuristicPipeline, LlmPipeline};
use storage::StorageManager;
use utils::AppError;

const TOKEN_ENV: &str = "LLM_GATEWAY_TOKEN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Regex section detection and whitespace table rebuilding
    Heuristic,
    /// Keyword prefilter plus model classification through the gateway
    Llm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Read only the configured page
    FixedPage,
    /// Read forward until a total line
    UntilTotal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// In-process text decoding; no layout, so columns are never split
    Lopdf,
    /// poppler `pdftotext -layout`; falls back to lopdf when not installed
    Pdftotext,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Tables {
    Text,
    Structure,
    Both,
}

impl Tables {
    fn text(self) -> bool {
        matches!(self, Tables::Text | Tables::Both)
    }

    fn structure(self) -> bool {
        matches!(self, Tables::Structure | Tables::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Xlsx,
    Docx,
    Both,
}

/// Command Line Interface for the contingent liabilities extractor
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Annual report PDF (prompted for when omitted)
    #[arg(short, long)]
    pdf: Option<PathBuf>,

    /// Output directory for extracted content
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = Mode::Heuristic)]
    mode: Mode,

    /// Section strategy for the heuristic mode
    #[arg(long, value_enum, default_value_t = Strategy::FixedPage)]
    strategy: Strategy,

    /// Section to extract as NAME=PAGE[:LOGICAL]; repeatable
    #[arg(long = "section", value_parser = parse_section, default_values_t = default_sections())]
    sections: Vec<SectionArg>,

    /// PDF text backend
    #[arg(long, value_enum, default_value_t = Backend::Pdftotext)]
    backend: Backend,

    /// Table strategies to run
    #[arg(long, value_enum, default_value_t = Tables::Both)]
    tables: Tables,

    /// Table-structure recognizer command (docling CLI)
    #[arg(long, default_value = "docling")]
    structure_cmd: String,

    /// Office files to write
    #[arg(long, value_enum, default_value_t = OutputFormat::Both)]
    format: OutputFormat,

    /// LLM gateway endpoint
    #[arg(long, default_value = "https://localhost/api/v1/llm")]
    gateway_url: String,

    #[arg(long, default_value = "Llama 3.3 v1")]
    deployment: String,

    #[arg(long, default_value = "tgi")]
    provider: String,

    #[arg(long, default_value_t = 0.1)]
    temperature: f32,

    /// Minimum stage-one confidence for a page to reach stage two
    #[arg(long, default_value_t = gateway::classify::DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence_threshold: f64,

    /// Skip TLS certificate verification for the gateway
    #[arg(long)]
    insecure: bool,

    /// Debug mode - save annotated text dumps for debugging
    #[arg(short, long)]
    debug: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// A `--section` value before the heading is derived.
#[derive(Debug, Clone, PartialEq)]
struct SectionArg {
    name: String,
    page: usize,
    logical: Option<u32>,
}

impl std::fmt::Display for SectionArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.logical {
            Some(logical) => write!(f, "{}={}:{}", self.name, self.page, logical),
            None => write!(f, "{}={}", self.name, self.page),
        }
    }
}

impl SectionArg {
    fn into_target(self) -> SectionTarget {
        SectionTarget {
            heading: heading_for(&self.name),
            name: self.name,
            physical_page: self.page,
            logical_page: self.logical,
        }
    }
}

fn default_sections() -> Vec<SectionArg> {
    vec![
        SectionArg { name: "consolidated".to_string(), page: 176, logical: Some(346) },
        SectionArg { name: "standalone".to_string(), page: 214, logical: Some(423) },
    ]
}

fn parse_section(value: &str) -> Result<SectionArg, String> {
    let (name, location) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=PAGE[:LOGICAL], got '{}'", value))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("section name is empty".to_string());
    }

    let (page, logical) = match location.split_once(':') {
        Some((page, logical)) => (page, Some(logical)),
        None => (location, None),
    };
    let page: usize = page.trim().parse().map_err(|_| format!("invalid page number '{}'", page))?;
    if page == 0 {
        return Err("page numbers start at 1".to_string());
    }
    let logical = logical
        .map(|l| l.trim().parse::<u32>().map_err(|_| format!("invalid logical page '{}'", l)))
        .transpose()?;

    Ok(SectionArg { name: name.to_string(), page, logical })
}

/// Asks for the PDF path on stdin.
fn prompt_for_pdf() -> Result<PathBuf, AppError> {
    eprint!("Enter the path to the PDF file: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let path = line.trim().trim_matches('"');
    if path.is_empty() {
        return Err(AppError::Config("No PDF path given".to_string()));
    }
    Ok(PathBuf::from(path))
}

fn build_backend(kind: Backend) -> Box<dyn PdfBackend> {
    match kind {
        Backend::Lopdf => Box::new(LopdfBackend),
        Backend::Pdftotext => {
            let backend = PdftotextBackend::default();
            if backend.is_available() {
                Box::new(backend)
            } else {
                tracing::warn!("{} not found, falling back to lopdf without column detection", backend.pdftotext);
                Box::new(LopdfBackend)
            }
        }
    }
}

fn save_outputs(storage: &StorageManager, args: &Args, pdf: &Path, results: &ExtractionSet) {
    let mode = match args.mode {
        Mode::Heuristic => "heuristic",
        Mode::Llm => "llm",
    };

    if matches!(args.format, OutputFormat::Xlsx | OutputFormat::Both) {
        match storage.save_workbook(results) {
            Ok(path) => tracing::info!("Saved workbook to: {}", path.display()),
            Err(e) => tracing::error!("Failed to save workbook: {}", e),
        }
    }
    if matches!(args.format, OutputFormat::Docx | OutputFormat::Both) {
        match storage.save_document(results) {
            Ok(path) => tracing::info!("Saved document to: {}", path.display()),
            Err(e) => tracing::error!("Failed to save document: {}", e),
        }
    }
    match storage.save_metadata(pdf, mode, results) {
        Ok(path) => tracing::info!("Saved metadata to: {}", path.display()),
        Err(e) => tracing::error!("Failed to save metadata: {}", e),
    }
}

async fn run_llm(
    args: &Args,
    backend: &dyn PdfBackend,
    storage: &StorageManager,
    pdf: &Path,
) -> Result<ExtractionSet, AppError> {
    let token = std::env::var(TOKEN_ENV).unwrap_or_default();
    let mut config = GatewayConfig::new(&args.gateway_url, token);
    config.deployment = args.deployment.clone();
    config.provider = args.provider.clone();
    config.temperature = args.temperature;
    config.accept_invalid_certs = args.insecure;

    let client = GatewayClient::new(config)?;
    let classifier = Classifier::new(&client).with_threshold(args.confidence_threshold);
    let recognizer = DoclingCli::new(&args.structure_cmd);

    let mut pipeline = LlmPipeline::new(backend, classifier, storage.base_dir()).with_text_tables(args.tables.text());
    if args.tables.structure() {
        pipeline = pipeline.with_recognizer(&recognizer);
    }
    if args.debug {
        pipeline = pipeline.with_debug_dir(storage.debug_dir());
    }
    Ok(pipeline.run(pdf).await?)
}

fn run_heuristic(args: &Args, backend: &dyn PdfBackend, storage: &StorageManager, pdf: &Path) -> ExtractionSet {
    let strategy: Box<dyn SectionStrategy> = match args.strategy {
        Strategy::FixedPage => Box::new(FixedPageStrategy),
        Strategy::UntilTotal => Box::new(UntilTotalStrategy),
    };

    let mut tables: Vec<Box<dyn TableStrategy>> = Vec::new();
    if args.tables.text() {
        tables.push(Box::new(TextTableStrategy));
    }
    if args.tables.structure() {
        tables.push(Box::new(StructureTableStrategy::new(Box::new(DoclingCli::new(&args.structure_cmd)))));
    }

    let targets: Vec<SectionTarget> = args.sections.iter().cloned().map(SectionArg::into_target).collect();
    let mut pipeline = HeuristicPipeline::new(backend, strategy.as_ref(), &tables);
    if args.debug {
        pipeline = pipeline.with_debug_dir(storage.debug_dir());
    }
    pipeline.run(pdf, &targets)
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments, then set up logging (reads RUST_LOG env var)
    let args = Args::parse();
    utils::logging::setup_logging(args.verbose);
    tracing::debug!("Starting with args: {:?}", args);

    // 2. Resolve the input PDF
    let pdf = match &args.pdf {
        Some(path) => path.clone(),
        None => prompt_for_pdf()?,
    };

    // 3. Opening the PDF is the one fatal failure
    let backend = build_backend(args.backend);
    {
        let doc = backend.open(&pdf)?;
        tracing::info!("Opened {} with {} ({} pages)", pdf.display(), backend.name(), doc.page_count());
    }

    // 4. Initialize storage
    let storage = StorageManager::new(&args.output_dir)?;

    // 5. Run the selected pipeline
    let results = match args.mode {
        Mode::Heuristic => run_heuristic(&args, backend.as_ref(), &storage, &pdf),
        Mode::Llm => run_llm(&args, backend.as_ref(), &storage, &pdf).await?,
    };

    if results.is_empty() {
        tracing::warn!("No sections found");
    }
    for result in results.iter() {
        tracing::info!(
            "{}: {} characters extracted, {} table(s){}",
            result.title(),
            result.text.chars().count(),
            result.tables.len(),
            result.error.as_ref().map(|e| format!(" (error: {})", e)).unwrap_or_default()
        );
    }

    // 6. Save outputs
    save_outputs(&storage, &args, &pdf, &results);

    tracing::info!("Processing finished. Sections: {}, tables: {}", results.len(), results.table_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_section_arguments() {
        assert_eq!(
            parse_section("consolidated=176:346").unwrap(),
            SectionArg { name: "consolidated".into(), page: 176, logical: Some(346) }
        );
        assert_eq!(
            parse_section("standalone=214").unwrap(),
            SectionArg { name: "standalone".into(), page: 214, logical: None }
        );
        assert!(parse_section("standalone").is_err());
        assert!(parse_section("=12").is_err());
        assert!(parse_section("x=0").is_err());
        assert!(parse_section("x=12:abc").is_err());
    }

    #[test]
    fn defaults_cover_both_statements() {
        let args = Args::parse_from(["contingent_extractor", "--pdf", "report.pdf"]);
        assert_eq!(args.sections, default_sections());
        assert_eq!(args.mode, Mode::Heuristic);
        assert_eq!(args.tables, Tables::Both);
        assert_eq!(args.backend, Backend::Pdftotext);

        let targets: Vec<SectionTarget> = args.sections.into_iter().map(SectionArg::into_target).collect();
        assert_eq!(targets[1].heading, "notes to standalone financial statement");
        assert_eq!(targets[1].logical_page, Some(423));
    }

    #[test]
    fn explicit_sections_replace_defaults() {
        let args = Args::parse_from([
            "contingent_extractor",
            "--mode",
            "llm",
            "--strategy",
            "until-total",
            "--section",
            "consolidated=10",
            "--tables",
            "text",
        ]);
        assert_eq!(args.sections.len(), 1);
        assert_eq!(args.mode, Mode::Llm);
        assert_eq!(args.strategy, Strategy::UntilTotal);
        assert!(args.tables.text() && !args.tables.structure());
    }

    #[test]
    fn clap_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
