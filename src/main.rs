//! medj-upload command line
//!
//! Drives the upload workflow against a medj server, and runs the text
//! normalizer and lab parser offline.
//!
//! ```bash
//! medj-upload upload --category 1 --specialty 4 --doc-type 2 scan.pdf
//! medj-upload parse ocr.txt
//! medj-upload share --labs --hours-labs 48 --qr-svg qr.svg
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use medj_upload::api::HttpClient;
use medj_upload::config::{self, ClientConfig};
use medj_upload::models::{EventQuery, FileKind, Locale, RecordId};
use medj_upload::messages::Message;
use medj_upload::share::{QrImage, ShareFilters, ShareForm};
use medj_upload::workflow::Completion;
use medj_upload::{normalize, IndicatorDictionary, LabParser, PickedFile, UploadService, UploadWorkflow};

#[derive(Parser)]
#[command(name = config::APP_NAME)]
#[command(version = config::APP_VERSION)]
#[command(about = "Upload medical documents to medj: OCR, analysis and confirmation", long_about = None)]
struct Cli {
    /// Server base URL (overrides MEDJ_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Anti-forgery token sent with every POST
    #[arg(long, global = true)]
    csrf_token: Option<String>,

    /// Session cookie header value, e.g. "sessionid=...; csrftoken=..."
    #[arg(long, global = true)]
    cookie: Option<String>,

    /// Message language (bg, en)
    #[arg(long, global = true)]
    locale: Option<Locale>,

    /// JSON indicator dictionary replacing the built-in one
    #[arg(long, global = true)]
    dictionary: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run OCR, analysis and confirmation for one document
    Upload {
        #[arg(long)]
        category: RecordId,

        #[arg(long)]
        specialty: RecordId,

        #[arg(long = "doc-type")]
        doc_type: RecordId,

        /// pdf or images; inferred from the files when omitted
        #[arg(long = "file-kind")]
        file_kind: Option<FileKind>,

        /// Attach to an existing clinical event
        #[arg(long)]
        event: Option<RecordId>,

        /// Use this text instead of running OCR
        #[arg(long = "text-file")]
        text_file: Option<PathBuf>,

        /// Stop after analysis
        #[arg(long = "no-confirm")]
        no_confirm: bool,

        /// One PDF, or one or more images of the same document
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the normalized form of an OCR text file
    Normalize { file: PathBuf },
    /// Parse lab rows from an OCR text file and print them as JSON
    Parse { file: PathBuf },
    /// List existing events matching a classification
    Suggest {
        #[arg(long)]
        category: RecordId,

        #[arg(long)]
        specialty: Option<RecordId>,

        #[arg(long = "doc-type")]
        doc_type: Option<RecordId>,
    },
    /// Create time-limited download links
    Share {
        #[arg(long, default_value = "")]
        start: String,

        #[arg(long, default_value = "")]
        end: String,

        #[arg(long)]
        events: bool,

        #[arg(long)]
        labs: bool,

        #[arg(long)]
        csv: bool,

        /// Link lifetime in hours (1-8760)
        #[arg(long = "hours-events", default_value = "24")]
        hours_events: String,

        #[arg(long = "hours-labs", default_value = "24")]
        hours_labs: String,

        #[arg(long = "hours-csv", default_value = "24")]
        hours_csv: String,

        #[arg(long)]
        specialty: Vec<String>,

        #[arg(long)]
        category: Vec<String>,

        #[arg(long = "event")]
        event: Vec<String>,

        #[arg(long)]
        indicator: Vec<String>,

        /// Render the QR code locally into this SVG file
        #[arg(long = "qr-svg")]
        qr_svg: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    medj_upload::init_tracing(cli.verbose.then(config::verbose_log_filter));
    tracing::debug!("{} v{}", config::APP_NAME, config::APP_VERSION);

    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.base_url {
        config.base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(token) = cli.csrf_token {
        config.csrf_token = Some(token);
    }
    if let Some(cookie) = cli.cookie {
        config.cookie = Some(cookie);
    }
    if let Some(locale) = cli.locale {
        config.locale = locale;
    }
    if let Some(path) = cli.dictionary {
        config.indicator_dictionary = Some(path);
    }

    match cli.command {
        Commands::Upload {
            category,
            specialty,
            doc_type,
            file_kind,
            event,
            text_file,
            no_confirm,
            files,
        } => {
            let parser = load_parser(&config)?;
            let client = HttpClient::new(&config)?;
            let mut workflow = UploadWorkflow::new(parser);
            workflow.set_category(Some(category))?;
            workflow.set_specialty(Some(specialty))?;
            workflow.set_doc_type(Some(doc_type))?;
            if file_kind.is_some() {
                workflow.set_file_kind(file_kind)?;
            }
            workflow.choose_event(event)?;

            let picked = files
                .iter()
                .map(|p| PickedFile::from_path(p))
                .collect::<Result<Vec<_>, _>>()?;
            let kind = workflow.select_files(picked)?;
            eprintln!("Files: {} ({kind})", files.len());

            match text_file {
                Some(path) => {
                    workflow.edit_text(read_text(&path)?)?;
                }
                None => {
                    applied(workflow.run_ocr(&client).await?, "OCR")?;
                }
            }
            if workflow.state().text().is_empty() {
                bail!("{}", Message::NoTextRecognized.text(config.locale));
            }

            applied(workflow.run_analyze(&client).await?, "Analysis")?;
            let state = workflow.state();
            if let Some(analysis) = state.analysis() {
                println!("{}", serde_json::to_string_pretty(analysis)?);
            }
            if !state.analyzed_ready() {
                bail!("{}", Message::RetrySuggested.text(config.locale));
            }
            if no_confirm {
                return Ok(());
            }

            applied(workflow.run_confirm(&client).await?, "Confirmation")?;
            let state = workflow.state();
            if let Some(duplicate) = state.duplicate() {
                println!(
                    "{} {}",
                    Message::Duplicate.text(config.locale),
                    config.url(&duplicate.redirect_url)
                );
            } else if let Some(saved) = state.saved() {
                println!(
                    "{} document_id={}",
                    Message::Saved.text(config.locale),
                    saved.document_id
                );
            }
        }
        Commands::Normalize { file } => {
            println!("{}", normalize(&read_text(&file)?));
        }
        Commands::Parse { file } => {
            let parser = load_parser(&config)?;
            let rows = parser.parse(&read_text(&file)?);
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Commands::Suggest { category, specialty, doc_type } => {
            let client = HttpClient::new(&config)?;
            let query = EventQuery { category_id: category, specialty_id: specialty, doc_type_id: doc_type };
            let events = client.suggest_events(&query).await?;
            if events.is_empty() {
                println!("{}", Message::NoEventsFound.text(config.locale));
            }
            for event in events {
                println!("{}\t{}", event.id, event.title);
            }
        }
        Commands::Share {
            start,
            end,
            events,
            labs,
            csv,
            hours_events,
            hours_labs,
            hours_csv,
            specialty,
            category,
            event,
            indicator,
            qr_svg,
        } => {
            let client = HttpClient::new(&config)?;
            let mut form = ShareForm::new(config.locale);
            form.update(|input| {
                input.start_date = start;
                input.end_date = end;
                input.generate_events = events;
                input.generate_labs = labs;
                input.generate_csv = csv;
                input.hours_events = hours_events;
                input.hours_labs = hours_labs;
                input.hours_csv = hours_csv;
                input.filters = ShareFilters { specialty, category, event, indicator };
            });
            if !form.can_generate() {
                bail!("Select at least one of --events, --labs, --csv");
            }

            let qr_endpoint = qr_svg.is_none().then(|| client.qr_endpoint());
            form.generate(&client, qr_endpoint.as_deref()).await;
            if let Some(summary) = form.summary() {
                eprintln!("{summary}");
            }
            let Some(links) = form.links() else {
                bail!("No links generated");
            };
            for url in [&links.events_pdf, &links.labs_pdf, &links.csv].into_iter().flatten() {
                println!("{}", config.url(url));
            }
            match (&links.qr, qr_svg) {
                (Some(QrImage::Inline(svg)), Some(path)) => {
                    std::fs::write(&path, svg)
                        .with_context(|| format!("writing {}", path.display()))?;
                    eprintln!("QR: {}", path.display());
                }
                (Some(QrImage::Remote(src)), _) => println!("QR: {}", config.url(src)),
                _ => {}
            }
            for doc in &links.documents {
                println!("- {}", doc.display_title(config.locale));
            }
        }
    }
    Ok(())
}

fn load_parser(config: &ClientConfig) -> Result<LabParser> {
    let dictionary = match &config.indicator_dictionary {
        Some(path) => IndicatorDictionary::load(path)
            .with_context(|| format!("loading indicator dictionary {}", path.display()))?,
        None => IndicatorDictionary::builtin(),
    };
    Ok(LabParser::new(Arc::new(dictionary)))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn applied(completion: Completion, step: &str) -> Result<()> {
    match completion {
        Completion::Applied => Ok(()),
        Completion::Failed(e) => Err(anyhow::Error::new(e).context(format!("{step} failed"))),
        Completion::Stale => bail!("{step} response was discarded"),
    }
}
