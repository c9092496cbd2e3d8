use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info};
use simplelog::{Config, LevelFilter, WriteLogger};

use pdf_binder::global_search::{HighlightMarker, SearchTarget, search_all_documents};
use pdf_binder::panic_handler;
use pdf_binder::pdf::{MupdfBackend, PdfBackend, Size, render_page};
use pdf_binder::search::find_matches;
use pdf_binder::settings::{self, APP_NAME, Settings};
use pdf_binder::{Binder, DocumentHandle, DocumentId, TextCache, Viewer, ViewerEvent};

#[derive(Parser)]
#[command(name = "binder")]
#[command(about = "Organize, search and render PDF documents")]
struct Cli {
    /// Log level for the log file (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    /// Binder file, defaults to the user data directory
    #[arg(long, global = true)]
    binder: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show page count and page sizes
    Info { file: PathBuf },

    /// Find a term inside one document
    Find { file: PathBuf, term: String },

    /// Search names and text of several documents
    Search {
        term: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Render one page to PNG
    Render {
        file: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        #[arg(short, long, default_value_t = 1.5)]
        scale: f32,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Open a document in the viewer, optionally search, and save the frame
    View {
        file: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        page: usize,
        /// Jump to the first match of this term
        #[arg(long)]
        search: Option<String>,
        /// Container width the page is fitted to
        #[arg(long, default_value_t = 800.0)]
        width: f32,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import files into the binder
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Make this tab (1-based) active before importing
        #[arg(long)]
        tab: Option<usize>,
    },

    /// List tabs and documents
    List,

    /// Delete a document by id
    Delete { id: String },
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.map_or_else(|| PathBuf::from("."), |dir| dir.join(APP_NAME))
}

fn init_logging(level: LevelFilter) -> Result<()> {
    let dir = app_dir(dirs::cache_dir());
    fs::create_dir_all(&dir)?;
    WriteLogger::init(
        level,
        Config::default(),
        File::create(dir.join("binder.log"))?,
    )?;
    Ok(())
}

fn main() -> Result<()> {
    panic_handler::initialize_panic_handler();
    let cli = Cli::parse();
    let settings = settings::load_settings();

    let level = cli
        .log_level
        .or_else(|| settings.log_level.parse().ok())
        .unwrap_or(LevelFilter::Info);
    init_logging(level)?;
    info!("Starting binder");

    let backend: Arc<dyn PdfBackend> = Arc::new(MupdfBackend);
    let binder_path = cli
        .binder
        .unwrap_or_else(|| app_dir(dirs::data_dir()).join("binder.json"));

    let result = run(cli.command, &settings, backend, &binder_path);
    if let Err(e) = &result {
        error!("Command failed: {e:#}");
    }
    info!("Shutting down binder");
    result
}

fn run(
    command: Commands,
    settings: &Settings,
    backend: Arc<dyn PdfBackend>,
    binder_path: &Path,
) -> Result<()> {
    match command {
        Commands::Info { file } => info_cmd(&file, backend.as_ref()),
        Commands::Find { file, term } => find_cmd(&file, &term, settings, backend.as_ref()),
        Commands::Search { term, files } => search_cmd(&term, &files, settings, backend.as_ref()),
        Commands::Render {
            file,
            page,
            scale,
            output,
        } => render_cmd(&file, page, scale, &output, backend.as_ref()),
        Commands::View {
            file,
            page,
            search,
            width,
            output,
        } => view_cmd(&file, page, search.as_deref(), width, output.as_deref(), settings, backend),
        Commands::Import { files, tab } => import_cmd(&files, tab, binder_path, backend.as_ref()),
        Commands::List => list_cmd(binder_path),
        Commands::Delete { id } => delete_cmd(&id, binder_path),
    }
}

fn read_handle(file: &Path) -> Result<DocumentHandle> {
    let bytes = fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let name = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(DocumentHandle::new(
        DocumentId::new(file.display().to_string()),
        name,
        bytes,
    ))
}

fn info_cmd(file: &Path, backend: &dyn PdfBackend) -> Result<()> {
    let handle = read_handle(file)?;
    let doc = backend.load(&handle.bytes)?;
    println!("{}: {} pages", handle.name, doc.page_count());
    for page in 1..=doc.page_count() {
        let size = doc.page_size(page)?;
        println!("  page {page}: {:.0} x {:.0} pt", size.width, size.height);
    }
    Ok(())
}

fn find_cmd(file: &Path, term: &str, settings: &Settings, backend: &dyn PdfBackend) -> Result<()> {
    let handle = read_handle(file)?;
    let cache = TextCache::new();
    let text = cache.ensure_cached(&handle.id, backend, &handle.bytes);
    let matches = find_matches(&text.pages, term, settings.search.min_term_len);
    if matches.is_empty() {
        println!("No matches");
        return Ok(());
    }
    for m in &matches {
        let context: String = text
            .page(m.page)
            .unwrap_or_default()
            .chars()
            .skip(m.offset.saturating_sub(20))
            .take(m.len + 40)
            .collect();
        println!("page {:>4} @ {:>6}: {}", m.page, m.offset, context.replace('\n', " "));
    }
    println!("{} matches", matches.len());
    Ok(())
}

fn search_cmd(
    term: &str,
    files: &[PathBuf],
    settings: &Settings,
    backend: &dyn PdfBackend,
) -> Result<()> {
    let handles = files
        .iter()
        .map(|f| read_handle(f))
        .collect::<Result<Vec<_>>>()?;
    let cache = TextCache::new();
    cache.warm_all(backend, &handles);

    let targets = handles.iter().map(|h| SearchTarget {
        id: &h.id,
        name: &h.name,
    });
    let marker = HighlightMarker::new("[", "]");
    let results = search_all_documents(term, targets, &cache, &settings.search, &marker);
    if results.is_empty() {
        println!("No results");
        return Ok(());
    }
    if !results.filename_matches.is_empty() {
        println!("Matching files:");
        for m in &results.filename_matches {
            println!("  {}", m.highlighted_name);
        }
    }
    if !results.content_matches.is_empty() {
        println!("Content mentions:");
        for m in &results.content_matches {
            println!("  {}: {}", m.name, m.snippet.replace('\n', " "));
        }
    }
    Ok(())
}

fn save_png(bitmap: &pdf_binder::pdf::PageBitmap, output: &Path) -> Result<()> {
    let image = image::RgbImage::from_raw(bitmap.width_px, bitmap.height_px, bitmap.pixels.clone())
        .context("bitmap size does not match its pixels")?;
    image
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn render_cmd(
    file: &Path,
    page: usize,
    scale: f32,
    output: &Path,
    backend: &dyn PdfBackend,
) -> Result<()> {
    let handle = read_handle(file)?;
    let doc = backend.load(&handle.bytes)?;
    let rendered = render_page(doc.as_ref(), page, scale)?;
    save_png(&rendered.bitmap, output)?;
    println!(
        "Rendered page {page} at {scale} to {} ({}x{})",
        output.display(),
        rendered.bitmap.width_px,
        rendered.bitmap.height_px
    );
    Ok(())
}

fn view_cmd(
    file: &Path,
    page: usize,
    search: Option<&str>,
    width: f32,
    output: Option<&Path>,
    settings: &Settings,
    backend: Arc<dyn PdfBackend>,
) -> Result<()> {
    let handle = read_handle(file)?;
    let mut viewer = Viewer::new(
        backend,
        Arc::new(TextCache::new()),
        settings.clone(),
        Size::new(width, width * 1.3),
    );
    viewer.open(&handle)?;
    if page != 1 && !viewer.go_to(page) {
        bail!("page {page} is out of range");
    }
    if let Some(term) = search {
        viewer.set_search_term(term);
    }

    let deadline = Instant::now() + Duration::from_secs(60);
    loop {
        for event in viewer.poll(Instant::now()) {
            if let ViewerEvent::RenderFailed { page, error } = event {
                bail!("page {page}: {error}");
            }
        }
        if !viewer.is_busy() {
            break;
        }
        if Instant::now() >= deadline {
            bail!("timed out waiting for the viewer");
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    println!(
        "{} | {}",
        viewer.page_label().unwrap_or_default(),
        viewer.match_info()
    );
    if let (Some(frame), Some(output)) = (viewer.frame(), output) {
        save_png(frame.bitmap(), output)?;
        println!(
            "Saved page {} ({} highlights) to {}",
            frame.page,
            frame.highlights.len(),
            output.display()
        );
    }
    Ok(())
}

fn import_cmd(
    files: &[PathBuf],
    tab: Option<usize>,
    binder_path: &Path,
    backend: &dyn PdfBackend,
) -> Result<()> {
    let mut binder = Binder::load_from_file(binder_path)?;
    if let Some(number) = tab {
        let id = binder
            .tab_at(number)
            .map(|t| t.id.clone())
            .with_context(|| format!("no tab {number}"))?;
        binder.set_active(&id);
    }
    // Text is cached during import; the CLI only needs it for the lifetime
    // of this command.
    let cache = TextCache::new();
    for file in files {
        let id = binder.import_path(file, backend, &cache)?;
        let tab = binder.find(&id).map(|(t, _)| t.title.clone()).unwrap_or_default();
        println!("{} -> {tab} ({id})", file.display());
    }
    binder.save()
}

fn list_cmd(binder_path: &Path) -> Result<()> {
    let binder = Binder::load_from_file(binder_path)?;
    let active = binder.active_tab().map(|t| t.id.clone());
    for (idx, tab) in binder.tabs().iter().enumerate() {
        let marker = if active.as_ref() == Some(&tab.id) { "*" } else { " " };
        println!("{marker}{} {} [{}]", idx + 1, tab.title, tab.color);
        for file in &tab.files {
            println!(
                "    {}  {}  {}",
                file.id,
                file.name,
                file.imported_at.format("%Y-%m-%d %H:%M")
            );
        }
    }
    Ok(())
}

fn delete_cmd(id: &str, binder_path: &Path) -> Result<()> {
    let mut binder = Binder::load_from_file(binder_path)?;
    let cache = TextCache::new();
    match binder.delete(&DocumentId::new(id), &cache) {
        Some(entry) => {
            binder.save()?;
            println!("Deleted {}", entry.name);
            Ok(())
        }
        None => bail!("no document with id {id}"),
    }
}
