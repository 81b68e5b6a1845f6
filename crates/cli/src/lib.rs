use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use textlayer_core::{
    map_matches, FixedAdvanceMetrics, FontFileMetrics, FrameContext, LayerEvent, LayerPhase,
    MatchPosition, OverlayNode, RunGeometry, RunPosition, RunStore, RunText, ScrollRequest,
    SearchOptions, SearchState, SelectedMatch, TextDirection, TextLayerConfig, TextLayerSet,
    TextMetrics, TextRun,
};
use textlayer_scheduler::{Clock, ManualClock, Timestamp};

/// Clock reading at which the CLI session starts
const SESSION_START_MS: u64 = 60_000;

#[derive(Debug, Parser)]
#[command(name = "textlayer")]
#[command(about = "Text overlay engine CLI")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Build the text overlay of a document fixture and paint search matches.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        /// Measure text with a TrueType/OpenType font instead of fixed advances.
        #[arg(long, value_name = "FONT")]
        font: Option<PathBuf>,
        /// Advance of every character, in em, when no font is given.
        #[arg(long, default_value_t = 0.5)]
        advance: f32,
        /// JSON configuration file.
        #[arg(long, value_name = "CONFIG")]
        config: Option<PathBuf>,
        /// Override the run ceiling.
        #[arg(long)]
        max_runs: Option<usize>,
        /// Treat the viewport as scrolled this many milliseconds ago.
        #[arg(long, value_name = "MS")]
        scroll_age: Option<u64>,
    },
    /// Map search matches onto runs and print the positions.
    Map {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[command(flatten)]
        search: SearchArgs,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Args)]
struct SearchArgs {
    /// Text to search for.
    #[arg(long)]
    query: Option<String>,
    #[arg(long)]
    case_sensitive: bool,
    /// Highlight every match, not only the selected one.
    #[arg(long)]
    highlight_all: bool,
    /// Select the n-th match across all pages (0-based).
    #[arg(long, value_name = "N")]
    select: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Markup,
}

#[derive(Debug, Deserialize)]
struct DocumentFixture {
    pages: Vec<PageFixture>,
}

#[derive(Debug, Deserialize)]
struct PageFixture {
    page_index: usize,
    runs: Vec<RunFixture>,
}

#[derive(Debug, Deserialize)]
struct RunFixture {
    #[serde(flatten)]
    geometry: RunGeometry,
    text: String,
    #[serde(default)]
    dir: TextDirection,
}

impl PageFixture {
    fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    fn run_texts(&self) -> Vec<RunText> {
        self.runs.iter().map(|run| RunText::new(run.text.clone(), run.dir)).collect()
    }

    fn run_store(&self) -> RunStore {
        self.runs
            .iter()
            .map(|run| TextRun::new(run.geometry.clone(), RunText::new(run.text.clone(), run.dir)))
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Metrics {
    Fixed(FixedAdvanceMetrics),
    Font(FontFileMetrics),
}

impl TextMetrics for Metrics {
    fn measure(&mut self, font: &str, text: &str) -> f32 {
        match self {
            Metrics::Fixed(metrics) => metrics.measure(font, text),
            Metrics::Font(metrics) => metrics.measure(font, text),
        }
    }
}

#[derive(Debug, Serialize)]
struct RenderOutput<'a> {
    finished_at: Timestamp,
    match_count: usize,
    scroll: Option<ScrollRequest>,
    pages: Vec<PageOutput<'a>>,
}

#[derive(Debug, Serialize)]
struct PageOutput<'a> {
    page_index: usize,
    phase: LayerPhase,
    timers_armed: u64,
    outcome: Outcome,
    nodes: &'a [OverlayNode],
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum Outcome {
    Rendered {
        attached: usize,
        unmeasurable: usize,
        whitespace: usize,
        mapped: usize,
        issues: Vec<String>,
    },
    TooManyRuns {
        runs: usize,
        limit: usize,
    },
    TextRejected {
        geometry_runs: usize,
        text_runs: usize,
    },
    Pending,
}

#[derive(Debug, Serialize)]
struct MapOutput {
    match_count: usize,
    pages: Vec<PageMapping>,
}

#[derive(Debug, Serialize)]
struct PageMapping {
    page_index: usize,
    total_chars: usize,
    matches: Vec<MappedMatch>,
    issues: Vec<String>,
}

#[derive(Debug, Serialize)]
struct MappedMatch {
    begin: RunPosition,
    end: RunPosition,
    text: String,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Render { file, search, format, font, advance, config, max_runs, scroll_age } => {
            let config = load_config(config.as_deref(), max_runs)?;
            let metrics = load_metrics(font.as_deref(), advance)?;
            run_render(&file, &search, format, config, metrics, scroll_age)
        }
        Commands::Map { file, search } => run_map(&file, &search),
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn run_render(
    file: &Path,
    args: &SearchArgs,
    format: OutputFormat,
    config: TextLayerConfig,
    metrics: Metrics,
    scroll_age: Option<u64>,
) -> Result<()> {
    let document = load_document(file)?;
    let search = build_search(&document, args)?;

    let clock = ManualClock::new(Timestamp::from_millis(SESSION_START_MS));
    let last_scroll = scroll_age.map(|age| Timestamp::from_millis(SESSION_START_MS.saturating_sub(age)));

    let mut layers = TextLayerSet::new(config);
    let mut outcomes: BTreeMap<usize, Outcome> = BTreeMap::new();
    let mut scroll = None;

    let ctx = FrameContext::new(clock.now(), last_scroll, &search);
    for page in &document.pages {
        let layer = layers.open_page(page.page_index, metrics.clone());
        for run in &page.runs {
            layer.append_geometry(run.geometry.clone());
        }
        layer.end_layout(&ctx);
        let event = layer.assign_text(page.run_texts(), &ctx);
        record_event(&mut outcomes, &mut scroll, page.page_index, event);
    }

    // Fire deferred alignment passes in due order until none is pending.
    while let Some(due) = next_due(&layers) {
        clock.set(due);
        let ctx = FrameContext::new(clock.now(), last_scroll, &search);
        for (page_index, event) in layers.poll(&ctx) {
            record_event(&mut outcomes, &mut scroll, page_index, event);
        }
    }

    let pages = layers
        .pages()
        .into_iter()
        .filter_map(|page_index| {
            let layer = layers.get(page_index)?;
            Some(PageOutput {
                page_index,
                phase: layer.phase(),
                timers_armed: layer.debounce_stats().timers_armed,
                outcome: outcomes.get(&page_index).cloned().unwrap_or(Outcome::Pending),
                nodes: layer.nodes(),
            })
        })
        .collect();

    let output = RenderOutput {
        finished_at: clock.now(),
        match_count: search.match_count(),
        scroll,
        pages,
    };

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&output)?;
            println!("{json}");
        }
        OutputFormat::Markup => print_markup(&output),
    }

    Ok(())
}

fn next_due(layers: &TextLayerSet<Metrics>) -> Option<Timestamp> {
    layers
        .pages()
        .into_iter()
        .filter_map(|page_index| layers.get(page_index)?.pending_render())
        .min()
}

fn record_event(
    outcomes: &mut BTreeMap<usize, Outcome>,
    scroll: &mut Option<ScrollRequest>,
    page_index: usize,
    event: LayerEvent,
) {
    let outcome = match event {
        LayerEvent::Idle | LayerEvent::Deferred { .. } => return,
        LayerEvent::TextRejected { geometry_runs, text_runs } => {
            Outcome::TextRejected { geometry_runs, text_runs }
        }
        LayerEvent::TooManyRuns { runs, limit } => Outcome::TooManyRuns { runs, limit },
        LayerEvent::Rendered { alignment, matches } => {
            if scroll.is_none() {
                *scroll = matches.scroll;
            }
            Outcome::Rendered {
                attached: alignment.attached,
                unmeasurable: alignment.unmeasurable,
                whitespace: alignment.whitespace,
                mapped: matches.mapped,
                issues: matches.issues.iter().map(ToString::to_string).collect(),
            }
        }
    };
    outcomes.insert(page_index, outcome);
}

fn print_markup(output: &RenderOutput<'_>) {
    for page in &output.pages {
        println!("page {}: {}", page.page_index, page.phase.as_str());
        for (index, node) in page.nodes.iter().enumerate() {
            if node.is_attached() {
                println!("{index}: {}", node.to_markup());
            }
        }
    }
    if let Some(scroll) = output.scroll {
        println!(
            "scroll: page {} run {} top {}px",
            scroll.page_index, scroll.run_index, scroll.top_offset_px
        );
    }
}

fn run_map(file: &Path, args: &SearchArgs) -> Result<()> {
    let document = load_document(file)?;
    let search = build_search(&document, args)?;

    let pages = document
        .pages
        .iter()
        .map(|page| {
            let runs = page.run_store();
            let mapping = map_matches(&runs.char_lengths(), &search.page_ranges(page.page_index));
            PageMapping {
                page_index: page.page_index,
                total_chars: runs.char_lengths().iter().sum(),
                matches: mapping
                    .positions
                    .iter()
                    .map(|position| MappedMatch {
                        begin: position.begin,
                        end: position.end,
                        text: matched_text(&runs, position),
                    })
                    .collect(),
                issues: mapping.issues.iter().map(ToString::to_string).collect(),
            }
        })
        .collect();

    let output = MapOutput { match_count: search.match_count(), pages };
    let json = serde_json::to_string_pretty(&output)?;
    println!("{json}");

    Ok(())
}

/// Text of a mapped match, re-sliced from its runs
fn matched_text(runs: &RunStore, position: &MatchPosition) -> String {
    position
        .runs()
        .filter_map(|run_index| {
            let run = runs.get(run_index)?;
            let from = if run_index == position.begin.run_index { position.begin.offset } else { 0 };
            let to = (run_index == position.end.run_index).then_some(position.end.offset);
            Some(run.slice(from, to))
        })
        .collect()
}

fn build_search(document: &DocumentFixture, args: &SearchArgs) -> Result<SearchState> {
    let Some(query) = args.query.as_deref() else {
        return Ok(SearchState::inactive());
    };

    let texts: Vec<(usize, String)> =
        document.pages.iter().map(|page| (page.page_index, page.text())).collect();
    let options =
        SearchOptions { case_sensitive: args.case_sensitive, highlight_all: args.highlight_all };
    let mut search =
        SearchState::find(texts.iter().map(|(index, text)| (*index, text.as_str())), query, options);

    if let Some(n) = args.select {
        let selected = nth_match(&search, n).with_context(|| {
            format!("--select {n} is out of range ({} matches)", search.match_count())
        })?;
        search.select(Some(selected));
    }

    Ok(search)
}

fn nth_match(search: &SearchState, n: usize) -> Option<SelectedMatch> {
    search
        .page_matches
        .iter()
        .flat_map(|(&page_index, starts)| {
            (0..starts.len()).map(move |match_index| SelectedMatch { page_index, match_index })
        })
        .nth(n)
}

fn load_config(path: Option<&Path>, max_runs: Option<usize>) -> Result<TextLayerConfig> {
    let mut config = match path {
        Some(path) => TextLayerConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TextLayerConfig::default(),
    };
    if let Some(max_runs) = max_runs {
        config = config.with_max_runs(max_runs);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_metrics(font: Option<&Path>, advance: f32) -> Result<Metrics> {
    if let Some(path) = font {
        let metrics = FontFileMetrics::load(path)
            .with_context(|| format!("failed to load font {}", path.display()))?;
        return Ok(Metrics::Font(metrics));
    }

    if !advance.is_finite() || advance <= 0.0 {
        anyhow::bail!("--advance must be a positive number of em");
    }
    Ok(Metrics::Fixed(FixedAdvanceMetrics::new(advance)))
}

fn load_document(file: &Path) -> Result<DocumentFixture> {
    if !file.exists() {
        anyhow::bail!("file does not exist: {}", file.display());
    }

    let raw = fs::read_to_string(file)
        .with_context(|| format!("failed to read fixture {}", file.display()))?;
    let document: DocumentFixture = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse fixture {}", file.display()))?;

    let mut seen = BTreeSet::new();
    for page in &document.pages {
        if !seen.insert(page.page_index) {
            anyhow::bail!("page {} appears twice in {}", page.page_index, file.display());
        }
    }

    Ok(document)
}
