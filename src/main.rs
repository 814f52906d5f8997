use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use shotnote::annotation::TEMPLATES;
use shotnote::export::{export_filename_for_url, DirectorySink};
use shotnote::{
    Annotation, AnnotationSurface, ExportOutcome, ImageSource, LoadOutcome, SurfaceConfig, Viewport,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "shotnote",
    version,
    about = "Annotate screenshots with typed callouts and export PNGs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Composite annotations onto a screenshot and export the PNG
    Render(RenderArgs),
    /// Ask the model for issues in a screenshot and export the annotated PNG
    #[cfg(feature = "remote")]
    Analyze(AnalyzeArgs),
    /// Fetch a page and produce a structured UX critique
    #[cfg(feature = "remote")]
    Critique(CritiqueArgs),
    /// List the quick-fix annotation templates
    Templates,
}

#[derive(Args, Debug)]
struct SurfaceArgs {
    /// Screenshot path, http(s) URL or data URL
    #[arg(long)]
    image: String,
    #[arg(long, default_value_t = 800)]
    width: u32,
    #[arg(long, default_value_t = 600)]
    height: u32,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Directory the PNG is written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
    /// Output file name (sanitized)
    #[arg(long)]
    name: Option<String>,
    /// Derive the file name from the page URL the screenshot shows
    #[arg(long, conflicts_with = "name")]
    page_url: Option<String>,
}

impl OutputArgs {
    fn filename(&self) -> String {
        match (&self.name, &self.page_url) {
            (Some(name), _) => name.clone(),
            (None, Some(url)) => export_filename_for_url(url),
            (None, None) => "annotated.png".to_string(),
        }
    }
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[command(flatten)]
    surface: SurfaceArgs,
    /// JSON file with an array of annotations
    #[arg(long)]
    annotations: PathBuf,
    #[command(flatten)]
    output: OutputArgs,
}

#[cfg(feature = "remote")]
#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[command(flatten)]
    surface: SurfaceArgs,
    /// Also write the generated annotations as JSON
    #[arg(long)]
    json: Option<PathBuf>,
    #[command(flatten)]
    output: OutputArgs,
}

#[cfg(feature = "remote")]
#[derive(Args, Debug)]
struct CritiqueArgs {
    #[arg(long)]
    url: String,
    /// Write the report JSON here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
    /// Keep the result in this directory under the analyzedUrl/analysisResult keys
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

fn open_surface(args: &SurfaceArgs) -> Result<AnnotationSurface> {
    let mut surface = AnnotationSurface::new(SurfaceConfig {
        viewport: Viewport {
            width: args.width,
            height: args.height,
        },
        ..Default::default()
    });
    match surface.load(&ImageSource::parse(&args.image)) {
        LoadOutcome::Applied => Ok(surface),
        LoadOutcome::Failed(msg) => bail!("{}", msg),
        LoadOutcome::Stale => bail!("image load was superseded"),
    }
}

fn export(surface: &AnnotationSurface, output: &OutputArgs) -> Result<()> {
    let sink = DirectorySink::new(&output.out_dir);
    match surface.exporter().export_to(&sink, &output.filename())? {
        ExportOutcome::Delivered { location, .. } => println!("{}", location),
        ExportOutcome::Skipped => bail!("another export was in progress"),
    }
    Ok(())
}

fn run_render(args: RenderArgs) -> Result<()> {
    let raw = std::fs::read_to_string(&args.annotations)
        .with_context(|| format!("reading {}", args.annotations.display()))?;
    let annotations: Vec<Annotation> =
        serde_json::from_str(&raw).context("annotations file must be a JSON array of annotations")?;
    let mut surface = open_surface(&args.surface)?;
    surface.insert_annotations(annotations)?;
    export(&surface, &args.output)
}

#[cfg(feature = "remote")]
fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    use shotnote::analysis::ScreenshotAnalyzer;
    use shotnote::critique::GeminiClient;
    use shotnote::CritiqueConfig;

    let mut surface = open_surface(&args.surface)?;
    let (w, h) = surface.size();
    let shot = surface.snapshot()?;
    let client = GeminiClient::new(&CritiqueConfig::from_env())?;
    let annotations = ScreenshotAnalyzer::new(client).analyze_png(&shot.png_data, w, h)?;
    if let Some(path) = &args.json {
        std::fs::write(path, serde_json::to_string_pretty(&annotations)?)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    surface.insert_annotations(annotations)?;
    export(&surface, &args.output)
}

#[cfg(feature = "remote")]
fn run_critique(args: CritiqueArgs) -> Result<()> {
    use shotnote::critique::{Critic, GeminiClient};
    use shotnote::storage::{save_critique, FileStore};
    use shotnote::CritiqueConfig;

    let config = CritiqueConfig::from_env();
    let critic = Critic::new(GeminiClient::new(&config)?, config);
    let report = critic
        .critique_url(&args.url)
        .with_context(|| format!("critiquing {}", args.url))?;
    if let Some(dir) = &args.store_dir {
        save_critique(&FileStore::new(dir)?, &args.url, &report)?;
    }
    let json = serde_json::to_string_pretty(&report)?;
    match &args.out {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => run_render(args),
        #[cfg(feature = "remote")]
        Commands::Analyze(args) => run_analyze(args),
        #[cfg(feature = "remote")]
        Commands::Critique(args) => run_critique(args),
        Commands::Templates => {
            for t in TEMPLATES.iter() {
                println!("{:<18} {:<10} {}", t.id, t.kind, t.text);
            }
            Ok(())
        }
    }
}
