//! mathsvg CLI - LaTeX math to sized SVG

use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use mathsvg::fonts::FetchResolver;
use mathsvg::{
    ConvertJob, ConvertOptions, EngineConfig, FontResolver, MathFont, MathSvg, ToolServer, Unit,
};

#[derive(Parser)]
#[command(name = "mathsvg")]
#[command(version)]
#[command(about = "Convert LaTeX math to standalone, sized SVG", long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Where node, MathJax and the font cache live.
#[derive(Args)]
struct EngineArgs {
    /// Node.js executable
    #[arg(long, global = true, env = "MATHSVG_NODE", value_name = "PATH")]
    node: Option<PathBuf>,

    /// Directory whose node_modules holds mathjax-full
    #[arg(long, global = true, env = "MATHSVG_MATHJAX_DIR", value_name = "DIR")]
    mathjax_dir: Option<PathBuf>,

    /// Font cache directory
    #[arg(long, global = true, env = "MATHSVG_FONT_CACHE", value_name = "DIR")]
    font_cache: Option<PathBuf>,

    /// npm registry for font packages
    #[arg(long, global = true, env = "MATHSVG_REGISTRY", value_name = "URL")]
    registry: Option<String>,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::new();
        if let Some(node) = &self.node {
            config = config.with_node(node);
        }
        if let Some(dir) = &self.mathjax_dir {
            config = config.with_mathjax_dir(dir);
        }
        if let Some(dir) = &self.font_cache {
            config = config.with_cache_dir(dir);
        }
        if let Some(registry) = &self.registry {
            config = config.with_registry(registry);
        }
        config
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one expression
    Svg {
        /// LaTeX math, without delimiters
        #[arg(value_name = "LATEX")]
        latex: String,

        #[command(flatten)]
        layout: LayoutArgs,

        /// Output file (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Print {svg, width, height, depth} as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a JSON array of {math, unit, ...} jobs
    Batch {
        /// JSON file with the jobs
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Directory for the numbered SVG files
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output: PathBuf,
    },

    /// Manage math fonts
    Fonts {
        #[command(subcommand)]
        command: FontCommands,
    },

    /// Run the JSON-RPC tool server on stdin/stdout
    Serve,

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum FontCommands {
    /// List fonts and whether they are available offline
    List,

    /// Download a font into the cache
    Fetch {
        /// Font name (e.g. stix2, fira)
        #[arg(value_parser = parse_font)]
        font: MathFont,
    },
}

#[derive(Args)]
struct LayoutArgs {
    /// Output unit
    #[arg(short, long, value_enum, default_value = "pt")]
    unit: UnitArg,

    /// Inline instead of display layout
    #[arg(long)]
    inline: bool,

    /// Font size (em), in the output unit
    #[arg(long, default_value_t = mathsvg::options::DEFAULT_FONT_SIZE)]
    font_size: f64,

    /// Ratio of x-height to font size
    #[arg(long, default_value_t = mathsvg::options::DEFAULT_X_HEIGHT_RATIO)]
    x_height_ratio: f64,

    /// Container width for line breaking
    #[arg(long, default_value_t = mathsvg::options::DEFAULT_CONTAINER_WIDTH)]
    container_width: f64,

    /// Math font
    #[arg(long, value_parser = parse_font, default_value = "tex")]
    font: MathFont,
}

impl LayoutArgs {
    fn options(&self) -> ConvertOptions {
        ConvertOptions::new(self.unit.into())
            .with_display(!self.inline)
            .with_font_size(self.font_size)
            .with_x_height_ratio(self.x_height_ratio)
            .with_container_width(self.container_width)
            .with_font(self.font)
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum UnitArg {
    /// Points (print, InDesign)
    Pt,
    /// Pixels (web)
    Px,
    /// Millimeters (metric print)
    Mm,
    /// Keep relative ex units
    Ex,
}

impl From<UnitArg> for Unit {
    fn from(unit: UnitArg) -> Self {
        match unit {
            UnitArg::Pt => Unit::Pt,
            UnitArg::Px => Unit::Px,
            UnitArg::Mm => Unit::Mm,
            UnitArg::Ex => Unit::Ex,
        }
    }
}

fn parse_font(name: &str) -> Result<MathFont, String> {
    name.parse().map_err(|e: mathsvg::Error| e.to_string())
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let config = cli.engine.config();

    let result = match cli.command {
        Commands::Svg {
            latex,
            layout,
            output,
            json,
        } => cmd_svg(&config, &latex, &layout, output.as_deref(), json),
        Commands::Batch { input, output } => cmd_batch(&config, &input, &output),
        Commands::Fonts { command } => match command {
            FontCommands::List => cmd_fonts_list(&config),
            FontCommands::Fetch { font } => cmd_fonts_fetch(&config, font),
        },
        Commands::Serve => cmd_serve(&config),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

fn cmd_svg(
    config: &EngineConfig,
    latex: &str,
    layout: &LayoutArgs,
    output: Option<&Path>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = MathSvg::new(config)?;
    let options = layout.options();

    if let Some(path) = output {
        let saved = engine.convert_to_file(latex, path, &options)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&saved)?);
        } else {
            println!("{} {}", "Saved to".green(), saved.path.display());
            print_metrics(&saved.width, &saved.height, &saved.depth);
        }
        return Ok(());
    }

    let result = engine.convert(latex, &options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.svg);
    }
    Ok(())
}

fn print_metrics(width: &str, height: &str, depth: &str) {
    println!("  {} width  {}", "├─".dimmed(), width);
    println!("  {} height {}", "├─".dimmed(), height);
    println!("  {} depth  {}", "└─".dimmed(), depth);
}

fn cmd_batch(
    config: &EngineConfig,
    input: &Path,
    output_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = fs::read_to_string(input)?;
    let jobs: Vec<ConvertJob> = serde_json::from_str(&text)?;
    fs::create_dir_all(output_dir)?;

    let engine = MathSvg::new(config)?;
    let pb = spinner(&format!("Converting {} expressions...", jobs.len()));
    let results = engine.convert_batch(&jobs);
    pb.finish_and_clear();

    let mut failed = 0;
    for (index, (job, result)) in jobs.iter().zip(results).enumerate() {
        match result {
            Ok(result) => {
                let path = output_dir.join(format!("{:04}.svg", index + 1));
                fs::write(&path, &result.svg)?;
                println!(
                    "{} {} ({} x {})",
                    "Saved".green(),
                    path.display(),
                    result.width,
                    result.height
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} #{} {}: {}", "Failed".red(), index + 1, job.math, e);
            }
        }
    }

    println!(
        "\n{} {} converted, {} failed",
        "Done!".green().bold(),
        jobs.len() - failed,
        failed
    );
    if failed > 0 {
        return Err(format!("{} expressions failed", failed).into());
    }
    Ok(())
}

fn cmd_fonts_list(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = FetchResolver::from_config(config)?;

    println!("{}", "Math Fonts".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for font in MathFont::ALL {
        let status = if font.is_bundled() {
            "bundled".green()
        } else if resolver.is_materialized(font) {
            "cached".green()
        } else {
            "not downloaded".dimmed()
        };
        println!("{:<10} {}", font.name().bold(), status);
    }
    println!();
    println!("{}: {}", "Cache".bold(), resolver.cache_dir().display());
    Ok(())
}

fn cmd_fonts_fetch(config: &EngineConfig, font: MathFont) -> Result<(), Box<dyn std::error::Error>> {
    let resolver = FetchResolver::from_config(config)?;
    if font.is_bundled() {
        println!("{} is bundled with MathJax", font.name().bold());
        return Ok(());
    }

    let pb = spinner(&format!("Fetching {}...", font));
    let outcome = resolver.resolve(font);
    pb.finish_and_clear();

    let assets = outcome?;
    println!("{} {}", "Ready".green().bold(), font);
    if let mathsvg::FontSource::Module(path) = assets.source {
        println!("  {} {}", "└─".dimmed(), path.display());
    }
    Ok(())
}

fn cmd_serve(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine = MathSvg::new(config)?;
    let server = ToolServer::new(engine);
    let stdin = io::stdin();
    server.serve(BufReader::new(stdin.lock()), io::stdout().lock())?;
    Ok(())
}

fn cmd_version() {
    println!("{} {}", "mathsvg".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("LaTeX math to sized SVG");
    println!();
    println!("Library: {}", mathsvg::VERSION.dimmed());
    println!("License: MIT");
}
