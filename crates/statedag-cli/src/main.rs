use futures::executor::block_on;
use serde::{Deserialize, Serialize};
use statedag::render::{
    GeometryConfig, RenderGeometry, RenderOptions, RenderedDiagram, TextMeasurer, build_geometry,
    escape_attr, escape_text, render_scenario,
};
use statedag::strata::Sugiyama;
use statedag::{ArtifactSink, DirectorySink, ExportError, ExportOptions, ExportOutcome, Exporter, Scenario};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Io(std::io::Error),
    Json(serde_json::Error),
    Scenario(statedag::Error),
    Render(statedag::render::Error),
    Export(ExportError),
    UnknownScenario(String),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
            CliError::Json(err) => write!(f, "JSON error: {err}"),
            CliError::Scenario(err) => write!(f, "{err}"),
            CliError::Render(err) => write!(f, "{err}"),
            CliError::Export(err) => write!(f, "{err}"),
            CliError::UnknownScenario(id) => write!(f, "unknown scenario: {id}"),
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<statedag::Error> for CliError {
    fn from(value: statedag::Error) -> Self {
        Self::Scenario(value)
    }
}

impl From<statedag::render::Error> for CliError {
    fn from(value: statedag::render::Error) -> Self {
        Self::Render(value)
    }
}

impl From<ExportError> for CliError {
    fn from(value: ExportError) -> Self {
        Self::Export(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Command {
    #[default]
    List,
    Layout,
    Render,
    Gallery,
}

#[derive(Debug, Clone, Copy, Default)]
enum RenderFormat {
    Svg,
    #[default]
    Png,
}

impl RenderFormat {
    fn extension(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}

impl FromStr for RenderFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    command: Command,
    pretty: bool,
    format: RenderFormat,
    scenario_ids: Vec<String>,
    out_dir: Option<PathBuf>,
    scale: Option<f32>,
    assets: Option<PathBuf>,
    scenarios: Option<PathBuf>,
    config: Option<PathBuf>,
}

/// Contents of a `--config` file. Every section is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    geometry: GeometryConfig,
    render: RenderOptions,
    export: ExportOptions,
}

#[derive(Serialize)]
struct LayoutOut<'a> {
    id: &'a str,
    title: &'a str,
    geometry: &'a RenderGeometry,
}

fn usage() -> &'static str {
    "statedag-cli\n\
\n\
USAGE:\n\
  statedag-cli list [--scenarios <file>]\n\
  statedag-cli layout [--pretty] [--scenario <id>]... [--scenarios <file>] [--config <file>]\n\
  statedag-cli render [--format svg|png] [--scenario <id>]... [--out-dir <dir>] [--scale <n>] [--assets <dir>] [--scenarios <file>] [--config <file>]\n\
  statedag-cli gallery [--scenario <id>]... [--out-dir <dir>] [--scale <n>] [--assets <dir>] [--scenarios <file>] [--config <file>]\n\
\n\
NOTES:\n\
  - Without --scenario every scenario in the catalog is processed.\n\
  - --scenarios reads a JSON or YAML scenario list instead of the built-in catalog.\n\
  - --config reads a JSON file with optional `geometry`, `render` and `export` sections.\n\
  - render writes one <scenario-id>.<ext> per scenario (default --out-dir: out).\n\
  - gallery writes index.html, styles.css and one PNG per scenario (default --out-dir: gallery).\n\
  - Set STATEDAG_LOG (e.g. STATEDAG_LOG=debug) to control log output on stderr.\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "list" => args.command = Command::List,
            "layout" => args.command = Command::Layout,
            "render" => args.command = Command::Render,
            "gallery" => args.command = Command::Gallery,
            "--pretty" => args.pretty = true,
            "--format" => {
                let Some(fmt) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.format = fmt
                    .parse::<RenderFormat>()
                    .map_err(|_| CliError::Usage(usage()))?;
            }
            "--scenario" => {
                let Some(id) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.scenario_ids.push(id.clone());
            }
            "--out-dir" => {
                let Some(dir) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.out_dir = Some(PathBuf::from(dir));
            }
            "--scale" => {
                let Some(scale) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                let scale = scale.parse::<f32>().map_err(|_| CliError::Usage(usage()))?;
                if !(scale.is_finite() && scale > 0.0) {
                    return Err(CliError::Usage(usage()));
                }
                args.scale = Some(scale);
            }
            "--assets" => {
                let Some(dir) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.assets = Some(PathBuf::from(dir));
            }
            "--scenarios" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.scenarios = Some(PathBuf::from(path));
            }
            "--config" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.config = Some(PathBuf::from(path));
            }
            _ => return Err(CliError::Usage(usage())),
        }
    }

    Ok(args)
}

fn load_config(args: &Args) -> Result<Config, CliError> {
    let mut config = match &args.config {
        Some(path) => serde_json::from_str::<Config>(&std::fs::read_to_string(path)?)?,
        None => Config::default(),
    };
    if let Some(scale) = args.scale {
        config.export.scale = scale;
    }
    if let Some(dir) = &args.assets {
        config.export.asset_dir = dir.clone();
    }
    Ok(config)
}

fn load_catalog(args: &Args) -> Result<Vec<Scenario>, CliError> {
    match &args.scenarios {
        Some(path) => Ok(statedag::load_scenarios(path)?),
        None => Ok(statedag::builtin()?.to_vec()),
    }
}

fn select(catalog: Vec<Scenario>, ids: &[String]) -> Result<Vec<Scenario>, CliError> {
    if ids.is_empty() {
        return Ok(catalog);
    }
    ids.iter()
        .map(|id| {
            catalog
                .iter()
                .find(|s| &s.id == id)
                .cloned()
                .ok_or_else(|| CliError::UnknownScenario(id.clone()))
        })
        .collect()
}

fn render_one(
    scenario: &Scenario,
    config: &Config,
    measurer: &dyn TextMeasurer,
) -> Result<RenderedDiagram, CliError> {
    Ok(render_scenario(
        scenario,
        &Sugiyama::new(),
        &config.geometry,
        measurer,
        &config.render,
    )?)
}

fn report(outcome: &ExportOutcome, sink: &DirectorySink) {
    match outcome {
        ExportOutcome::Delivered {
            filename,
            width,
            height,
            ..
        } => println!("{} ({width}x{height})", sink.dir().join(filename).display()),
        ExportOutcome::Skipped(reason) => tracing::warn!(?reason, "export skipped"),
    }
}

const GALLERY_STYLESHEET: &str = "styles.css";

/// Sections embed the bare diagram markup; the stylesheet is linked once from the head.
fn gallery_html(sections: &[(Scenario, String)], stylesheet: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Build state diagrams</title>\n");
    if let Some(href) = stylesheet {
        let _ = writeln!(out, "<link rel=\"stylesheet\" href=\"{}\">", escape_attr(href));
    }
    out.push_str("</head>\n<body>\n");
    for (scenario, svg) in sections {
        let _ = write!(
            out,
            "<section id=\"{id}\">\n<h2>{title}</h2>\n<p>{description}</p>\n{svg}\n\
<p><a href=\"{png}\" download>Download PNG</a></p>\n</section>\n",
            id = escape_attr(&scenario.id),
            title = escape_text(&scenario.title),
            description = escape_text(&scenario.description),
            png = escape_attr(&scenario.artifact_name("png")),
        );
    }
    out.push_str("</body>\n</html>\n");
    out
}

fn run(args: Args) -> Result<(), CliError> {
    let catalog = load_catalog(&args)?;

    if args.command == Command::List {
        for scenario in &catalog {
            println!("{}\t{}", scenario.id, scenario.title);
        }
        return Ok(());
    }

    let config = load_config(&args)?;
    let scenarios = select(catalog, &args.scenario_ids)?;

    match args.command {
        Command::List => Ok(()),
        Command::Layout => {
            let layout = Sugiyama::new();
            let mut geometries = Vec::with_capacity(scenarios.len());
            for scenario in &scenarios {
                let (_, geometry) = build_geometry(scenario, &layout, &config.geometry)?;
                geometries.push(geometry);
            }
            let out: Vec<LayoutOut<'_>> = scenarios
                .iter()
                .zip(&geometries)
                .map(|(s, geometry)| LayoutOut {
                    id: &s.id,
                    title: &s.title,
                    geometry,
                })
                .collect();
            let json = if args.pretty {
                serde_json::to_string_pretty(&out)?
            } else {
                serde_json::to_string(&out)?
            };
            println!("{json}");
            Ok(())
        }
        Command::Render => {
            let exporter = Exporter::new(config.export.clone())?;
            let measurer = block_on(exporter.text_measurer());
            let sink = DirectorySink::new(args.out_dir.unwrap_or_else(|| PathBuf::from("out")));
            for scenario in &scenarios {
                let rendered = render_one(scenario, &config, &measurer)?;
                let filename = scenario.artifact_name(args.format.extension());
                let outcome = match args.format {
                    RenderFormat::Svg => {
                        block_on(exporter.export_svg(Some(&rendered.document), &filename, &sink))?
                    }
                    RenderFormat::Png => {
                        block_on(exporter.export_png(Some(&rendered.document), &filename, &sink))?
                    }
                };
                report(&outcome, &sink);
            }
            Ok(())
        }
        Command::Gallery => {
            let exporter = Exporter::new(config.export.clone())?;
            let measurer = block_on(exporter.text_measurer());
            let out_dir = args.out_dir.unwrap_or_else(|| PathBuf::from("gallery"));
            let sink = DirectorySink::new(&out_dir);
            let mut sections = Vec::with_capacity(scenarios.len());
            for scenario in scenarios {
                let rendered = render_one(&scenario, &config, &measurer)?;
                let outcome = block_on(exporter.export_png(
                    Some(&rendered.document),
                    &scenario.artifact_name("png"),
                    &sink,
                ))?;
                report(&outcome, &sink);
                sections.push((scenario, rendered.document.to_xml()));
            }
            let css = block_on(exporter.stylesheet());
            let stylesheet = if css.is_empty() {
                tracing::warn!("gallery has no stylesheet to link");
                None
            } else {
                sink.deliver(GALLERY_STYLESHEET, css.as_bytes())?;
                Some(GALLERY_STYLESHEET)
            };
            std::fs::create_dir_all(&out_dir)?;
            let index = out_dir.join("index.html");
            std::fs::write(&index, gallery_html(&sections, stylesheet))?;
            println!("{}", index.display());
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("STATEDAG_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() {
    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(v) => v,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    init_logging();

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
