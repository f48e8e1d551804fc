use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::{Context, IntoDiagnostic};

use lnprune_dependency::{
    BuildOptions, Classifier, DiagnosticLevel, NodeType, PrintOptions, build_from_graph,
    format_dependency_map, format_entry,
};
use lnprune_ir::Exporter;
use lnprune_model::ModuleTree;
use lnprune_onnx::{CommandExporter, OnnxFile};

/// lnprune: channel-dependency maps for pruning convolutional networks
#[derive(Parser)]
#[command(name = "lnprune", version, about)]
struct Cli {
    /// Pre-exported ONNX model
    #[arg(required_unless_present = "exporter")]
    input: Option<PathBuf>,

    /// Input tensor shape used for the export, e.g. 1,3,416,416
    #[arg(long, default_value = "1,3,416,416", value_parser = parse_shape)]
    input_shape: InputShape,

    /// Program that exports the model to ONNX ({output} and {shape} are substituted)
    #[arg(long, conflicts_with = "input")]
    exporter: Option<String>,

    /// Argument passed to the exporter program (repeatable)
    #[arg(long = "exporter-arg", allow_hyphen_values = true, requires = "exporter")]
    exporter_args: Vec<String>,

    /// Override an operator's classification, e.g. MaxPool=ignore (repeatable)
    #[arg(long = "classify", value_parser = parse_override)]
    overrides: Vec<(String, NodeType)>,

    /// Indent width per depth level
    #[arg(long, default_value_t = 1)]
    indent: usize,

    /// Draw tree connectors
    #[arg(long)]
    tree: bool,

    /// Print only the entry for this weight
    #[arg(long)]
    only: Option<String>,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Dump the exported graph to stderr
    #[arg(long)]
    emit_graph: bool,
}

#[derive(Clone, Debug)]
struct InputShape(Vec<usize>);

fn parse_shape(s: &str) -> Result<InputShape, String> {
    let dims = s
        .split(',')
        .map(|d| {
            d.trim()
                .parse::<usize>()
                .map_err(|_| format!("invalid dimension '{d}' in input shape '{s}'"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if dims.is_empty() || dims.contains(&0) {
        return Err(format!("input shape '{s}' must list positive dimensions"));
    }
    Ok(InputShape(dims))
}

fn parse_override(s: &str) -> Result<(String, NodeType), String> {
    let (op, ty) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid override '{s}', expected OP=TYPE"))?;
    let ty = ty.parse::<NodeType>().map_err(|e| e.to_string())?;
    Ok((op.trim().to_string(), ty))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    let shape = &cli.input_shape.0;

    // 1. Export (or load) the graph.
    let exporter: Box<dyn Exporter> = match (&cli.exporter, &cli.input) {
        (Some(program), _) => Box::new(CommandExporter::new(program).args(cli.exporter_args.iter())),
        (None, Some(path)) => Box::new(OnnxFile::new(path)),
        (None, None) => return Err(miette::miette!("no ONNX model or --exporter given")),
    };
    let graph = exporter
        .export_graph(shape)
        .into_diagnostic()
        .wrap_err("graph export failed")?;

    if cli.emit_graph {
        eprintln!("{}", lnprune_ir::dump_graph(&graph));
    }

    // 2. Recover the module tree from the named parameters.
    let model = ModuleTree::from_graph(&graph);
    log::info!("module tree: {} modules", model.len());

    // 3. Build.
    let classifier = cli
        .overrides
        .iter()
        .fold(Classifier::new(), |c, (op, ty)| c.with_override(op.clone(), *ty));
    let options = BuildOptions::default().with_classifier(classifier);
    let map = build_from_graph(&model, &graph, &options)
        .into_diagnostic()
        .wrap_err("dependency map build failed")?;

    // 4. Print diagnostics.
    for diag in map.diagnostics() {
        if diag.level >= DiagnosticLevel::Info {
            eprintln!("{diag}");
        }
    }

    // 5. Render.
    let print = PrintOptions {
        separator: " ".repeat(cli.indent),
        tree: cli.tree,
    };
    let text = match &cli.only {
        Some(name) => format_entry(&map, name, &print).ok_or_else(|| {
            let available: Vec<_> = map.names().collect();
            miette::miette!(
                "no entry for '{}' (available: {})",
                name,
                available.join(", ")
            )
        })?,
        None => format_dependency_map(&map, &print),
    };

    match &cli.output {
        Some(path) => std::fs::write(path, text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to write {}", path.display()))?,
        None => print!("{text}"),
    }

    Ok(())
}
