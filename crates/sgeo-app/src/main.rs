//! SGEO 命令行程序
//!
//! - `replay`：回放构造脚本并列出节点
//! - `eval`：对计算表达式求值
//! - `convert`：在文本、JSON、原生格式之间转换脚本

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sgeo_core::config::Settings;
use sgeo_core::construction::Construction;
use sgeo_core::expression;
use sgeo_core::geometry::Geometry;
use sgeo_core::node::Node;
use sgeo_file::{ConstructionScript, ScriptFormat};

/// 球面作图构造脚本工具
#[derive(Parser)]
#[command(name = "sgeo")]
#[command(version)]
#[command(about = "Replay, inspect and convert spherical construction scripts")]
struct Cli {
    /// 日志详细程度（-v, -vv, -vvv）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON 配置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a script and list the resulting nodes
    Replay {
        script: PathBuf,

        /// Undo this many commands after replaying
        #[arg(long, default_value_t = 0)]
        undo: usize,

        /// Print nodes as JSON
        #[arg(long)]
        json: bool,

        /// Write the replayed undo stack back out
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Evaluate a calculation expression
    Eval {
        expression: String,

        /// Variable binding, e.g. --var M1=0.5
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },
    /// Convert a script between text, JSON and native containers
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Output container (text, json, native); defaults to the output extension
        #[arg(short, long)]
        format: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .finish(),
    )?;

    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Commands::Replay {
            script,
            undo,
            json,
            output,
        } => replay(&script, settings, undo, json, output.as_deref()),
        Commands::Eval { expression, vars } => eval(&expression, &vars),
        Commands::Convert {
            input,
            output,
            format,
        } => convert(&input, &output, format.as_deref()),
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let settings = Settings::from_json(&text)
        .with_context(|| format!("invalid config {}", path.display()))?;
    info!("Loaded settings from {}", path.display());
    Ok(settings)
}

fn replay(
    path: &Path,
    settings: Settings,
    undo: usize,
    json: bool,
    output: Option<&Path>,
) -> Result<()> {
    let script = sgeo_file::load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let mut construction = script
        .replay(settings)
        .with_context(|| format!("failed to replay {}", path.display()))?;
    info!("Replayed {} commands", script.commands.len());

    for _ in 0..undo {
        if !construction.undo()? {
            break;
        }
    }

    if json {
        let nodes: Vec<serde_json::Value> =
            construction.graph().iter().map(node_json).collect();
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        print_nodes(&construction);
    }

    if let Some(output) = output {
        let mut saved = ConstructionScript::from_construction(&construction);
        saved.metadata.title = script.metadata.title.clone();
        sgeo_file::save(&saved, output, ScriptFormat::from_path(output))?;
    }
    Ok(())
}

fn print_nodes(construction: &Construction) {
    for node in construction.graph().iter() {
        let mut flags = String::new();
        if !node.exists {
            flags.push_str(" (undefined)");
        }
        if !node.showing {
            flags.push_str(" (hidden)");
        }
        println!(
            "{:<6} {:<18} {}{}",
            node.name,
            node.kind.type_name(),
            describe(&node.geometry),
            flags
        );
    }
}

fn describe(geometry: &Geometry) -> String {
    match geometry {
        Geometry::Point(p) => format!("({:.6}, {:.6}, {:.6})", p.x, p.y, p.z),
        Geometry::Line { normal } => {
            format!("pole ({:.6}, {:.6}, {:.6})", normal.x, normal.y, normal.z)
        }
        Geometry::Value(Some(value)) => format!("{value:.6}"),
        Geometry::Value(None) => "undefined".to_string(),
        Geometry::Text(text) => format!("\"{text}\""),
        other => other.type_name().to_string(),
    }
}

fn node_json(node: &Node) -> serde_json::Value {
    serde_json::json!({
        "name": node.name,
        "kind": node.kind.type_name(),
        "exists": node.exists,
        "showing": node.showing,
        "position": node.position().map(|p| [p.x, p.y, p.z]),
        "value": node.value(),
    })
}

fn eval(source: &str, vars: &[String]) -> Result<()> {
    let mut variables = HashMap::new();
    for binding in vars {
        let (name, value) = binding
            .split_once('=')
            .ok_or_else(|| anyhow!("expected NAME=VALUE, got {binding}"))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("bad value for {name}"))?;
        variables.insert(name.trim().to_string(), value);
    }

    let expr = expression::parse(source)?;
    match expr.evaluate(&variables)? {
        Some(value) => println!("{value}"),
        None => println!("undefined"),
    }
    Ok(())
}

fn convert(input: &Path, output: &Path, format: Option<&str>) -> Result<()> {
    let format = match format {
        Some(name) => match ScriptFormat::from_name(name) {
            Some(format) => format,
            None => bail!("unknown format {name}"),
        },
        None => ScriptFormat::from_path(output),
    };
    let script = sgeo_file::load(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    sgeo_file::save(&script, output, format)?;
    Ok(())
}
