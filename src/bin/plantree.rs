//! Command-line renderer for serialized plans.
#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use plantree::auto_explain::{AutoExplain, AutoExplainConfig, LogLevel, LogSink};
use plantree::catalog::InMemoryCatalog;
use plantree::executor::{
    ActiveQuery, ExecFlags, ExecutorHooks, QueryDesc, RecordedRun, ReplayExecutor,
};
use plantree::explain::{explain_query, ExplainEnv, ExplainRegistry};
use plantree::logging::init_logging;
use plantree::nodes::plannodes::{PlannedStmt, ScanDirection};
use plantree::params::ParamListInfo;
use plantree::{overexplain, ExplainFormat, PlanError, Result};

/// A plan with everything needed to render it.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanBundle {
    statement: PlannedStmt,
    #[serde(default)]
    catalog: InMemoryCatalog,
    #[serde(default)]
    query_text: Option<String>,
    #[serde(default)]
    params: Option<ParamListInfo>,
    #[serde(default)]
    run: Option<RecordedRun>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum FormatArg {
    Text,
    Xml,
    Json,
    Yaml,
}

impl From<FormatArg> for ExplainFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Text => ExplainFormat::Text,
            FormatArg::Xml => ExplainFormat::Xml,
            FormatArg::Json => ExplainFormat::Json,
            FormatArg::Yaml => ExplainFormat::Yaml,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "plantree",
    version,
    about = "Render serialized query plans as EXPLAIN output"
)]
struct Cli {
    #[arg(value_name = "BUNDLE", help = "JSON plan bundle to render")]
    bundle: PathBuf,

    #[arg(
        long,
        value_enum,
        env = "PLANTREE_FORMAT",
        default_value_t = FormatArg::Text,
        help = "Output format"
    )]
    format: FormatArg,

    #[arg(long, help = "Include the recorded run counters")]
    analyze: bool,

    #[arg(long, help = "Show output columns and qualified names")]
    verbose: bool,

    #[arg(long, help = "Hide estimated costs")]
    no_costs: bool,

    #[arg(long, help = "Show buffer usage (with --analyze)")]
    buffers: bool,

    #[arg(long, help = "Show WAL usage (with --analyze)")]
    wal: bool,

    #[arg(long, help = "Hide per-node timing (with --analyze)")]
    no_timing: bool,

    #[arg(long, help = "Print planning and execution totals")]
    summary: bool,

    #[arg(long, help = "Show modified planner settings")]
    settings: bool,

    #[arg(long, help = "Show planner bookkeeping for each node")]
    debug: bool,

    #[arg(long, help = "Show the range table")]
    range_table: bool,

    #[arg(
        long,
        help = "Replay the run through auto_explain and print what it logs"
    )]
    auto_explain: bool,

    #[arg(
        long,
        value_name = "FILE",
        env = "PLANTREE_CONFIG",
        help = "TOML file with an [auto_explain] table"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIRECTIVE",
        env = "PLANTREE_LOG",
        default_value = "warn",
        help = "Tracing filter for diagnostics on stderr"
    )]
    log_level: String,
}

impl Cli {
    fn explain_options(&self) -> Vec<String> {
        let format: ExplainFormat = self.format.into();
        let mut options = vec![format!("format {format}")];
        let flags = [
            (self.analyze, "analyze"),
            (self.verbose, "verbose"),
            (self.no_costs, "costs off"),
            (self.buffers, "buffers"),
            (self.wal, "wal"),
            (self.no_timing, "timing off"),
            (self.summary, "summary"),
            (self.settings, "settings"),
            (self.debug, "debug"),
            (self.range_table, "range_table"),
        ];
        options.extend(
            flags
                .into_iter()
                .filter(|(set, _)| *set)
                .map(|(_, name)| name.to_string()),
        );
        options
    }
}

/// Prints each logged plan on stdout.
#[derive(Default)]
struct StdoutSink {
    emitted: Mutex<usize>,
}

impl LogSink for StdoutSink {
    fn emit(&self, level: LogLevel, message: &str) {
        *self.emitted.lock() += 1;
        println!("{}: {message}", level.as_str().to_uppercase());
    }
}

fn load_bundle(path: &Path) -> Result<PlanBundle> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn render(cli: &Cli, bundle: PlanBundle) -> Result<Vec<String>> {
    let PlanBundle {
        statement,
        catalog,
        query_text,
        params,
        run,
    } = bundle;
    let env = ExplainEnv::new(
        Arc::new(catalog),
        Arc::new(ReplayExecutor::new(run.unwrap_or_default())),
    );
    let text = query_text.unwrap_or_else(|| "<serialized plan>".to_string());
    let command = format!("EXPLAIN ({}) {text}", cli.explain_options().join(", "));
    debug!(%command, "rendering");
    let planner = move |_: &str, _: Option<&ParamListInfo>| -> Result<Vec<PlannedStmt>> {
        Ok(vec![statement.clone()])
    };
    explain_query(&env, &planner, &command, params.as_ref())
}

fn replay_through_auto_explain(cli: &Cli, bundle: PlanBundle) -> Result<usize> {
    let mut config = AutoExplainConfig::load(cli.config.as_deref())?;
    config.log_format = cli.format.into();
    let sink = Arc::new(StdoutSink::default());
    let module = Arc::new(AutoExplain::new(config).with_sink(sink.clone()));
    let hooks = ExecutorHooks::new();
    let previous = module.install(&hooks);

    let mut qd = QueryDesc::new(
        Arc::new(bundle.statement),
        bundle.query_text.as_deref().unwrap_or_default(),
        bundle.params,
        Arc::new(bundle.catalog),
        Arc::new(ReplayExecutor::new(bundle.run.unwrap_or_default())),
    );
    let result = (|| {
        let mut active = ActiveQuery::new(&hooks, &mut qd);
        if !active.start(ExecFlags::NONE)? {
            return Err(PlanError::internal("plan was invalidated at start"));
        }
        active.run(ScanDirection::Forward, 0)?;
        active.finish()?;
        active.end()
    })();
    AutoExplain::uninstall(&hooks, previous);
    result?;
    let emitted = *sink.emitted.lock();
    Ok(emitted)
}

fn run(cli: Cli) -> Result<()> {
    overexplain::install(ExplainRegistry::global());
    let bundle = load_bundle(&cli.bundle)?;
    if cli.auto_explain {
        let emitted = replay_through_auto_explain(&cli, bundle)?;
        if emitted == 0 {
            eprintln!("auto_explain logged nothing; check log_min_duration and sample_rate");
        }
        return Ok(());
    }
    for line in render(&cli, bundle)? {
        println!("{line}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli.log_level) {
        eprintln!("error: {err}");
        return ExitCode::FAILURE;
    }
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
