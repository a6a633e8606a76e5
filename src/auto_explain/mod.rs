//! Logs the plans of slow statements.
//!
//! [`AutoExplain::install`] chains the module onto the four executor hooks.
//! At start it decides whether the top-level statement takes part (a
//! Bernoulli draw against `sample_rate`) and, if it does, asks the executor
//! for the counters `log_analyze` needs. At end it compares the statement's
//! total run time against `log_min_duration` and hands the rendered plan to
//! a [`LogSink`].
//!
//! Statements started while another one runs are nested; they inherit the
//! top-level decision and are only considered with
//! `log_nested_statements`.

mod config;

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, trace, warn};

pub use config::{
    default_config_path, parse_bool, parse_duration_ms, parse_size_bytes, AutoExplainConfig,
    LogLevel, SETTING_NAMES, SETTING_PREFIX,
};

use crate::error::Result;
use crate::executor::{
    standard_executor_end, standard_executor_finish, standard_executor_run,
    standard_executor_start, ExecFlags, ExecutorEndHook, ExecutorFinishHook, ExecutorHooks,
    ExecutorRunHook, ExecutorStartHook, QueryDesc, SavedExecutorHooks,
};
use crate::explain::{
    explain_print_jit_summary, explain_print_plan, explain_print_triggers,
    explain_query_parameters, explain_query_text, ExplainFormat, ExplainRegistry, ExplainState,
};
use crate::instrument::{InstrumentOption, Instrumentation};
use crate::memctx::switch_to;
use crate::nodes::plannodes::ScanDirection;

/// Destination of logged plans.
pub trait LogSink: Send + Sync {
    /// Emits one message at `level`.
    fn emit(&self, level: LogLevel, message: &str);
}

/// Sends plans to `tracing` under the `auto_explain` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn emit(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug5 | LogLevel::Debug4 | LogLevel::Debug3 | LogLevel::Debug2 => {
                trace!(target: "auto_explain", "{message}")
            }
            LogLevel::Debug1 | LogLevel::Debug => debug!(target: "auto_explain", "{message}"),
            LogLevel::Info | LogLevel::Notice | LogLevel::Log => {
                info!(target: "auto_explain", "{message}")
            }
            LogLevel::Warning => warn!(target: "auto_explain", "{message}"),
        }
    }
}

/// Keeps the nesting depth raised while alive.
struct NestingGuard<'a> {
    depth: &'a AtomicI32,
}

impl<'a> NestingGuard<'a> {
    fn enter(depth: &'a AtomicI32) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        NestingGuard { depth }
    }
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The module's per-process state.
pub struct AutoExplain {
    config: RwLock<AutoExplainConfig>,
    nesting: AtomicI32,
    sampled: AtomicBool,
    rng: Mutex<ChaCha8Rng>,
    sink: Arc<dyn LogSink>,
    registry: Arc<ExplainRegistry>,
}

impl std::fmt::Debug for AutoExplain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoExplain")
            .field("config", &*self.config.read())
            .field("nesting", &self.nesting.load(Ordering::SeqCst))
            .field("sampled", &self.sampled.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl AutoExplain {
    /// A module logging through [`TracingSink`], sampling from an
    /// entropy-seeded generator.
    pub fn new(config: AutoExplainConfig) -> Self {
        AutoExplain {
            config: RwLock::new(config),
            nesting: AtomicI32::new(0),
            sampled: AtomicBool::new(false),
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
            sink: Arc::new(TracingSink),
            registry: Arc::clone(ExplainRegistry::global()),
        }
    }

    /// Logs through `sink` instead.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Samples from a generator seeded with `seed`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(ChaCha8Rng::seed_from_u64(seed));
        self
    }

    /// Renders with extension options and hooks from `registry`.
    pub fn with_registry(mut self, registry: Arc<ExplainRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Copy of the current settings.
    pub fn config(&self) -> AutoExplainConfig {
        self.config.read().clone()
    }

    /// Assigns one `auto_explain.*` setting. Nothing changes on error.
    pub fn set(&self, name: &str, value: &str, privileged: bool) -> Result<()> {
        let mut config = self.config.write();
        let mut updated = config.clone();
        updated.set(name, value, privileged)?;
        *config = updated;
        debug!(name, value, "auto_explain setting changed");
        Ok(())
    }

    /// Current value of one `auto_explain.*` setting.
    pub fn show(&self, name: &str) -> Result<String> {
        self.config.read().show(name)
    }

    /// Depth of statements currently running; zero between statements.
    pub fn nesting_level(&self) -> i32 {
        self.nesting.load(Ordering::SeqCst)
    }

    /// Chains the module onto `hooks` and returns the hooks it displaced.
    /// Passing them to [`AutoExplain::uninstall`] puts the chain back as it
    /// was, provided nothing was installed on top in between.
    pub fn install(self: &Arc<Self>, hooks: &ExecutorHooks) -> SavedExecutorHooks {
        let previous = hooks.snapshot();

        let this = Arc::clone(self);
        let prev = previous.start.clone();
        let start: ExecutorStartHook = Arc::new(move |qd: &mut QueryDesc, eflags: ExecFlags| {
            this.on_start(prev.as_ref(), qd, eflags)
        });

        let this = Arc::clone(self);
        let prev = previous.run.clone();
        let run: ExecutorRunHook = Arc::new(
            move |qd: &mut QueryDesc, direction: ScanDirection, count: u64| {
                this.on_run(prev.as_ref(), qd, direction, count)
            },
        );

        let this = Arc::clone(self);
        let prev = previous.finish.clone();
        let finish: ExecutorFinishHook =
            Arc::new(move |qd: &mut QueryDesc| this.on_finish(prev.as_ref(), qd));

        let this = Arc::clone(self);
        let prev = previous.end.clone();
        let end: ExecutorEndHook = Arc::new(move |qd: &mut QueryDesc| this.on_end(prev.as_ref(), qd));

        hooks.install_start(Some(start));
        hooks.install_run(Some(run));
        hooks.install_finish(Some(finish));
        hooks.install_end(Some(end));
        debug!("auto_explain installed");
        previous
    }

    /// Restores the hooks [`AutoExplain::install`] displaced.
    pub fn uninstall(hooks: &ExecutorHooks, previous: SavedExecutorHooks) {
        hooks.restore(previous);
        debug!("auto_explain uninstalled");
    }

    fn enabled(&self, config: &AutoExplainConfig) -> bool {
        config.log_min_duration >= 0
            && (self.nesting.load(Ordering::SeqCst) == 0 || config.log_nested_statements)
            && self.sampled.load(Ordering::SeqCst)
    }

    fn on_start(
        &self,
        prev: Option<&ExecutorStartHook>,
        qd: &mut QueryDesc,
        eflags: ExecFlags,
    ) -> Result<bool> {
        let config = self.config();
        if self.nesting.load(Ordering::SeqCst) == 0 {
            let sampled = config.log_min_duration >= 0
                && !qd.in_parallel_worker
                && self.rng.lock().gen::<f64>() < config.sample_rate;
            self.sampled.store(sampled, Ordering::SeqCst);
            trace!(sampled, "auto_explain sampling decision");
        }

        let enabled = self.enabled(&config);
        if enabled && config.log_analyze && !eflags.contains(ExecFlags::EXPLAIN_ONLY) {
            qd.instrument_options |= if config.log_timing {
                InstrumentOption::TIMER
            } else {
                InstrumentOption::ROWS
            };
            if config.log_buffers {
                qd.instrument_options |= InstrumentOption::BUFFERS;
            }
            if config.log_wal {
                qd.instrument_options |= InstrumentOption::WAL;
            }
        }

        let valid = match prev {
            Some(hook) => hook(qd, eflags)?,
            None => standard_executor_start(qd, eflags)?,
        };
        if !valid {
            return Ok(false);
        }

        if enabled && qd.totaltime.is_none() {
            let context = qd.estate()?.query_context.clone();
            let _region = switch_to(&context);
            qd.totaltime = Some(Instrumentation::new(InstrumentOption::ALL, false));
        }
        Ok(true)
    }

    fn on_run(
        &self,
        prev: Option<&ExecutorRunHook>,
        qd: &mut QueryDesc,
        direction: ScanDirection,
        count: u64,
    ) -> Result<()> {
        let _nested = NestingGuard::enter(&self.nesting);
        match prev {
            Some(hook) => hook(qd, direction, count),
            None => standard_executor_run(qd, direction, count),
        }
    }

    fn on_finish(&self, prev: Option<&ExecutorFinishHook>, qd: &mut QueryDesc) -> Result<()> {
        let _nested = NestingGuard::enter(&self.nesting);
        match prev {
            Some(hook) => hook(qd),
            None => standard_executor_finish(qd),
        }
    }

    fn on_end(&self, prev: Option<&ExecutorEndHook>, qd: &mut QueryDesc) -> Result<()> {
        let config = self.config();
        let logged = if qd.totaltime.is_some() && self.enabled(&config) {
            self.log_plan(&config, qd)
        } else {
            Ok(())
        };
        let ended = match prev {
            Some(hook) => hook(qd),
            None => standard_executor_end(qd),
        };
        logged.and(ended)
    }

    fn log_plan(&self, config: &AutoExplainConfig, qd: &mut QueryDesc) -> Result<()> {
        let context = qd.estate()?.query_context.clone();
        let _region = switch_to(&context);

        let Some(total) = qd.totaltime.as_mut() else {
            return Ok(());
        };
        total.end_loop();
        let msec = total.total * 1000.0;
        if msec < f64::from(config.log_min_duration) {
            return Ok(());
        }

        let mut es = ExplainState::with_registry(Arc::clone(&qd.catalog), Arc::clone(&self.registry));
        es.analyze = !qd.instrument_options.is_empty() && config.log_analyze;
        es.verbose = config.log_verbose;
        es.buffers = es.analyze && config.log_buffers;
        es.wal = es.analyze && config.log_wal;
        es.timing = es.analyze && config.log_timing;
        es.summary = es.analyze;
        es.format = config.log_format;
        es.settings = config.log_settings;

        es.begin_output();
        explain_query_text(&mut es, qd);
        explain_query_parameters(&mut es, qd.params.as_ref(), config.log_parameter_max_length);
        explain_print_plan(&mut es, qd)?;
        if es.analyze && config.log_triggers {
            explain_print_triggers(&mut es, qd)?;
        }
        if es.costs {
            explain_print_jit_summary(&mut es, qd);
        }
        es.end_output();

        let body = finish_document(es.output, config.log_format);
        self.sink
            .emit(config.log_level, &format!("duration: {msec:.3} ms  plan:\n{body}"));
        Ok(())
    }
}

/// Drops the final newline and, for JSON, turns the outer array into an
/// object.
fn finish_document(mut output: String, format: ExplainFormat) -> String {
    if output.ends_with('\n') {
        output.pop();
    }
    if format == ExplainFormat::Json && output.starts_with('[') && output.ends_with(']') {
        output.replace_range(..1, "{");
        let last = output.len() - 1;
        output.replace_range(last.., "}");
    }
    output
}
