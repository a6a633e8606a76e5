//! EXPLAIN option parsing and the registry of extension-defined options.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{PlanError, Result};
use crate::nodes::parsenodes::DefElem;

use super::state::{ExplainFormat, ExplainState, SerializeMode};

/// Applies an extension option to the rendering state.
pub type ExplainOptionHandler = Arc<dyn Fn(&mut ExplainState, &DefElem) -> Result<()> + Send + Sync>;

/// Options contributed by extensions, looked up by name.
#[derive(Default)]
pub struct OptionRegistry {
    handlers: RwLock<Vec<(String, ExplainOptionHandler)>>,
}

impl OptionRegistry {
    /// Registers `handler` for option `name`. Registering a name again
    /// replaces the earlier handler.
    pub fn register(&self, name: &str, handler: ExplainOptionHandler) {
        let mut handlers = self.handlers.write();
        if let Some(slot) = handlers.iter_mut().find(|(n, _)| n == name) {
            slot.1 = handler;
            debug!(option = name, "explain option handler replaced");
        } else {
            handlers.push((name.to_string(), handler));
            debug!(option = name, "explain option registered");
        }
    }

    /// Handler registered for `name`.
    pub fn handler(&self, name: &str) -> Option<ExplainOptionHandler> {
        self.handlers
            .read()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, h)| Arc::clone(h))
    }

    /// Names of all registered options, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.handlers.read().iter().map(|(n, _)| n.clone()).collect()
    }
}

impl std::fmt::Debug for OptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionRegistry")
            .field("names", &self.names())
            .finish()
    }
}

/// Runs the extension handler for `opt`. Returns false when no extension
/// claims the option.
pub fn apply_extension_option(es: &mut ExplainState, opt: &DefElem) -> Result<bool> {
    let Some(handler) = es.registry.options.handler(&opt.defname) else {
        return Ok(false);
    };
    handler(es, opt)?;
    Ok(true)
}

fn requires_analyze(option: &str) -> PlanError {
    PlanError::option(format!("EXPLAIN option {option} requires ANALYZE"))
}

fn unrecognized_value(opt: &DefElem, value: &str) -> PlanError {
    PlanError::option_at(
        format!(
            "unrecognized value for EXPLAIN option \"{}\": \"{}\"",
            opt.defname, value
        ),
        opt.location.offset(),
    )
}

/// Applies `options` to `es` and checks the combination.
///
/// `TIMING`, `BUFFERS` and `SUMMARY` default to the value of `ANALYZE`
/// unless given explicitly. Afterwards the validate hook, if installed,
/// sees the final state and the raw options.
pub fn parse_explain_options(es: &mut ExplainState, options: &[DefElem]) -> Result<()> {
    let mut timing_set = false;
    let mut buffers_set = false;
    let mut summary_set = false;

    for opt in options {
        match opt.defname.as_str() {
            "analyze" => es.analyze = opt.get_boolean()?,
            "verbose" => es.verbose = opt.get_boolean()?,
            "costs" => es.costs = opt.get_boolean()?,
            "buffers" => {
                buffers_set = true;
                es.buffers = opt.get_boolean()?;
            }
            "wal" => es.wal = opt.get_boolean()?,
            "settings" => es.settings = opt.get_boolean()?,
            "generic_plan" => es.generic = opt.get_boolean()?,
            "timing" => {
                timing_set = true;
                es.timing = opt.get_boolean()?;
            }
            "summary" => {
                summary_set = true;
                es.summary = opt.get_boolean()?;
            }
            "memory" => es.memory = opt.get_boolean()?,
            "serialize" => {
                es.serialize = match &opt.arg {
                    None => SerializeMode::Text,
                    Some(_) => match opt.get_string()?.as_str() {
                        "off" | "none" => SerializeMode::None,
                        "text" => SerializeMode::Text,
                        "binary" => SerializeMode::Binary,
                        other => return Err(unrecognized_value(opt, other)),
                    },
                };
            }
            "format" => {
                let value = opt.get_string()?;
                es.format = match value.as_str() {
                    "text" => ExplainFormat::Text,
                    "xml" => ExplainFormat::Xml,
                    "json" => ExplainFormat::Json,
                    "yaml" => ExplainFormat::Yaml,
                    other => return Err(unrecognized_value(opt, other)),
                };
            }
            _ => {
                if !apply_extension_option(es, opt)? {
                    return Err(PlanError::option_at(
                        format!("unrecognized EXPLAIN option \"{}\"", opt.defname),
                        opt.location.offset(),
                    ));
                }
            }
        }
    }

    if es.wal && !es.analyze {
        return Err(requires_analyze("WAL"));
    }
    if !timing_set {
        es.timing = es.analyze;
    }
    if !buffers_set {
        es.buffers = es.analyze;
    }
    if es.timing && !es.analyze {
        return Err(requires_analyze("TIMING"));
    }
    if es.serialize != SerializeMode::None && !es.analyze {
        return Err(requires_analyze("SERIALIZE"));
    }
    if es.generic && es.analyze {
        return Err(PlanError::option(
            "EXPLAIN options ANALYZE and GENERIC_PLAN cannot be used together",
        ));
    }
    if !summary_set {
        es.summary = es.analyze;
    }

    if let Some(hook) = es.registry.hooks.validate_options_hook() {
        hook(es, options)?;
    }
    Ok(())
}
