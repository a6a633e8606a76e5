//! Rendering state shared by every EXPLAIN code path.

use std::any::Any;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::debug;

use crate::catalog::CatalogLookup;
use crate::error::PlanError;
use crate::nodes::Bitmapset;

use super::format::WorkersState;
use super::hooks::ExplainRegistry;

/// Output format of a rendering run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplainFormat {
    /// Indented human-readable lines.
    #[default]
    Text,
    /// XML document.
    Xml,
    /// JSON document.
    Json,
    /// YAML document.
    Yaml,
}

impl ExplainFormat {
    /// Lower-case option value naming this format.
    pub fn as_str(self) -> &'static str {
        match self {
            ExplainFormat::Text => "text",
            ExplainFormat::Xml => "xml",
            ExplainFormat::Json => "json",
            ExplainFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for ExplainFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExplainFormat {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ExplainFormat::Text),
            "xml" => Ok(ExplainFormat::Xml),
            "json" => Ok(ExplainFormat::Json),
            "yaml" => Ok(ExplainFormat::Yaml),
            other => Err(PlanError::option(format!(
                "unrecognized value for EXPLAIN option \"format\": \"{other}\""
            ))),
        }
    }
}

/// What `SERIALIZE` measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SerializeMode {
    /// Not requested.
    #[default]
    None,
    /// Text output functions.
    Text,
    /// Binary send functions.
    Binary,
}

/// Options and output buffer of one rendering run.
///
/// Fields mirror the EXPLAIN options; everything but `costs` starts out
/// false. Extensions keep per-run data in the extension state slots, keyed
/// by the id handed out by [`ExtensionIds::get_id`].
pub struct ExplainState {
    /// Rendered output.
    pub output: String,
    /// Print schema-qualified names and output columns.
    pub verbose: bool,
    /// The statement was executed.
    pub analyze: bool,
    /// Print estimated costs.
    pub costs: bool,
    /// Print buffer usage.
    pub buffers: bool,
    /// Print WAL usage.
    pub wal: bool,
    /// Print per-node timing.
    pub timing: bool,
    /// Print planning and execution totals.
    pub summary: bool,
    /// Print planner memory usage.
    pub memory: bool,
    /// Print modified planner settings.
    pub settings: bool,
    /// Plan with parameter placeholders left unbound.
    pub generic: bool,
    /// Serialization measurement mode.
    pub serialize: SerializeMode,
    /// Output format.
    pub format: ExplainFormat,
    /// Current indentation level.
    pub indent: usize,
    /// One entry per open group; structured formats track whether the
    /// group has members yet.
    pub(crate) grouping_stack: SmallVec<[i32; 8]>,
    /// Reference name per range table entry.
    pub rtable_names: Vec<Option<String>>,
    /// Range table length, not counting a grouping entry.
    pub rtable_size: usize,
    /// Sub-plan ids already printed.
    pub printed_subplans: Bitmapset,
    /// Suppress per-worker details.
    pub hide_workers: bool,
    /// Include I/O timings in buffer output.
    pub track_io_timing: bool,
    pub(crate) workers_state: Option<WorkersState>,
    extension_state: Vec<Option<Box<dyn Any + Send>>>,
    /// Catalog used for names.
    pub catalog: Arc<dyn CatalogLookup>,
    /// Extension registry consulted for options and hooks.
    pub registry: Arc<ExplainRegistry>,
}

impl ExplainState {
    /// A state using the process-wide extension registry.
    pub fn new(catalog: Arc<dyn CatalogLookup>) -> Self {
        Self::with_registry(catalog, Arc::clone(ExplainRegistry::global()))
    }

    /// A state consulting `registry` for extension options and hooks.
    pub fn with_registry(catalog: Arc<dyn CatalogLookup>, registry: Arc<ExplainRegistry>) -> Self {
        ExplainState {
            output: String::new(),
            verbose: false,
            analyze: false,
            costs: true,
            buffers: false,
            wal: false,
            timing: false,
            summary: false,
            memory: false,
            settings: false,
            generic: false,
            serialize: SerializeMode::None,
            format: ExplainFormat::Text,
            indent: 0,
            grouping_stack: SmallVec::new(),
            rtable_names: Vec::new(),
            rtable_size: 0,
            printed_subplans: Bitmapset::new(),
            hide_workers: false,
            track_io_timing: false,
            workers_state: None,
            extension_state: Vec::new(),
            catalog,
            registry,
        }
    }

    /// Open groups still on the stack.
    pub fn grouping_depth(&self) -> usize {
        self.grouping_stack.len()
    }

    /// Extension state stored under `id`, if any.
    pub fn extension_state(&self, id: usize) -> Option<&(dyn Any + Send)> {
        self.extension_state.get(id)?.as_deref()
    }

    /// Extension state under `id` downcast to `T`.
    pub fn extension_state_as<T: Any>(&self, id: usize) -> Option<&T> {
        self.extension_state(id)?.downcast_ref::<T>()
    }

    /// Mutable extension state under `id` downcast to `T`.
    pub fn extension_state_as_mut<T: Any>(&mut self, id: usize) -> Option<&mut T> {
        self.extension_state.get_mut(id)?.as_deref_mut()?.downcast_mut::<T>()
    }

    /// Stores extension state under `id`, growing the slot array as needed.
    pub fn set_extension_state(&mut self, id: usize, state: Box<dyn Any + Send>) {
        if id >= self.extension_state.len() {
            let len = (id + 1).next_power_of_two().max(16);
            self.extension_state.resize_with(len, || None);
        }
        self.extension_state[id] = Some(state);
    }
}

impl fmt::Debug for ExplainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExplainState")
            .field("format", &self.format)
            .field("analyze", &self.analyze)
            .field("verbose", &self.verbose)
            .field("costs", &self.costs)
            .field("indent", &self.indent)
            .field("depth", &self.grouping_stack.len())
            .finish_non_exhaustive()
    }
}

/// Process-stable ids handed to extensions that keep per-run state.
#[derive(Debug, Default)]
pub struct ExtensionIds {
    names: RwLock<Vec<String>>,
}

impl ExtensionIds {
    /// Id for `name`, allocating the next free one on first use.
    pub fn get_id(&self, name: &str) -> usize {
        if let Some(id) = self.names.read().iter().position(|n| n == name) {
            return id;
        }
        let mut names = self.names.write();
        if let Some(id) = names.iter().position(|n| n == name) {
            return id;
        }
        names.push(name.to_string());
        let id = names.len() - 1;
        debug!(extension = name, id, "explain extension id assigned");
        id
    }

    /// Name registered under `id`.
    pub fn name(&self, id: usize) -> Option<String> {
        self.names.read().get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;

    fn state() -> ExplainState {
        ExplainState::with_registry(Arc::new(InMemoryCatalog::new()), Arc::new(ExplainRegistry::new()))
    }

    #[test]
    fn defaults_only_enable_costs() {
        let es = state();
        assert!(es.costs);
        assert!(!es.analyze && !es.verbose && !es.timing && !es.summary);
        assert_eq!(es.format, ExplainFormat::Text);
        assert_eq!(es.grouping_depth(), 0);
        assert!(es.extension_state(0).is_none());
    }

    #[test]
    fn extension_ids_are_stable_and_distinct() {
        let ids = ExtensionIds::default();
        let a = ids.get_id("alpha");
        let b = ids.get_id("beta");
        assert_ne!(a, b);
        assert_eq!(ids.get_id("alpha"), a);
        assert_eq!(ids.name(b).as_deref(), Some("beta"));
    }

    #[test]
    fn extension_slots_grow_and_do_not_collide() {
        let mut es = state();
        es.set_extension_state(1, Box::new(7_u32));
        es.set_extension_state(40, Box::new(String::from("x")));
        assert_eq!(es.extension_state_as::<u32>(1), Some(&7));
        assert_eq!(es.extension_state_as::<String>(40).map(String::as_str), Some("x"));
        assert!(es.extension_state_as::<u32>(40).is_none());
        assert!(es.extension_state(1000).is_none());
        if let Some(v) = es.extension_state_as_mut::<u32>(1) {
            *v += 1;
        }
        assert_eq!(es.extension_state_as::<u32>(1), Some(&8));
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("yaml".parse::<ExplainFormat>().unwrap(), ExplainFormat::Yaml);
        assert!("html".parse::<ExplainFormat>().is_err());
        assert_eq!(ExplainFormat::Json.to_string(), "json");
    }
}
