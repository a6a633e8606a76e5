//! Interception points for extensions that add EXPLAIN output.

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::executor::PlanState;
use crate::nodes::parsenodes::DefElem;
use crate::nodes::plannodes::{Plan, PlannedStmt};
use crate::params::ParamListInfo;
use crate::ruleutils::Ancestor;

use super::options::OptionRegistry;
use super::state::{ExplainState, ExtensionIds};

/// Called once per plan after the built-in summary lines.
pub type ExplainPerPlanHook = Arc<
    dyn Fn(&PlannedStmt, &mut ExplainState, Option<&str>, Option<&ParamListInfo>) -> Result<()>
        + Send
        + Sync,
>;

/// Called for every node after its built-in details and before its
/// children. Arguments: the node, its runtime state, ancestors innermost
/// first, the relationship to its parent and the sub-plan name.
pub type ExplainPerNodeHook = Arc<
    dyn Fn(
            &Plan,
            Option<&PlanState>,
            &[Ancestor<'_>],
            Option<&str>,
            Option<&str>,
            &mut ExplainState,
        ) -> Result<()>
        + Send
        + Sync,
>;

/// Called after option parsing with the final state and the raw options.
pub type ExplainValidateOptionsHook =
    Arc<dyn Fn(&mut ExplainState, &[DefElem]) -> Result<()> + Send + Sync>;

/// The three hook slots. Installing returns the previous value so callers
/// can chain to it and restore it later.
#[derive(Default)]
pub struct ExplainHooks {
    per_plan: RwLock<Option<ExplainPerPlanHook>>,
    per_node: RwLock<Option<ExplainPerNodeHook>>,
    validate_options: RwLock<Option<ExplainValidateOptionsHook>>,
}

impl ExplainHooks {
    /// Installs the per-plan hook.
    pub fn install_per_plan(&self, hook: Option<ExplainPerPlanHook>) -> Option<ExplainPerPlanHook> {
        debug!(installed = hook.is_some(), "explain per-plan hook");
        std::mem::replace(&mut *self.per_plan.write(), hook)
    }

    /// Installs the per-node hook.
    pub fn install_per_node(&self, hook: Option<ExplainPerNodeHook>) -> Option<ExplainPerNodeHook> {
        debug!(installed = hook.is_some(), "explain per-node hook");
        std::mem::replace(&mut *self.per_node.write(), hook)
    }

    /// Installs the option validation hook.
    pub fn install_validate_options(
        &self,
        hook: Option<ExplainValidateOptionsHook>,
    ) -> Option<ExplainValidateOptionsHook> {
        debug!(installed = hook.is_some(), "explain validate-options hook");
        std::mem::replace(&mut *self.validate_options.write(), hook)
    }

    /// Current per-plan hook.
    pub fn per_plan_hook(&self) -> Option<ExplainPerPlanHook> {
        self.per_plan.read().clone()
    }

    /// Current per-node hook.
    pub fn per_node_hook(&self) -> Option<ExplainPerNodeHook> {
        self.per_node.read().clone()
    }

    /// Current option validation hook.
    pub fn validate_options_hook(&self) -> Option<ExplainValidateOptionsHook> {
        self.validate_options.read().clone()
    }
}

impl std::fmt::Debug for ExplainHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplainHooks")
            .field("per_plan", &self.per_plan.read().is_some())
            .field("per_node", &self.per_node.read().is_some())
            .field("validate_options", &self.validate_options.read().is_some())
            .finish()
    }
}

/// Everything extensions register with the EXPLAIN engine: state ids,
/// options and hooks.
#[derive(Debug, Default)]
pub struct ExplainRegistry {
    /// Ids for per-run extension state.
    pub extension_ids: ExtensionIds,
    /// Extension options.
    pub options: OptionRegistry,
    /// Hook slots.
    pub hooks: ExplainHooks,
}

impl ExplainRegistry {
    /// An empty registry, independent of the process-wide one.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Arc<ExplainRegistry> {
        static GLOBAL: OnceLock<Arc<ExplainRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ExplainRegistry::new()))
    }
}

/// Id for extension `name` in the process-wide registry.
pub fn get_explain_extension_id(name: &str) -> usize {
    ExplainRegistry::global().extension_ids.get_id(name)
}
