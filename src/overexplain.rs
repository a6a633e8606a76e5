//! Extra EXPLAIN output for people debugging the planner.
//!
//! Adds two options. `DEBUG` prints planner bookkeeping per node (disabled
//! node count, parallel safety, node id, parameter sets) and a `PlannedStmt`
//! section per statement. `RANGE_TABLE` prints the range table indexes each
//! node touches and a `Range Table` section describing every entry.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::{get_lockmode_name, get_namespace_name_or_temp, get_rel_name, get_rel_namespace, LockMethod};
use crate::error::Result;
use crate::executor::PlanState;
use crate::explain::{
    ExplainFormat, ExplainOptionHandler, ExplainPerNodeHook, ExplainPerPlanHook, ExplainRegistry,
    ExplainState,
};
use crate::nodes::parsenodes::{Alias, DefElem, JoinType, RangeTblEntry, RteKind};
use crate::nodes::plannodes::{Plan, PlanKind, PlannedStmt};
use crate::nodes::Bitmapset;
use crate::params::ParamListInfo;
use crate::ruleutils::{quote_identifier, Ancestor};

/// Name the extension registers its state under.
pub const EXTENSION_NAME: &str = "pg_overexplain";

/// Options of one rendering run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverexplainOptions {
    /// `DEBUG` was given.
    pub debug: bool,
    /// `RANGE_TABLE` was given.
    pub range_table: bool,
}

/// What [`install`] replaced; hand it to [`uninstall`] to undo.
#[derive(Clone)]
pub struct Installed {
    /// Extension state slot used by the module.
    pub extension_id: usize,
    previous_per_plan: Option<ExplainPerPlanHook>,
    previous_per_node: Option<ExplainPerNodeHook>,
}

impl std::fmt::Debug for Installed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installed")
            .field("extension_id", &self.extension_id)
            .finish_non_exhaustive()
    }
}

fn update_options(es: &mut ExplainState, id: usize, apply: impl FnOnce(&mut OverexplainOptions)) {
    let mut opts = options(es, id);
    apply(&mut opts);
    es.set_extension_state(id, Box::new(opts));
}

fn options(es: &ExplainState, id: usize) -> OverexplainOptions {
    es.extension_state_as::<OverexplainOptions>(id)
        .copied()
        .unwrap_or_default()
}

/// Registers the options and chains the per-node and per-plan hooks of
/// `registry`.
pub fn install(registry: &ExplainRegistry) -> Installed {
    let id = registry.extension_ids.get_id(EXTENSION_NAME);

    let debug_handler: ExplainOptionHandler = Arc::new(move |es: &mut ExplainState, opt: &DefElem| {
        let value = opt.get_boolean()?;
        update_options(es, id, |o| o.debug = value);
        Ok(())
    });
    let range_table_handler: ExplainOptionHandler =
        Arc::new(move |es: &mut ExplainState, opt: &DefElem| {
            let value = opt.get_boolean()?;
            update_options(es, id, |o| o.range_table = value);
            Ok(())
        });
    registry.options.register("debug", debug_handler);
    registry.options.register("range_table", range_table_handler);

    let previous_per_node = registry.hooks.per_node_hook();
    let chained = previous_per_node.clone();
    let per_node: ExplainPerNodeHook = Arc::new(
        move |plan: &Plan,
              state: Option<&PlanState>,
              ancestors: &[Ancestor<'_>],
              relationship: Option<&str>,
              plan_name: Option<&str>,
              es: &mut ExplainState| {
            if let Some(prev) = &chained {
                prev(plan, state, ancestors, relationship, plan_name, es)?;
            }
            let opts = options(es, id);
            per_node_details(plan, es, opts)
        },
    );
    registry.hooks.install_per_node(Some(per_node));

    let previous_per_plan = registry.hooks.per_plan_hook();
    let chained = previous_per_plan.clone();
    let per_plan: ExplainPerPlanHook = Arc::new(
        move |stmt: &PlannedStmt,
              es: &mut ExplainState,
              query_string: Option<&str>,
              params: Option<&ParamListInfo>| {
            if let Some(prev) = &chained {
                prev(stmt, es, query_string, params)?;
            }
            let opts = options(es, id);
            if opts.debug {
                show_planned_stmt(stmt, es);
            }
            if opts.range_table {
                show_range_table(stmt, es)?;
            }
            Ok(())
        },
    );
    registry.hooks.install_per_plan(Some(per_plan));

    debug!(extension_id = id, "overexplain installed");
    Installed {
        extension_id: id,
        previous_per_plan,
        previous_per_node,
    }
}

/// Puts back the hooks [`install`] replaced. The options stay registered.
pub fn uninstall(registry: &ExplainRegistry, installed: Installed) {
    registry.hooks.install_per_plan(installed.previous_per_plan);
    registry.hooks.install_per_node(installed.previous_per_node);
    debug!("overexplain uninstalled");
}

fn show_bitmapset(es: &mut ExplainState, label: &str, set: &Bitmapset) {
    if set.is_empty() {
        es.property_text(label, "none");
        return;
    }
    let members: Vec<String> = set.iter().map(|m| m.to_string()).collect();
    es.property_text(label, &members.join(" "));
}

fn show_int_list<T: ToString>(es: &mut ExplainState, label: &str, list: &[T]) {
    if list.is_empty() {
        es.property_text(label, "none");
        return;
    }
    let members: Vec<String> = list.iter().map(ToString::to_string).collect();
    es.property_text(label, &members.join(" "));
}

fn per_node_details(plan: &Plan, es: &mut ExplainState, opts: OverexplainOptions) -> Result<()> {
    let text = es.format == ExplainFormat::Text;
    if opts.debug {
        es.property_integer("Disabled Nodes", None, i64::from(plan.disabled_nodes));
        es.property_bool("Parallel Safe", plan.parallel_safe);
        es.property_integer("Plan Node ID", None, i64::from(plan.plan_node_id));
        if !text || !plan.ext_param.is_empty() {
            show_bitmapset(es, "extParam", &plan.ext_param);
        }
        if !text || !plan.all_param.is_empty() {
            show_bitmapset(es, "allParam", &plan.all_param);
        }
    }
    if opts.range_table {
        match &plan.kind {
            PlanKind::ForeignScan(fs) => show_bitmapset(es, "Foreign Relids", &fs.fs_relids),
            PlanKind::CustomScan(cs) => show_bitmapset(es, "Custom Relids", &cs.custom_relids),
            PlanKind::ModifyTable(mt) => {
                es.property_integer("Nominal RTI", None, i64::from(mt.nominal_relation));
                es.property_integer("Exclude Relation RTI", None, i64::from(mt.excl_rel_rti));
            }
            PlanKind::Append(ap) => show_bitmapset(es, "Append RTIs", &ap.apprelids),
            PlanKind::MergeAppend(ma) => show_bitmapset(es, "Append RTIs", &ma.apprelids),
            _ => {
                if let Some(scan) = plan.as_scan() {
                    es.property_integer("Scan RTI", None, i64::from(scan.scanrelid));
                }
            }
        }
    }
    Ok(())
}

fn show_planned_stmt(stmt: &PlannedStmt, es: &mut ExplainState) {
    let text = es.format == ExplainFormat::Text;
    es.open_group("PlannedStmt", Some("PlannedStmt"), true);
    if text {
        es.indent_text();
        es.output.push_str("PlannedStmt:\n");
        es.indent += 1;
    }

    es.property_text("Command Type", stmt.command_type.name());

    let flags: Vec<&str> = [
        (stmt.has_returning, "hasReturning"),
        (stmt.has_modifying_cte, "hasModifyingCTE"),
        (stmt.can_set_tag, "canSetTag"),
        (stmt.transient_plan, "transientPlan"),
        (stmt.depends_on_role, "dependsOnRole"),
        (stmt.parallel_mode_needed, "parallelModeNeeded"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();
    if flags.is_empty() {
        es.property_text("Flags", "none");
    } else {
        es.property_text("Flags", &flags.join(", "));
    }

    show_bitmapset(es, "Subplans Needing Rewind", &stmt.rewind_plan_ids);
    show_int_list(es, "Relation OIDs", &stmt.relation_oids);
    show_int_list(es, "Executor Parameter Types", &stmt.param_exec_types);

    let location = match stmt.stmt_location.offset() {
        None => "Unknown".to_string(),
        Some(at) if stmt.stmt_len == 0 => format!("{at} to end"),
        Some(at) => format!("{at} for {} bytes", stmt.stmt_len),
    };
    es.property_text("Parse Location", &location);

    if text {
        es.indent -= 1;
    }
    es.close_group("PlannedStmt", Some("PlannedStmt"), true);
}

fn alias_text(alias: &Alias) -> String {
    let columns: Vec<String> = alias.colnames.iter().map(|c| quote_identifier(c)).collect();
    format!("{} ({})", quote_identifier(&alias.aliasname), columns.join(", "))
}

fn relkind_name(relkind: char) -> Option<String> {
    Some(
        match relkind {
            'r' => "relation",
            'i' => "index",
            'S' => "sequence",
            't' => "toastvalue",
            'v' => "view",
            'm' => "materialized_view",
            'c' => "composite_type",
            'f' => "foreign_table",
            'p' => "partitioned_table",
            'I' => "partitioned_index",
            '\0' => return None,
            other => return Some(other.to_string()),
        }
        .to_string(),
    )
}

fn join_type_name(jointype: JoinType) -> &'static str {
    match jointype {
        JoinType::Inner => "Inner",
        JoinType::Left => "Left",
        JoinType::Full => "Full",
        JoinType::Right => "Right",
        JoinType::Semi => "Semi",
        JoinType::Anti => "Anti",
        JoinType::RightSemi => "Right Semi",
        JoinType::RightAnti => "Right Anti",
        _ => "???",
    }
}

fn inherited(rte: &RangeTblEntry) -> bool {
    matches!(rte.kind, RteKind::Relation { inh: true, .. })
}

fn show_range_table_entry(es: &mut ExplainState, rti: u32, rte: &RangeTblEntry) -> Result<()> {
    let text = es.format == ExplainFormat::Text;
    let kind = rte.rtekind().name();
    let inh = inherited(rte);

    es.open_group("Range Table Entry", None, true);
    if text {
        es.indent_text();
        es.output.push_str(&format!(
            "RTI {rti} ({kind}{}{}):\n",
            if inh { ", inherited" } else { "" },
            if rte.in_from_cl { ", in-from-clause" } else { "" },
        ));
        es.indent += 1;
    } else {
        es.property_uinteger("RTI", None, u64::from(rti));
        es.property_text("Kind", kind);
        es.property_bool("Inherited", inh);
        es.property_bool("In From Clause", rte.in_from_cl);
    }

    if let Some(alias) = &rte.alias {
        es.property_text("Alias", &alias_text(alias));
    }
    es.property_text("Eref", &alias_text(&rte.eref));

    let catalog = Arc::clone(&es.catalog);
    match &rte.kind {
        RteKind::Relation {
            relid,
            relkind,
            rellockmode,
            perminfoindex,
            ..
        } => {
            if *relid != 0 {
                let relname = quote_identifier(&get_rel_name(&*catalog, *relid)?);
                let qualname = if es.verbose {
                    let nsp = get_namespace_name_or_temp(&*catalog, get_rel_namespace(&*catalog, *relid)?)?;
                    format!("{}.{relname}", quote_identifier(&nsp))
                } else {
                    relname
                };
                es.property_text("Relation", &qualname);
            }
            if let Some(name) = relkind_name(*relkind) {
                es.property_text("Relation Kind", &name);
            }
            if *rellockmode != 0 {
                es.property_text(
                    "Relation Lock Mode",
                    get_lockmode_name(LockMethod::Default, *rellockmode)?,
                );
            }
            if *perminfoindex != 0 {
                es.property_integer("Permission Info Index", None, i64::from(*perminfoindex));
            }
        }
        RteKind::NamedTuplestore { relid, .. } if *relid != 0 => {
            let relname = quote_identifier(&get_rel_name(&*catalog, *relid)?);
            es.property_text("Relation", &relname);
        }
        _ => {}
    }

    if !text || rte.security_barrier {
        es.property_bool("Security Barrier", rte.security_barrier);
    }

    match &rte.kind {
        RteKind::Join {
            jointype,
            joinmergedcols,
            ..
        } => {
            es.property_text("Join Type", join_type_name(*jointype));
            if !text || *joinmergedcols != 0 {
                es.property_integer("JOIN USING Columns", None, i64::from(*joinmergedcols));
            }
        }
        RteKind::Function { funcordinality, .. } => {
            es.property_bool("WITH ORDINALITY", *funcordinality);
        }
        RteKind::Cte {
            ctename,
            ctelevelsup,
            self_reference,
        } => {
            es.property_text("CTE Name", ctename);
            es.property_uinteger("CTE Levels Up", None, u64::from(*ctelevelsup));
            es.property_bool("CTE Self-Reference", *self_reference);
        }
        RteKind::NamedTuplestore {
            enrname, enrtuples, ..
        } => {
            es.property_text("ENR Name", enrname);
            es.property_float("ENR Tuples", None, *enrtuples, 0);
        }
        _ => {}
    }

    if !text || rte.lateral {
        es.property_bool("Lateral", rte.lateral);
    }

    if text {
        es.indent -= 1;
    }
    es.close_group("Range Table Entry", None, true);
    Ok(())
}

fn show_range_table(stmt: &PlannedStmt, es: &mut ExplainState) -> Result<()> {
    let text = es.format == ExplainFormat::Text;
    es.open_group("Range Table", Some("Range Table"), false);
    for (rti, rte) in stmt.rtable.iter() {
        show_range_table_entry(es, rti, rte)?;
    }
    es.close_group("Range Table", Some("Range Table"), false);

    // RTI lists kept on the statement itself.
    if !text || !stmt.unprunable_relids.is_empty() {
        show_bitmapset(es, "Unprunable RTIs", &stmt.unprunable_relids);
    }
    if !text || !stmt.result_relations.is_empty() {
        show_int_list(es, "Result RTIs", &stmt.result_relations);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::makefuncs::make_def_elem;

    #[test]
    fn options_land_in_extension_state() {
        let registry = Arc::new(ExplainRegistry::new());
        let installed = install(&registry);
        let mut es = ExplainState::with_registry(
            Arc::new(crate::catalog::InMemoryCatalog::new()),
            Arc::clone(&registry),
        );
        let handler = registry.options.handler("debug").unwrap();
        handler(&mut es, &make_def_elem("debug", None, None)).unwrap();
        assert_eq!(
            options(&es, installed.extension_id),
            OverexplainOptions {
                debug: true,
                range_table: false
            }
        );
    }

    #[test]
    fn uninstall_restores_hooks() {
        let registry = ExplainRegistry::new();
        let installed = install(&registry);
        assert!(registry.hooks.per_node_hook().is_some());
        uninstall(&registry, installed);
        assert!(registry.hooks.per_node_hook().is_none());
        assert!(registry.hooks.per_plan_hook().is_none());
    }

    #[test]
    fn alias_lists_columns() {
        let alias = Alias {
            aliasname: "Veg".into(),
            colnames: vec!["id".into(), "name".into()],
        };
        assert_eq!(alias_text(&alias), "\"Veg\" (id, name)");
    }
}
