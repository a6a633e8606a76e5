//! The four output backends.
//!
//! Every property and group call dispatches on [`ExplainFormat`]. Text output
//! is line oriented and ignores groups; XML, JSON and YAML keep a grouping
//! stack so separators and list markers land in the right place. For JSON a
//! stack entry records whether the current level already holds an item (and
//! so needs a comma); for YAML it records whether the next line still needs
//! a `- ` marker.

use super::state::{ExplainFormat, ExplainState};

const XML_TAG_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_.";

const X_OPENING: u8 = 0;
const X_CLOSING: u8 = 1;
const X_CLOSE_IMMEDIATE: u8 = 2;
const X_NOWHITESPACE: u8 = 4;

/// XML namespace of the document element.
pub const EXPLAIN_XML_NAMESPACE: &str = "http://www.postgresql.org/2009/explain";

/// Per-worker output buffers collected while walking a node.
#[derive(Debug)]
pub(crate) struct WorkersState {
    worker_inited: Vec<bool>,
    worker_str: Vec<String>,
    worker_state_save: Vec<i32>,
}

impl WorkersState {
    pub(crate) fn new(num_workers: usize) -> Self {
        WorkersState {
            worker_inited: vec![false; num_workers],
            worker_str: vec![String::new(); num_workers],
            worker_state_save: vec![0; num_workers],
        }
    }
}

/// Escapes `&`, `<`, `>` and carriage returns for XML text.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#x0d;"),
            _ => out.push(c),
        }
    }
    out
}

/// Quotes `value` as a JSON string. YAML output uses the same quoting.
pub fn escape_json(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn spaces(out: &mut String, n: usize) {
    out.extend(std::iter::repeat(' ').take(n));
}

impl ExplainState {
    /// Indents a fresh text line.
    pub fn indent_text(&mut self) {
        if self.output.is_empty() || self.output.ends_with('\n') {
            spaces(&mut self.output, self.indent * 2);
        }
    }

    fn json_line_ending(&mut self) {
        match self.grouping_stack.last_mut() {
            Some(top) if *top != 0 => self.output.push(','),
            Some(top) => *top = 1,
            None => {}
        }
        self.output.push('\n');
    }

    fn yaml_line_starting(&mut self) {
        match self.grouping_stack.last_mut() {
            Some(top) if *top == 0 => *top = 1,
            _ => {
                self.output.push('\n');
                spaces(&mut self.output, self.indent * 2);
            }
        }
    }

    fn xml_tag(&mut self, tagname: &str, flags: u8) {
        if flags & X_NOWHITESPACE == 0 {
            spaces(&mut self.output, 2 * self.indent);
        }
        self.output.push('<');
        if flags & X_CLOSING != 0 {
            self.output.push('/');
        }
        for c in tagname.chars() {
            self.output
                .push(if XML_TAG_CHARS.contains(c) { c } else { '-' });
        }
        if flags & X_CLOSE_IMMEDIATE != 0 {
            self.output.push_str(" /");
        }
        self.output.push('>');
        if flags & X_NOWHITESPACE == 0 {
            self.output.push('\n');
        }
    }

    fn property(&mut self, label: &str, unit: Option<&str>, value: &str, numeric: bool) {
        match self.format {
            ExplainFormat::Text => {
                self.indent_text();
                match unit {
                    Some(unit) => self.output.push_str(&format!("{label}: {value} {unit}\n")),
                    None => self.output.push_str(&format!("{label}: {value}\n")),
                }
            }
            ExplainFormat::Xml => {
                spaces(&mut self.output, self.indent * 2);
                self.xml_tag(label, X_OPENING | X_NOWHITESPACE);
                self.output.push_str(&escape_xml(value));
                self.xml_tag(label, X_CLOSING | X_NOWHITESPACE);
                self.output.push('\n');
            }
            ExplainFormat::Json => {
                self.json_line_ending();
                spaces(&mut self.output, self.indent * 2);
                self.output.push_str(&escape_json(label));
                self.output.push_str(": ");
                if numeric {
                    self.output.push_str(value);
                } else {
                    self.output.push_str(&escape_json(value));
                }
            }
            ExplainFormat::Yaml => {
                self.yaml_line_starting();
                self.output.push_str(label);
                self.output.push_str(": ");
                if numeric {
                    self.output.push_str(value);
                } else {
                    self.output.push_str(&escape_json(value));
                }
            }
        }
    }

    /// Emits a string property.
    pub fn property_text(&mut self, label: &str, value: &str) {
        self.property(label, None, value, false);
    }

    /// Emits an integer property with an optional unit.
    pub fn property_integer(&mut self, label: &str, unit: Option<&str>, value: i64) {
        self.property(label, unit, &value.to_string(), true);
    }

    /// Emits an unsigned integer property with an optional unit.
    pub fn property_uinteger(&mut self, label: &str, unit: Option<&str>, value: u64) {
        self.property(label, unit, &value.to_string(), true);
    }

    /// Emits a float property printed with `ndigits` fractional digits.
    pub fn property_float(&mut self, label: &str, unit: Option<&str>, value: f64, ndigits: usize) {
        self.property(label, unit, &format!("{value:.ndigits$}"), true);
    }

    /// Emits a boolean property.
    pub fn property_bool(&mut self, label: &str, value: bool) {
        self.property(label, None, if value { "true" } else { "false" }, true);
    }

    /// Emits a list of strings under `label`.
    pub fn property_list(&mut self, label: &str, data: &[String]) {
        match self.format {
            ExplainFormat::Text => {
                self.indent_text();
                self.output.push_str(label);
                self.output.push_str(": ");
                self.output.push_str(&data.join(", "));
                self.output.push('\n');
            }
            ExplainFormat::Xml => {
                self.xml_tag(label, X_OPENING);
                for item in data {
                    spaces(&mut self.output, self.indent * 2 + 2);
                    self.output.push_str("<Item>");
                    self.output.push_str(&escape_xml(item));
                    self.output.push_str("</Item>\n");
                }
                self.xml_tag(label, X_CLOSING);
            }
            ExplainFormat::Json => {
                self.json_line_ending();
                spaces(&mut self.output, self.indent * 2);
                self.output.push_str(&escape_json(label));
                self.output.push_str(": [");
                let items: Vec<String> = data.iter().map(|d| escape_json(d)).collect();
                self.output.push_str(&items.join(", "));
                self.output.push(']');
            }
            ExplainFormat::Yaml => {
                self.yaml_line_starting();
                self.output.push_str(label);
                self.output.push_str(": ");
                for item in data {
                    self.output.push('\n');
                    spaces(&mut self.output, self.indent * 2 + 2);
                    self.output.push_str("- ");
                    self.output.push_str(&escape_json(item));
                }
            }
        }
    }

    /// Emits an unlabeled list, for use inside an unlabeled group. Text and
    /// XML fall back to [`ExplainState::property_list`].
    pub fn property_list_nested(&mut self, label: &str, data: &[String]) {
        let items = || data.iter().map(|d| escape_json(d)).collect::<Vec<_>>().join(", ");
        match self.format {
            ExplainFormat::Text | ExplainFormat::Xml => self.property_list(label, data),
            ExplainFormat::Json => {
                self.json_line_ending();
                spaces(&mut self.output, self.indent * 2);
                self.output.push('[');
                self.output.push_str(&items());
                self.output.push(']');
            }
            ExplainFormat::Yaml => {
                self.yaml_line_starting();
                self.output.push_str("- [");
                self.output.push_str(&items());
                self.output.push(']');
            }
        }
    }

    /// Opens a group. `labeled` groups hold properties, unlabeled ones hold
    /// a list of unnamed items; `labelname` names the group inside its
    /// parent, if the parent is labeled.
    pub fn open_group(&mut self, objtype: &str, labelname: Option<&str>, labeled: bool) {
        match self.format {
            ExplainFormat::Text => {}
            ExplainFormat::Xml => {
                self.xml_tag(objtype, X_OPENING);
                self.indent += 1;
            }
            ExplainFormat::Json => {
                self.json_line_ending();
                spaces(&mut self.output, 2 * self.indent);
                if let Some(name) = labelname {
                    self.output.push_str(&escape_json(name));
                    self.output.push_str(": ");
                }
                self.output.push(if labeled { '{' } else { '[' });
                self.grouping_stack.push(0);
                self.indent += 1;
            }
            ExplainFormat::Yaml => {
                self.yaml_line_starting();
                match labelname {
                    Some(name) => {
                        self.output.push_str(name);
                        self.output.push_str(": ");
                        self.grouping_stack.push(1);
                    }
                    None => {
                        self.output.push_str("- ");
                        self.grouping_stack.push(0);
                    }
                }
                self.indent += 1;
            }
        }
    }

    /// Closes a group opened with the same arguments.
    pub fn close_group(&mut self, objtype: &str, _labelname: Option<&str>, labeled: bool) {
        match self.format {
            ExplainFormat::Text => {}
            ExplainFormat::Xml => {
                self.indent = self.indent.saturating_sub(1);
                self.xml_tag(objtype, X_CLOSING);
            }
            ExplainFormat::Json => {
                self.indent = self.indent.saturating_sub(1);
                self.output.push('\n');
                spaces(&mut self.output, 2 * self.indent);
                self.output.push(if labeled { '}' } else { ']' });
                self.grouping_stack.pop();
            }
            ExplainFormat::Yaml => {
                self.indent = self.indent.saturating_sub(1);
                self.grouping_stack.pop();
            }
        }
    }

    /// Sets up state for a group whose text is emitted into a separate
    /// buffer and spliced in later at `depth` extra levels.
    pub fn open_set_aside_group(
        &mut self,
        _objtype: &str,
        labelname: Option<&str>,
        _labeled: bool,
        depth: usize,
    ) {
        match self.format {
            ExplainFormat::Text => {}
            ExplainFormat::Xml => self.indent += depth,
            ExplainFormat::Json => {
                self.grouping_stack.push(0);
                self.indent += depth;
            }
            ExplainFormat::Yaml => {
                self.grouping_stack.push(i32::from(labelname.is_some()));
                self.indent += depth;
            }
        }
    }

    /// Pops a set-aside group, returning the state to pass back to
    /// [`ExplainState::restore_group`].
    pub fn save_group(&mut self, depth: usize) -> i32 {
        match self.format {
            ExplainFormat::Text => 0,
            ExplainFormat::Xml => {
                self.indent = self.indent.saturating_sub(depth);
                0
            }
            ExplainFormat::Json | ExplainFormat::Yaml => {
                self.indent = self.indent.saturating_sub(depth);
                self.grouping_stack.pop().unwrap_or(0)
            }
        }
    }

    /// Re-enters a group popped by [`ExplainState::save_group`].
    pub fn restore_group(&mut self, depth: usize, saved: i32) {
        match self.format {
            ExplainFormat::Text => {}
            ExplainFormat::Xml => self.indent += depth,
            ExplainFormat::Json | ExplainFormat::Yaml => {
                self.grouping_stack.push(saved);
                self.indent += depth;
            }
        }
    }

    /// Emits a group with no content.
    pub fn dummy_group(&mut self, objtype: &str, labelname: Option<&str>) {
        match self.format {
            ExplainFormat::Text => {}
            ExplainFormat::Xml => self.xml_tag(objtype, X_CLOSE_IMMEDIATE),
            ExplainFormat::Json => {
                self.json_line_ending();
                spaces(&mut self.output, 2 * self.indent);
                if let Some(name) = labelname {
                    self.output.push_str(&escape_json(name));
                    self.output.push_str(": ");
                }
                self.output.push_str(&escape_json(objtype));
            }
            ExplainFormat::Yaml => {
                self.yaml_line_starting();
                match labelname {
                    Some(name) => {
                        self.output.push_str(&escape_json(name));
                        self.output.push_str(": ");
                    }
                    None => self.output.push_str("- "),
                }
                self.output.push_str(&escape_json(objtype));
            }
        }
    }

    /// Emits the document prologue.
    pub fn begin_output(&mut self) {
        match self.format {
            ExplainFormat::Text => {}
            ExplainFormat::Xml => {
                self.output
                    .push_str(&format!("<explain xmlns=\"{EXPLAIN_XML_NAMESPACE}\">\n"));
                self.indent += 1;
            }
            ExplainFormat::Json => {
                self.output.push('[');
                self.grouping_stack.push(0);
                self.indent += 1;
            }
            ExplainFormat::Yaml => self.grouping_stack.push(0),
        }
    }

    /// Emits the document epilogue.
    pub fn end_output(&mut self) {
        match self.format {
            ExplainFormat::Text => {}
            ExplainFormat::Xml => {
                self.indent = self.indent.saturating_sub(1);
                self.output.push_str("</explain>");
            }
            ExplainFormat::Json => {
                self.indent = self.indent.saturating_sub(1);
                self.output.push_str("\n]");
                self.grouping_stack.pop();
            }
            ExplainFormat::Yaml => {
                self.grouping_stack.pop();
            }
        }
    }

    /// Separates consecutive plans in one document.
    pub fn separate_plans(&mut self) {
        if self.format == ExplainFormat::Text {
            self.output.push('\n');
        }
    }

    /// Redirects output into worker `n`'s buffer.
    pub(crate) fn open_worker(&mut self, n: usize) {
        let Some(ws) = self.workers_state.as_mut() else {
            return;
        };
        if n >= ws.worker_str.len() {
            return;
        }
        std::mem::swap(&mut self.output, &mut ws.worker_str[n]);
        let first = !ws.worker_inited[n];
        ws.worker_inited[n] = true;
        let saved = ws.worker_state_save[n];
        if first {
            self.open_set_aside_group("Worker", None, true, 2);
            if self.format != ExplainFormat::Text {
                self.property_integer("Worker Number", None, n as i64);
            }
        } else {
            self.restore_group(2, saved);
        }
        if self.format == ExplainFormat::Text {
            if self.output.is_empty() {
                self.indent_text();
                self.output.push_str(&format!("Worker {n}:  "));
            }
            self.indent += 1;
        }
    }

    /// Ends a section opened by [`ExplainState::open_worker`]. A text line
    /// left unfinished is dropped.
    pub(crate) fn close_worker(&mut self, n: usize) {
        if self
            .workers_state
            .as_ref()
            .map_or(true, |ws| n >= ws.worker_str.len())
        {
            return;
        }
        let saved = self.save_group(2);
        if self.format == ExplainFormat::Text {
            while !self.output.is_empty() && !self.output.ends_with('\n') {
                self.output.pop();
            }
            self.indent = self.indent.saturating_sub(1);
        }
        if let Some(ws) = self.workers_state.as_mut() {
            ws.worker_state_save[n] = saved;
            std::mem::swap(&mut self.output, &mut ws.worker_str[n]);
        }
    }

    /// Appends every worker buffer that received output, in worker order.
    pub(crate) fn flush_workers_state(&mut self) {
        let Some(ws) = self.workers_state.take() else {
            return;
        };
        self.open_group("Workers", Some("Workers"), false);
        for (text, inited) in ws.worker_str.iter().zip(&ws.worker_inited) {
            if *inited {
                self.open_group("Worker", None, true);
                self.output.push_str(text);
                self.close_group("Worker", None, true);
            }
        }
        self.close_group("Workers", Some("Workers"), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::explain::hooks::ExplainRegistry;
    use std::sync::Arc;

    fn state(format: ExplainFormat) -> ExplainState {
        let mut es = ExplainState::with_registry(
            Arc::new(InMemoryCatalog::new()),
            Arc::new(ExplainRegistry::new()),
        );
        es.format = format;
        es
    }

    fn sample(format: ExplainFormat) -> String {
        let mut es = state(format);
        es.begin_output();
        es.open_group("Query", None, true);
        es.open_group("Plan", Some("Plan"), true);
        es.property_text("Node Type", "Seq Scan");
        es.property_float("Total Cost", None, 35.5, 2);
        es.property_bool("Parallel Aware", false);
        es.property_list("Output", &["a".to_string(), "b<c".to_string()]);
        es.close_group("Plan", Some("Plan"), true);
        es.property_float("Planning Time", Some("ms"), 0.25, 3);
        es.close_group("Query", None, true);
        es.end_output();
        assert_eq!(es.grouping_depth(), 0);
        es.output
    }

    #[test]
    fn text_properties() {
        let mut es = state(ExplainFormat::Text);
        es.indent = 1;
        es.property_integer("Heap Fetches", None, 3);
        es.property_float("Planning Time", Some("ms"), 0.1234, 3);
        es.property_list("Sort Key", &["a".into(), "b DESC".into()]);
        assert_eq!(
            es.output,
            "  Heap Fetches: 3\n  Planning Time: 0.123 ms\n  Sort Key: a, b DESC\n"
        );
    }

    #[test]
    fn json_layout() {
        let out = sample(ExplainFormat::Json);
        let expected = "[\n  {\n    \"Plan\": {\n      \"Node Type\": \"Seq Scan\",\n      \"Total Cost\": 35.50,\n      \"Parallel Aware\": false,\n      \"Output\": [\"a\", \"b<c\"]\n    },\n    \"Planning Time\": 0.250\n  }\n]";
        assert_eq!(out, expected);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["Plan"]["Node Type"], "Seq Scan");
    }

    #[test]
    fn xml_layout() {
        let out = sample(ExplainFormat::Xml);
        let expected = "<explain xmlns=\"http://www.postgresql.org/2009/explain\">\n  <Query>\n    <Plan>\n      <Node-Type>Seq Scan</Node-Type>\n      <Total-Cost>35.50</Total-Cost>\n      <Parallel-Aware>false</Parallel-Aware>\n      <Output>\n        <Item>a</Item>\n        <Item>b&lt;c</Item>\n      </Output>\n    </Plan>\n    <Planning-Time>0.250</Planning-Time>\n  </Query>\n</explain>";
        assert_eq!(out, expected);
    }

    #[test]
    fn yaml_layout() {
        let out = sample(ExplainFormat::Yaml);
        let expected = "- Plan: \n    Node Type: \"Seq Scan\"\n    Total Cost: 35.50\n    Parallel Aware: false\n    Output: \n      - \"a\"\n      - \"b<c\"\n  Planning Time: 0.250";
        assert_eq!(out, expected);
        let parsed: serde_yaml::Value = serde_yaml::from_str(&out).unwrap();
        assert_eq!(parsed[0]["Plan"]["Node Type"].as_str(), Some("Seq Scan"));
    }

    #[test]
    fn dummy_and_nested_lists() {
        let mut es = state(ExplainFormat::Json);
        es.begin_output();
        es.open_group("Items", Some("Items"), false);
        es.property_list_nested("Item", &["x".into()]);
        es.dummy_group("Empty", None);
        es.close_group("Items", Some("Items"), false);
        es.end_output();
        assert_eq!(es.output, "[\n  \"Items\": [\n    [\"x\"],\n    \"Empty\"\n  ]\n]");
    }

    #[test]
    fn escaping() {
        assert_eq!(escape_xml("a&b\r"), "a&amp;b&#x0d;");
        assert_eq!(escape_json("say \"hi\"\n"), "\"say \\\"hi\\\"\\n\"");
    }

    #[test]
    fn worker_sections_are_flushed_in_order() {
        let mut es = state(ExplainFormat::Text);
        es.indent = 2;
        es.workers_state = Some(WorkersState::new(3));
        es.open_worker(1);
        es.output.push_str("actual rows=5\n");
        es.close_worker(1);
        es.open_worker(0);
        es.close_worker(0);
        es.open_worker(2);
        es.property_text("Sort Method", "quicksort");
        es.close_worker(2);
        es.open_worker(1);
        es.property_integer("Heap Fetches", None, 2);
        es.close_worker(1);
        es.flush_workers_state();
        assert_eq!(
            es.output,
            "    Worker 1:  actual rows=5\n      Heap Fetches: 2\n    Worker 2:  Sort Method: quicksort\n"
        );
        assert!(es.workers_state.is_none());
    }

    #[test]
    fn json_workers_are_grouped() {
        let mut es = state(ExplainFormat::Json);
        es.begin_output();
        es.open_group("Plan", None, true);
        es.workers_state = Some(WorkersState::new(1));
        es.open_worker(0);
        es.property_float("Actual Rows", None, 5.0, 2);
        es.close_worker(0);
        es.flush_workers_state();
        es.close_group("Plan", None, true);
        es.end_output();
        let parsed: serde_json::Value = serde_json::from_str(&es.output).unwrap();
        assert_eq!(parsed[0]["Workers"][0]["Worker Number"], 0);
        assert_eq!(es.grouping_depth(), 0);
    }
}
