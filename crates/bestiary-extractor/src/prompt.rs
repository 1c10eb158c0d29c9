//! Deterministic prompt construction from a registry of task templates
//!
//! A [`PromptFactory`] owns one [`PromptTemplate`] per registered
//! [`TaskKind`]. Callers hand it [`ContextFragment`]s; each fragment kind is
//! dispatched to a setter on a [`PromptBuilder`], the builder checks that the
//! task's required keys are present, and the template is rendered.
//!
//! Templates use a small Jinja-compatible subset: `{{ key }}` or
//! `{{ key.field }}` placeholders and non-nested `{% if key %}...{% endif %}`
//! blocks. Undefined placeholders are errors.

use crate::error::PromptError;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Extension of template files in a template directory
pub const TEMPLATE_EXTENSION: &str = "j2";

/// Tasks the model has a prebuilt prompt for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Structured JSON extraction of a record batch
    JsonExtraction,
    /// Cross-check extracted data against reference values
    Validation,
}

impl TaskKind {
    /// All registered tasks
    pub const ALL: [TaskKind; 2] = [TaskKind::JsonExtraction, TaskKind::Validation];

    /// Registry name of the task
    pub fn name(&self) -> &'static str {
        match self {
            TaskKind::JsonExtraction => "json_extraction",
            TaskKind::Validation => "validation",
        }
    }

    /// Look up a task by registry name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Context keys a prompt for this task cannot be built without
    pub fn required_context_keys(&self) -> &'static [&'static str] {
        match self {
            TaskKind::JsonExtraction => &["schema", "payload"],
            TaskKind::Validation => &["payload", "cross_validation"],
        }
    }

    /// Template compiled into the binary
    pub fn builtin_template(&self) -> &'static str {
        match self {
            TaskKind::JsonExtraction => include_str!("../templates/json_extraction.j2"),
            TaskKind::Validation => include_str!("../templates/validation.j2"),
        }
    }

    /// Describe this task
    pub fn spec(&self) -> TaskSpec {
        TaskSpec {
            name: self.name().to_string(),
            required_context_keys: self
                .required_context_keys()
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }

    fn valid_names() -> Vec<String> {
        Self::ALL.iter().map(|t| t.name().to_string()).collect()
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a prompt builder for a task requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Registry name
    pub name: String,
    /// Keys that must be present before rendering
    pub required_context_keys: BTreeSet<String>,
}

/// A piece of context handed to the prompt factory
#[derive(Debug, Clone, PartialEq)]
pub enum ContextFragment {
    /// Target JSON schema (field → description)
    Schema(Value),
    /// Concrete data the model should process
    Payload(Value),
    /// Few-shot example: an input/output pair
    Example {
        /// Example input as the model would see it
        input: String,
        /// Expected output for that input
        output: Value,
    },
    /// Reference values for the validation task
    CrossValidation(Value),
}

impl ContextFragment {
    /// Fragment name as used by [`PromptFactory::create_prompt_named`]
    pub fn name(&self) -> &'static str {
        match self {
            ContextFragment::Schema(_) => "schema",
            ContextFragment::Payload(_) => "payload",
            ContextFragment::Example { .. } => "example",
            ContextFragment::CrossValidation(_) => "cross_validation",
        }
    }

    /// Map a named value onto a fragment
    ///
    /// `example` expects an object with `input_example` and
    /// `output_example` fields. Returns `None` for names without a setter or
    /// an example missing its input.
    pub fn from_named(name: &str, value: Value) -> Option<Self> {
        match name {
            "schema" => Some(ContextFragment::Schema(value)),
            "payload" => Some(ContextFragment::Payload(value)),
            "cross_validation" => Some(ContextFragment::CrossValidation(value)),
            "example" => {
                let mut fields = match value {
                    Value::Object(map) => map,
                    _ => return None,
                };
                let input = match fields.remove("input_example")? {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                let output = fields.remove("output_example").unwrap_or(Value::Null);
                Some(ContextFragment::Example { input, output })
            }
            _ => None,
        }
    }
}

/// Context values keyed by name, filled incrementally by a builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptContext {
    values: BTreeMap<String, Value>,
}

impl PromptContext {
    /// Empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Check whether a top-level key is present
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Resolve a dotted path such as `example.input`
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// Top-level keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Final prompt text sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt(String);

impl RenderedPrompt {
    /// Borrow the prompt text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Take the prompt text
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RenderedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RenderedPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Var(String),
    If { key: String, body: Vec<Segment> },
}

/// A named template parsed once and rendered many times
#[derive(Debug, Clone, PartialEq)]
pub struct PromptTemplate {
    name: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::Malformed`] on unclosed tags, nested or
    /// unbalanced `if` blocks, and unsupported statements.
    pub fn new(name: impl Into<String>, source: &str) -> Result<Self, PromptError> {
        let name = name.into();
        let segments = parse_template(&name, source)?;
        Ok(Self { name, segments })
    }

    /// Template name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Substitute the context into the template
    ///
    /// # Examples
    ///
    /// ```
    /// use bestiary_extractor::{PromptContext, PromptTemplate};
    /// use serde_json::json;
    ///
    /// let template = PromptTemplate::new("greeting", "Hello {{ who }}!").unwrap();
    /// let mut context = PromptContext::new();
    /// context.insert("who", json!("world"));
    /// assert_eq!(template.render(&context).unwrap().as_str(), "Hello world!");
    /// ```
    pub fn render(&self, context: &PromptContext) -> Result<RenderedPrompt, PromptError> {
        let mut out = String::new();
        self.render_segments(&self.segments, context, &mut out)?;
        Ok(RenderedPrompt(out))
    }

    fn render_segments(
        &self,
        segments: &[Segment],
        context: &PromptContext,
        out: &mut String,
    ) -> Result<(), PromptError> {
        for segment in segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Var(key) => {
                    let value = context.lookup(key).ok_or_else(|| {
                        PromptError::UndefinedPlaceholder {
                            template: self.name.clone(),
                            key: key.clone(),
                        }
                    })?;
                    out.push_str(&display_value(value));
                }
                Segment::If { key, body } => {
                    if context.lookup(key).is_some_and(is_truthy) {
                        self.render_segments(body, context, out)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Number(_) => true,
    }
}

fn parse_template(name: &str, source: &str) -> Result<Vec<Segment>, PromptError> {
    let malformed = |reason: &str| PromptError::Malformed {
        template: name.to_string(),
        reason: reason.to_string(),
    };

    let mut root = Vec::new();
    let mut open: Option<(String, Vec<Segment>)> = None;
    let mut rest = source;

    while !rest.is_empty() {
        let next = match (rest.find("{{"), rest.find("{%")) {
            (Some(a), Some(b)) => a.min(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => rest.len(),
        };

        let target = match open.as_mut() {
            Some((_, body)) => body,
            None => &mut root,
        };
        if next > 0 {
            target.push(Segment::Text(rest[..next].to_string()));
        }
        let tag = &rest[next..];
        if tag.is_empty() {
            break;
        }

        if tag.starts_with("{{") {
            let end = tag.find("}}").ok_or_else(|| malformed("unclosed '{{'"))?;
            let key = tag[2..end].trim();
            if key.is_empty() {
                return Err(malformed("empty placeholder"));
            }
            target.push(Segment::Var(key.to_string()));
            rest = &tag[end + 2..];
        } else {
            let end = tag.find("%}").ok_or_else(|| malformed("unclosed '{%'"))?;
            let statement = tag[2..end].trim();
            if let Some(key) = statement.strip_prefix("if ") {
                if open.is_some() {
                    return Err(malformed("nested 'if' blocks are not supported"));
                }
                open = Some((key.trim().to_string(), Vec::new()));
            } else if statement == "endif" {
                let (key, body) = open
                    .take()
                    .ok_or_else(|| malformed("'endif' without 'if'"))?;
                root.push(Segment::If { key, body });
            } else {
                return Err(malformed(&format!("unsupported statement '{}'", statement)));
            }
            rest = &tag[end + 2..];
            // Block tags swallow the newline that follows them
            rest = rest.strip_prefix('\n').unwrap_or(rest);
        }
    }

    if open.is_some() {
        return Err(malformed("unclosed 'if' block"));
    }
    Ok(root)
}

/// Assembles the context for one task and validates it
#[derive(Debug, Clone)]
pub struct PromptBuilder<'a> {
    task: TaskKind,
    template: &'a PromptTemplate,
    context: PromptContext,
}

impl<'a> PromptBuilder<'a> {
    /// Builder for `task` rendering with `template`
    pub fn new(task: TaskKind, template: &'a PromptTemplate) -> Self {
        Self {
            task,
            template,
            context: PromptContext::new(),
        }
    }

    /// Task being built
    pub fn task(&self) -> TaskKind {
        self.task
    }

    /// Define the target JSON schema (stored pretty-printed under `schema`)
    pub fn add_schema(&mut self, schema: &Value) -> &mut Self {
        self.context.insert("schema", Value::String(pretty(schema)));
        self
    }

    /// Set the concrete payload to process
    pub fn add_payload(&mut self, payload: &Value) -> &mut Self {
        let text = match payload {
            Value::String(s) => s.clone(),
            other => pretty(other),
        };
        self.context.insert("payload", Value::String(text));
        self
    }

    /// Add a few-shot example; both halves land under `example` in one call
    pub fn add_example(&mut self, input: &str, output: &Value) -> &mut Self {
        self.context.insert(
            "example",
            json!({
                "input": input,
                "output": pretty(output),
            }),
        );
        self
    }

    /// Set reference values for cross validation
    pub fn add_cross_validation(&mut self, reference: &Value) -> &mut Self {
        self.context
            .insert("cross_validation", Value::String(pretty(reference)));
        self
    }

    /// Dispatch a fragment to its setter
    pub fn apply(&mut self, fragment: &ContextFragment) -> &mut Self {
        match fragment {
            ContextFragment::Schema(schema) => self.add_schema(schema),
            ContextFragment::Payload(payload) => self.add_payload(payload),
            ContextFragment::Example { input, output } => self.add_example(input, output),
            ContextFragment::CrossValidation(reference) => self.add_cross_validation(reference),
        }
    }

    /// Validate the context and produce a renderable prompt
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::MissingContext`] naming every required key
    /// that was never set.
    pub fn build(self) -> Result<Prompt<'a>, PromptError> {
        let missing: Vec<String> = self
            .task
            .required_context_keys()
            .iter()
            .filter(|k| !self.context.contains(k))
            .map(|k| k.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(PromptError::MissingContext {
                task: self.task.name().to_string(),
                missing,
            });
        }

        Ok(Prompt {
            template: self.template,
            context: self.context,
        })
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// A validated template plus its complete context
#[derive(Debug, Clone)]
pub struct Prompt<'a> {
    template: &'a PromptTemplate,
    context: PromptContext,
}

impl Prompt<'_> {
    /// Context the prompt will be rendered with
    pub fn context(&self) -> &PromptContext {
        &self.context
    }

    /// Render the final prompt text
    pub fn render(&self) -> Result<RenderedPrompt, PromptError> {
        self.template.render(&self.context)
    }
}

/// Creates the right builder and prompt for a given task name
#[derive(Debug, Clone)]
pub struct PromptFactory {
    templates: HashMap<TaskKind, PromptTemplate>,
    language_directive: Option<String>,
}

impl PromptFactory {
    /// Factory using the templates compiled into the binary
    pub fn builtin() -> Result<Self, PromptError> {
        let mut templates = HashMap::new();
        for task in TaskKind::ALL {
            templates.insert(task, PromptTemplate::new(task.name(), task.builtin_template())?);
        }

        Ok(Self {
            templates,
            language_directive: None,
        })
    }

    /// Factory loading `<task>.j2` for every registered task from `dir`
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::TemplateNotFound`] if the directory or any
    /// task's template is missing, so configuration errors surface at
    /// startup rather than on the first render.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, PromptError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(PromptError::TemplateNotFound {
                task: "*".to_string(),
                path: dir.display().to_string(),
            });
        }

        let mut templates = HashMap::new();
        for task in TaskKind::ALL {
            let path = dir.join(format!("{}.{}", task.name(), TEMPLATE_EXTENSION));
            let source =
                std::fs::read_to_string(&path).map_err(|_| PromptError::TemplateNotFound {
                    task: task.name().to_string(),
                    path: path.display().to_string(),
                })?;
            debug!("Loaded template {}", path.display());
            templates.insert(task, PromptTemplate::new(task.name(), &source)?);
        }

        Ok(Self {
            templates,
            language_directive: None,
        })
    }

    /// Prefix every rendered prompt with an instruction (e.g. answer language)
    pub fn with_language_directive(mut self, directive: impl Into<String>) -> Self {
        let directive = directive.into();
        self.language_directive = (!directive.trim().is_empty()).then_some(directive);
        self
    }

    /// Registered tasks
    pub fn tasks(&self) -> Vec<TaskSpec> {
        TaskKind::ALL.iter().map(TaskKind::spec).collect()
    }

    /// Return a builder for the named task
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::UnknownTask`] listing the valid task names.
    pub fn new_builder(&self, task: &str) -> Result<PromptBuilder<'_>, PromptError> {
        let unknown = || PromptError::UnknownTask {
            task: task.to_string(),
            valid: TaskKind::valid_names(),
        };
        let kind = TaskKind::from_name(task).ok_or_else(unknown)?;
        let template = self.templates.get(&kind).ok_or_else(unknown)?;
        Ok(PromptBuilder::new(kind, template))
    }

    /// Build and render a prompt in a single call
    pub fn create_prompt<'f>(
        &self,
        task: &str,
        fragments: impl IntoIterator<Item = &'f ContextFragment>,
    ) -> Result<RenderedPrompt, PromptError> {
        let mut builder = self.new_builder(task)?;
        for fragment in fragments {
            builder.apply(fragment);
        }
        let rendered = builder.build()?.render()?;
        Ok(self.finish(rendered))
    }

    /// Like [`create_prompt`](Self::create_prompt), with fragments given by name
    ///
    /// Names without a matching setter are logged and skipped, since tasks
    /// tolerate extra hints.
    pub fn create_prompt_named<S: AsRef<str>>(
        &self,
        task: &str,
        fragments: impl IntoIterator<Item = (S, Value)>,
    ) -> Result<RenderedPrompt, PromptError> {
        let mapped: Vec<ContextFragment> = fragments
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.as_ref();
                let fragment = ContextFragment::from_named(name, value);
                if fragment.is_none() {
                    warn!("No setter for context fragment '{}' on task '{}'", name, task);
                }
                fragment
            })
            .collect();
        self.create_prompt(task, &mapped)
    }

    fn finish(&self, rendered: RenderedPrompt) -> RenderedPrompt {
        match &self.language_directive {
            Some(directive) => RenderedPrompt(format!("{}\n\n{}", directive.trim_end(), rendered.0)),
            None => rendered,
        }
    }
}
