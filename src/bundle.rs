//! Shared result aggregation for a validation run.
//!
//! An [`ErrorBundle`] is handed to every check. It collects messages,
//! maintains the derived message-count tree, stores named resources that
//! checks share with each other, and tracks the nested-package state stack
//! used when an archive contains further archives.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::Serialize;

use crate::context::{ContextGenerator, ContextSnippet};
use crate::detect::PackageType;

/// Message severity. Errors block publication, warnings block it under the
/// default policy, notices are informational.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks success unconditionally.
    Error,
    /// Blocks success when warnings count toward failure.
    Warning,
    /// Never blocks success.
    Notice,
}

/// A message description: either a single block of text or an ordered list
/// of lines.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Description {
    /// Free-form text.
    Text(String),
    /// An ordered list of description lines.
    Lines(Vec<String>),
}

impl Default for Description {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl Description {
    /// True when no description was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Lines(lines) => lines.is_empty(),
        }
    }
}

impl From<&str> for Description {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Description {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<String>> for Description {
    fn from(lines: Vec<String>) -> Self {
        Self::Lines(lines)
    }
}

/// The file a message refers to. Crossing a nested-package boundary on the
/// way out prepends the enclosing archive's name, turning the trace into
/// an ordered sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileTrace {
    /// A single in-archive path; empty when the message is not tied to a
    /// file.
    Path(String),
    /// An ordered outer-to-inner trace through nested packages.
    Nested(Vec<String>),
}

impl Default for FileTrace {
    fn default() -> Self {
        Self::Path(String::new())
    }
}

impl FileTrace {
    /// True when the trace carries no file information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Path(path) => path.is_empty(),
            Self::Nested(segments) => segments.is_empty(),
        }
    }

    /// Number of trace segments.
    #[must_use]
    pub fn depth(&self) -> usize {
        match self {
            Self::Path(_) => 1,
            Self::Nested(segments) => segments.len(),
        }
    }
}

impl std::fmt::Display for FileTrace {
    /// Joins nested traces with `" > "`, substituting `(none)` for an
    /// empty terminal filename.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => f.write_str(path),
            Self::Nested(segments) => {
                let mut parts: Vec<&str> = segments.iter().map(String::as_str).collect();
                if let Some(last) = parts.last_mut()
                    && last.is_empty()
                {
                    *last = "(none)";
                }
                f.write_str(&parts.join(" > "))
            }
        }
    }
}

/// A recorded validation message. Immutable after creation except for the
/// file trace, which grows one segment per nested-package boundary.
#[derive(Clone, Debug, Serialize)]
pub struct Message {
    /// Unique identifier within the run.
    pub uid: String,
    /// Hierarchical message identifier.
    pub id: Vec<String>,
    /// Severity of the message.
    #[serde(rename = "type")]
    pub severity: Severity,
    /// Short human-readable message.
    pub message: String,
    /// Longer description, possibly a list of lines.
    pub description: Description,
    /// File trace; see [`FileTrace`].
    pub file: FileTrace,
    /// 1-based line number, 0 when unknown.
    pub line: u32,
    /// 0-based column, 0 when unknown.
    pub column: u32,
    /// Tier the message was recorded at.
    pub tier: u8,
    /// Rendered context snippet, when available.
    pub context: Option<ContextSnippet>,
}

/// A node of the derived message-count tree. Counts at a node equal the
/// sum over all messages whose id path passes through or ends at it.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MessageNode {
    /// Errors at or below this node.
    pub errors: u32,
    /// Warnings at or below this node.
    pub warnings: u32,
    /// Notices at or below this node.
    pub notices: u32,
    /// Uids of messages whose id terminates exactly here.
    pub messages: Vec<String>,
    /// Child nodes keyed by the next id segment.
    pub children: BTreeMap<String, MessageNode>,
}

impl MessageNode {
    /// Looks up a descendant node by id path.
    #[must_use]
    pub fn node(&self, path: &[&str]) -> Option<&Self> {
        path.iter()
            .try_fold(self, |node, segment| node.children.get(*segment))
    }

    /// Total message count at this node.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.errors + self.warnings + self.notices
    }

    fn bump(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.errors += 1,
            Severity::Warning => self.warnings += 1,
            Severity::Notice => self.notices += 1,
        }
    }
}

/// Context supplied when recording a message: either a pre-rendered
/// snippet or a source to render one from at the message's position.
pub enum MessageContext<'a> {
    /// Already-rendered snippet lines.
    Snippet(ContextSnippet),
    /// Render from this source at the message's line and column.
    Source(&'a ContextGenerator),
}

/// Saved parent state while a nested package is being validated.
struct StateSnapshot {
    errors: Vec<Message>,
    warnings: Vec<Message>,
    notices: Vec<Message>,
    detected_type: PackageType,
    message_tree: MessageNode,
    resources: HashMap<String, Rc<dyn Any>>,
    pushable_resources: HashMap<String, Rc<dyn Any>>,
}

/// The shared, mutable aggregation object passed to every check.
pub struct ErrorBundle {
    errors: Vec<Message>,
    warnings: Vec<Message>,
    notices: Vec<Message>,
    message_tree: MessageNode,
    tier: u8,
    detected_type: PackageType,
    resources: HashMap<String, Rc<dyn Any>>,
    pushable_resources: HashMap<String, Rc<dyn Any>>,
    package_stack: Vec<String>,
    snapshots: Vec<StateSnapshot>,
    supported_versions: Option<Vec<String>>,
    reject: bool,
    determined: bool,
    unfinished: bool,
    next_uid: u64,
}

impl ErrorBundle {
    /// Creates a fresh bundle. A `determined` bundle keeps running later
    /// tiers even after a tier records errors; an undetermined bundle
    /// short-circuits.
    #[must_use]
    pub fn new(determined: bool) -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            notices: Vec::new(),
            message_tree: MessageNode::default(),
            tier: 1,
            detected_type: PackageType::Unknown,
            resources: HashMap::new(),
            pushable_resources: HashMap::new(),
            package_stack: Vec::new(),
            snapshots: Vec::new(),
            supported_versions: None,
            reject: false,
            determined,
            unfinished: false,
            next_uid: 0,
        }
    }

    /// Starts recording an error.
    pub fn error<I, S>(&mut self, id: I, message: impl Into<String>) -> MessageBuilder<'_, '_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builder(Severity::Error, id, message)
    }

    /// Starts recording a warning.
    pub fn warning<I, S>(&mut self, id: I, message: impl Into<String>) -> MessageBuilder<'_, '_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builder(Severity::Warning, id, message)
    }

    /// Starts recording a notice.
    pub fn notice<I, S>(&mut self, id: I, message: impl Into<String>) -> MessageBuilder<'_, '_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builder(Severity::Notice, id, message)
    }

    fn builder<I, S>(
        &mut self,
        severity: Severity,
        id: I,
        message: impl Into<String>,
    ) -> MessageBuilder<'_, '_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MessageBuilder {
            message: Message {
                uid: String::new(),
                id: id.into_iter().map(Into::into).collect(),
                severity,
                message: message.into(),
                description: Description::default(),
                file: FileTrace::default(),
                line: 0,
                column: 0,
                tier: 0,
                context: None,
            },
            tier: None,
            context: None,
            bundle: self,
        }
    }

    /// Recorded errors, in order.
    #[must_use]
    pub fn errors(&self) -> &[Message] {
        &self.errors
    }

    /// Recorded warnings, in order.
    #[must_use]
    pub fn warnings(&self) -> &[Message] {
        &self.warnings
    }

    /// Recorded notices, in order.
    #[must_use]
    pub fn notices(&self) -> &[Message] {
        &self.notices
    }

    /// Root of the message-count tree.
    #[must_use]
    pub const fn message_tree(&self) -> &MessageNode {
        &self.message_tree
    }

    /// Whether validation has failed so far.
    #[must_use]
    pub fn failed(&self, fail_on_warnings: bool) -> bool {
        !self.errors.is_empty() || (fail_on_warnings && !self.warnings.is_empty())
    }

    /// Current tier.
    #[must_use]
    pub const fn tier(&self) -> u8 {
        self.tier
    }

    /// Sets the current tier; the dispatcher calls this as it walks tiers.
    pub fn set_tier(&mut self, tier: u8) {
        self.tier = tier;
    }

    /// Detected package type.
    #[must_use]
    pub const fn detected_type(&self) -> PackageType {
        self.detected_type
    }

    /// Records the detected package type; the last call wins.
    pub fn set_type(&mut self, detected: PackageType) {
        self.detected_type = detected;
    }

    /// Terminal-reject verdict flag.
    #[must_use]
    pub const fn rejected(&self) -> bool {
        self.reject
    }

    /// Marks the package as rejected regardless of severity counting.
    pub fn set_reject(&mut self, reject: bool) {
        self.reject = reject;
    }

    /// Whether the bundle keeps running tiers after failures.
    #[must_use]
    pub const fn is_determined(&self) -> bool {
        self.determined
    }

    /// Whether the run was aborted by tier short-circuiting.
    #[must_use]
    pub const fn unfinished(&self) -> bool {
        self.unfinished
    }

    /// Marks the run as aborted before the final tier.
    pub fn mark_unfinished(&mut self) {
        self.unfinished = true;
    }

    /// Declared supported application versions, when known.
    #[must_use]
    pub fn supported_versions(&self) -> Option<&[String]> {
        self.supported_versions.as_deref()
    }

    /// Declares the application versions the package claims to support.
    pub fn set_supported_versions(&mut self, versions: Vec<String>) {
        self.supported_versions = Some(versions);
    }

    /// Saves a named resource for later checks. Pushable resources remain
    /// visible inside nested packages; plain resources do not.
    pub fn save_resource<T: 'static>(&mut self, name: &str, value: T, pushable: bool) {
        let table = if pushable {
            &mut self.pushable_resources
        } else {
            &mut self.resources
        };
        table.insert(name.to_owned(), Rc::new(value));
    }

    /// Fetches a previously saved resource. A missing resource is a
    /// normal checked condition, not an error.
    #[must_use]
    pub fn resource<T: 'static>(&self, name: &str) -> Option<Rc<T>> {
        self.resources
            .get(name)
            .or_else(|| self.pushable_resources.get(name))
            .and_then(|value| Rc::clone(value).downcast::<T>().ok())
    }

    /// Whether a resource with this name exists in either table.
    #[must_use]
    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.contains_key(name) || self.pushable_resources.contains_key(name)
    }

    /// True when validation is currently inside a nested package.
    #[must_use]
    pub fn is_nested_package(&self) -> bool {
        !self.package_stack.is_empty()
    }

    /// Current nested-package depth.
    #[must_use]
    pub fn nesting_depth(&self) -> usize {
        self.package_stack.len()
    }

    /// Saves the current state and begins accumulating fresh state for a
    /// nested package named `label`. Pushable resources stay visible.
    pub fn push_state(&mut self, label: &str) {
        self.snapshots.push(StateSnapshot {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
            notices: std::mem::take(&mut self.notices),
            detected_type: std::mem::replace(&mut self.detected_type, PackageType::Unknown),
            message_tree: std::mem::take(&mut self.message_tree),
            resources: std::mem::take(&mut self.resources),
            pushable_resources: self.pushable_resources.clone(),
        });
        self.package_stack.push(label.to_owned());
    }

    /// Restores the most recent saved state and replays every message the
    /// nested scope accumulated, with the nested package's name prepended
    /// to each file trace.
    ///
    /// # Panics
    ///
    /// Panics when no state was pushed; an unbalanced pop is a programming
    /// error, not a recoverable condition.
    pub fn pop_state(&mut self) {
        let snapshot = self
            .snapshots
            .pop()
            .unwrap_or_else(|| panic!("pop_state without matching push_state"));
        let label = self
            .package_stack
            .pop()
            .unwrap_or_else(|| panic!("package stack empty on pop_state"));

        let nested_errors = std::mem::replace(&mut self.errors, snapshot.errors);
        let nested_warnings = std::mem::replace(&mut self.warnings, snapshot.warnings);
        let nested_notices = std::mem::replace(&mut self.notices, snapshot.notices);
        self.detected_type = snapshot.detected_type;
        self.message_tree = snapshot.message_tree;
        self.resources = snapshot.resources;
        self.pushable_resources = snapshot.pushable_resources;

        for message in nested_errors
            .into_iter()
            .chain(nested_warnings)
            .chain(nested_notices)
        {
            self.replay(message, &label);
        }
    }

    /// Re-records a message that crossed a nested-package boundary.
    fn replay(&mut self, mut message: Message, label: &str) {
        let mut trace = vec![label.to_owned()];
        match message.file {
            FileTrace::Path(path) => trace.push(path),
            FileTrace::Nested(segments) => trace.extend(segments),
        }
        message.file = FileTrace::Nested(trace);
        self.record(message);
    }

    /// Final accumulation path for every message: assigns the uid, updates
    /// the message tree, and appends to the severity's sequence.
    fn record(&mut self, mut message: Message) {
        self.next_uid += 1;
        message.uid = format!("{:016x}", self.next_uid);

        if !message.id.is_empty() {
            let mut node = &mut self.message_tree;
            for segment in &message.id {
                node = node.children.entry(segment.clone()).or_default();
                node.bump(message.severity);
            }
            node.messages.push(message.uid.clone());
        }

        log::debug!(
            "recorded {:?} {} at tier {}",
            message.severity,
            message.id.join("/"),
            message.tier
        );
        match message.severity {
            Severity::Error => self.errors.push(message),
            Severity::Warning => self.warnings.push(message),
            Severity::Notice => self.notices.push(message),
        }
    }
}

/// In-progress message; finish with [`MessageBuilder::emit`].
#[must_use = "a message does not exist until emit() is called"]
pub struct MessageBuilder<'b, 'c> {
    bundle: &'b mut ErrorBundle,
    message: Message,
    tier: Option<u8>,
    context: Option<MessageContext<'c>>,
}

impl<'b, 'c> MessageBuilder<'b, 'c> {
    /// Attaches a description.
    pub fn description(mut self, description: impl Into<Description>) -> Self {
        self.message.description = description.into();
        self
    }

    /// Attaches a single-file trace.
    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.message.file = FileTrace::Path(file.into());
        self
    }

    /// Attaches a pre-built nested file trace.
    pub fn file_trace(mut self, trace: FileTrace) -> Self {
        self.message.file = trace;
        self
    }

    /// Attaches a 1-based line number.
    pub fn line(mut self, line: u32) -> Self {
        self.message.line = line;
        self
    }

    /// Attaches a 0-based column.
    pub fn column(mut self, column: u32) -> Self {
        self.message.column = column;
        self
    }

    /// Overrides the tier; defaults to the bundle's current tier.
    pub fn tier(mut self, tier: u8) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Attaches context, either pre-rendered or rendered at emit time from
    /// a source at the message's line and column.
    pub fn context(mut self, context: MessageContext<'c>) -> Self {
        self.context = Some(context);
        self
    }

    /// Records the message on the bundle.
    pub fn emit(self) {
        let Self {
            bundle,
            mut message,
            tier,
            context,
        } = self;
        message.tier = tier.unwrap_or(bundle.tier);
        message.context = context.map(|request| match request {
            MessageContext::Snippet(snippet) => snippet,
            MessageContext::Source(source) => source.snippet(message.line, message.column),
        });
        bundle.record(message);
    }
}
