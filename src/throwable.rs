use serde_json::{Map, Value};
use std::error::Error;

/// One exception in a cause chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrowableNode {
    /// Canonical type name of the exception, when known.
    pub class_name: Option<String>,
    pub message: Option<String>,
    /// Fully formatted, multi-line stack trace.
    pub stack_trace: Option<String>,
}

impl ThrowableNode {
    pub fn new(class_name: impl Into<String>, message: Option<String>) -> Self {
        Self {
            class_name: Some(class_name.into()),
            message,
            stack_trace: None,
        }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    /// Set the stack trace from pre-split lines, joined with `\n`.
    pub fn with_stack_trace_lines<I, S>(self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = lines
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        self.with_stack_trace(joined)
    }

    fn headline(&self) -> String {
        match (&self.class_name, &self.message) {
            (Some(class), Some(msg)) => format!("{}: {}", class, msg),
            (Some(class), None) => class.clone(),
            (None, Some(msg)) => msg.clone(),
            (None, None) => String::new(),
        }
    }
}

/// Materialized exception cause chain, outermost first.
///
/// The chain is never empty: it always has a top node, and `causes` lists
/// every deeper cause in order. The mapper only ever walks this list, so
/// capturing code decides once how a platform error turns into nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThrowableChain {
    top: ThrowableNode,
    causes: Vec<ThrowableNode>,
}

impl ThrowableChain {
    pub fn new(top: ThrowableNode) -> Self {
        Self { top, causes: Vec::new() }
    }

    /// Append `cause` as the new innermost node.
    pub fn caused_by(mut self, cause: ThrowableNode) -> Self {
        self.causes.push(cause);
        self
    }

    /// Build a chain from a Rust error and its `source()` links.
    ///
    /// Only the outermost error has a statically known type, so source
    /// nodes carry no class name. Each node's stack trace lists its own
    /// headline followed by a `Caused by:` line per deeper cause.
    pub fn from_error<E: Error + 'static>(err: &E) -> Self {
        Self::build(err, Some(std::any::type_name::<E>().to_string()))
    }

    /// Same as [`ThrowableChain::from_error`] for a type-erased error.
    pub fn from_dyn_error(err: &(dyn Error + 'static)) -> Self {
        Self::build(err, None)
    }

    fn build(err: &(dyn Error + 'static), top_class: Option<String>) -> Self {
        let mut nodes = vec![ThrowableNode {
            class_name: top_class,
            message: Some(err.to_string()),
            stack_trace: None,
        }];
        let mut source = err.source();
        while let Some(cause) = source {
            nodes.push(ThrowableNode {
                class_name: None,
                message: Some(cause.to_string()),
                stack_trace: None,
            });
            source = cause.source();
        }

        let headlines: Vec<String> = nodes.iter().map(ThrowableNode::headline).collect();
        for (i, node) in nodes.iter_mut().enumerate() {
            let mut lines = vec![headlines[i].clone()];
            lines.extend(headlines[i + 1..].iter().map(|h| format!("Caused by: {}", h)));
            node.stack_trace = Some(lines.join("\n"));
        }

        let mut iter = nodes.into_iter();
        // `nodes` always holds the outermost error.
        let top = iter.next().unwrap_or_default();
        Self { top, causes: iter.collect() }
    }

    pub fn top(&self) -> &ThrowableNode {
        &self.top
    }

    /// Innermost cause, or the top node when nothing caused it.
    pub fn root(&self) -> &ThrowableNode {
        self.causes.last().unwrap_or(&self.top)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThrowableNode> {
        std::iter::once(&self.top).chain(self.causes.iter())
    }

    /// Render the `exception` object.
    ///
    /// Absent node data is omitted, never written as `null`. With
    /// `include_root` the `root_*` keys describe [`ThrowableChain::root`],
    /// which is the top node itself for a single-element chain.
    pub fn to_fields(&self, include_root: bool) -> Map<String, Value> {
        let mut fields = Map::new();
        put_node(&mut fields, "", &self.top);
        if include_root {
            put_node(&mut fields, "root_", self.root());
        }
        fields
    }
}

fn put_node(fields: &mut Map<String, Value>, prefix: &str, node: &ThrowableNode) {
    let entries = [
        ("exception_class", &node.class_name),
        ("exception_message", &node.message),
        ("stacktrace", &node.stack_trace),
    ];
    for (key, value) in entries {
        if let Some(value) = value {
            fields.insert(format!("{}{}", prefix, key), Value::String(value.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    fn nested() -> ThrowableChain {
        ThrowableChain::new(
            ThrowableNode::new("java.lang.IllegalArgumentException", Some("down below".into()))
                .with_stack_trace_lines([
                    "java.lang.IllegalArgumentException: down below",
                    "\tat Foo.bar(Foo.java:10)",
                    "Caused by: java.lang.IllegalStateException: on fire",
                ]),
        )
        .caused_by(
            ThrowableNode::new("java.lang.IllegalStateException", Some("on fire".into()))
                .with_stack_trace("java.lang.IllegalStateException: on fire\n\tat Foo.baz(Foo.java:20)"),
        )
    }

    #[test]
    fn root_is_innermost_cause() {
        let chain = nested();
        assert_eq!(chain.iter().count(), 2);
        assert_eq!(chain.root().class_name.as_deref(), Some("java.lang.IllegalStateException"));
        assert_eq!(chain.top().message.as_deref(), Some("down below"));
    }

    #[test]
    fn root_of_single_node_is_top() {
        let chain = ThrowableChain::new(ThrowableNode::new("E", Some("boom".into())));
        assert_eq!(chain.root(), chain.top());
    }

    #[test]
    fn fields_with_root() {
        let fields = nested().to_fields(true);
        assert_eq!(fields["exception_class"], "java.lang.IllegalArgumentException");
        assert_eq!(fields["root_exception_class"], "java.lang.IllegalStateException");
        assert_eq!(fields["root_exception_message"], "on fire");
        assert_ne!(fields["stacktrace"], fields["root_stacktrace"]);
    }

    #[test]
    fn fields_without_root_omit_keys() {
        let fields = nested().to_fields(false);
        assert!(fields.keys().all(|k| !k.starts_with("root_")));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn missing_message_is_omitted() {
        let chain = ThrowableChain::new(ThrowableNode::new("E", None));
        let fields = chain.to_fields(true);
        assert!(!fields.contains_key("exception_message"));
        assert!(!fields.contains_key("root_exception_message"));
        assert!(!fields.contains_key("stacktrace"));
        assert_eq!(fields["root_exception_class"], "E");
    }

    #[derive(Debug)]
    struct Outer(Inner);
    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("request failed")
        }
    }
    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection reset")
        }
    }
    impl Error for Outer {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(&self.0)
        }
    }
    impl Error for Inner {}

    #[test]
    fn chain_from_error_sources() {
        let chain = ThrowableChain::from_error(&Outer(Inner));
        assert_eq!(chain.iter().count(), 2);
        let top = chain.top();
        assert!(top.class_name.as_deref().unwrap().ends_with("Outer"));
        let top_trace = top.stack_trace.as_deref().unwrap();
        assert!(top_trace.contains("request failed"));
        assert!(top_trace.contains("Caused by: connection reset"));

        let root = chain.root();
        assert_eq!(root.class_name, None);
        assert_eq!(root.stack_trace.as_deref(), Some("connection reset"));
    }
}
