use thiserror::Error;

use crate::definition::CardinalityViolation;

#[derive(Debug, Error)]
pub enum PageSourceError {
    #[error("page resource not found: {0}")]
    NotFound(String),
    #[error("invalid resource location `{key}`: {reason}")]
    InvalidLocation { key: String, reason: String },
    #[error("resource `{0}` resolves outside the web root")]
    OutsideRoot(String),
    #[error("unsupported resource scheme `{0}`")]
    UnsupportedScheme(String),
    #[error("failed to read page source: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed page markup at byte {position}: {message}")]
    Malformed { position: u64, message: String },
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("unrecognized tag: {0}")]
    UnknownTag(String),
    #[error("unrecognized attribute `{attribute}` for tag `{tag}`")]
    UnknownAttribute { tag: String, attribute: String },
    #[error("attribute `{0}` belongs to an unresolvable namespace")]
    UnresolvableAttribute(String),
    #[error("text content is not allowed for tag `{0}`")]
    TextNotAllowed(String),
    #[error("unrecognized processing instruction: {0}")]
    UnrecognizedPi(String),
    #[error("invalid `{target}` processing instruction: {reason}")]
    InvalidPi { target: String, reason: String },
    #[error("unrecognized document node: {0}")]
    UnrecognizedNode(String),
    #[error("cardinality violations for tag `{tag}`:\n{}", render_violations(.violations))]
    Cardinality {
        tag: String,
        violations: Vec<CardinalityViolation>,
    },
    #[error("`{child}` is not a valid child for `{parent}`")]
    InvalidChild { parent: String, child: String },
    #[error("`{parent}` allows at most {max} `{child}` children")]
    TooManyChildren {
        parent: String,
        child: String,
        max: usize,
    },
    #[error("document root must be `fsp`, found `{0}`")]
    InvalidRoot(String),
    #[error("page imports nest deeper than {0} levels")]
    ImportDepth(usize),
    #[error(transparent)]
    Source(#[from] PageSourceError),
}

fn render_violations(violations: &[CardinalityViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("invalid value `{value}` for attribute `{attribute}` of `{tag}`: expected {expected}")]
    InvalidValue {
        tag: String,
        attribute: String,
        value: String,
        expected: String,
    },
    #[error("unknown parent component `{0}`")]
    UnknownParent(String),
    #[error("page `{0}` has been destroyed")]
    PageDestroyed(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to load page `{key}`")]
    Load {
        key: String,
        #[source]
        source: ParserError,
    },
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a component definition for tag `{0}` is already registered")]
    DuplicateTag(String),
    #[error("a handler for processing instruction `{0}` is already registered")]
    DuplicateProcessingInstruction(String),
}

#[derive(Debug, Error)]
pub enum EventError {
    #[error("unknown event target `{0}`")]
    UnknownTarget(String),
    #[error("no event handler named `{0}` is registered on the page")]
    MissingHandler(String),
    #[error("event handler failed: {0}")]
    Handler(String),
    #[error("page `{0}` has been destroyed")]
    PageDestroyed(String),
}
