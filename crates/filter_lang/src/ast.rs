//! Filter expression tree

use std::fmt;

/// Event field referenced by a filter
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    /// `evt.num`
    Num,
    /// `evt.source_id`
    SourceId,
    /// `evt.source` - plugin name of the bound source
    Source,
    /// `evt.event_source`
    EventSource,
    /// `evt.len` - payload length in bytes
    Len,
    /// `evt.payload` - payload as text
    Payload,
    /// `json.<path>` - field extracted from the JSON payload
    Json(Vec<String>),
}

impl Field {
    /// Resolve a field name, `None` if the name is not a known field
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "evt.num" => Some(Self::Num),
            "evt.source_id" | "evt.plugin_id" => Some(Self::SourceId),
            "evt.source" | "evt.plugin" => Some(Self::Source),
            "evt.event_source" => Some(Self::EventSource),
            "evt.len" => Some(Self::Len),
            "evt.payload" => Some(Self::Payload),
            _ => {
                let path = name.strip_prefix("json.")?;
                let segments: Vec<String> = path.split('.').map(str::to_string).collect();
                if segments.iter().any(String::is_empty) {
                    return None;
                }
                Some(Self::Json(segments))
            }
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Num => write!(f, "evt.num"),
            Self::SourceId => write!(f, "evt.source_id"),
            Self::Source => write!(f, "evt.source"),
            Self::EventSource => write!(f, "evt.event_source"),
            Self::Len => write!(f, "evt.len"),
            Self::Payload => write!(f, "evt.payload"),
            Self::Json(path) => write!(f, "json.{}", path.join(".")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
}

impl CmpOp {
    /// Ordering operators only accept numeric operands
    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    /// Substring operators only accept text operands
    pub fn is_text(self) -> bool {
        matches!(self, Self::Contains | Self::StartsWith | Self::EndsWith)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Num(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        field: Field,
        op: CmpOp,
        value: Literal,
    },
    In {
        field: Field,
        values: Vec<Literal>,
    },
    Exists(Field),
}
