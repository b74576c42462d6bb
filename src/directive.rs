//! Field directive parsing.
//!
//! A directive is the metadata string attached to a record field:
//! `"<function>"` or `"<function>,<output>"`. An output of the form
//! `fn:<name>` routes the result through a named callback on the record.

use std::fmt;

/// Marker prefix selecting callback output instead of a field.
pub const CALLBACK_PREFIX: &str = "fn:";

/// Where a handler result is written for one field occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write back into the field carrying the directive.
    SameField,
    /// Write into the named field.
    Field(String),
    /// Invoke the named single-argument callback.
    Callback(String),
}

impl OutputTarget {
    /// Field name to assign, falling back to the source field.
    pub fn field_name<'a>(&'a self, source_field: &'a str) -> Option<&'a str> {
        match self {
            OutputTarget::SameField => Some(source_field),
            OutputTarget::Field(name) => Some(name),
            OutputTarget::Callback(_) => None,
        }
    }
}

impl fmt::Display for OutputTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputTarget::SameField => write!(f, "<same field>"),
            OutputTarget::Field(name) => write!(f, "{}", name),
            OutputTarget::Callback(name) => write!(f, "{}{}", CALLBACK_PREFIX, name),
        }
    }
}

/// Parsed field directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub function: String,
    pub output: OutputTarget,
}

impl Directive {
    /// Parse a raw directive string.
    ///
    /// Splits on the first comma. Returns `None` when the string is empty or
    /// the function segment is blank; such fields are skipped by the engine.
    ///
    /// # Example
    ///
    /// ```
    /// use combine::{Directive, OutputTarget};
    ///
    /// let directive = Directive::parse("avg_score,fn:SetAvg").unwrap();
    /// assert_eq!(directive.function, "avg_score");
    /// assert_eq!(directive.output, OutputTarget::Callback("SetAvg".to_string()));
    /// ```
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }

        let (function, output) = match raw.split_once(',') {
            Some((function, output)) => (function.trim(), output.trim()),
            None => (raw.trim(), ""),
        };

        if function.is_empty() {
            return None;
        }

        let output = if output.is_empty() {
            OutputTarget::SameField
        } else if let Some(callback) = output.strip_prefix(CALLBACK_PREFIX) {
            OutputTarget::Callback(callback.trim().to_string())
        } else {
            OutputTarget::Field(output.to_string())
        };

        Some(Self {
            function: function.to_string(),
            output,
        })
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.output {
            OutputTarget::SameField => write!(f, "{}", self.function),
            output => write!(f, "{},{}", self.function, output),
        }
    }
}
