use std::fmt;

use crate::Position;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => f.write_str("error"),
            Self::Warning => f.write_str("warning"),
        }
    }
}

/// A non-fatal finding reported by a rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// State tag of the reporting rule instance.
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub position: Option<Position>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(position) = self.position {
            write!(f, "{position}: ")?;
        }
        write!(f, "{} [{}]: {}", self.severity, self.rule, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_position() {
        let mut diagnostic = Diagnostic {
            rule: "line-naming@shared".into(),
            severity: Severity::Error,
            message: "duplicate line name".into(),
            position: Some(Position { line: 4, column: 0 }),
        };
        assert_eq!(
            diagnostic.to_string(),
            "4:0: error [line-naming@shared]: duplicate line name"
        );

        diagnostic.position = None;
        diagnostic.severity = Severity::Warning;
        assert_eq!(
            diagnostic.to_string(),
            "warning [line-naming@shared]: duplicate line name"
        );
    }
}
