//! Structured evaluation faults.
//!
//! Rhai provides rich error types (parse + runtime) with positions. The
//! catalog and CLI need a stable, JSON-serializable reason for why a script
//! was rejected, without requiring access to Rust logs. Each fault carries
//! the class of the first violated contract condition, so a malformed
//! third-party script always reports the same rejection.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptFaultKind {
    /// Syntax/parse errors (compile time).
    ParseError,
    /// The script raised during its top-level evaluation.
    RuntimeError,
    /// The script ran, but its result lacks a required callable.
    MissingEntryPoint,
    /// The script's `apiVersion` is missing, non-numeric, or not positive.
    InvalidApiVersion,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptLocation {
    /// 1-based line number in the script source.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptFault {
    pub kind: ScriptFaultKind,
    pub message: String,
    pub location: Option<ScriptLocation>,
    /// Raw engine error string (useful for bug reports).
    pub raw: Option<String>,
}

fn location_of(pos: rhai::Position) -> Option<ScriptLocation> {
    let line = pos.line().unwrap_or(0) as u32;
    if line == 0 {
        return None;
    }
    let column = pos.position().unwrap_or(0) as u32;
    Some(ScriptLocation { line, column: column.max(1) })
}

impl ScriptFault {
    pub fn from_parse_error(err: &rhai::ParseError) -> Self {
        let raw = err.to_string();
        Self {
            kind: ScriptFaultKind::ParseError,
            message: raw.clone(),
            location: location_of(err.position()),
            raw: Some(raw),
        }
    }

    pub fn from_eval_error(err: &rhai::EvalAltResult) -> Self {
        let raw = err.to_string();
        Self {
            kind: ScriptFaultKind::RuntimeError,
            message: raw.clone(),
            location: location_of(err.position()),
            raw: Some(raw),
        }
    }

    pub fn missing_entry_point(detail: impl Into<String>) -> Self {
        Self {
            kind: ScriptFaultKind::MissingEntryPoint,
            message: detail.into(),
            location: None,
            raw: None,
        }
    }

    pub fn invalid_api_version(detail: impl Into<String>) -> Self {
        Self {
            kind: ScriptFaultKind::InvalidApiVersion,
            message: detail.into(),
            location: None,
            raw: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_faults_carry_a_source_location() {
        let engine = rhai::Engine::new();
        let err = engine.compile("let x = ;\n").unwrap_err();
        let fault = ScriptFault::from_parse_error(&err);
        assert_eq!(fault.kind, ScriptFaultKind::ParseError);
        let loc = fault.location.expect("parse error should have a position");
        assert_eq!(loc.line, 1);
        assert!(fault.raw.is_some());
    }

    #[test]
    fn fault_kind_serializes_snake_case() {
        let fault = ScriptFault::missing_entry_point("no rgbMap");
        let json = serde_json::to_value(&fault).unwrap();
        assert_eq!(json["kind"], "missing_entry_point");
        assert_eq!(json["message"], "no rgbMap");
        assert!(json["location"].is_null());
    }
}
