//! Enforcement gating.
//!
//! The gate is a pure decision function: given the lint violations and the
//! enforcement mode, it decides whether dispatch may proceed and which
//! messages to emit. It performs no I/O and has no side effects.

use crate::lint::Violation;

/// How blocking violations are enforced for one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnforcementMode {
    /// Blocking violations abort before dispatch; warnings are reported.
    #[default]
    Strict,
    /// Execution proceeds, but every blocking violation is surfaced as a
    /// warning so the operator knows compliance was bypassed.
    Override,
    /// Enforcement is skipped entirely; callers may skip linting altogether.
    Skip,
}

impl EnforcementMode {
    pub fn as_str(self) -> &'static str {
        match self {
            EnforcementMode::Strict => "strict",
            EnforcementMode::Override => "override",
            EnforcementMode::Skip => "skip",
        }
    }
}

/// The gate's verdict for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub allow: bool,
    pub messages: Vec<String>,
}

/// Decide whether execution may proceed.
pub fn evaluate(violations: &[Violation], mode: EnforcementMode) -> GateDecision {
    match mode {
        EnforcementMode::Strict => {
            let blocking = violations.iter().filter(|v| v.is_blocking()).count();
            let mut messages: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
            if blocking > 0 {
                messages.push(format!(
                    "{blocking} blocking violation(s); fix them or re-run with --override"
                ));
            }
            GateDecision {
                allow: blocking == 0,
                messages,
            }
        }
        EnforcementMode::Override => {
            let mut messages: Vec<String> = violations
                .iter()
                .filter(|v| v.is_blocking())
                .map(|v| format!("override: bypassing {v}"))
                .collect();
            if !messages.is_empty() {
                messages.push("running despite blocking violations (override mode)".to_string());
            }
            GateDecision {
                allow: true,
                messages,
            }
        }
        EnforcementMode::Skip => GateDecision {
            allow: true,
            messages: Vec::new(),
        },
    }
}
