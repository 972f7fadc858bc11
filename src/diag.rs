/// Warning sink threaded through the pipeline.
///
/// Derivation tasks each own a private `Diagnostics` so parallel fanout
/// never contends on a shared logger; the orchestrator drains them at join,
/// which keeps warning order independent of scheduling.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and mirror it to the log facade.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::warn!("{msg}");
        self.warnings.push(msg);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Move all warnings out of `other` into `self`, preserving order.
    pub fn absorb(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
