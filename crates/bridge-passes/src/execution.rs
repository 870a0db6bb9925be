//! Execution mode for a pipeline run.

/// Threading mode the pass manager is allowed to use.
///
/// Nested passes are scheduled one function at a time in either mode; the
/// flag decides which instrumentation may run. IR printing after every pass
/// is only meaningful when execution is single-threaded, so the manager
/// refuses to install it otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionContext {
    multithreading: bool,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single_threaded() -> Self {
        Self {
            multithreading: false,
        }
    }

    pub fn disable_multithreading(&mut self) {
        self.multithreading = false;
    }

    pub fn enable_multithreading(&mut self) {
        self.multithreading = true;
    }

    pub fn is_multithreading_enabled(&self) -> bool {
        self.multithreading
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            multithreading: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_multithreading() {
        let mut exec = ExecutionContext::new();
        assert!(exec.is_multithreading_enabled());
        exec.disable_multithreading();
        assert!(!exec.is_multithreading_enabled());
        exec.enable_multithreading();
        assert!(exec.is_multithreading_enabled());
        assert!(!ExecutionContext::single_threaded().is_multithreading_enabled());
    }
}
