use crate::wrapper::DispatchWrapper;

/// Receives a description of every kernel launch. Fire-and-forget.
pub trait DiagnosticsSink: Send + Sync {
    fn report_launch_attributes(&self, wrapper: &DispatchWrapper);
}

/// Writes kernel attributes through `log`: debug level normally, info level
/// when `verbose` is set (`debug_kernel_attributes` in the configuration).
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics {
    verbose: bool,
}

impl LogDiagnostics {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl DiagnosticsSink for LogDiagnostics {
    fn report_launch_attributes(&self, wrapper: &DispatchWrapper) {
        let level = if self.verbose {
            log::Level::Info
        } else {
            log::Level::Debug
        };
        if !log::log_enabled!(level) {
            return;
        }
        let attrs = wrapper.attributes();
        let known = attrs
            .known()
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" ");
        log::log!(
            level,
            "sigpack: launched {} {} {}",
            attrs.name,
            wrapper.dims(),
            known
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullDiagnostics;

impl DiagnosticsSink for NullDiagnostics {
    fn report_launch_attributes(&self, _wrapper: &DispatchWrapper) {}
}
