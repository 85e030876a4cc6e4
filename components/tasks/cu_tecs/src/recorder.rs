use cu_tecs_payloads::TecsDiagnostics;

/// Consumer of the per-cycle diagnostic record. The controller never logs telemetry itself.
pub trait TecsRecorder: Send {
    fn record(&mut self, diagnostics: &TecsDiagnostics);
}

/// Drops every record.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRecorder;

impl TecsRecorder for NullRecorder {
    fn record(&mut self, _diagnostics: &TecsDiagnostics) {}
}

impl<F> TecsRecorder for F
where
    F: FnMut(&TecsDiagnostics) + Send,
{
    fn record(&mut self, diagnostics: &TecsDiagnostics) {
        self(diagnostics)
    }
}
