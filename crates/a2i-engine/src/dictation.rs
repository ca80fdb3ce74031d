use anyhow::Result;

/// Optional speech input for the prompt editor. Transcripts are pushed back
/// through `WizardController::append_transcript`.
pub trait DictationProvider: Send {
    fn is_available(&self) -> bool {
        true
    }

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self);
}
