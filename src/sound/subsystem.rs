//! Explicitly owned audio-subsystem handle.
//!
//! The device is opened on the first start that actually needs sound and is
//! kept until [`AudioSubsystem::teardown`]. A failed open leaves nothing
//! behind, so the next start simply tries again.

use std::fmt;

use tracing::{debug, info};

use super::error::SoundError;
use super::AudioBackend;

type Opener<B> = Box<dyn Fn() -> Result<B, SoundError>>;

pub struct AudioSubsystem<B> {
    opener: Opener<B>,
    backend: Option<B>,
}

impl<B: AudioBackend> AudioSubsystem<B> {
    /// Creates a closed subsystem that will use `opener` on first use.
    pub fn new(opener: impl Fn() -> Result<B, SoundError> + 'static) -> Self {
        Self {
            opener: Box::new(opener),
            backend: None,
        }
    }

    /// A subsystem that can never open, for running as a silent timer.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(move || Err(SoundError::Unsupported(reason.clone())))
    }

    /// Returns the open backend, opening it first if needed.
    ///
    /// # Errors
    ///
    /// Returns `SoundError::Unsupported` if the device cannot be opened.
    pub fn ensure_open(&mut self) -> Result<&mut B, SoundError> {
        if self.backend.is_none() {
            let backend = (self.opener)()?;
            info!("Audio subsystem initialized");
            self.backend = Some(backend);
        }
        self.backend
            .as_mut()
            .ok_or_else(|| SoundError::Unsupported("audio subsystem not open".to_string()))
    }

    /// Returns the backend only if it is already open.
    pub fn backend_mut(&mut self) -> Option<&mut B> {
        self.backend.as_mut()
    }

    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Drops the backend. The next `ensure_open` opens a fresh one.
    pub fn teardown(&mut self) {
        if self.backend.take().is_some() {
            debug!("Audio subsystem torn down");
        }
    }
}

impl<B> fmt::Debug for AudioSubsystem<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioSubsystem")
            .field("open", &self.backend.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::sound::MockAudioBackend;

    fn counting_subsystem() -> (AudioSubsystem<MockAudioBackend>, Rc<Cell<u32>>) {
        let opens = Rc::new(Cell::new(0));
        let counter = Rc::clone(&opens);
        let subsystem = AudioSubsystem::new(move || {
            counter.set(counter.get() + 1);
            Ok(MockAudioBackend::new())
        });
        (subsystem, opens)
    }

    #[test]
    fn test_lazy_open() {
        let (mut subsystem, opens) = counting_subsystem();
        assert!(!subsystem.is_open());
        assert!(subsystem.backend_mut().is_none());
        assert_eq!(opens.get(), 0);

        subsystem.ensure_open().unwrap();
        assert!(subsystem.is_open());
        assert_eq!(opens.get(), 1);
    }

    #[test]
    fn test_not_recreated_until_teardown() {
        let (mut subsystem, opens) = counting_subsystem();
        subsystem.ensure_open().unwrap();
        subsystem.ensure_open().unwrap();
        assert_eq!(opens.get(), 1);

        subsystem.teardown();
        assert!(!subsystem.is_open());
        subsystem.ensure_open().unwrap();
        assert_eq!(opens.get(), 2);
    }

    #[test]
    fn test_unavailable() {
        let mut subsystem = AudioSubsystem::<MockAudioBackend>::unavailable("--no-audio");
        match subsystem.ensure_open() {
            Err(SoundError::Unsupported(reason)) => assert_eq!(reason, "--no-audio"),
            other => panic!("expected Unsupported, got {:?}", other.map(|_| ())),
        }
        assert!(!subsystem.is_open());
    }
}
