use crate::errors::PipelineError;
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Abort flag shared between the signal handler and the blocking pipeline.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    raised: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<(), PipelineError> {
        if self.is_cancelled() {
            Err(PipelineError::cancelled("Process interrupted by user"))
        } else {
            Ok(())
        }
    }
}

/// Fails the next read once the flag is raised, so `io::copy` stops mid-transfer.
pub struct CancellableReader<R> {
    inner: R,
    flag: CancelFlag,
}

impl<R> CancellableReader<R> {
    pub fn new(inner: R, flag: CancelFlag) -> Self {
        Self { inner, flag }
    }
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.flag.is_cancelled() {
            // Not `Interrupted`: io::copy retries those.
            return Err(io::Error::new(io::ErrorKind::Other, "transfer cancelled"));
        }
        self.inner.read(buf)
    }
}
