//! Buffer that drains a child's standard output from the read end of a pipe.
use std::{
    fs::File,
    io::{self, Read},
    os::fd::{IntoRawFd, OwnedFd},
};

use tracing::debug;

use crate::{
    constants::READ_CHUNK_SIZE,
    error::{ExecError, errno_to_io},
};

/// Accumulates the console output of one launched process.
///
/// The buffer owns at most one pipe read end. Once released the handle is
/// gone for good; a new one can only come from another launch.
///
/// ```no_run
/// use clu::{ExecOptions, Executor, OutputBuffer};
///
/// let executor = Executor::new();
/// let mut output = OutputBuffer::new();
/// executor.async_execute("echo hello", &ExecOptions::default(), Some(&mut output))?;
/// output.fill()?;
/// assert_eq!(output.get(), "hello\n");
/// # Ok::<(), clu::ExecError>(())
/// ```
#[derive(Debug, Default)]
pub struct OutputBuffer {
    handle: Option<File>,
    text: String,
    /// Tail of an UTF-8 sequence split across two reads.
    pending: Vec<u8>,
}

impl OutputBuffer {
    /// Creates a detached, empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulated text. Reading does not consume it.
    pub fn get(&self) -> &str {
        &self.text
    }

    /// Clears the accumulated text, keeping the pipe attached.
    pub fn flush(&mut self) {
        self.text.clear();
    }

    /// Whether a pipe read end is currently owned.
    pub fn is_attached(&self) -> bool {
        self.handle.is_some()
    }

    /// Takes ownership of a pipe read end. Called by the launcher once the
    /// process has been created; any previously owned handle is closed.
    pub fn set_handle(&mut self, handle: OwnedFd) {
        if let Err(err) = self.release() {
            debug!("Closing previous output handle failed: {err}");
        }
        self.pending.clear();
        self.handle = Some(File::from(handle));
    }

    /// Reads the pipe until every writer has closed it, appending to the
    /// buffer. Returns the number of bytes read by this call.
    ///
    /// Blocks while the child keeps its standard output open. Data read
    /// before an error stays in the buffer.
    pub fn fill(&mut self) -> Result<usize, ExecError> {
        let Some(mut reader) = self.handle.as_ref() else {
            return Err(ExecError::Detached.recorded());
        };

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut total = 0;

        loop {
            match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(read) => {
                    total += read;
                    append_utf8(&mut self.text, &mut self.pending, &chunk[..read]);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(ExecError::Read(err).recorded()),
            }
        }

        self.finish_pending();
        Ok(total)
    }

    /// Closes the owned handle, if any. Calling it again is a no-op.
    pub fn release(&mut self) -> Result<(), ExecError> {
        if let Some(handle) = self.handle.take() {
            nix::unistd::close(handle.into_raw_fd())
                .map_err(|err| ExecError::Close(errno_to_io(err)).recorded())?;
        }
        Ok(())
    }

    fn finish_pending(&mut self) {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.text.push_str(&String::from_utf8_lossy(&tail));
        }
    }
}

/// Appends `bytes` to `text`, holding back an incomplete trailing UTF-8
/// sequence in `pending` and replacing invalid ones.
fn append_utf8(text: &mut String, pending: &mut Vec<u8>, bytes: &[u8]) {
    pending.extend_from_slice(bytes);
    let mut consumed = 0;

    while consumed < pending.len() {
        match std::str::from_utf8(&pending[consumed..]) {
            Ok(valid) => {
                text.push_str(valid);
                consumed = pending.len();
            }
            Err(err) => {
                let valid_up_to = consumed + err.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[consumed..valid_up_to]));
                match err.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        consumed = valid_up_to + len;
                    }
                    None => {
                        consumed = valid_up_to;
                        break;
                    }
                }
            }
        }
    }

    pending.drain(..consumed);
}

impl Drop for OutputBuffer {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
