use crate::constants::STACK_DEPTH;

use super::exception::Exception;

/// Fixed-capacity stack of subroutine return addresses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallStack {
    frames: [u16; STACK_DEPTH],
    depth: usize,
}

impl CallStack {
    /// Push a return address
    ///
    /// # Errors
    ///
    /// It fails with [`Exception::StackOverflow`] when all frames are in use.
    pub fn push(&mut self, address: u16) -> Result<(), Exception> {
        if self.depth == STACK_DEPTH {
            return Err(Exception::StackOverflow);
        }
        self.frames[self.depth] = address;
        self.depth += 1;
        Ok(())
    }

    /// Pop the most recent return address
    ///
    /// # Errors
    ///
    /// It fails with [`Exception::StackUnderflow`] when no frame is in use.
    pub fn pop(&mut self) -> Result<u16, Exception> {
        if self.depth == 0 {
            return Err(Exception::StackUnderflow);
        }
        self.depth -= 1;
        Ok(self.frames[self.depth])
    }

    /// Number of frames in use
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }
}
