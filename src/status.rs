//! Decoding of waitpid(2) status words reported by the host.

/// Exit code reported to our own caller when the host command terminated
/// abnormally or when the invocation failed before a pid was obtained.
pub const FAILURE_EXIT_CODE: i32 = 127;

/// How the host command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    /// Clean exit with the given code.
    Exited(u8),
    /// Terminated by a signal, or otherwise did not exit cleanly.
    Abnormal,
}

impl ExitOutcome {
    /// Decodes a raw wait status word.
    ///
    /// Field layout per bits/waitstatus.h: the low 7 bits hold the
    /// terminating signal; when they are zero the process exited
    /// normally and bits 8-15 hold the exit code.
    pub fn decode(wait_status: u32) -> Self {
        let term_signal = wait_status & 0x7f;
        if term_signal == 0 {
            ExitOutcome::Exited(((wait_status & 0xff00) >> 8) as u8)
        } else {
            ExitOutcome::Abnormal
        }
    }

    /// Maps the outcome to the exit code of this process.
    pub fn exit_code(self) -> i32 {
        match self {
            ExitOutcome::Exited(code) => i32::from(code),
            ExitOutcome::Abnormal => FAILURE_EXIT_CODE,
        }
    }
}
