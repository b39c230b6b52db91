//! Messages consumed by driver event loops.

use super::state::BlockRun;

/// A user action in the interactive driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Execute,
    ExecuteAll,
    /// Start capturing a count of blocks to run
    ExecuteMany,
    Previous,
    Next,
    Pause,
    Quit,
    Digit(u8),
    Enter,
    /// Any other key; ends count capture
    Other,
}

/// An event delivered to a driver loop.
#[derive(Debug)]
pub enum DriverEvent {
    Input(Input),
    /// The block at `index` finished running.
    Finished { index: usize, run: BlockRun },
}
