// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounded FIFO of decoded application commands.
//!
//! The original implementation used an intrusive linked list backed by a
//! slab allocator with a 100ms acquisition timeout. Here the queue is an
//! owned, fixed-capacity ring with plain value records: no allocation, no
//! blocking, and draining never fails for any reason other than "empty".

use heapless::spsc::Queue;

use crate::command::AppCommand;

/// Default queue depth (32 per connected PD in the original; this engine
/// owns exactly one PD).
pub const QUEUE_CAPACITY: usize = 32;

/// Single-producer (the decoder), single-consumer (the host) FIFO.
pub struct CommandQueue {
    inner: Queue<AppCommand, { QUEUE_CAPACITY + 1 }>,
}

impl CommandQueue {
    pub const fn new() -> Self {
        Self {
            inner: Queue::new(),
        }
    }

    /// Enqueue a decoded command. Returns the command back if the queue is
    /// full; callers treat this as allocator exhaustion (log + NAK).
    pub fn push(&mut self, cmd: AppCommand) -> Result<(), AppCommand> {
        self.inner.enqueue(cmd)
    }

    /// Drain the oldest command, or `None` if empty.
    pub fn pop(&mut self) -> Option<AppCommand> {
        self.inner.dequeue()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.inner.len() == QUEUE_CAPACITY
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}
