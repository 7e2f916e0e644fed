// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The byte-transport capability the engine is built on.
//!
//! This replaces the original's function-pointer-plus-`void*` struct with a
//! plain trait: implementations carry their own transport state instead of
//! reaching through an opaque user-data pointer.

/// Non-blocking byte channel to the physical link.
///
/// All three methods must return promptly; the engine polls them from a
/// cooperative scheduler tick and never blocks waiting on I/O.
pub trait Channel {
    /// Copy up to `buf.len()` received bytes into `buf`. Returns the number
    /// of bytes copied, which may be zero if nothing is available.
    fn recv(&mut self, buf: &mut [u8]) -> usize;

    /// Send `buf`. Returns the number of bytes accepted; a full-buffer
    /// contract is expected (no partial sends on a healthy transport).
    fn send(&mut self, buf: &[u8]) -> usize;

    /// Discard any buffered bytes in both directions.
    fn flush(&mut self);
}
