// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The three phases a PD cycles through on every poll: accumulate/decode,
//! send the built reply, and the momentary error phase that resets
//! everything tied to the current exchange.

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    SendReply,
    Err,
}
