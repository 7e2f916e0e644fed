// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! PD context flag bits.

use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct Flags: u16 {
        /// Context is operating as a PD (always set; kept for parity with
        /// the CP-side flag bit so the two engines can share a wire trace).
        const PD_MODE       = 1 << 0;
        const TAMPER        = 1 << 1;
        const POWER         = 1 << 2;
        const R_TAMPER      = 1 << 3;
        const SC_ACTIVE     = 1 << 4;
        const SC_USE_SCBKD  = 1 << 5;
        const INSTALL_MODE  = 1 << 6;
    }
}
