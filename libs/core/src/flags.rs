//! Bitmask flags accepted by [`crate::Provider`] operations.
//!
//! Unknown bits are preserved and ignored so integrators can pass through
//! backend-specific hints.

use bitflags::bitflags;

bitflags! {
    /// Flags for [`crate::Provider::fetch`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FetchFlags: u8 {
        /// Commit the receipt before returning.
        const DEFAULT = 0x00;
        /// Defer commit; a token is returned for a later acknowledge/discard.
        const CONFIRM = 0x02;
    }
}

bitflags! {
    /// Flags for [`crate::Provider::acknowledge`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AckFlags: u8 {
        const DEFAULT = 0x00;
    }
}

bitflags! {
    /// Flags for [`crate::Provider::discard`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DiscardFlags: u8 {
        /// Drop the message permanently.
        const DEFAULT = 0x00;
        /// Ask the backend to redeliver the message on a later fetch.
        const REQUEUE = 0x01;
    }
}

impl FetchFlags {
    pub fn is_confirm(self) -> bool {
        self.contains(Self::CONFIRM)
    }
}

impl DiscardFlags {
    pub fn is_requeue(self) -> bool {
        self.contains(Self::REQUEUE)
    }
}

impl Default for FetchFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Default for AckFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl Default for DiscardFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}
