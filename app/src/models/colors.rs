pub const RED: u32 = 0xFF2323;
pub const ORANGE: u32 = 0xFF924F;
pub const GREEN: u32 = 0x7FFF6D;
/// Matches the embed background, used when a role or guild has no colour.
pub const BLANK: u32 = 0x2B2D31;
