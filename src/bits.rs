/// Returns true if the given bit of `value` is set.
pub fn check(value: u64, index: u32) -> bool {
    value & (1u64 << index) != 0
}

/// Parse an ASCII-binary status field with least-significant-first ordering:
/// the first transmitted character is bit 0. The string is reversed before
/// the base-2 parse so `check(value, 0)` tests the first character.
///
/// This ordering is a device-protocol convention; flipping it silently swaps
/// ignition/charge reporting.
pub fn from_lsb_binary(status: &str) -> Option<u64> {
    let reversed: String = status.chars().rev().collect();
    u64::from_str_radix(&reversed, 2).ok()
}
