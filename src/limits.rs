//! Input-size ceilings. Every user-supplied string is bounded before it can
//! reach a collection file.

pub const MAX_TOPIC_LEN: usize = 200;
pub const MAX_NAME_LEN: usize = 120;
pub const MIN_NAME_LEN: usize = 3;
pub const MAX_DESCRIPTION_LEN: usize = 2000;
pub const MIN_DESCRIPTION_LEN: usize = 10;
pub const MAX_SUGGESTION_LEN: usize = 2000;
pub const MIN_SUGGESTION_LEN: usize = 5;

/// Digits in a minted PIN.
pub const PIN_DIGITS: usize = 4;
/// Give up minting after this many collisions (the PIN space is tiny).
pub const MAX_PIN_ATTEMPTS: usize = 1000;

/// Longest accepted request line on the wire.
pub const MAX_LINE_LEN: usize = 64 * 1024;
