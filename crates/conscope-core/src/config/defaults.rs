/// Default per-call timeout (milliseconds)
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 5_000;

/// Maximum stack frames printed per record
pub const MAX_STACK_FRAMES: usize = 5;

/// Width of the rule line in the file banner
pub const BANNER_RULE_WIDTH: usize = 80;
