// Worker pool constants (No magic values)

/// Lower bound on worker count, whatever the machine reports
pub const MIN_WORKERS: usize = 4;

/// Backlog slots per worker (backlog = workers * multiplier)
pub const DEFAULT_BACKLOG_MULTIPLIER: usize = 100;
