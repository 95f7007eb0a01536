//! Traffic-shaping control behaviors that need more state than a plain
//! threshold comparison. Currently just warm-up; a queueing rate limiter
//! would live here too.
pub mod warmup;
