pub mod error;
pub mod normalize;
pub mod pii;
pub mod protocol;

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
