//! Sequence-index header parsing.

/// Parse the fragment index carried in the sequence header.
///
/// Absent, negative, non-numeric or out-of-`u32` values all yield None (the
/// "sequence = -1" case); the response is then discarded.
pub fn parse_sequence(value: Option<&str>) -> Option<u32> {
    let value = value?.trim();
    if value.is_empty() {
        return None;
    }
    let n: i64 = value.parse().ok()?;
    u32::try_from(n).ok()
}
