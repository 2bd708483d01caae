use crate::router::THRESHOLD;

/// Adds the one hop a relayed advertisement travels, without wrapping.
///
/// # Examples
///
/// ```
/// assert_eq!(hopvec::util::add_hop(1), 2);
/// assert_eq!(hopvec::util::add_hop(u32::MAX), u32::MAX);
/// ```
pub fn add_hop(hops: u32) -> u32 {
    hops.saturating_add(1)
}

/// Whether a hop count has degraded past the reachability ceiling.
pub fn past_threshold(hops: u32) -> bool {
    hops > THRESHOLD
}
