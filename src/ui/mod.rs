/// Custom canvas widgets
///
/// - `map.rs` - campus map with building markers and popups
/// - `status.rs` - crowd status indicator

pub mod map;
pub mod status;
