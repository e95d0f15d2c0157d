pub const DEFAULT_BEACON_HEX: &str = "766572206c6f63303031";
pub const SUMMARY_WORST_NODES: usize = 5;
