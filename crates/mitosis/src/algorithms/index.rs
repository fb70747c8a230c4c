use histo_common::utils::round_to_places;

/// Decimal places kept in a reported index
pub const INDEX_PRECISION: usize = 2;

/// Percentage of filtered regions among all regions, rounded to two decimals.
///
/// With no regions at all the index is `0.0`;
/// [`crate::MaskAnalysis::is_empty`] separates that case from a genuine 0%.
pub fn compute_index(total_regions: usize, filtered_regions: usize) -> f64 {
    if total_regions == 0 {
        return 0.0;
    }
    let ratio = filtered_regions as f64 / total_regions as f64;
    round_to_places(ratio * 100.0, INDEX_PRECISION)
}
