use depot_storage::BundleId;

/// Split `ids` into consecutive batches of at most `size` ids.
///
/// Every id lands in exactly one batch and order is kept. A `size` of zero
/// is treated as one.
///
/// ```
/// use depot_janitor::batch_ids;
/// use depot_storage::BundleId;
///
/// let ids: Vec<_> = (1..=5).filter_map(BundleId::new).collect();
/// let batches = batch_ids(&ids, 2);
/// assert_eq!(batches.iter().map(|b| b.len()).collect::<Vec<_>>(), vec![2, 2, 1]);
/// ```
pub fn batch_ids(ids: &[BundleId], size: usize) -> Vec<&[BundleId]> {
    ids.chunks(size.max(1)).collect()
}
