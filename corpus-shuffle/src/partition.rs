//! Round-robin assignment of records to output shards

/// Assigns the i-th written record to shard `i % shards`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRobin {
    shards: usize,
}

impl RoundRobin {
    /// Create an assignment over `shards` shards (values below one mean one)
    pub fn new(shards: usize) -> Self {
        Self {
            shards: shards.max(1),
        }
    }

    /// Number of shards
    pub fn shards(&self) -> usize {
        self.shards
    }

    /// Shard of the record at `position`
    pub fn shard_for(&self, position: usize) -> usize {
        position % self.shards
    }
}

/// Split items into `shards` groups, item `i` going to group `i % shards`
///
/// Every item lands in exactly one group and groups keep the relative order
/// of their items.
pub fn partition<T>(items: Vec<T>, shards: usize) -> Vec<Vec<T>> {
    let assignment = RoundRobin::new(shards);
    let mut groups: Vec<Vec<T>> = (0..assignment.shards())
        .map(|_| Vec::with_capacity(items.len() / assignment.shards() + 1))
        .collect();

    for (position, item) in items.into_iter().enumerate() {
        groups[assignment.shard_for(position)].push(item);
    }

    groups
}
