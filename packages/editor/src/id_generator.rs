use uuid::Uuid;

/// Block identifier
pub type BlockId = String;

/// Sequential ID generator for blocks within an editing session
///
/// IDs are `"{seed}-{n}"`: the seed is random per session, the counter
/// keeps IDs unique within it.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    seed: String,
    count: u64,
}

impl IdGenerator {
    pub fn new() -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self::from_seed(uuid[..8].to_string())
    }

    pub fn from_seed(seed: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            count: 0,
        }
    }

    /// Generate next sequential ID
    pub fn new_id(&mut self) -> BlockId {
        self.count += 1;
        format!("{}-{}", self.seed, self.count)
    }

    /// Generate the next ID rejected by none of `taken`
    pub fn new_id_where(&mut self, mut taken: impl FnMut(&str) -> bool) -> BlockId {
        loop {
            let id = self.new_id();
            if !taken(&id) {
                return id;
            }
        }
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_ids() {
        let mut gen = IdGenerator::from_seed("doc");

        assert_eq!(gen.new_id(), "doc-1");
        assert_eq!(gen.new_id(), "doc-2");
        assert_eq!(gen.new_id(), "doc-3");
    }

    #[test]
    fn test_random_seeds_differ() {
        let a = IdGenerator::new().new_id();
        let b = IdGenerator::new().new_id();

        assert_eq!(a.strip_suffix("-1").unwrap().len(), 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_skips_taken_ids() {
        let mut gen = IdGenerator::from_seed("doc");
        let taken = ["doc-1", "doc-2"];

        let id = gen.new_id_where(|candidate| taken.contains(&candidate));
        assert_eq!(id, "doc-3");
    }
}
