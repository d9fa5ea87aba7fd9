use crate::models::TestItem;
use anyhow::{Context, Result};
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::path::Path;

/// Load the pool of test outputs from a JSON array of `{id, text}` objects
pub fn load_test_outputs(path: &Path) -> Result<Vec<TestItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read test outputs: {}", path.display()))?;
    let items: Vec<TestItem> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test outputs: {}", path.display()))?;

    let mut seen = HashSet::new();
    if let Some(duplicate) = items.iter().find(|item| !seen.insert(item.id)) {
        anyhow::bail!("Duplicate test output id {} in {}", duplicate.id, path.display());
    }

    Ok(items)
}

/// Shuffle a copy of the pool and keep the first `size` items
pub fn sample<R: Rng + ?Sized>(items: &[TestItem], size: usize, rng: &mut R) -> Vec<TestItem> {
    let mut shuffled = items.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(size);
    shuffled
}
