//! Class-balanced subset selection and the train/validation split.
//!
//! Selection is only reproducible when the caller seeds the RNG; an unseeded
//! run draws a different subset every time.

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::classify::CategorySets;
use crate::error::DatasetError;
use crate::types::{Category, PRIMARY_CLASS_NAME};

/// Create the sampling RNG: seeded when `seed` is given, from entropy otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Target proportions primary : secondary : negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceRatios {
    pub primary_per_unit: f64,
    pub secondary_per_unit: f64,
    pub negative_per_unit: f64,
}

impl Default for BalanceRatios {
    fn default() -> Self {
        Self {
            primary_per_unit: 1.0,
            secondary_per_unit: 1.0,
            negative_per_unit: 1.0,
        }
    }
}

impl BalanceRatios {
    /// How many items of a `per_unit` category to keep for `n_primary` primaries.
    fn target(&self, n_primary: usize, per_unit: f64) -> usize {
        let target = (n_primary as f64 * per_unit / self.primary_per_unit).floor();
        if target.is_finite() && target > 0.0 {
            target as usize
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts {
    pub primary: usize,
    pub secondary: usize,
    pub negative: usize,
}

impl CategoryCounts {
    pub fn of<T>(sets: &CategorySets<T>) -> Self {
        Self {
            primary: sets.primary.len(),
            secondary: sets.secondary.len(),
            negative: sets.negative.len(),
        }
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Primary => self.primary,
            Category::Secondary => self.secondary,
            Category::Negative => self.negative,
        }
    }

    pub fn total(&self) -> usize {
        self.primary + self.secondary + self.negative
    }
}

/// Available and kept counts per category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceStats {
    pub available: CategoryCounts,
    pub kept: CategoryCounts,
}

impl BalanceStats {
    pub fn print_summary(&self, split: &str) {
        info!(
            "[{}] available primary:{} secondary:{} negative:{} -> kept primary:{} secondary:{} negative:{} total:{}",
            split,
            self.available.primary,
            self.available.secondary,
            self.available.negative,
            self.kept.primary,
            self.kept.secondary,
            self.kept.negative,
            self.kept.total()
        );
    }
}

/// A balanced selection in final (shuffled) order.
#[derive(Debug, Clone)]
pub struct Balanced<T> {
    pub selected: Vec<T>,
    pub stats: BalanceStats,
}

/// Keep every primary item and a uniform random sample of the other two
/// categories sized by `ratios`, then shuffle the combined selection.
///
/// Fails with [`DatasetError::NoPrimaryImages`] when there is no primary item;
/// nothing is selected in that case.
pub fn balance<T, R>(
    mut sets: CategorySets<T>,
    ratios: &BalanceRatios,
    rng: &mut R,
) -> Result<Balanced<T>, DatasetError>
where
    R: Rng + ?Sized,
{
    let available = CategoryCounts::of(&sets);
    let n_primary = available.primary;
    if n_primary == 0 {
        return Err(DatasetError::NoPrimaryImages {
            class_name: PRIMARY_CLASS_NAME,
            secondary: available.secondary,
            negative: available.negative,
        });
    }

    let kept = CategoryCounts {
        primary: n_primary,
        secondary: available
            .secondary
            .min(ratios.target(n_primary, ratios.secondary_per_unit)),
        negative: available
            .negative
            .min(ratios.target(n_primary, ratios.negative_per_unit)),
    };

    let mut selected = Vec::with_capacity(kept.total());
    for category in [Category::Primary, Category::Secondary, Category::Negative] {
        let items = sets.get_mut(category);
        items.shuffle(&mut *rng);
        items.truncate(kept.get(category));
        selected.append(items);
    }
    selected.shuffle(&mut *rng);

    Ok(Balanced {
        selected,
        stats: BalanceStats { available, kept },
    })
}

/// Train and validation partitions of a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitData<T> {
    pub train: Vec<T>,
    pub val: Vec<T>,
}

/// Split a selection: the first `floor(len * val_ratio)` items become the
/// validation set and the rest the training set. Order is preserved.
pub fn split_selection<T>(mut selected: Vec<T>, val_ratio: f64) -> SplitData<T> {
    let n_val = ((selected.len() as f64 * val_ratio).floor() as usize).min(selected.len());
    let train = selected.split_off(n_val);
    SplitData {
        train,
        val: selected,
    }
}
