use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Selection state over the wallpaper set.
///
/// In sequential mode `cursor` indexes the set directly. With shuffle on it
/// indexes `permutation`, which always covers the whole set once the first
/// wallpaper has been drawn.
#[derive(Debug, Clone, Default)]
pub struct RotationState {
    current: Option<PathBuf>,
    cursor: usize,
    permutation: Vec<usize>,
    rotated_at: Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RotationSnapshot {
    pub current: Option<PathBuf>,
    pub cursor: usize,
    pub permutation: Vec<usize>,
    pub rotated_at: Option<DateTime<Local>>,
}

impl RotationState {
    pub fn current(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn snapshot(&self) -> RotationSnapshot {
        RotationSnapshot {
            current: self.current.clone(),
            cursor: self.cursor,
            permutation: self.permutation.clone(),
            rotated_at: self.rotated_at,
        }
    }

    /// Start over after the set changed or shuffle was toggled.
    pub fn reset<R: Rng>(&mut self, files: &[PathBuf], shuffle: bool, rng: &mut R) {
        if shuffle {
            self.permutation = self.fresh_permutation(files, rng);
            self.cursor = 0;
        } else {
            self.permutation.clear();
            // continue after the wallpaper on screen when it is still in the set
            self.cursor = self
                .current
                .as_ref()
                .and_then(|cur| files.iter().position(|f| f == cur))
                .map_or(0, |i| (i + 1) % files.len().max(1));
        }
    }

    /// Pick the next wallpaper, or `None` for an empty set.
    pub fn advance<R: Rng>(
        &mut self,
        files: &[PathBuf],
        shuffle: bool,
        rng: &mut R,
    ) -> Option<PathBuf> {
        if files.is_empty() {
            return None;
        }

        let index = if shuffle {
            if self.permutation.len() != files.len() || self.cursor >= self.permutation.len() {
                self.permutation = self.fresh_permutation(files, rng);
                self.cursor = 0;
            }
            let index = self.permutation[self.cursor];
            self.cursor += 1;
            index
        } else {
            let index = self.cursor % files.len();
            self.cursor = index + 1;
            index
        };

        let path = files[index].clone();
        self.current = Some(path.clone());
        self.rotated_at = Some(Local::now());
        Some(path)
    }

    /// A random order over `files` whose first entry is not the wallpaper
    /// currently shown, unless the set has a single entry.
    fn fresh_permutation<R: Rng>(&self, files: &[PathBuf], rng: &mut R) -> Vec<usize> {
        let mut order: Vec<usize> = (0..files.len()).collect();
        order.shuffle(rng);
        if order.len() > 1 {
            if let Some(current) = &self.current {
                if files[order[0]] == *current {
                    let swap_with = rng.random_range(1..order.len());
                    order.swap(0, swap_with);
                }
            }
        }
        order
    }
}
