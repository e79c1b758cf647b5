use crate::{
    descriptor::Descriptor,
    extract::QueryFeatureSet,
    index::{Landmark, LandmarkIndex},
};
use log::debug;
use rayon::prelude::*;

/// Default cap on the number of correspondences returned by [`FeatureMatcher`].
pub const DEFAULT_MAX_RESULTS: usize = 50;

/// Default ceiling on the Hamming distance of an accepted match.
pub const DEFAULT_MAX_DISTANCE: u32 = 100;

/// A query feature paired with the landmark it matched.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Correspondence<'a> {
    query: usize,
    landmark: &'a Landmark,
    distance: u32,
}

impl<'a> Correspondence<'a> {
    pub fn new(query: usize, landmark: &'a Landmark, distance: u32) -> Self {
        Self {
            query,
            landmark,
            distance,
        }
    }

    /// Position of the matched feature in the [`QueryFeatureSet`].
    pub fn query(&self) -> usize {
        self.query
    }

    pub fn landmark(&self) -> &'a Landmark {
        self.landmark
    }

    /// Hamming distance between the query descriptor and the landmark descriptor.
    pub fn distance(&self) -> u32 {
        self.distance
    }
}

/// Brute force cross-check matching of query descriptors against a [`LandmarkIndex`].
///
/// A query descriptor matches its nearest pool descriptor only if that pool descriptor's
/// nearest query descriptor is the same query descriptor. Ties go to the lowest position on
/// both sides, so matching is deterministic.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureMatcher {
    max_results: usize,
    max_distance: Option<u32>,
}

impl FeatureMatcher {
    pub fn new(max_results: usize) -> Self {
        Self {
            max_results,
            max_distance: Some(DEFAULT_MAX_DISTANCE),
        }
    }

    /// Sets the largest accepted distance, `None` accepts any distance.
    pub fn with_max_distance(self, max_distance: Option<u32>) -> Self {
        Self {
            max_distance,
            ..self
        }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn max_distance(&self) -> Option<u32> {
        self.max_distance
    }

    /// Returns at most `max_results` correspondences ordered by ascending distance.
    ///
    /// Equal distances keep query order. Each query feature and each pool descriptor appears
    /// in at most one correspondence.
    pub fn matches<'a>(
        &self,
        query: &QueryFeatureSet,
        index: &'a LandmarkIndex,
    ) -> Vec<Correspondence<'a>> {
        let pool = index.pool();
        if pool.is_empty() || query.is_empty() {
            debug!(
                "nothing to match: {} query features, {} pool descriptors",
                query.len(),
                pool.len()
            );
            return Vec::new();
        }

        let queries: Vec<&Descriptor> = query.descriptors().collect();
        let forward: Vec<Option<(usize, u32)>> = queries
            .par_iter()
            .map(|descriptor| nearest(descriptor, pool.iter()))
            .collect();

        // Nearest query of each pool entry, computed the first time it is needed.
        let mut reverse: Vec<Option<usize>> = vec![None; pool.len()];
        let mut matches: Vec<(usize, usize, u32)> = Vec::new();
        for (query_index, candidate) in forward.into_iter().enumerate() {
            let Some((pool_index, distance)) = candidate else {
                continue;
            };
            if self.max_distance.is_some_and(|max| distance > max) {
                continue;
            }

            let back = *reverse[pool_index].get_or_insert_with(|| {
                nearest(&pool[pool_index], queries.iter().copied())
                    .map_or(usize::MAX, |(index, _)| index)
            });
            if back == query_index {
                matches.push((query_index, pool_index, distance));
            }
        }

        let mutual = matches.len();
        matches.sort_by_key(|&(_, _, distance)| distance);
        matches.truncate(self.max_results);

        debug!(
            "{mutual} mutual matches from {} query features, keeping {}",
            queries.len(),
            matches.len()
        );

        matches
            .into_iter()
            .filter_map(|(query_index, pool_index, distance)| {
                Some(Correspondence::new(
                    query_index,
                    index.owner(pool_index)?,
                    distance,
                ))
            })
            .collect()
    }
}

impl Default for FeatureMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

/// Returns the position and distance of the first candidate closest to `target`.
fn nearest<'d>(
    target: &Descriptor,
    candidates: impl Iterator<Item = &'d Descriptor>,
) -> Option<(usize, u32)> {
    candidates
        .map(|candidate| target.distance(candidate))
        .enumerate()
        .min_by_key(|&(_, distance)| distance)
}
