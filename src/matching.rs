use rayon::prelude::*;

use crate::detection::BriefDescriptor;

/// A correspondence between descriptor `query_idx` of the query set and
/// descriptor `train_idx` of the train set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: u32,
}

/// Brute-force Hamming 2-NN with Lowe's ratio test.
#[derive(Debug, Clone, Copy)]
pub struct RatioMatcher {
    pub ratio: f32,
}

impl Default for RatioMatcher {
    fn default() -> Self {
        RatioMatcher { ratio: 0.7 }
    }
}

impl RatioMatcher {
    pub fn new(ratio: f32) -> RatioMatcher {
        RatioMatcher { ratio }
    }

    /// One match per query descriptor whose nearest train descriptor is
    /// clearly closer than the second nearest. Results follow query order.
    pub fn match_descriptors(
        &self,
        query: &[BriefDescriptor],
        train: &[BriefDescriptor],
    ) -> Vec<DMatch> {
        if train.len() < 2 {
            return Vec::new();
        }
        query
            .par_iter()
            .enumerate()
            .filter_map(|(query_idx, q)| {
                let (best_idx, best, second) = two_nearest(q, train);
                if (best as f32) < self.ratio * second as f32 {
                    Some(DMatch {
                        query_idx,
                        train_idx: best_idx,
                        distance: best,
                    })
                } else {
                    None
                }
            })
            .collect()
    }
}

/// Index and distance of the nearest descriptor, plus the second distance.
/// Ties keep the lowest index.
fn two_nearest(q: &BriefDescriptor, train: &[BriefDescriptor]) -> (usize, u32, u32) {
    let mut best_idx = 0;
    let mut best = u32::MAX;
    let mut second = u32::MAX;
    for (i, t) in train.iter().enumerate() {
        let d = q.hamming_distance(t);
        if d < best {
            second = best;
            best = d;
            best_idx = i;
        } else if d < second {
            second = d;
        }
    }
    (best_idx, best, second)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(bits: u64) -> BriefDescriptor {
        BriefDescriptor([bits, 0, 0, 0])
    }

    #[test]
    fn test_too_few_train_descriptors() {
        let matcher = RatioMatcher::default();
        assert!(matcher.match_descriptors(&[desc(1)], &[]).is_empty());
        assert!(matcher.match_descriptors(&[desc(1)], &[desc(1)]).is_empty());
    }

    #[test]
    fn test_unambiguous_match_survives() {
        let matcher = RatioMatcher::default();
        let train = [desc(0xff), desc(0), desc(0xffff_0000)];
        let matches = matcher.match_descriptors(&[desc(1)], &train);
        assert_eq!(
            matches,
            vec![DMatch {
                query_idx: 0,
                train_idx: 1,
                distance: 1
            }]
        );
    }

    #[test]
    fn test_ambiguous_match_rejected() {
        let matcher = RatioMatcher::default();
        // distances 1 and 1: equal, never below 0.7 of each other
        let train = [desc(0b01), desc(0b10)];
        assert!(matcher.match_descriptors(&[desc(0)], &train).is_empty());
    }

    #[test]
    fn test_ratio_boundary_is_strict() {
        // best 7, second 10: 7 < 0.7 * 10 is false
        let matcher = RatioMatcher::new(0.7);
        let train = [desc(0x7f), desc(0x3ff)];
        assert!(matcher.match_descriptors(&[desc(0)], &train).is_empty());
        let train = [desc(0x3f), desc(0x3ff)];
        assert_eq!(matcher.match_descriptors(&[desc(0)], &train).len(), 1);
    }

    #[test]
    fn test_exact_zero_distance_against_far_second() {
        let matcher = RatioMatcher::default();
        let train = [desc(u64::MAX), desc(42)];
        let matches = matcher.match_descriptors(&[desc(42), desc(u64::MAX)], &train);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].train_idx, 1);
        assert_eq!(matches[1].train_idx, 0);
    }
}
