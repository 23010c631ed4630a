//! Variant clustering: canonical song groups from raw catalog entries.
//!
//! Tracks sharing a normalized title are split into duration sub-clusters
//! ("variants"). Duration is a cheap, robust discriminator between a true
//! alternate recording (live take, different length) and a repackage of the
//! identical recording (same length, different metadata tags already removed
//! by the normalizer).

use rustc_hash::FxHashMap;

use crate::models::{GroupKey, RawTrack, SongGroup};
use crate::normalize::TitleNormalizer;

/// Groups raw tracks into canonical song groups. Processing is input-order:
/// a borderline track joins the first matching variant, so callers that want
/// reproducible clusterings must feed tracks in a stable order.
pub struct Clusterer {
    normalizer: TitleNormalizer,
    threshold_ms: u64,
}

impl Clusterer {
    pub fn new(normalizer: TitleNormalizer, threshold_ms: u64) -> Self {
        Self {
            normalizer,
            threshold_ms,
        }
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// Cluster `tracks` into song groups. Returned groups are in creation
    /// order; `members` hold indices into `tracks` in discovery order.
    ///
    /// A track joins variant `i` of its normalized title when its duration
    /// differs by strictly less than the threshold from ANY existing member
    /// of that variant (chain matching, not centroid matching). Variants are
    /// scanned in index order and the first match wins; no match opens the
    /// next variant.
    pub fn cluster(&self, tracks: &[RawTrack]) -> Vec<SongGroup> {
        let mut groups: Vec<SongGroup> = Vec::new();
        // normalized title -> group indices for its variants, in variant order
        let mut variants_by_title: FxHashMap<String, Vec<usize>> = FxHashMap::default();

        for (idx, track) in tracks.iter().enumerate() {
            let title = self.normalizer.normalize(&track.title);
            let variants = variants_by_title.entry(title.clone()).or_default();

            let matched = variants.iter().copied().find(|&g| {
                groups[g].members.iter().any(|&m| {
                    tracks[m].duration_ms.abs_diff(track.duration_ms) < self.threshold_ms
                })
            });

            match matched {
                Some(g) => groups[g].members.push(idx),
                None => {
                    let variant = variants.len() as u32 + 1;
                    variants.push(groups.len());
                    groups.push(SongGroup {
                        key: GroupKey { title, variant },
                        members: vec![idx],
                        play_count: None,
                    });
                }
            }
        }

        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, title: &str, duration_ms: u64) -> RawTrack {
        RawTrack {
            track_id: id.to_string(),
            title: title.to_string(),
            artists: vec![],
            duration_ms,
            album: String::new(),
            release_date: None,
            isrc: None,
            api_popularity: None,
            play_count: None,
            popularity: None,
        }
    }

    fn clusterer(threshold_ms: u64) -> Clusterer {
        Clusterer::new(TitleNormalizer::default(), threshold_ms)
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(clusterer(20_000).cluster(&[]).is_empty());
    }

    #[test]
    fn duration_outlier_opens_second_variant() {
        let tracks = vec![
            track("a", "Anthem", 200_000),
            track("b", "Anthem - Remastered", 201_000),
            track("c", "Anthem", 400_000),
        ];
        let groups = clusterer(20_000).cluster(&tracks);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.title, "anthem");
        assert_eq!(groups[0].key.variant, 1);
        assert_eq!(groups[0].members, vec![0, 1]);
        assert_eq!(groups[1].key.variant, 2);
        assert_eq!(groups[1].members, vec![2]);
    }

    #[test]
    fn chain_matching_links_drifting_durations() {
        // 0 and 30s are farther apart than the threshold, but 15s bridges
        // them: matching is against any member, not the first.
        let tracks = vec![
            track("a", "Drift", 200_000),
            track("b", "Drift", 215_000),
            track("c", "Drift", 230_000),
        ];
        let groups = clusterer(20_000).cluster(&tracks);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members, vec![0, 1, 2]);
    }

    #[test]
    fn threshold_is_exclusive() {
        let tracks = vec![track("a", "Edge", 200_000), track("b", "Edge", 220_000)];
        let groups = clusterer(20_000).cluster(&tracks);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn first_matching_variant_wins() {
        // The third track fits both variants; variant order decides.
        let tracks = vec![
            track("a", "Border", 100_000),
            track("b", "Border", 150_000),
            track("c", "Border", 125_000),
        ];
        let groups = clusterer(30_000).cluster(&tracks);
        assert_eq!(groups.len(), 2);
        // c is within 30s of a, so it joins variant 1 even though it is also
        // within 30s of b in variant 2.
        assert_eq!(groups[0].members, vec![0, 2]);
        assert_eq!(groups[1].members, vec![1]);
    }

    #[test]
    fn different_titles_never_share_a_group() {
        let tracks = vec![track("a", "One", 200_000), track("b", "Two", 200_000)];
        let groups = clusterer(20_000).cluster(&tracks);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key.variant, 1);
        assert_eq!(groups[1].key.variant, 1);
    }

    #[test]
    fn normalized_variants_collapse_into_one_group() {
        let tracks = vec![
            track("a", "Wonderwall", 258_000),
            track("b", "Wonderwall - Remastered 2014", 258_500),
            track("c", "Wonderwall (Deluxe Edition)", 259_000),
        ];
        let groups = clusterer(20_000).cluster(&tracks);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].members.len(), 3);
    }

    #[test]
    fn tighter_profile_splits_what_the_broad_one_keeps() {
        let tracks = vec![track("a", "Same", 200_000), track("b", "Same", 202_500)];
        assert_eq!(clusterer(20_000).cluster(&tracks).len(), 1);
        assert_eq!(clusterer(1_700).cluster(&tracks).len(), 2);
    }
}
