//! Property-based tests for title normalisation, season record transitions
//! and classifier dedup.

use proptest::prelude::*;

use seasonarr::domain::{EpisodeTag, ShowId};
use seasonarr::matching::{Classifier, Expectation, ProcessedSet};
use seasonarr::models::{Candidate, CompletionMethod, SeasonRecord, SeasonStatus};
use seasonarr::parser::{extract_episodes, normalize};

#[derive(Debug, Clone)]
enum Op {
    Sync(Option<u32>, Option<u32>),
    Begin,
    Confirm(u32),
    Fail(u32),
    Pack(CompletionMethod),
    Discrepant,
    PartiallyAired,
    Clear,
    Reset,
}

fn arb_count() -> impl Strategy<Value = Option<u32>> {
    prop_oneof![Just(None), (0u32..=16).prop_map(Some)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (arb_count(), arb_count()).prop_map(|(total, aired)| Op::Sync(total, aired)),
        Just(Op::Begin),
        (0u32..=18).prop_map(Op::Confirm),
        (0u32..=18).prop_map(Op::Fail),
        prop_oneof![
            Just(CompletionMethod::CompletePack),
            Just(CompletionMethod::WithExtrasPack),
        ]
        .prop_map(Op::Pack),
        Just(Op::Discrepant),
        Just(Op::PartiallyAired),
        Just(Op::Clear),
        Just(Op::Reset),
    ]
}

fn apply(record: &mut SeasonRecord, op: &Op) {
    // Rejected transitions (unaired episodes, nothing aired) leave the record as is.
    match op {
        Op::Sync(total, aired) => record.sync_metadata(*total, *aired),
        Op::Begin => record.begin_attempt(),
        Op::Confirm(n) => {
            let _ = record.confirm_episode(EpisodeTag::new(*n));
        }
        Op::Fail(n) => {
            let _ = record.fail_episode(EpisodeTag::new(*n));
        }
        Op::Pack(method) => {
            let _ = record.complete_with_pack(*method);
        }
        Op::Discrepant => record.mark_discrepant("pack count mismatch"),
        Op::PartiallyAired => record.mark_partially_aired(),
        Op::Clear => record.clear_discrepancy(),
        Op::Reset => record.reset(),
    }
}

proptest! {
    #[test]
    fn prop_normalize_is_idempotent(title in "[A-Za-z0-9 .,_&'()\\[\\]-]{0,48}") {
        let once = normalize(&title);
        let twice = normalize(&once.canonical);
        prop_assert_eq!(twice, once);
    }

    #[test]
    fn prop_season_sets_partition_aired_episodes(
        total in arb_count(),
        aired in arb_count(),
        ops in prop::collection::vec(arb_op(), 0..40),
    ) {
        let mut record = SeasonRecord::new(ShowId::new(1), 1, total, aired);
        prop_assert!(record.is_consistent());

        for op in &ops {
            let confirmed_before = record.confirmed_episodes.clone();
            apply(&mut record, op);
            prop_assert!(record.is_consistent(), "after {:?}: {:?}", op, record);
            if matches!(op, Op::Sync(..)) {
                prop_assert!(confirmed_before.is_subset(&record.confirmed_episodes));
            }
            if record.status == SeasonStatus::Completed {
                prop_assert!(record.unprocessed_episodes.is_empty());
            }
        }
    }

    #[test]
    fn prop_sync_without_counts_keeps_confirmed_episodes(
        total in 1u32..=16,
        confirm in prop::collection::btree_set(1u32..=16, 0..8),
    ) {
        let mut record = SeasonRecord::new(ShowId::new(1), 1, Some(total), Some(total));
        for n in confirm.iter().filter(|&&n| n <= total) {
            record.confirm_episode(EpisodeTag::new(*n)).unwrap();
        }
        let before = record.clone();

        apply(&mut record, &Op::Sync(None, None));

        prop_assert_eq!(&record.confirmed_episodes, &before.confirmed_episodes);
        prop_assert_eq!(record.status, before.status);
        prop_assert_eq!(record.aired_episode_count, Some(total));
        prop_assert!(record.is_consistent());
    }

    #[test]
    fn prop_processed_candidates_are_never_accepted(
        title in "[A-Za-z ]{1,24}",
        season in 1u32..=20,
    ) {
        let candidate = Candidate::new(format!("{title} S{season:02} 1080p"));
        let expectation = Expectation::season(title, season);
        let mut processed = ProcessedSet::new();
        processed.insert(candidate.key());

        let result = Classifier::default().classify(&candidate, &expectation, &processed);
        prop_assert!(!result.accepted);
    }

    #[test]
    fn prop_episode_ranges_are_sorted_and_bounded(
        season in 1u32..=30,
        start in 1u32..=40,
        len in 0u32..=20,
    ) {
        let end = start + len;
        let text = format!("Show.S{season:02}E{start:02}-E{end:02}.1080p");
        let episodes = extract_episodes(&text, season);

        prop_assert!(episodes.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(episodes.iter().all(|&e| (start..=end).contains(&e)));
        prop_assert!(episodes.contains(&start));
    }
}
