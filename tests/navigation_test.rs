//! Integration tests for the navigation index.

use std::path::PathBuf;

use rstest::{fixture, rstest};

use chnav::domain::{Choices, Database, Resolution};

fn resource(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/resources")
        .join(name)
}

fn load(name: &str) -> Database {
    let text = std::fs::read_to_string(resource(name)).expect("read fixture");
    Database::parse(&text).expect("fixture loads")
}

#[fixture]
fn accelerator() -> Database {
    load("accelerator.json")
}

// ============================================================
// Consistency with enumeration
// ============================================================

#[rstest]
#[case("production_line.json")]
#[case("sector_devices.json")]
#[case("accelerator.json")]
#[case("accelerator_legacy.json")]
fn given_enumerated_channel_when_walking_its_keys_then_reaches_same_identifier(
    #[case] name: &str,
) {
    let db = load(name);

    for channel in db.enumerate_all() {
        let keys = channel.path.choices();

        for depth in 0..keys.len() {
            match db.children_at(&keys[..depth]) {
                Choices::Branches { branches, .. } => assert!(
                    branches.iter().any(|b| b.key == keys[depth]),
                    "{} not offered after {:?}",
                    keys[depth],
                    &keys[..depth]
                ),
                Choices::Instances { expansion, .. } => assert!(
                    expansion.contains(keys[depth]),
                    "{} not generated after {:?}",
                    keys[depth],
                    &keys[..depth]
                ),
                other => panic!("unexpected {:?} after {:?}", other, &keys[..depth]),
            }
        }
        assert_eq!(db.children_at(keys.as_slice()), Choices::Terminal);

        match db.resolve(keys.as_slice()) {
            Resolution::Leaf { identifier, path } => {
                assert_eq!(identifier, channel.identifier);
                assert_eq!(path, channel.path);
            }
            other => panic!("{:?} did not resolve to a leaf: {:?}", keys, other),
        }
    }
}

// ============================================================
// Choices
// ============================================================

#[rstest]
fn given_empty_prefix_when_listing_children_then_offers_systems(accelerator: Database) {
    let Choices::Branches { level, branches } = accelerator.children_at::<&str>(&[]) else {
        panic!("expected tree choices at the root");
    };

    assert_eq!(level.name, "system");
    let keys: Vec<&str> = branches.iter().map(|b| b.key.as_str()).collect();
    assert_eq!(keys, vec!["MAG", "VAC"]);
    assert_eq!(branches[0].description.as_deref(), Some("magnets"));
}

#[rstest]
fn given_family_prefix_when_listing_children_then_describes_instances(accelerator: Database) {
    let Choices::Instances {
        level, expansion, ..
    } = accelerator.children_at(&["MAG", "QF"])
    else {
        panic!("expected instance choices");
    };

    assert_eq!(level.name, "device");
    assert_eq!(expansion.len(), 4);
    assert!(expansion.contains("QF03"));
    assert!(!expansion.contains("QF05"));
}

#[rstest]
fn given_unknown_key_when_listing_children_then_invalid_at_its_depth(accelerator: Database) {
    let Choices::Invalid(invalid) = accelerator.children_at(&["MAG", "SEXTUPOLE"]) else {
        panic!("expected invalid prefix");
    };

    assert_eq!(invalid.depth, 1);
    assert_eq!(invalid.value, "SEXTUPOLE");
}

// ============================================================
// Resolution
// ============================================================

#[rstest]
#[case::forced_single_field(&["VAC", "GAUGE", "G2"], "VAC:GAUGE[G2]:PRESSURE")]
#[case::forced_field_and_subfield(&["MAG", "QD", "QD1"], "MAG:QD[QD1]:CURRENT:SP")]
#[case::full_path(&["MAG", "QF", "QF01", "CURRENT", "RB"], "MAG:QF[QF01]:CURRENT:RB")]
#[case::leaf_above_last_level(&["MAG", "QF", "QF04", "STATUS"], "MAG:QF[QF04]:STATUS")]
fn given_determining_prefix_when_resolving_then_leaf(
    accelerator: Database,
    #[case] prefix: &[&str],
    #[case] expected: &str,
) {
    match accelerator.resolve(prefix) {
        Resolution::Leaf { identifier, .. } => assert_eq!(identifier, expected),
        other => panic!("expected leaf, got {:?}", other),
    }
}

#[rstest]
fn given_partial_prefix_when_resolving_then_ambiguous_with_remaining_levels(
    accelerator: Database,
) {
    let Resolution::Ambiguous {
        remaining_levels,
        channel,
    } = accelerator.resolve(&["MAG", "QF"])
    else {
        panic!("expected ambiguous");
    };

    assert_eq!(remaining_levels.first().map(String::as_str), Some("device"));
    assert_eq!(channel, None);
}

#[rstest]
fn given_value_outside_expansion_when_resolving_then_invalid(accelerator: Database) {
    let Resolution::Invalid(invalid) = accelerator.resolve(&["MAG", "QF", "QF05"]) else {
        panic!("expected invalid");
    };

    assert_eq!(invalid.depth, 2);
    assert_eq!(invalid.value, "QF05");
}

#[rstest]
fn given_prefix_past_leaf_when_resolving_then_invalid(accelerator: Database) {
    let resolution = accelerator.resolve(&["VAC", "GAUGE", "G1", "PRESSURE", "EXTRA"]);

    assert!(matches!(resolution, Resolution::Invalid(ref inv) if inv.depth == 4));
}

#[test]
fn given_shared_database_when_navigating_from_threads_then_answers_agree() {
    let db = load("accelerator.json");

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| db.resolve(&["VAC", "PUMP", "P1"])))
            .collect();
        for handle in handles {
            let resolution = handle.join().expect("thread finished");
            let Resolution::Leaf { identifier, .. } = resolution else {
                panic!("expected leaf");
            };
            assert_eq!(identifier, "VAC:PUMP[P1]:STATUS");
        }
    });
}
