mod common;

use std::collections::BTreeMap;

use aula::capacity::{CapacityGuard, can_assign};
use common::paralelo;

#[tokio::test]
async fn test_can_assign_near_capacity() {
    assert!(!can_assign(48, 3, 50));
    assert!(can_assign(48, 2, 50));
    assert!(can_assign(50, 0, 50));
    assert!(!can_assign(51, 0, 50));
}

#[tokio::test]
async fn test_can_assign_is_monotonic_in_incoming() {
    for capacity in [0u32, 1, 30, 50] {
        for current in 0..=capacity + 2 {
            for incoming in 0..=capacity + 2 {
                if can_assign(current, incoming, capacity) {
                    for smaller in 0..incoming {
                        assert!(
                            can_assign(current, smaller, capacity),
                            "current={} incoming={} smaller={} capacity={}",
                            current,
                            incoming,
                            smaller,
                            capacity
                        );
                    }
                }
            }
        }
    }
}

#[tokio::test]
async fn test_can_assign_does_not_overflow() {
    assert!(!can_assign(u32::MAX, 1, u32::MAX));
    assert!(can_assign(u32::MAX, 0, u32::MAX));
}

#[tokio::test]
async fn test_default_guard_uses_fifty() {
    let guard = CapacityGuard::default();
    assert_eq!(guard.capacity(), 50);
    assert_eq!(guard.remaining(48), 2);
    assert_eq!(guard.remaining(60), 0);
    assert_eq!(guard.occupancy_percent(25), 50);
}

#[tokio::test]
async fn test_choices_disable_groups_that_would_overflow() {
    let guard = CapacityGuard::new(50);
    let paralelos = vec![paralelo(1, "3", "A"), paralelo(2, "3", "B")];
    let counts = BTreeMap::from([(1, 48usize), (2, 10usize)]);

    let choices = guard.choices(&paralelos, &counts, 3);
    assert_eq!(choices.len(), 2);
    assert!(!choices[0].enabled);
    assert!(choices[1].enabled);
    assert_eq!(choices[0].display(), "3-A (48/50)");
    assert_eq!(choices[1].display(), "3-B (10/50)");
}

#[tokio::test]
async fn test_choices_treat_unloaded_groups_as_empty() {
    let guard = CapacityGuard::new(2);
    let choices = guard.choices(&[paralelo(7, "1", "C")], &BTreeMap::new(), 2);
    assert_eq!(choices[0].current, 0);
    assert!(choices[0].enabled);
}
