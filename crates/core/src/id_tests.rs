// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn uuid_gen_prefixes_unique_ids() {
    let id_gen = UuidIdGen::new("att");
    let id1 = id_gen.next();
    let id2 = id_gen.next();
    assert_ne!(id1, id2);
    assert!(id1.starts_with("att-"));
    assert_eq!(id1.len(), "att-".len() + 36);
}

#[test]
fn uuid_gen_defaults_to_decision_prefix() {
    assert!(UuidIdGen::default().next().starts_with("dec-"));
}

#[test]
fn sequential_gen_creates_predictable_ids() {
    let id_gen = SequentialIdGen::new("dec");
    assert_eq!(id_gen.next(), "dec-1");
    assert_eq!(id_gen.next(), "dec-2");
}

#[test]
fn sequential_gen_clones_share_counter() {
    let id_gen1 = SequentialIdGen::new("shared");
    let id_gen2 = id_gen1.clone();
    assert_eq!(id_gen1.next(), "shared-1");
    assert_eq!(id_gen2.next(), "shared-2");
}
