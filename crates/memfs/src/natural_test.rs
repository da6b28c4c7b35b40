// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::cmp::Ordering;

use proptest::prelude::*;
use rstest::rstest;

use super::natural_cmp;

#[rstest]
#[case("a", "b", Ordering::Less)]
#[case("file2", "file10", Ordering::Less)]
#[case("file10", "file2", Ordering::Greater)]
#[case("x9y", "x10a", Ordering::Less)]
#[case("B", "a", Ordering::Less)]
#[case("a", "a", Ordering::Equal)]
#[case("a", "ab", Ordering::Less)]
#[case("007", "7", Ordering::Greater)]
#[case("7", "007", Ordering::Less)]
#[case("v01.2", "v1.10", Ordering::Less)]
#[case("99999999999999999999999", "100000000000000000000000", Ordering::Less)]
fn test_natural_cmp(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
    assert_eq!(natural_cmp(a, b), expected, "{a} vs {b}");
}

#[rstest]
fn test_natural_sort() {
    let mut names = vec!["img12.png", "img10.png", "IMG3.png", "img2.png", "img1.png"];
    names.sort_by(|a, b| natural_cmp(a, b));
    assert_eq!(
        names,
        vec!["IMG3.png", "img1.png", "img2.png", "img10.png", "img12.png"]
    );
}

proptest! {
    #[test]
    fn test_natural_cmp_antisymmetric(a in "[a-c0-9]{0,8}", b in "[a-c0-9]{0,8}") {
        prop_assert_eq!(natural_cmp(&a, &b), natural_cmp(&b, &a).reverse());
    }

    #[test]
    fn test_natural_cmp_equal_only_when_identical(a in "[a0-2]{0,6}", b in "[a0-2]{0,6}") {
        prop_assert_eq!(natural_cmp(&a, &b) == Ordering::Equal, a == b);
    }
}
