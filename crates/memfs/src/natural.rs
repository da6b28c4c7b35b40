// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/spkenv/spk

use std::cmp::Ordering;

#[cfg(test)]
#[path = "./natural_test.rs"]
mod natural_test;

/// Compare two names in natural order.
///
/// Runs of ascii digits are compared by their numeric value, so that
/// `file2` sorts before `file10`. Everything else is compared
/// case-sensitively by code point. Numbers of any length are supported,
/// and when two numbers only differ by leading zeros the shorter
/// spelling sorts first, so only identical names compare as equal.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    // utf-8 preserves code point order bytewise, and digits are
    // always single bytes, so there is no need to decode characters
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    let mut zeros_tiebreak = Ordering::Equal;
    loop {
        match (a.get(i), b.get(j)) {
            (None, None) => return zeros_tiebreak,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let a_end = digits_end(a, i);
                let b_end = digits_end(b, j);
                let a_num = &a[i..a_end];
                let b_num = &b[j..b_end];
                match compare_numbers(a_num, b_num) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
                if zeros_tiebreak == Ordering::Equal {
                    zeros_tiebreak = a_num.len().cmp(&b_num.len());
                }
                i = a_end;
                j = b_end;
            }
            (Some(x), Some(y)) => {
                match x.cmp(y) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
                i += 1;
                j += 1;
            }
        }
    }
}

fn digits_end(s: &[u8], start: usize) -> usize {
    s[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map(|len| start + len)
        .unwrap_or(s.len())
}

fn compare_numbers(a: &[u8], b: &[u8]) -> Ordering {
    let a = trim_zeros(a);
    let b = trim_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn trim_zeros(digits: &[u8]) -> &[u8] {
    let start = digits
        .iter()
        .position(|c| *c != b'0')
        .unwrap_or(digits.len());
    &digits[start..]
}
