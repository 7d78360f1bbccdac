//! Case-insensitive, numeric-aware ordering for entry names.
//!
//! Runs of ASCII digits compare by numeric value, everything else compares
//! by lower-cased character, so `File1 < file2 < file10`. Names that are
//! equal under that rule fall back to plain byte order, which keeps the
//! ordering total and lets sorted child lists be binary-searched.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

/// Total natural ordering of two names.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_fold_cmp(a, b).then_with(|| a.cmp(b))
}

/// Natural ordering ignoring case and leading zeros.
pub fn natural_fold_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let ord = cmp_numeric(&take_digits(&mut left), &take_digits(&mut right));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                left.next();
                right.next();
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

fn cmp_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
