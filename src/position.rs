//! Fractional position keys for ordering siblings.
//!
//! A key is an integer part followed by an optional fractional part, both
//! written in base 62 (`0-9A-Za-z`). The head character of the integer part
//! encodes its length, so appending at either end only increments or
//! decrements the integer and key length grows logarithmically. Inserting
//! between two keys bisects the fractional part.
//!
//! Only the (at most two) neighbouring keys are ever read; no other sibling
//! key is touched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ArborError, Result};

const DIGITS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const BASE: usize = 62;
const ZERO: u8 = b'0';
const LAST_DIGIT: u8 = b'z';

/// Key handed out for the first child of an empty sibling list.
pub const BASELINE_KEY: &str = "a0";

/// The smallest integer part; nothing can be placed before it.
const SMALLEST_INTEGER: &str = "A00000000000000000000000000";

/// An opaque, lexicographically ordered sibling position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionKey(String);

impl PositionKey {
    /// Parse and validate a stored key.
    pub fn parse(key: &str) -> Result<Self> {
        validate_order_key(key)?;
        Ok(Self(key.to_string()))
    }

    pub fn baseline() -> Self {
        Self(BASELINE_KEY.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for PositionKey {
    type Err = ArborError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Key before `next`, or the baseline when the list is empty.
pub fn at_start(next: Option<&PositionKey>) -> Result<PositionKey> {
    between(None, next)
}

/// Key after `prev`, or the baseline when the list is empty.
pub fn at_end(prev: Option<&PositionKey>) -> Result<PositionKey> {
    between(prev, None)
}

/// Key strictly between `prev` and `next`.
///
/// Fails with [`ArborError::Ordering`] when `prev >= next`.
pub fn between(prev: Option<&PositionKey>, next: Option<&PositionKey>) -> Result<PositionKey> {
    let key = key_between(prev.map(PositionKey::as_str), next.map(PositionKey::as_str))?;
    Ok(PositionKey(key))
}

fn ordering(prev: &str, next: &str) -> ArborError {
    ArborError::Ordering {
        prev: prev.to_string(),
        next: next.to_string(),
    }
}

fn invalid(key: &str, reason: &str) -> ArborError {
    ArborError::InvalidPositionKey {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn digit(key: &str, c: u8) -> Result<usize> {
    DIGITS
        .iter()
        .position(|&d| d == c)
        .ok_or_else(|| invalid(key, "character outside the base-62 alphabet"))
}

fn integer_length(head: u8) -> Option<usize> {
    match head {
        b'a'..=b'z' => Some((head - b'a') as usize + 2),
        b'A'..=b'Z' => Some((b'Z' - head) as usize + 2),
        _ => None,
    }
}

fn validate_integer(int: &str) -> Result<()> {
    let head = *int.as_bytes().first().ok_or_else(|| invalid(int, "empty key"))?;
    match integer_length(head) {
        Some(len) if len == int.len() => Ok(()),
        Some(_) => Err(invalid(int, "integer part has the wrong length")),
        None => Err(invalid(int, "head must be a letter")),
    }
}

fn integer_part(key: &str) -> Result<&str> {
    let head = *key.as_bytes().first().ok_or_else(|| invalid(key, "empty key"))?;
    let len = integer_length(head).ok_or_else(|| invalid(key, "head must be a letter"))?;
    key.get(..len)
        .ok_or_else(|| invalid(key, "integer part is truncated"))
}

fn validate_order_key(key: &str) -> Result<()> {
    if !key.is_ascii() {
        return Err(invalid(key, "character outside the base-62 alphabet"));
    }
    if key == SMALLEST_INTEGER {
        return Err(invalid(key, "smallest integer is reserved"));
    }
    let int = integer_part(key)?;
    for &c in key.as_bytes().iter().skip(1) {
        digit(key, c)?;
    }
    if key.len() > int.len() && key.ends_with('0') {
        return Err(invalid(key, "fractional part ends with zero"));
    }
    Ok(())
}

/// Midpoint of two fractional parts; `b = None` means "past the end".
fn midpoint(a: &str, b: Option<&str>) -> Result<String> {
    if let Some(b) = b {
        if a >= b {
            return Err(ordering(a, b));
        }
    }
    if a.ends_with('0') || b.is_some_and(|b| b.ends_with('0')) {
        return Err(invalid(a, "fractional part ends with zero"));
    }

    let a_bytes = a.as_bytes();
    if let Some(b) = b {
        let b_bytes = b.as_bytes();
        let mut n = 0;
        while n < b_bytes.len() && a_bytes.get(n).copied().unwrap_or(ZERO) == b_bytes[n] {
            n += 1;
        }
        if n > 0 {
            let rest_a = if n < a.len() { &a[n..] } else { "" };
            return Ok(format!("{}{}", &b[..n], midpoint(rest_a, Some(&b[n..]))?));
        }
    }

    let digit_a = match a_bytes.first() {
        Some(&c) => digit(a, c)?,
        None => 0,
    };
    let digit_b = match b.and_then(|b| b.as_bytes().first().copied()) {
        Some(c) => digit(b.unwrap_or_default(), c)?,
        None => BASE,
    };

    if digit_b - digit_a > 1 {
        let mid = (digit_a + digit_b + 1) / 2;
        return Ok((DIGITS[mid] as char).to_string());
    }

    if let Some(b) = b {
        if b.len() > 1 {
            return Ok(b[..1].to_string());
        }
    }
    let rest_a = if a.len() > 1 { &a[1..] } else { "" };
    Ok(format!("{}{}", DIGITS[digit_a] as char, midpoint(rest_a, None)?))
}

fn assemble(head: u8, digits: &[u8]) -> String {
    let mut out = String::with_capacity(digits.len() + 1);
    out.push(head as char);
    out.extend(digits.iter().map(|&d| d as char));
    out
}

/// Next integer, or `None` once the largest integer is reached.
fn increment_integer(int: &str) -> Result<Option<String>> {
    validate_integer(int)?;
    let head = int.as_bytes()[0];
    let mut digs = int.as_bytes()[1..].to_vec();

    let mut carry = true;
    for i in (0..digs.len()).rev() {
        if !carry {
            break;
        }
        let d = digit(int, digs[i])? + 1;
        if d == BASE {
            digs[i] = ZERO;
        } else {
            digs[i] = DIGITS[d];
            carry = false;
        }
    }

    if !carry {
        return Ok(Some(assemble(head, &digs)));
    }
    match head {
        b'Z' => Ok(Some(assemble(b'a', &[ZERO]))),
        b'z' => Ok(None),
        _ => {
            let h = head + 1;
            if h > b'a' {
                digs.push(ZERO);
            } else {
                digs.pop();
            }
            Ok(Some(assemble(h, &digs)))
        }
    }
}

/// Previous integer, or `None` once the smallest integer is reached.
fn decrement_integer(int: &str) -> Result<Option<String>> {
    validate_integer(int)?;
    let head = int.as_bytes()[0];
    let mut digs = int.as_bytes()[1..].to_vec();

    let mut borrow = true;
    for i in (0..digs.len()).rev() {
        if !borrow {
            break;
        }
        let d = digit(int, digs[i])?;
        if d == 0 {
            digs[i] = LAST_DIGIT;
        } else {
            digs[i] = DIGITS[d - 1];
            borrow = false;
        }
    }

    if !borrow {
        return Ok(Some(assemble(head, &digs)));
    }
    match head {
        b'a' => Ok(Some(assemble(b'Z', &[LAST_DIGIT]))),
        b'A' => Ok(None),
        _ => {
            let h = head - 1;
            if h < b'Z' {
                digs.push(LAST_DIGIT);
            } else {
                digs.pop();
            }
            Ok(Some(assemble(h, &digs)))
        }
    }
}

fn key_between(a: Option<&str>, b: Option<&str>) -> Result<String> {
    if let Some(a) = a {
        validate_order_key(a)?;
    }
    if let Some(b) = b {
        validate_order_key(b)?;
    }

    match (a, b) {
        (None, None) => Ok(BASELINE_KEY.to_string()),
        (None, Some(b)) => {
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ib == SMALLEST_INTEGER {
                return Ok(format!("{}{}", ib, midpoint("", Some(fb))?));
            }
            if ib.len() < b.len() {
                return Ok(ib.to_string());
            }
            decrement_integer(ib)?.ok_or_else(|| invalid(b, "no key exists before it"))
        }
        (Some(a), None) => {
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            match increment_integer(ia)? {
                Some(next) => Ok(next),
                None => Ok(format!("{}{}", ia, midpoint(fa, None)?)),
            }
        }
        (Some(a), Some(b)) => {
            if a >= b {
                return Err(ordering(a, b));
            }
            let ia = integer_part(a)?;
            let fa = &a[ia.len()..];
            let ib = integer_part(b)?;
            let fb = &b[ib.len()..];
            if ia == ib {
                return Ok(format!("{}{}", ia, midpoint(fa, Some(fb))?));
            }
            let next = increment_integer(ia)?.ok_or_else(|| invalid(a, "no key exists after it"))?;
            if next.as_str() < b {
                Ok(next)
            } else {
                Ok(format!("{}{}", ia, midpoint(fa, None)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PositionKey {
        PositionKey::parse(s).unwrap()
    }

    #[test]
    fn test_empty_list_gets_baseline() {
        assert_eq!(at_end(None).unwrap().as_str(), "a0");
        assert_eq!(at_start(None).unwrap().as_str(), "a0");
        assert_eq!(between(None, None).unwrap().as_str(), "a0");
    }

    #[test]
    fn test_between_integer_neighbours() {
        let c = between(Some(&key("a0")), Some(&key("a2"))).unwrap();
        assert_eq!(c.as_str(), "a1");

        let c = between(Some(&key("a0")), Some(&key("a1"))).unwrap();
        assert_eq!(c.as_str(), "a0V");
    }

    #[test]
    fn test_single_bound_degenerates() {
        let a = key("a5");
        assert_eq!(between(Some(&a), None).unwrap(), at_end(Some(&a)).unwrap());
        assert_eq!(between(None, Some(&a)).unwrap(), at_start(Some(&a)).unwrap());
        assert!(at_start(Some(&a)).unwrap() < a);
        assert!(at_end(Some(&a)).unwrap() > a);
    }

    #[test]
    fn test_equal_bounds_is_ordering_error() {
        let a = key("a1");
        let result = between(Some(&a), Some(&a));
        assert!(matches!(result, Err(ArborError::Ordering { .. })));
    }

    #[test]
    fn test_inverted_bounds_is_ordering_error() {
        let result = between(Some(&key("a3")), Some(&key("a1")));
        assert!(matches!(result, Err(ArborError::Ordering { .. })));
    }

    #[test]
    fn test_parse_rejects_malformed_keys() {
        assert!(PositionKey::parse("").is_err());
        assert!(PositionKey::parse("b1").is_err());
        assert!(PositionKey::parse("a00").is_err());
        assert!(PositionKey::parse("a!").is_err());
        assert!(PositionKey::parse("aé").is_err());
        assert!("bé0".parse::<PositionKey>().is_err());
        assert!(PositionKey::parse("0a").is_err());
        assert!(PositionKey::parse(SMALLEST_INTEGER).is_err());
        assert!(PositionKey::parse("a0V").is_ok());
        assert!(PositionKey::parse("Zz").is_ok());
    }

    #[test]
    fn test_repeated_bisection_toward_lower_bound() {
        let lo = key("a0");
        let mut hi = key("a1");
        let mut seen = vec![lo.clone(), hi.clone()];
        for _ in 0..30 {
            let mid = between(Some(&lo), Some(&hi)).unwrap();
            assert!(lo < mid && mid < hi, "{} < {} < {}", lo, mid, hi);
            assert!(!seen.contains(&mid));
            seen.push(mid.clone());
            hi = mid;
        }
    }

    #[test]
    fn test_repeated_bisection_toward_upper_bound() {
        let mut lo = key("a0");
        let hi = key("a1");
        for _ in 0..30 {
            let mid = between(Some(&lo), Some(&hi)).unwrap();
            assert!(lo < mid && mid < hi, "{} < {} < {}", lo, mid, hi);
            lo = mid;
        }
    }

    #[test]
    fn test_append_sequence_is_strictly_increasing() {
        let mut prev: Option<PositionKey> = None;
        for _ in 0..5000 {
            let next = at_end(prev.as_ref()).unwrap();
            if let Some(p) = &prev {
                assert!(next > *p);
            }
            prev = Some(next);
        }
        // a0..az, b00..bzz, then c000..: three integer widths for 5000 keys
        assert!(prev.unwrap().as_str().len() <= 4);
    }

    #[test]
    fn test_prepend_sequence_is_strictly_decreasing() {
        let mut next: Option<PositionKey> = None;
        for _ in 0..5000 {
            let key = at_start(next.as_ref()).unwrap();
            if let Some(n) = &next {
                assert!(key < *n);
            }
            next = Some(key);
        }
        assert!(next.unwrap().as_str().len() <= 4);
    }

    #[test]
    fn test_inserting_never_touches_neighbours() {
        let mut keys: Vec<PositionKey> = Vec::new();
        // Deterministic spread of insert positions
        for step in 0..200usize {
            let idx = if keys.is_empty() { 0 } else { (step * 7) % (keys.len() + 1) };
            let before = keys.clone();
            let prev = if idx == 0 { None } else { keys.get(idx - 1) };
            let next = keys.get(idx);
            let new_key = between(prev, next).unwrap();
            keys.insert(idx, new_key);

            let mut remaining = keys.clone();
            remaining.remove(idx);
            assert_eq!(remaining, before);
            assert!(keys.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
