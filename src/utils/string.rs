//! UTF-8 safe string helpers.
//!
//! All lengths here count Unicode scalar values (chars), never bytes, so
//! truncation can't panic on multibyte characters.

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return the last `n` characters of `s`.
pub fn suffix_chars(s: &str, n: usize) -> String {
    let total = s.chars().count();
    s.chars().skip(total.saturating_sub(n)).collect()
}

/// Return a preview of `s` up to `n` characters. If `s` is longer than `n`
/// characters, the returned string will include a trailing ellipsis `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Keep the first `head` and last `tail` characters with `marker` between
/// them. Strings of at most `head + tail` characters are returned unchanged.
pub fn head_tail(s: &str, head: usize, tail: usize, marker: &str) -> String {
    if s.chars().count() <= head + tail {
        return s.to_string();
    }
    format!("{}{}{}", prefix_chars(s, head), marker, suffix_chars(s, tail))
}

/// Format an integer with comma thousands separators (`40000` -> `40,000`).
pub fn format_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_basic_ascii() {
        let s = "hello world";
        assert_eq!(preview(s, 5), "hello...");
        assert_eq!(preview(s, 20), "hello world");
    }

    #[test]
    fn preview_cjk_characters() {
        let s = "宇树科技是最强的选手";
        assert_eq!(preview(s, 4), "宇树科技...");
        assert_eq!(suffix_chars(s, 2), "选手");
    }

    #[test]
    fn head_tail_keeps_both_ends() {
        let s = "abcdefghij";
        assert_eq!(head_tail(s, 3, 2, "|"), "abc|ij");
        assert_eq!(head_tail(s, 5, 5, "|"), s);
    }

    #[test]
    fn suffix_longer_than_string() {
        assert_eq!(suffix_chars("abc", 10), "abc");
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(40_000), "40,000");
        assert_eq!(format_thousands(100_000), "100,000");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }
}
