//! Chinese numeral conversion (`三` → 3, `十二` → 12, `一百零八` → 108).

fn digit_value(c: char) -> Option<u64> {
    match c {
        '0'..='9' => c.to_digit(10).map(u64::from),
        '０'..='９' => Some(u64::from(c as u32 - '０' as u32)),
        '〇' | '零' => Some(0),
        '一' => Some(1),
        '二' | '兩' | '两' => Some(2),
        '三' => Some(3),
        '四' => Some(4),
        '五' => Some(5),
        '六' => Some(6),
        '七' => Some(7),
        '八' => Some(8),
        '九' => Some(9),
        _ => None,
    }
}

fn small_unit(c: char) -> Option<u64> {
    match c {
        '十' => Some(10),
        '百' => Some(100),
        '千' => Some(1_000),
        _ => None,
    }
}

fn large_unit(c: char) -> Option<u64> {
    match c {
        '萬' | '万' => Some(10_000),
        '億' | '亿' => Some(100_000_000),
        _ => None,
    }
}

/// Parse a Chinese (or ASCII/fullwidth digit) numeral.
///
/// Digit-only strings are read positionally (`二〇二三` → 2023). Returns
/// `None` for empty input, unknown characters or values above `u32::MAX`.
pub fn parse_chinese_numeral(text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let has_units = text
        .chars()
        .any(|c| small_unit(c).is_some() || large_unit(c).is_some());

    let value = if has_units {
        parse_with_units(text)?
    } else {
        text.chars().try_fold(0u64, |acc, c| {
            acc.checked_mul(10)?.checked_add(digit_value(c)?)
        })?
    };

    u32::try_from(value).ok()
}

fn parse_with_units(text: &str) -> Option<u64> {
    let mut total: u64 = 0;
    let mut section: u64 = 0;
    let mut number: u64 = 0;
    let mut pending_digit = false;

    for c in text.chars() {
        if let Some(d) = digit_value(c) {
            number = d;
            pending_digit = true;
        } else if let Some(unit) = small_unit(c) {
            // A bare 十 means ten.
            let n = if pending_digit { number } else { 1 };
            section = section.checked_add(n.checked_mul(unit)?)?;
            number = 0;
            pending_digit = false;
        } else if let Some(unit) = large_unit(c) {
            section = section.checked_add(number)?;
            total = total.checked_add(section.checked_mul(unit)?)?;
            section = 0;
            number = 0;
            pending_digit = false;
        } else {
            return None;
        }
    }

    total.checked_add(section)?.checked_add(number)
}

/// Total wrapper around [`parse_chinese_numeral`]: unparseable input is 0.
pub fn convert(text: &str) -> u32 {
    parse_chinese_numeral(text).unwrap_or(0)
}
