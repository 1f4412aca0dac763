use crate::*;

/// Formats `num` to at most `total_width` significant digits.
pub fn format_float(num: float, total_width: usize) -> String {
    debug_assert!(total_width > 0);
    if !num.is_finite() {
        return num.to_string();
    }
    let formatted = format!("{:.*e}", total_width.saturating_sub(1), num);
    // round trip drops trailing zeros
    let formatted_num = formatted.parse::<float>().unwrap_or(num);
    let integer_width = num.trunc().abs().to_string().len() + 1;
    let width = formatted_num.to_string().len();
    if integer_width >= width {
        format!("{formatted_num}")
    } else {
        format!("{:.precision$}", formatted_num, precision = width - integer_width)
    }
}

/// Thousands separators on the integer part, three decimals at most.
pub fn format_with_separator<T: CCfloat>(n: T, sep: char) -> String {
    let n = (n.float() * 1000.0).round() / 1000.0;
    let sign = if n < 0.0 { "-" } else { "" };
    let n = n.abs();
    let integer = (n.trunc() as u64).to_string();
    let decimal = n.to_string().split_once('.').map(|(_, d)| format!(".{d}")).unwrap_or_default();

    let mut formatted = String::new();
    let len = integer.len();
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            formatted.push(sep);
        }
        formatted.push(c);
    }
    format!("{sign}{formatted}{decimal}")
}
