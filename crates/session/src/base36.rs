//! 소문자 base 36 정수 표현

const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 정수를 소문자 base 36 문자열로 인코딩합니다.
pub fn encode(mut value: u64) -> String {
    if value == 0 {
        return "0".to_owned();
    }
    let mut buf = Vec::with_capacity(13);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    buf.into_iter().map(char::from).collect()
}

/// 최소 `width` 자리가 되도록 앞을 `0`으로 채워 인코딩합니다.
pub fn encode_padded(value: u64, width: usize) -> String {
    format!("{:0>width$}", encode(value))
}

/// base 36 문자열을 디코딩합니다. 대소문자를 구분하지 않습니다.
///
/// 빈 문자열, 허용되지 않는 문자, `u64` 오버플로우는 `None`입니다.
pub fn decode(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    s.chars().try_fold(0_u64, |acc, c| {
        let digit = u64::from(c.to_digit(36)?);
        acc.checked_mul(36)?.checked_add(digit)
    })
}
