//! URL 지문
//!
//! 세션 쿠키의 `r`(참조 URL)과 `nu`(다음 URL) 필드에 쓰이는 고정 폭 해시입니다.
//! 퍼센트 인코딩한 URL에 32비트 FNV-1a를 적용하고 7자리 base 36으로 표현합니다.

use crate::base36;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 16_777_619;

/// 해시 문자열 길이
pub const HASH_WIDTH: usize = 7;

/// 32비트 FNV-1a
pub fn fnv1a32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, &b| {
        (hash ^ u32::from(b)).wrapping_mul(FNV_PRIME)
    })
}

/// URL의 7자리 소문자 base 36 지문을 계산합니다.
pub fn navigation_hash(url: &str) -> String {
    let encoded = urlencoding::encode(url);
    base36::encode_padded(u64::from(fnv1a32(encoded.as_bytes())), HASH_WIDTH)
}
