#![no_main]

use libfuzzer_sys::fuzz_target;
use tidemark_session::Session;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    // 디코딩에 성공한 쿠키는 다시 인코딩해도 같은 세션이어야 한다
    if let Ok(session) = Session::decode(raw) {
        let reencoded = Session::decode(&session.encode()).expect("re-encoded cookie must decode");
        assert_eq!(reencoded, session);
    }
});
