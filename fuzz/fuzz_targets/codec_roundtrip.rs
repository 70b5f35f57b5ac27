#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use tidemark_capture::{ErrorRecord, compress, decompress};

/// 퍼저용 구조적 에러 레코드 입력
#[derive(Arbitrary, Debug)]
struct FuzzRecord {
    message: String,
    source: Option<String>,
    line: Option<u32>,
    column: Option<u32>,
    stack: Option<String>,
    count: u8,
}

fuzz_target!(|input: Vec<FuzzRecord>| {
    // 레코드 수 제한 (퍼징 성능)
    let records: Vec<ErrorRecord> = input
        .into_iter()
        .take(32)
        .map(|r| {
            let mut record = ErrorRecord::new(r.message);
            record.source = r.source;
            record.line = r.line;
            record.column = r.column;
            record.stack = r.stack;
            record.count = u32::from(r.count.max(1));
            record
        })
        .collect();

    let compressed = compress(&records);
    let restored = decompress(&compressed).expect("compressed output must decompress");

    assert_eq!(restored.len(), records.len());
    for (before, after) in records.iter().zip(&restored) {
        assert_eq!(before.message, after.message);
        assert_eq!(before.source, after.source);
        assert_eq!(before.line, after.line);
        assert_eq!(before.column, after.column);
        assert_eq!(before.stack, after.stack);
        assert_eq!(before.count, after.count);
    }
});
