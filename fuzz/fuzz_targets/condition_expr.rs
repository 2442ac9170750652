#![no_main]

use libfuzzer_sys::fuzz_target;

use flowsentry_policy::lang::{self, ErrorSink};

fuzz_target!(|data: &[u8]| {
    // 렉서/파서는 &str을 받으므로 UTF-8 변환 필요
    if let Ok(cond) = std::str::from_utf8(data) {
        let mut sink = ErrorSink::new();
        let tokens = lang::tokenize(cond, "fuzz-input", &mut sink);
        let _ = lang::parse(&tokens, "fuzz-input", &mut sink);
    }
});
