#![no_main]

use libfuzzer_sys::fuzz_target;

use flowsentry_core::record::{Record, Source};
use flowsentry_core::schema;
use flowsentry_policy::mapper;

fuzz_target!(|data: &[u8]| {
    // 임의의 속성 이름이 문자열 뷰를 패닉시키지 않아야 합니다
    if let Ok(attr) = std::str::from_utf8(data) {
        let mut r = Record::new();
        r.set_int(schema::SF_REC_TYPE, Source::SysFlow, 1);
        r.set_str(
            schema::POD_SERVICES_STR,
            Source::SysFlow,
            r#"{"service":{"name":"dns"}}"#,
        );
        let m = mapper();
        let _ = (m.map_str(attr))(&r);
        let _ = (m.map_int(attr))(&r);
    }
});
