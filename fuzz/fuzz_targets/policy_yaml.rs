#![no_main]

use libfuzzer_sys::fuzz_target;

use flowsentry_policy::PolicyCompiler;

fuzz_target!(|data: &[u8]| {
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        let _ = PolicyCompiler::compile_sources(&[(
            "fuzz-input.yaml".to_owned(),
            yaml_str.to_owned(),
        )]);
    }
});
