#![no_main]

use libfuzzer_sys::fuzz_target;
use mast::{parse, CompileOptions};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(tree) = parse(s, &CompileOptions::default()) {
            // Whatever parses must print back into something that parses
            let _ = parse(&tree.to_string(), &CompileOptions::default()).unwrap();
        }
    }
});
