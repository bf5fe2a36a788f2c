// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for permission key, forbidden entry and page path parsing

#![no_main]

use edugate_policy::{normalize_page_path, ForbiddenEntry, PermissionKey};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Ok(key) = PermissionKey::parse(s) {
            // A parsed key must print back to something that parses to itself
            let reparsed = PermissionKey::parse(&key.to_string()).expect("display must reparse");
            assert_eq!(reparsed, key);

            let exact = ForbiddenEntry::Exact(key.clone());
            assert!(exact.matches(&key));
            let wildcard = ForbiddenEntry::Namespace(key.namespace().to_string());
            assert!(wildcard.matches(&key));
        }

        if let Ok(entry) = ForbiddenEntry::parse(s) {
            let _ = entry.is_wildcard();
        }

        let path = normalize_page_path(s);
        assert_eq!(normalize_page_path(path), path);
    }
});
