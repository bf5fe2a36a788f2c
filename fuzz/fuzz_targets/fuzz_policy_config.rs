// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for policy document loading, compilation and validation

#![no_main]

use edugate_policy::PolicyConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // Malformed documents must be rejected, never panic
        if let Ok(config) = PolicyConfig::from_json_str(s) {
            if let Ok(policy) = config.compile() {
                let _ = policy.validate_role_configuration();
                for role in policy.roles().iter() {
                    let _ = role.effective_permissions();
                }
            }
        }
    }
});
