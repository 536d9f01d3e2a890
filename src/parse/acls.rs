use once_cell::sync::Lazy;
use regex::Regex;

use crate::scan::types::AclRecord;

static RESOURCE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"resourceType=([^,]+),\s*name=(.+?),\s*patternType=([^)\s]+)\)")
        .unwrap_or_else(|_| unreachable!())
});

static PERMISSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\(principal=User:(.+?),\s*host=(.+?),\s*operation=(.+?),\s*permissionType=(.+?)\)$",
    )
    .unwrap_or_else(|_| unreachable!())
});

/// Parse `kafka-acls.sh --list` output.
///
/// Permission lines belong to the last resource header seen. Lines for the same
/// (principal, host) on a resource are folded into one entry.
pub fn parse_acls(raw: &str) -> Vec<AclRecord> {
    let mut records = Vec::new();
    let mut current: Option<AclRecord> = None;

    for line in raw.lines().map(str::trim) {
        if let Some(caps) = PERMISSION_REGEX.captures(line) {
            if let Some(acl) = current.as_mut() {
                acl.fold_permission(&caps[1], &caps[2], &caps[3], &caps[4]);
            }
        } else if let Some(caps) = RESOURCE_REGEX.captures(line) {
            if let Some(acl) = current.take() {
                if !acl.name.is_empty() {
                    records.push(acl);
                }
            }
            current = Some(AclRecord::new(&caps[1], caps[2].trim(), &caps[3]));
        }
    }

    if let Some(acl) = current {
        if !acl.name.is_empty() {
            records.push(acl);
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
Current ACLs for resource `ResourcePattern(resourceType=TOPIC, name=orders, patternType=LITERAL)`:
 \t(principal=User:alice, host=*, operation=READ, permissionType=ALLOW)
\t(principal=User:alice, host=*, operation=DESCRIBE, permissionType=ALLOW)
\t(principal=User:bob, host=10.0.0.1, operation=WRITE, permissionType=ALLOW)

Current ACLs for resource `ResourcePattern(resourceType=GROUP, name=billing, patternType=PREFIXED)`:
\t(principal=User:alice, host=*, operation=READ, permissionType=ALLOW)
";

    #[test]
    fn test_resources_and_permissions() {
        let acls = parse_acls(LISTING);
        assert_eq!(acls.len(), 2);

        let orders = &acls[0];
        assert_eq!(orders.resource_type, "TOPIC");
        assert_eq!(orders.name, "orders");
        assert_eq!(orders.pattern_type, "LITERAL");
        assert_eq!(orders.permissions.len(), 2);

        let alice = &orders.permissions[0];
        assert_eq!(alice.principal, "alice");
        assert!(alice.read && alice.describe && !alice.write);
        assert_eq!(alice.permission_type, "ALLOW");

        let bob = &orders.permissions[1];
        assert_eq!(bob.host, "10.0.0.1");
        assert!(bob.write);

        assert_eq!(acls[1].resource_type, "GROUP");
        assert_eq!(acls[1].pattern_type, "PREFIXED");
    }

    #[test]
    fn test_folding_is_idempotent() {
        let line = "\t(principal=User:alice, host=*, operation=READ, permissionType=ALLOW)\n";
        let header = "Current ACLs for resource `ResourcePattern(resourceType=TOPIC, name=t, patternType=LITERAL)`:\n";
        let once = parse_acls(&format!("{header}{line}"));
        let twice = parse_acls(&format!("{header}{line}{line}"));

        assert_eq!(once, twice);
        assert_eq!(twice[0].permissions.len(), 1);
    }

    #[test]
    fn test_orphan_permissions_and_noise_are_dropped() {
        let raw = "(principal=User:eve, host=*, operation=READ, permissionType=DENY)\nnothing to see\n";
        assert!(parse_acls(raw).is_empty());
    }
}
