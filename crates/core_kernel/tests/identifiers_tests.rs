//! Comprehensive unit tests for the Identifiers module
//!
//! Tests cover all identifier types, their creation, parsing,
//! conversion, and display formatting.

use core_kernel::{
    ActorId, AllocationId, CustomerId, EarnTransactionId, LedgerEntryId, OrgId, RedemptionId,
    RuleId, ServiceId,
};
use uuid::Uuid;

mod customer_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = CustomerId::new();
        let id2 = CustomerId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_new_v7_generates_time_ordered_ids() {
        let id1 = CustomerId::new_v7();
        std::thread::sleep(std::time::Duration::from_millis(1));
        let id2 = CustomerId::new_v7();
        let uuid1: Uuid = id1.into();
        let uuid2: Uuid = id2.into();
        assert!(uuid1 < uuid2);
    }

    #[test]
    fn test_from_uuid() {
        let uuid = Uuid::new_v4();
        let id = CustomerId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(CustomerId::prefix(), "CUS");
    }

    #[test]
    fn test_display_format() {
        let id = CustomerId::new();
        let display = id.to_string();
        assert!(display.starts_with("CUS-"));
    }

    #[test]
    fn test_from_str_with_prefix() {
        let original = CustomerId::new();
        let string = original.to_string();
        let parsed: CustomerId = string.parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_from_str_without_prefix() {
        let uuid = Uuid::new_v4();
        let parsed: CustomerId = uuid.to_string().parse().unwrap();
        assert_eq!(*parsed.as_uuid(), uuid);
    }

    #[test]
    fn test_uuid_conversion() {
        let uuid = Uuid::new_v4();
        let id: CustomerId = uuid.into();
        let back: Uuid = id.into();
        assert_eq!(uuid, back);
    }

    #[test]
    fn test_json_serialization() {
        let id = CustomerId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: CustomerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }
}

mod ledger_entry_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = LedgerEntryId::new();
        let id2 = LedgerEntryId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(LedgerEntryId::prefix(), "LED");
    }

    #[test]
    fn test_display_format() {
        let id = LedgerEntryId::new();
        let display = id.to_string();
        assert!(display.starts_with("LED-"));
    }

    #[test]
    fn test_roundtrip() {
        let original = LedgerEntryId::new();
        let string = original.to_string();
        let parsed: LedgerEntryId = string.parse().unwrap();
        assert_eq!(original, parsed);
    }

    #[test]
    fn test_ordering_follows_uuid_ordering() {
        let low = LedgerEntryId::from_uuid(Uuid::nil());
        let high = LedgerEntryId::from_uuid(Uuid::max());
        assert!(low < high);
    }
}

mod rule_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = RuleId::new();
        let id2 = RuleId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(RuleId::prefix(), "RUL");
    }

    #[test]
    fn test_display_format() {
        let id = RuleId::new();
        let display = id.to_string();
        assert!(display.starts_with("RUL-"));
    }
}

mod org_id_tests {
    use super::*;

    #[test]
    fn test_new_generates_unique_ids() {
        let id1 = OrgId::new();
        let id2 = OrgId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_prefix() {
        assert_eq!(OrgId::prefix(), "ORG");
    }

    #[test]
    fn test_display_format() {
        let id = OrgId::new();
        let display = id.to_string();
        assert!(display.starts_with("ORG-"));
    }
}

mod cross_type_tests {
    use super::*;

    #[test]
    fn test_different_id_types_are_distinct() {
        // Same UUID should create different identifier instances
        // that are type-safe (can't mix CustomerId with ServiceId)
        let uuid = Uuid::new_v4();
        let customer_id = CustomerId::from_uuid(uuid);
        let service_id = ServiceId::from_uuid(uuid);

        // They contain the same UUID but are different types
        assert_eq!(*customer_id.as_uuid(), *service_id.as_uuid());
    }

    #[test]
    fn test_id_prefixes_are_unique() {
        let prefixes = vec![
            OrgId::prefix(),
            ActorId::prefix(),
            CustomerId::prefix(),
            ServiceId::prefix(),
            RuleId::prefix(),
            EarnTransactionId::prefix(),
            LedgerEntryId::prefix(),
            RedemptionId::prefix(),
            AllocationId::prefix(),
        ];

        // Check all prefixes are unique
        let mut unique_prefixes: Vec<&str> = prefixes.clone();
        unique_prefixes.sort();
        unique_prefixes.dedup();

        assert_eq!(
            prefixes.len(),
            unique_prefixes.len(),
            "All identifier prefixes should be unique"
        );
    }
}

mod edge_cases {
    use super::*;

    #[test]
    fn test_nil_uuid() {
        let nil_uuid = Uuid::nil();
        let id = CustomerId::from_uuid(nil_uuid);
        assert!(id.as_uuid().is_nil());
    }

    #[test]
    fn test_max_uuid() {
        let max_uuid = Uuid::max();
        let id = CustomerId::from_uuid(max_uuid);
        assert_eq!(*id.as_uuid(), max_uuid);
    }
}
