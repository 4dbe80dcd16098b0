/// Property-based tests using proptest
/// Tests invariants that should hold for all inputs
use bigdecimal::BigDecimal;
use imob_lead_api::contact::normalize_phone;
use imob_lead_api::scoring::{score_lead, LeadPriority, LeadProfile, URGENCY_KEYWORDS};
use proptest::prelude::*;

// Property: the scorer never panics, stays in range, and its priority
// always agrees with the score
proptest! {
    #[test]
    fn scorer_never_panics_and_stays_in_range(
        phone in proptest::option::of("\\PC{0,20}"),
        intent in proptest::option::of("\\PC{0,20}"),
        budget in proptest::option::of(0i64..100_000_000i64),
        regions in proptest::collection::vec("\\PC{0,12}", 0..4),
        property_type in proptest::option::of("\\PC{0,12}"),
        notes in proptest::option::of("\\PC{0,60}"),
        message in proptest::option::of("\\PC{0,60}")
    ) {
        let profile = LeadProfile {
            phone,
            intent,
            budget_min: budget.map(BigDecimal::from),
            budget_max: None,
            regions,
            property_type,
            notes,
        };

        let result = score_lead(&profile, message.as_deref());
        prop_assert!((0..=100).contains(&result.score));
        prop_assert_eq!(result.priority, LeadPriority::from_score(result.score));
    }

    #[test]
    fn score_equals_sum_of_reason_points(
        intent in proptest::option::of("[a-z]{1,10}"),
        budget in proptest::option::of(1i64..10_000_000i64),
        regions in proptest::collection::vec("[A-Za-z ]{1,12}", 0..3),
        message in proptest::option::of("[a-z ]{0,40}")
    ) {
        let profile = LeadProfile {
            intent,
            budget_max: budget.map(BigDecimal::from),
            regions,
            ..Default::default()
        };

        let result = score_lead(&profile, message.as_deref());

        // Every fired rule appends exactly one reason carrying its
        // point value as "(+N)"
        let mut sum = 0;
        for reason in &result.reasons {
            let points: i32 = reason
                .rsplit("(+")
                .next()
                .and_then(|tail| tail.strip_suffix(')'))
                .and_then(|digits| digits.parse().ok())
                .unwrap_or(0);
            prop_assert!(points > 0, "reason without points: {}", reason);
            sum += points;
        }
        prop_assert_eq!(result.score, sum);
    }
}

// Property: filling in a profile field never lowers the score
proptest! {
    #[test]
    fn adding_intent_never_lowers_score(
        notes in proptest::option::of("[a-z ]{0,30}"),
        intent in "[a-z]{1,12}"
    ) {
        let without = LeadProfile {
            notes: notes.clone(),
            ..Default::default()
        };
        let with = LeadProfile {
            intent: Some(intent),
            notes,
            ..Default::default()
        };

        prop_assert!(score_lead(&with, None).score >= score_lead(&without, None).score);
    }

    #[test]
    fn adding_budget_never_lowers_score(
        phone in proptest::option::of("[0-9]{8,13}"),
        budget in 1i64..10_000_000i64
    ) {
        let without = LeadProfile {
            phone: phone.clone(),
            ..Default::default()
        };
        let with = LeadProfile {
            phone,
            budget_min: Some(BigDecimal::from(budget)),
            ..Default::default()
        };

        prop_assert!(score_lead(&with, None).score >= score_lead(&without, None).score);
    }
}

// Property: the urgency bonus is flat no matter how many keywords hit
proptest! {
    #[test]
    fn multiple_urgency_keywords_score_like_one(
        first in prop::sample::select(URGENCY_KEYWORDS.to_vec()),
        second in prop::sample::select(URGENCY_KEYWORDS.to_vec())
    ) {
        let one = score_lead(&LeadProfile::default(), Some(first));
        let many_text = format!("{} and {} and {}", first, second, first);
        let many = score_lead(&LeadProfile::default(), Some(&many_text));

        prop_assert_eq!(one.score, 20);
        prop_assert_eq!(many.score, 20);
    }
}

// Property: every score maps to exactly one priority with exact
// thresholds at 80/60/40
proptest! {
    #[test]
    fn priority_thresholds_are_exact(score in 0i32..=100i32) {
        let priority = LeadPriority::from_score(score);
        let expected = if score >= 80 {
            LeadPriority::Urgent
        } else if score >= 60 {
            LeadPriority::High
        } else if score >= 40 {
            LeadPriority::Medium
        } else {
            LeadPriority::Low
        };
        prop_assert_eq!(priority, expected);
    }
}

// Property: phone normalization never panics, emits "+" then digits,
// and is idempotent
proptest! {
    #[test]
    fn normalization_never_panics(raw in "\\PC{0,24}") {
        let _ = normalize_phone(&raw, "55");
    }

    #[test]
    fn normalized_output_is_plus_then_digits(raw in "[0-9+() .-]{8,20}") {
        if let Ok(normalized) = normalize_phone(&raw, "55") {
            prop_assert!(normalized.starts_with('+'));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
            prop_assert!(normalized.len() >= 8);
        }
    }

    #[test]
    fn normalization_is_idempotent(raw in "[0-9+() .-]{8,20}") {
        if let Ok(once) = normalize_phone(&raw, "55") {
            let twice = normalize_phone(&once, "55").unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn very_short_phones_always_rejected(raw in "[0-9]{0,6}") {
        prop_assert!(normalize_phone(&raw, "55").is_err(),
            "Very short phone should be rejected: {}", raw);
    }
}
