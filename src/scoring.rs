//! Deterministic lead scoring.
//!
//! Pure functions only: no clock, no I/O, no randomness. The same
//! profile and message always produce the same score, which keeps
//! re-scoring after staff edits and the batch re-score tool honest.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

/// Keywords that signal buying urgency in an inbound message.
/// Matched case-insensitively as substrings; the bonus is flat +20
/// no matter how many of them appear.
pub const URGENCY_KEYWORDS: &[&str] = &[
    "urgent",
    "today",
    "this week",
    "visit",
    "proposal",
    "want to buy",
    "want to rent",
    "close",
    "already",
    "now",
];

/// Priority tag derived from the final score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl LeadPriority {
    /// Maps a clamped score onto its priority bucket.
    /// Thresholds are inclusive on the lower bound: 80+ urgent,
    /// 60-79 high, 40-59 medium, below 40 low.
    pub fn from_score(score: i32) -> Self {
        match score {
            s if s >= 80 => LeadPriority::Urgent,
            s if s >= 60 => LeadPriority::High,
            s if s >= 40 => LeadPriority::Medium,
            _ => LeadPriority::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadPriority::Low => "low",
            LeadPriority::Medium => "medium",
            LeadPriority::High => "high",
            LeadPriority::Urgent => "urgent",
        }
    }
}

impl std::fmt::Display for LeadPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The scorable slice of a lead. Built from a stored lead before
/// re-scoring, or deserialized directly for score previews.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadProfile {
    pub phone: Option<String>,
    pub intent: Option<String>,
    pub budget_min: Option<BigDecimal>,
    pub budget_max: Option<BigDecimal>,
    pub regions: Vec<String>,
    pub property_type: Option<String>,
    pub notes: Option<String>,
}

/// Scoring result: clamped score, derived priority, and one reason
/// string per rule that fired, in rule order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadScore {
    pub score: i32,
    pub priority: LeadPriority,
    pub reasons: Vec<String>,
}

/// Scores a lead profile against the latest inbound message.
///
/// Rules are additive and evaluated in a fixed order: phone +15,
/// intent +20, either budget bound +20, regions +15, property type
/// +10, urgency keyword +20. The urgency haystack is the message
/// when one is given, otherwise the stored notes, otherwise empty.
/// The total is clamped to 0..=100.
///
/// # Arguments
/// * `profile` - Scorable lead fields
/// * `latest_message` - Text of the newest inbound message, if any
///
/// # Returns
/// * `LeadScore` with score, priority and per-rule reasons
pub fn score_lead(profile: &LeadProfile, latest_message: Option<&str>) -> LeadScore {
    let mut score = 0i32;
    let mut reasons = Vec::new();

    if profile.phone.as_deref().map_or(false, non_blank) {
        score += 15;
        reasons.push("phone number on record (+15)".to_string());
    }

    if profile.intent.as_deref().map_or(false, non_blank) {
        score += 20;
        reasons.push("purchase or rental intent stated (+20)".to_string());
    }

    if profile.budget_min.is_some() || profile.budget_max.is_some() {
        score += 20;
        reasons.push("budget range provided (+20)".to_string());
    }

    if profile.regions.iter().any(|r| non_blank(r)) {
        score += 15;
        reasons.push("regions of interest listed (+15)".to_string());
    }

    if profile.property_type.as_deref().map_or(false, non_blank) {
        score += 10;
        reasons.push("property type specified (+10)".to_string());
    }

    let haystack = latest_message
        .or(profile.notes.as_deref())
        .unwrap_or("")
        .to_lowercase();
    if let Some(keyword) = URGENCY_KEYWORDS.iter().find(|k| haystack.contains(*k)) {
        score += 20;
        reasons.push(format!("urgency signal \"{keyword}\" (+20)"));
    }

    let score = score.clamp(0, 100);
    LeadScore {
        score,
        priority: LeadPriority::from_score(score),
        reasons,
    }
}

fn non_blank(s: &str) -> bool {
    !s.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone_only() -> LeadProfile {
        LeadProfile {
            phone: Some("+5561999990000".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn empty_profile_scores_zero_low() {
        let result = score_lead(&LeadProfile::default(), None);
        assert_eq!(result.score, 0);
        assert_eq!(result.priority, LeadPriority::Low);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn fully_populated_profile_scores_one_hundred_urgent() {
        let profile = LeadProfile {
            phone: Some("+5511988887777".to_string()),
            intent: Some("purchase".to_string()),
            budget_min: Some(BigDecimal::from(500_000)),
            budget_max: Some(BigDecimal::from(900_000)),
            regions: vec!["Pinheiros".to_string(), "Vila Madalena".to_string()],
            property_type: Some("apartment".to_string()),
            notes: None,
        };
        let result = score_lead(&profile, Some("can we visit today?"));
        assert_eq!(result.score, 100);
        assert_eq!(result.priority, LeadPriority::Urgent);
        assert_eq!(result.reasons.len(), 6);
    }

    #[test]
    fn phone_plus_urgent_message_scores_thirty_five_low() {
        let result = score_lead(&phone_only(), Some("I want to visit today"));
        assert_eq!(result.score, 35);
        assert_eq!(result.priority, LeadPriority::Low);
    }

    #[test]
    fn adding_budget_min_lifts_to_fifty_five_medium() {
        let mut profile = phone_only();
        profile.budget_min = Some(BigDecimal::from(300_000));
        let result = score_lead(&profile, Some("I want to visit today"));
        assert_eq!(result.score, 55);
        assert_eq!(result.priority, LeadPriority::Medium);
    }

    #[test]
    fn urgency_falls_back_to_notes_when_no_message() {
        let mut profile = phone_only();
        profile.notes = Some("asked for a proposal last week".to_string());
        let result = score_lead(&profile, None);
        assert_eq!(result.score, 35);
    }

    #[test]
    fn provided_message_suppresses_notes_fallback() {
        let mut profile = phone_only();
        profile.notes = Some("urgent buyer".to_string());
        let result = score_lead(&profile, Some("hello there"));
        assert_eq!(result.score, 15);
    }

    #[test]
    fn multiple_keywords_grant_bonus_once() {
        let result = score_lead(&phone_only(), Some("urgent! visit today, close now"));
        assert_eq!(result.score, 35);
        assert_eq!(
            result
                .reasons
                .iter()
                .filter(|r| r.contains("urgency"))
                .count(),
            1
        );
    }

    #[test]
    fn keyword_match_is_case_insensitive() {
        let result = score_lead(&phone_only(), Some("URGENT: call me"));
        assert_eq!(result.score, 35);
    }

    #[test]
    fn blank_fields_do_not_score() {
        let profile = LeadProfile {
            phone: Some("   ".to_string()),
            intent: Some("".to_string()),
            regions: vec!["".to_string(), "  ".to_string()],
            property_type: Some(" ".to_string()),
            ..Default::default()
        };
        let result = score_lead(&profile, None);
        assert_eq!(result.score, 0);
    }

    #[test]
    fn single_budget_bound_is_enough() {
        let only_max = LeadProfile {
            budget_max: Some(BigDecimal::from(750_000)),
            ..Default::default()
        };
        assert_eq!(score_lead(&only_max, None).score, 20);
    }

    #[test]
    fn priority_thresholds_are_exact() {
        assert_eq!(LeadPriority::from_score(0), LeadPriority::Low);
        assert_eq!(LeadPriority::from_score(39), LeadPriority::Low);
        assert_eq!(LeadPriority::from_score(40), LeadPriority::Medium);
        assert_eq!(LeadPriority::from_score(59), LeadPriority::Medium);
        assert_eq!(LeadPriority::from_score(60), LeadPriority::High);
        assert_eq!(LeadPriority::from_score(79), LeadPriority::High);
        assert_eq!(LeadPriority::from_score(80), LeadPriority::Urgent);
        assert_eq!(LeadPriority::from_score(100), LeadPriority::Urgent);
    }

    #[test]
    fn priority_serializes_lowercase() {
        let json = serde_json::to_string(&LeadPriority::Urgent).unwrap();
        assert_eq!(json, "\"urgent\"");
    }
}
