//! Routing rules: classification → handler name.
//!
//! First match wins, all comparisons case-insensitive:
//! 1. route or tag names medication → drug information
//! 2. route or tag names reports, health data or activity → general chat
//!    (no specialized handler for these yet)
//! 3. keywords in the message pick drug information or diagnosis support
//! 4. general chat

pub const CHAT_HANDLER: &str = "ai.chat";
pub const DRUG_INFO_HANDLER: &str = "ai.tool.drug_info";
pub const DIAGNOSIS_HANDLER: &str = "ai.tool.diagnosis_support";
pub const ROUTE_HANDLER: &str = "ai.route_with_master_prompt";

const DRUG_KEYWORDS: &[&str] = &["drug", "medication", "dose", "side effect"];
const DIAGNOSIS_KEYWORDS: &[&str] = &["diagnos", "symptom", "what could this be", "condition"];

/// Pick the handler for a classified message.
///
/// `tag` is the classifier's message type (or classification tag when no
/// message type was given).
pub fn resolve_handler(route_to: Option<&str>, tag: &str, message: &str) -> &'static str {
    let route = route_to.unwrap_or_default().to_lowercase();
    let tag = tag.trim().to_lowercase();

    if route.contains("medication") || tag.contains("medication") {
        return DRUG_INFO_HANDLER;
    }
    if ["report", "health_data", "healthdata", "activity"]
        .iter()
        .any(|k| route.contains(k))
        || matches!(tag.as_str(), "report" | "health" | "health_data" | "activity")
    {
        return CHAT_HANDLER;
    }
    handler_for_message(message)
}

/// Keyword fallback when the classification names no specific route.
pub fn handler_for_message(message: &str) -> &'static str {
    let m = message.to_lowercase();
    if DRUG_KEYWORDS.iter().any(|k| m.contains(k)) {
        DRUG_INFO_HANDLER
    } else if DIAGNOSIS_KEYWORDS.iter().any(|k| m.contains(k)) {
        DIAGNOSIS_HANDLER
    } else {
        CHAT_HANDLER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_route_or_tag() {
        assert_eq!(resolve_handler(Some("MedicationService"), "", "hi"), DRUG_INFO_HANDLER);
        assert_eq!(
            resolve_handler(Some("medication_data_entry_prompt.txt"), "", "hi"),
            DRUG_INFO_HANDLER
        );
        assert_eq!(resolve_handler(None, "MEDICATION", "hi"), DRUG_INFO_HANDLER);
    }

    #[test]
    fn unspecialized_categories_go_to_chat() {
        assert_eq!(resolve_handler(Some("ReportService"), "", "symptom list"), CHAT_HANDLER);
        assert_eq!(resolve_handler(Some("HealthDataService"), "", "my dose"), CHAT_HANDLER);
        assert_eq!(resolve_handler(Some("activity_prompt"), "", "x"), CHAT_HANDLER);
        assert_eq!(resolve_handler(None, "health", "what could this be"), CHAT_HANDLER);
    }

    #[test]
    fn keywords_decide_otherwise() {
        assert_eq!(
            resolve_handler(Some("MedicalQueryService"), "MEDICAL_QUERY", "Any side effects of this?"),
            DRUG_INFO_HANDLER
        );
        assert_eq!(
            resolve_handler(Some("MedicalQueryService"), "MEDICAL_QUERY", "Rash and fever, what could this be"),
            DIAGNOSIS_HANDLER
        );
        assert_eq!(
            resolve_handler(Some("MedicalQueryService"), "MEDICAL_QUERY", "I have a headache"),
            CHAT_HANDLER
        );
    }

    #[test]
    fn drug_keywords_win_over_diagnosis() {
        assert_eq!(handler_for_message("Which drug for this condition?"), DRUG_INFO_HANDLER);
    }
}
