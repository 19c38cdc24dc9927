pub mod capture_and_detect_use_case;
pub mod detect_with_escalation_use_case;
