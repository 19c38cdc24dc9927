pub mod confidence_escalation;
pub mod detection_service;
