use super::*;

// ============================================================================
// SEVERITY FILTER
// ============================================================================

#[test]
fn test_errors_only_filter() {
    let flags = severity_flags(DebugSeverity::ErrorsOnly);
    assert!(flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR));
    assert!(!flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
}

#[test]
fn test_errors_and_warnings_filter() {
    let flags = severity_flags(DebugSeverity::ErrorsAndWarnings);
    assert!(flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING));
    assert!(!flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
}

#[test]
fn test_all_filter() {
    let flags = severity_flags(DebugSeverity::All);
    assert!(flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE));
    assert!(flags.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO));
}

// ============================================================================
// SEVERITY MAPPING
// ============================================================================

#[test]
fn test_log_severity_mapping() {
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR), LogSeverity::Error);
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING), LogSeverity::Warn);
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::INFO), LogSeverity::Info);
    assert_eq!(log_severity(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE), LogSeverity::Trace);
}

#[test]
fn test_message_type_names() {
    assert_eq!(message_type_name(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION), "Validation");
    assert_eq!(message_type_name(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE), "Performance");
    assert_eq!(message_type_name(vk::DebugUtilsMessageTypeFlagsEXT::GENERAL), "General");
}

// ============================================================================
// STATISTICS
// ============================================================================

#[test]
fn test_stats_tracker_counts_by_severity() {
    let tracker = ValidationStatsTracker::new();
    tracker.increment(LogSeverity::Error);
    tracker.increment(LogSeverity::Warn);
    tracker.increment(LogSeverity::Warn);
    tracker.increment(LogSeverity::Trace);

    let stats = tracker.get_stats();
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.warnings, 2);
    assert_eq!(stats.info, 0);
    assert_eq!(stats.verbose, 1);
    assert_eq!(stats.total(), 4);

    tracker.reset();
    assert_eq!(tracker.get_stats().total(), 0);
}

#[test]
fn test_repeated_messages_are_counted() {
    let message = "test_repeated_messages_are_counted: unique message";
    let first = track_message(message);
    let second = track_message(message);
    assert_eq!(second, first + 1);
}
