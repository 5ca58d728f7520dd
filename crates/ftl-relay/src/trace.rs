use ftl_core::Failure;

/// Builds the replacement trace text for a relayed failure: a single frame
/// naming the test, wrapping the original message, with the first line of
/// the original trace kept as the cause.
pub fn synthesize_trace(failure: &Failure) -> String {
    let mut s = String::new();
    s.push_str(&format!("RelayedFailure: {}\n", failure.message));
    s.push_str(&format!(
        "\tat {}.{}\n",
        failure.description.class_name, failure.description.method_name
    ));
    if let Some(cause) = failure.trace.lines().map(str::trim).find(|l| !l.is_empty()) {
        s.push_str(&format!("Caused by: {}\n", cause));
    }
    s
}

/// Keeps description and message, replaces the trace.
pub fn rewrite_failure(failure: Failure) -> Failure {
    let trace = synthesize_trace(&failure);
    Failure { trace, ..failure }
}
