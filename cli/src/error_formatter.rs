use ariadne::{Color, Label, Report, ReportKind, Source};
use mast::MastError;

/// Format a MastError with fancy terminal output using Ariadne
pub fn format_error(error: &MastError) -> String {
    match error {
        MastError::Parse(details) => {
            let mut output = Vec::new();

            let message = format!(
                "Parse error: {} (at {}:{}:{})",
                details.message, details.source_id, details.span.line, details.span.col
            );

            let start = details.span.start.min(details.source_text.len());
            let end = details
                .span
                .end
                .max(start + 1)
                .min(details.source_text.len().max(start));
            let mut report = Report::build(ReportKind::Error, &details.source_id, start)
                .with_message(message)
                .with_label(
                    Label::new((&details.source_id, start..end))
                        .with_message("")
                        .with_color(Color::Red),
                );

            if let Some(suggestion) = &details.suggestion {
                report = report.with_help(suggestion);
            }

            match report.finish().write(
                (
                    &details.source_id,
                    Source::from(details.source_text.as_ref()),
                ),
                &mut output,
            ) {
                Ok(_) => String::from_utf8_lossy(&output).to_string(),
                Err(_) => {
                    // Fallback to simple format
                    format!("{}", error)
                }
            }
        }
        MastError::UnsupportedOperation { operation, arity } => format!(
            "Unsupported operation: the algebra has no {} operation '{}'",
            arity, operation
        ),
        MastError::UnboundSymbol(name) => format!(
            "Unbound symbol: '{}' has no value\n  Pass it as a binding, e.g. {}=1",
            name, name
        ),
        MastError::Domain(msg) => format!("Domain error: {}", msg),
        MastError::MalformedProgram(msg) => format!("Internal error: {}", msg),
        MastError::Backend(msg) => format!("Backend error: {}", msg),
        MastError::ResourceLimitExceeded {
            limit_name,
            limit_value,
            actual_value,
            suggestion,
        } => {
            format!(
                "Resource limit exceeded: {}\n  Limit: {}\n  Actual: {}\n  {}",
                limit_name, limit_value, actual_value, suggestion
            )
        }
    }
}
