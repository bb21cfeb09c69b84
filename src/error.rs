//! Error types for the chronotab library.
//!
//! Every failure surfaces at job insertion time; once a schedule is
//! installed the engine has no recoverable error paths.

use thiserror::Error;

/// Errors returned when a schedule expression cannot be turned into a
/// [`Schedule`](crate::Schedule).
///
/// # Examples
///
/// ```rust
/// use chrono_tz::Tz;
/// use chronotab::Cron;
///
/// let cron = Cron::new(Tz::UTC);
///
/// match cron.add_fn("not-a-cron-expression", || {}) {
///     Ok(job_id) => println!("job added with id {}", job_id),
///     Err(err) => println!("invalid schedule expression: {}", err),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The spec string was empty.
    #[error("empty spec string")]
    EmptySpec,

    /// The `TZ=` / `CRON_TZ=` prefix named a zone the tz database does not
    /// know, or the prefix itself was malformed.
    #[error("provided bad location {name}: {cause}")]
    InvalidLocation { name: String, cause: String },

    /// An `@`-descriptor that is not one of the recognized presets.
    #[error("unrecognized descriptor: {0}")]
    UnrecognizedDescriptor(String),

    /// An `@`-descriptor was given to a parser configured without
    /// [`ParseOption::DESCRIPTOR`](crate::ParseOption::DESCRIPTOR).
    #[error("parser does not accept descriptors: {0}")]
    DescriptorNotAllowed(String),

    /// The number of whitespace-separated fields does not fit the parser's
    /// configured field set.
    #[error("expected {min} to {max} fields, found {got}")]
    FieldCount { min: usize, max: usize, got: usize },

    /// A field range such as `5-1` or `61` that violates the field bounds,
    /// or a range expression that does not parse at all.
    #[error("{reason}: {expr}")]
    BadRange { reason: String, expr: String },

    /// The duration of an `@every` descriptor did not parse.
    #[error("failed to parse duration {spec}: {cause}")]
    BadDuration { spec: String, cause: String },

    /// An absolute target instant that already lies in the past.
    #[error("target instant is in the past")]
    InvalidInstant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_offending_expression() {
        let err = Error::BadRange {
            reason: "beginning of range (5) beyond end of range (1)".to_string(),
            expr: "5-1".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("5-1"));
        assert!(rendered.contains("beyond end of range"));
    }

    #[test]
    fn field_count_display() {
        let err = Error::FieldCount {
            min: 5,
            max: 5,
            got: 6,
        };
        assert_eq!(err.to_string(), "expected 5 to 5 fields, found 6");
    }
}
