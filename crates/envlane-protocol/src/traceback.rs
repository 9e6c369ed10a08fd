//! Diagnostic trace rendering for error responses.

use std::error::Error;

/// Render an error and its source chain as a multi-line trace, suitable for
/// the `traceback` field of an error response.
pub fn render(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str("\ncaused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] Inner);

    #[derive(Debug, thiserror::Error)]
    #[error("inner failure")]
    struct Inner;

    #[test]
    fn test_renders_source_chain() {
        let trace = render(&Outer(Inner));
        assert_eq!(trace, "outer failure\ncaused by: inner failure");
    }

    #[test]
    fn test_single_error_is_one_line() {
        let trace = render(&Inner);
        assert_eq!(trace, "inner failure");
    }
}
