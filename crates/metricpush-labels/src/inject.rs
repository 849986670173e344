//! Extra-label injection for Prometheus text exposition.
//!
//! Works on raw bytes, one `\n`-delimited line at a time, appending to a
//! caller-owned buffer so a push loop can reuse the same allocation on
//! every tick.

use crate::error::{LabelError, LabelResult};
use crate::fragment::ExtraLabels;

/// Append `src` to `dst` with `extra` spliced into every metric line.
///
/// - `name{labels} value` becomes `name{<extra>,labels} value`
/// - `name value` becomes `name{<extra>} value`
/// - comment (`#`) and blank lines are copied as-is
///
/// An empty `extra` copies every line through unchanged.
///
/// Every emitted line ends with `\n`, including an unterminated final
/// line of `src`. On error `dst` holds a partial block and must be
/// discarded.
pub fn inject(dst: &mut Vec<u8>, src: &[u8], extra: &ExtraLabels) -> LabelResult<()> {
    let extra = extra.as_bytes();
    let mut rest = src;

    while !rest.is_empty() {
        let line = match rest.iter().position(|&b| b == b'\n') {
            Some(n) => {
                let line = &rest[..n];
                rest = &rest[n + 1..];
                line
            }
            None => std::mem::take(&mut rest),
        };

        if extra.is_empty() || line.is_empty() || line[0] == b'#' {
            dst.extend_from_slice(line);
        } else if let Some(n) = line.iter().position(|&b| b == b'{') {
            dst.extend_from_slice(&line[..=n]);
            dst.extend_from_slice(extra);
            dst.push(b',');
            dst.extend_from_slice(&line[n + 1..]);
        } else if let Some(n) = line.iter().rposition(|&b| b == b' ') {
            dst.extend_from_slice(&line[..n]);
            dst.push(b'{');
            dst.extend_from_slice(extra);
            dst.push(b'}');
            dst.extend_from_slice(&line[n..]);
        } else {
            return Err(LabelError::MalformedLine {
                line: String::from_utf8_lossy(line).into_owned(),
            });
        }
        dst.push(b'\n');
    }
    Ok(())
}

/// One-shot variant of [`inject`] that allocates its own output.
pub fn inject_to_vec(src: &[u8], extra: &ExtraLabels) -> LabelResult<Vec<u8>> {
    let mut dst = Vec::with_capacity(src.len() + src.len() / 2);
    inject(&mut dst, src, extra)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(s: &str) -> ExtraLabels {
        ExtraLabels::parse(s).unwrap()
    }

    fn run(src: &str, extra: &str) -> String {
        String::from_utf8(inject_to_vec(src.as_bytes(), &labels(extra)).unwrap()).unwrap()
    }

    #[test]
    fn line_with_labels() {
        assert_eq!(run("foo{a=\"1\"} 5", r#"b="2""#), "foo{b=\"2\",a=\"1\"} 5\n");
    }

    #[test]
    fn line_without_labels() {
        assert_eq!(run("foo 5", r#"b="2""#), "foo{b=\"2\"} 5\n");
    }

    #[test]
    fn nested_injection_prepends() {
        let once = inject_to_vec(b"foo 5", &labels(r#"b="2""#)).unwrap();
        let twice = inject_to_vec(&once, &labels(r#"c="3""#)).unwrap();
        assert_eq!(twice, b"foo{c=\"3\",b=\"2\"} 5\n");
    }

    #[test]
    fn multiple_extra_labels() {
        assert_eq!(
            run("up 1\nreqs{path=\"/\"} 10\n", r#"job="api",zone="eu""#),
            "up{job=\"api\",zone=\"eu\"} 1\nreqs{job=\"api\",zone=\"eu\",path=\"/\"} 10\n"
        );
    }

    #[test]
    fn preserves_line_count_and_terminators() {
        let src = "a 1\nb{x=\"y\"} 2\nc 3";
        let out = run(src, r#"k="v""#);
        assert_eq!(out.lines().count(), src.lines().count());
        assert!(out.ends_with('\n'));
        assert_eq!(out.matches('\n').count(), 3);
    }

    #[test]
    fn only_first_brace_is_used() {
        assert_eq!(
            run("foo{a=\"{x}\"} 5", r#"b="2""#),
            "foo{b=\"2\",a=\"{x}\"} 5\n"
        );
    }

    #[test]
    fn comments_and_blank_lines_pass_through() {
        let src = "# HELP foo Foo total.\n# TYPE foo counter\nfoo 5\n\nbar 1\n";
        assert_eq!(
            run(src, r#"b="2""#),
            "# HELP foo Foo total.\n# TYPE foo counter\nfoo{b=\"2\"} 5\n\nbar{b=\"2\"} 1\n"
        );
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(run("", r#"b="2""#), "");
    }

    #[test]
    fn malformed_line_is_rejected() {
        let err = inject_to_vec(b"ok 1\nbroken\n", &labels(r#"b="2""#)).unwrap_err();
        assert_eq!(
            err,
            LabelError::MalformedLine {
                line: "broken".to_string()
            }
        );
    }

    #[test]
    fn escaped_fragment_keeps_line_count() {
        let extra = labels(r#"note="a\nb \"q\" c\\",job="x""#);
        let src = b"a 1\nb{k=\"v\"} 2\nc 3\n";
        let out = inject_to_vec(src, &extra).unwrap();
        assert_eq!(out.split(|&b| b == b'\n').count(), src.split(|&b| b == b'\n').count());
        assert!(out.ends_with(b"\n"));
    }

    #[test]
    fn empty_fragment_copies_lines_through() {
        assert_eq!(
            run("foo{a=\"1\"} 5\nbar 2", ""),
            "foo{a=\"1\"} 5\nbar 2\n"
        );
    }

    #[test]
    fn appends_to_existing_buffer() {
        let extra = labels(r#"b="2""#);
        let mut dst = Vec::new();

        inject(&mut dst, b"foo 1\n", &extra).unwrap();
        let capacity = dst.capacity();

        dst.clear();
        inject(&mut dst, b"foo 2\n", &extra).unwrap();
        assert_eq!(dst, b"foo{b=\"2\"} 2\n");
        assert_eq!(dst.capacity(), capacity);
    }
}
