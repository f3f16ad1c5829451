//! Unified diff rendering.

use std::fmt::Write;

/// Number of unchanged lines shown around each change.
const CONTEXT_LINES: usize = 3;

/// Renders a unified diff turning `expected` into `actual`.
///
/// Returns an empty string when both texts have identical lines.
pub fn unified_diff(expected: &str, actual: &str, expected_label: &str, actual_label: &str) -> String {
    let ops = diff::lines(expected, actual);

    let mut hunks: Vec<(usize, usize)> = vec![];
    for (index, _) in ops
        .iter()
        .enumerate()
        .filter(|(_, op)| !matches!(op, diff::Result::Both(..)))
    {
        let start = index.saturating_sub(CONTEXT_LINES);
        let end = (index + CONTEXT_LINES + 1).min(ops.len());

        match hunks.last_mut() {
            Some(last) if start <= last.1 => last.1 = last.1.max(end),
            _ => hunks.push((start, end)),
        }
    }

    let mut output = String::new();
    if hunks.is_empty() {
        return output;
    }

    writeln!(output, "--- {expected_label}").ok();
    writeln!(output, "+++ {actual_label}").ok();

    for (start, end) in hunks {
        let (old_before, new_before) = count_sides(&ops[..start]);
        let (old_len, new_len) = count_sides(&ops[start..end]);

        writeln!(
            output,
            "@@ -{} +{} @@",
            hunk_range(old_before, old_len),
            hunk_range(new_before, new_len)
        )
        .ok();

        for op in &ops[start..end] {
            match op {
                diff::Result::Both(line, _) => writeln!(output, " {line}").ok(),
                diff::Result::Left(line) => writeln!(output, "-{line}").ok(),
                diff::Result::Right(line) => writeln!(output, "+{line}").ok(),
            };
        }
    }

    output
}

/// Counts the lines each side contributes to the given operations.
fn count_sides(ops: &[diff::Result<&str>]) -> (usize, usize) {
    ops.iter().fold((0, 0), |(old, new), op| match op {
        diff::Result::Both(..) => (old + 1, new + 1),
        diff::Result::Left(_) => (old + 1, new),
        diff::Result::Right(_) => (old, new + 1),
    })
}

fn hunk_range(lines_before: usize, len: usize) -> String {
    match len {
        0 => format!("{lines_before},0"),
        1 => (lines_before + 1).to_string(),
        _ => format!("{},{len}", lines_before + 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn identical_texts_have_no_diff() {
        assert_eq!(unified_diff("a\nb", "a\nb", "expected", "actual"), "");
    }

    #[test]
    fn single_line_change() {
        let diff = unified_diff("a\nb\nc", "a\nx\nc", "expected", "actual");

        assert!(diff.starts_with("--- expected\n+++ actual\n"));
        assert!(diff.contains("@@ -1,3 +1,3 @@\n"));
        assert!(diff.contains("\n-b\n"));
        assert!(diff.contains("\n+x\n"));
        assert!(diff.contains("\n a\n"));
        assert!(diff.contains("\n c\n"));
    }

    #[test]
    fn distant_changes_get_separate_hunks() {
        let expected: Vec<String> = (1..=20).map(|n| n.to_string()).collect();
        let mut actual = expected.clone();
        actual[1] = String::from("two");
        actual[18] = String::from("nineteen");

        let diff = unified_diff(
            &expected.join("\n"),
            &actual.join("\n"),
            "expected",
            "actual",
        );

        assert_eq!(diff.matches("@@ -").count(), 2);
        assert!(diff.contains("\n-2\n"));
        assert!(diff.contains("\n+two\n"));
        assert!(diff.contains("+nineteen\n"));
    }

    #[test]
    fn added_lines_at_end() {
        let diff = unified_diff("a", "a\nb", "expected", "actual");

        assert!(diff.contains("@@ -1 +1,2 @@\n"));
        assert!(diff.ends_with("+b\n"));
    }
}
