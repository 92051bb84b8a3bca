//! Annotated diffs
//!
//! Marks which lines of two rendered statements are unchanged, added or
//! removed. Each side's spans concatenate back to exactly the text they were
//! computed from.

use serde::Serialize;

/// How a span of text relates to the other side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationType {
    Unchanged,
    Added,
    Removed,
}

impl AnnotationType {
    fn prefix(&self) -> char {
        match self {
            AnnotationType::Unchanged => ' ',
            AnnotationType::Added => '+',
            AnnotationType::Removed => '-',
        }
    }
}

/// A contiguous span of text sharing one annotation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnnotatedText {
    pub text: String,
    pub kind: AnnotationType,
}

/// An ordered, non-overlapping sequence of annotated spans
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextualAnnotations {
    texts: Vec<AnnotatedText>,
}

impl TextualAnnotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text, merging it into the last span when the kind matches
    pub fn push(&mut self, text: &str, kind: AnnotationType) {
        if text.is_empty() {
            return;
        }
        match self.texts.last_mut() {
            Some(last) if last.kind == kind => last.text.push_str(text),
            _ => self.texts.push(AnnotatedText {
                text: text.to_string(),
                kind,
            }),
        }
    }

    pub fn texts(&self) -> &[AnnotatedText] {
        &self.texts
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Spans of the given kind
    pub fn by_type(&self, kind: AnnotationType) -> Vec<&AnnotatedText> {
        self.texts.iter().filter(|t| t.kind == kind).collect()
    }

    /// The full annotated text
    pub fn text(&self) -> String {
        self.texts.iter().map(|t| t.text.as_str()).collect()
    }

    /// Render every line prefixed with `+`, `-` or a space
    pub fn export(&self) -> String {
        let mut lines = Vec::new();
        for annotated in &self.texts {
            for line in annotated.text.split_inclusive('\n') {
                lines.push(format!(
                    "{}{}",
                    annotated.kind.prefix(),
                    line.trim_end_matches('\n')
                ));
            }
        }
        lines.join("\n")
    }
}

/// Annotate two texts line by line, returning `(from, to, unified)`
pub fn annotate(
    from: &str,
    to: &str,
) -> (TextualAnnotations, TextualAnnotations, TextualAnnotations) {
    let from_lines: Vec<&str> = from.split_inclusive('\n').collect();
    let to_lines: Vec<&str> = to.split_inclusive('\n').collect();
    let key = |line: &str| line.trim_end_matches('\n').to_string();
    let from_keys: Vec<String> = from_lines.iter().map(|l| key(l)).collect();
    let to_keys: Vec<String> = to_lines.iter().map(|l| key(l)).collect();

    // lcs[i][j] is the common subsequence length of from[i..] and to[j..]
    let (n, m) = (from_lines.len(), to_lines.len());
    let mut lcs = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if from_keys[i] == to_keys[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut from_annotations = TextualAnnotations::new();
    let mut to_annotations = TextualAnnotations::new();
    let mut unified = TextualAnnotations::new();
    let (mut i, mut j) = (0, 0);

    while i < n || j < m {
        if i < n && j < m && from_keys[i] == to_keys[j] {
            from_annotations.push(from_lines[i], AnnotationType::Unchanged);
            to_annotations.push(to_lines[j], AnnotationType::Unchanged);
            unified.push(&unified_line(to_lines[j]), AnnotationType::Unchanged);
            i += 1;
            j += 1;
        } else if i < n && (j == m || lcs[i + 1][j] >= lcs[i][j + 1]) {
            from_annotations.push(from_lines[i], AnnotationType::Removed);
            unified.push(&unified_line(from_lines[i]), AnnotationType::Removed);
            i += 1;
        } else {
            to_annotations.push(to_lines[j], AnnotationType::Added);
            unified.push(&unified_line(to_lines[j]), AnnotationType::Added);
            j += 1;
        }
    }

    (from_annotations, to_annotations, unified)
}

// Unified output holds lines from both sides, so each one is terminated
fn unified_line(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{}\n", line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn spans_partition_both_sides() {
        let from = "CREATE TABLE `t` (\n  `id` int,\n  `name` varchar(50)\n)";
        let to = "CREATE TABLE `t` (\n  `id` int,\n  `name` varchar(100)\n)";
        let (from_ann, to_ann, unified) = annotate(from, to);

        assert_eq!(from_ann.text(), from);
        assert_eq!(to_ann.text(), to);
        assert_eq!(from_ann.by_type(AnnotationType::Removed).len(), 1);
        assert_eq!(to_ann.by_type(AnnotationType::Added).len(), 1);
        assert_eq!(
            unified.export(),
            " CREATE TABLE `t` (\n   `id` int,\n-  `name` varchar(50)\n+  `name` varchar(100)\n )"
        );
    }

    #[test]
    fn empty_side_is_fully_added() {
        let (from_ann, to_ann, unified) = annotate("", "CREATE VIEW `v` AS select 1");
        assert!(from_ann.is_empty());
        assert_eq!(to_ann.len(), 1);
        assert_eq!(to_ann.texts()[0].kind, AnnotationType::Added);
        assert_eq!(unified.export(), "+CREATE VIEW `v` AS select 1");
    }

    #[test]
    fn identical_texts_are_unchanged() {
        let text = "a\nb\nc";
        let (from_ann, to_ann, _) = annotate(text, text);
        assert_eq!(from_ann.len(), 1);
        assert_eq!(from_ann.texts()[0].kind, AnnotationType::Unchanged);
        assert_eq!(to_ann, from_ann);
    }
}
