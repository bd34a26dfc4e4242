//! v4a patch parser (§4.4, §6).

use crate::error::{PatchError, PatchResult};
use crate::types::{Hunk, Operation, Patch};

const BEGIN: &str = "*** Begin Patch";
const END: &str = "*** End Patch";
const ADD_PREFIX: &str = "*** Add File: ";
const DELETE_PREFIX: &str = "*** Delete File: ";
const UPDATE_PREFIX: &str = "*** Update File: ";
const MOVE_PREFIX: &str = "*** Move File: ";
const END_OF_FILE: &str = "*** End of File";
const MOVE_ARROW: &str = " -> ";

/// Parse a v4a patch document.
pub fn parse_patch(input: &str) -> PatchResult<Patch> {
    let lines: Vec<&str> = input.lines().collect();

    let mut idx = 0;
    while idx < lines.len() && lines[idx].trim().is_empty() {
        idx += 1;
    }
    if idx >= lines.len() || lines[idx].trim_end() != BEGIN {
        return Err(PatchError::ParseError(
            "\"*** Begin Patch\" marker is missing".to_string(),
        ));
    }
    idx += 1;

    let mut operations = Vec::new();

    while idx < lines.len() {
        let line = lines[idx];
        let trimmed = line.trim_end();

        if trimmed == END {
            return Ok(Patch { operations });
        }

        if let Some(path) = trimmed.strip_prefix(ADD_PREFIX) {
            idx += 1;
            let (content_lines, next) = collect_add_content(&lines, idx);
            idx = next;
            operations.push(Operation::Add {
                path: path.trim().to_string(),
                content_lines,
            });
        } else if let Some(path) = trimmed.strip_prefix(DELETE_PREFIX) {
            idx += 1;
            operations.push(Operation::Delete {
                path: path.trim().to_string(),
            });
        } else if let Some(path) = trimmed.strip_prefix(UPDATE_PREFIX) {
            idx += 1;
            let (hunks, next) = collect_hunks(&lines, idx);
            idx = next;
            operations.push(Operation::Update {
                path: path.trim().to_string(),
                hunks,
            });
        } else if let Some(rest) = trimmed.strip_prefix(MOVE_PREFIX) {
            let Some((old, new)) = rest.split_once(MOVE_ARROW) else {
                return Err(PatchError::ParseError(
                    "\"*** Move File\" header is missing the \"->\" arrow".to_string(),
                ));
            };
            operations.push(Operation::Move {
                path: old.trim().to_string(),
                new_path: new.trim().to_string(),
            });
            idx += 1;
        } else {
            // Unrecognized line outside a recognized section: skip it.
            idx += 1;
        }
    }

    Err(PatchError::ParseError(
        "\"*** End Patch\" marker is missing".to_string(),
    ))
}

fn collect_add_content(lines: &[&str], mut idx: usize) -> (Vec<String>, usize) {
    let mut content = Vec::new();
    while idx < lines.len() && !lines[idx].starts_with("*** ") {
        if let Some(stripped) = lines[idx].strip_prefix('+') {
            content.push(stripped.to_string());
        }
        idx += 1;
    }
    (content, idx)
}

fn collect_hunks(lines: &[&str], mut idx: usize) -> (Vec<Hunk>, usize) {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    while idx < lines.len() && !lines[idx].starts_with("*** ") {
        let line = lines[idx];

        if let Some(hint) = parse_hunk_header(line) {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            current = Some(Hunk {
                context_hint: hint.filter(|s| !s.is_empty()),
                ..Hunk::default()
            });
            idx += 1;
            continue;
        }

        if line.trim_end() == END_OF_FILE {
            if let Some(h) = current.take() {
                hunks.push(h);
            }
            idx += 1;
            continue;
        }

        let hunk = current.get_or_insert_with(Hunk::default);
        if let Some(rest) = line.strip_prefix(' ') {
            hunk.context_lines.push(rest.to_string());
            hunk.match_lines.push(rest.to_string());
            hunk.replace_lines.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.delete_lines.push(rest.to_string());
            hunk.match_lines.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix('+') {
            hunk.add_lines.push(rest.to_string());
            hunk.replace_lines.push(rest.to_string());
        } else {
            // Unrecognized prefix inside a hunk body: treated as context.
            hunk.context_lines.push(line.to_string());
            hunk.match_lines.push(line.to_string());
            hunk.replace_lines.push(line.to_string());
        }
        idx += 1;
    }

    if let Some(h) = current.take() {
        hunks.push(h);
    }
    (hunks, idx)
}

/// Parse a `@@@ <hint> @@@` or `@@ <hint>` hunk header line. Returns
/// `Some(hint)` (possibly empty) if `line` is a hunk header, `None`
/// otherwise.
fn parse_hunk_header(line: &str) -> Option<String> {
    if let Some(rest) = line.strip_prefix("@@@") {
        let rest = rest.trim();
        let hint = rest.strip_suffix("@@@").unwrap_or(rest);
        Some(hint.trim().to_string())
    } else {
        line.strip_prefix("@@").map(|rest| rest.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_fails() {
        assert!(parse_patch("").is_err());
    }

    #[test]
    fn missing_begin_patch_names_the_marker() {
        let err = parse_patch("*** Add File: a.txt\n+x\n*** End Patch\n").unwrap_err();
        assert!(err.to_string().contains("Begin Patch"));
    }

    #[test]
    fn parses_add_file() {
        let patch = parse_patch(
            "*** Begin Patch\n*** Add File: a.txt\n+line one\n+line two\n*** End Patch\n",
        )
        .unwrap();
        assert_eq!(patch.operations.len(), 1);
        match &patch.operations[0] {
            Operation::Add { path, content_lines } => {
                assert_eq!(path, "a.txt");
                assert_eq!(content_lines, &["line one", "line two"]);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn parses_delete_file() {
        let patch =
            parse_patch("*** Begin Patch\n*** Delete File: old.txt\n*** End Patch\n").unwrap();
        assert!(matches!(&patch.operations[0], Operation::Delete { path } if path == "old.txt"));
    }

    #[test]
    fn parses_move_file() {
        let patch = parse_patch(
            "*** Begin Patch\n*** Move File: old.txt -> new.txt\n*** End Patch\n",
        )
        .unwrap();
        match &patch.operations[0] {
            Operation::Move { path, new_path } => {
                assert_eq!(path, "old.txt");
                assert_eq!(new_path, "new.txt");
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn move_without_arrow_is_parse_error_naming_arrow() {
        let err =
            parse_patch("*** Begin Patch\n*** Move File: old.txt new.txt\n*** End Patch\n")
                .unwrap_err();
        assert!(err.to_string().contains("->"));
    }

    #[test]
    fn parses_update_with_triple_at_hunk_header() {
        let input = "*** Begin Patch\n\
             *** Update File: src/lib.rs\n\
             @@@ fn main @@@\n\
              context line\n\
             -old line\n\
             +new line\n\
             *** End of File\n\
             *** End Patch\n";
        let patch = parse_patch(input).unwrap();
        match &patch.operations[0] {
            Operation::Update { hunks, .. } => {
                assert_eq!(hunks.len(), 1);
                assert_eq!(hunks[0].context_hint.as_deref(), Some("fn main"));
                assert_eq!(hunks[0].delete_lines, vec!["old line"]);
                assert_eq!(hunks[0].add_lines, vec!["new line"]);
                assert_eq!(hunks[0].match_lines, vec!["context line", "old line"]);
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn double_at_header_is_accepted_as_compat_alias() {
        let input = "*** Begin Patch\n\
             *** Update File: f.rs\n\
             @@ old hint\n\
             -a\n\
             +b\n\
             *** End Patch\n";
        let patch = parse_patch(input).unwrap();
        match &patch.operations[0] {
            Operation::Update { hunks, .. } => {
                assert_eq!(hunks[0].context_hint.as_deref(), Some("old hint"));
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn hunk_without_header_starts_immediately_with_body() {
        let input = "*** Begin Patch\n*** Update File: f.rs\n -ctx\n-old\n+new\n*** End Patch\n";
        let patch = parse_patch(input).unwrap();
        match &patch.operations[0] {
            Operation::Update { hunks, .. } => {
                assert_eq!(hunks.len(), 1);
                assert!(hunks[0].context_hint.is_none());
            }
            other => panic!("unexpected operation: {other:?}"),
        }
    }

    #[test]
    fn multiple_operations_in_one_patch() {
        let input = "*** Begin Patch\n\
             *** Add File: a.txt\n+hi\n\
             *** Delete File: b.txt\n\
             *** End Patch\n";
        let patch = parse_patch(input).unwrap();
        assert_eq!(patch.operations.len(), 2);
    }
}
