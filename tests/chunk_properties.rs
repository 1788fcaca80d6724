use commitsmith::diff::chunk_diff;
use commitsmith::message::{extract_commit_message, TypeCheck, TypeVocabulary, Validator};
use proptest::prelude::*;

fn diff_text() -> impl Strategy<Value = String> {
    (
        prop::collection::vec("[a-z +\\-@/.]{0,120}", 0..80),
        any::<bool>(),
    )
        .prop_map(|(lines, trailing_newline)| {
            let mut text = lines.join("\n");
            if trailing_newline && !text.is_empty() {
                text.push('\n');
            }
            text
        })
}

proptest! {
    #[test]
    fn chunks_respect_budget(diff in diff_text(), budget in 1usize..400) {
        for chunk in chunk_diff(&diff, budget) {
            let line_count = chunk.text.split_inclusive('\n').count();
            prop_assert!(
                chunk.text.len() <= budget || line_count == 1,
                "chunk {} has {} bytes over {} lines",
                chunk.index,
                chunk.text.len(),
                line_count
            );
        }
    }

    #[test]
    fn chunks_reassemble_input(diff in diff_text(), budget in 1usize..400) {
        let chunks = chunk_diff(&diff, budget);
        prop_assert!(!chunks.is_empty());
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        prop_assert_eq!(joined, diff);
        for (position, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.index, position);
        }
    }

    #[test]
    fn small_input_is_a_single_chunk(diff in diff_text(), slack in 0usize..100) {
        let budget = diff.len() + slack;
        let chunks = chunk_diff(&diff, budget);
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(&chunks[0].text, &diff);
    }

    #[test]
    fn extraction_is_idempotent(
        title in "[a-z]{1,8}(\\([a-z]{1,6}\\))?: [a-z][a-z ]{0,50}",
        wrapping in 0usize..5,
        comment in any::<bool>(),
    ) {
        let vocabulary = TypeVocabulary::builtin().unwrap();
        let validator = Validator::new(&vocabulary, TypeCheck::Permissive);

        let mut raw = String::new();
        if comment {
            raw.push_str("# generated\n");
        }
        match wrapping {
            0 => raw.push_str(&title),
            1 => raw.push_str(&format!("```\n{title}\n```\n")),
            2 => raw.push_str(&format!("```text\n{title}\n```\n")),
            3 => raw.push_str(&format!("`{title}`")),
            _ => raw.push_str(&format!("`` `{title}` ``")),
        }

        let once = extract_commit_message(&raw, &validator);
        let twice = extract_commit_message(&once, &validator);
        prop_assert_eq!(&once, &twice);
        prop_assert!(!once.contains('`'));
    }

    #[test]
    fn empty_fences_extract_to_nothing(tag in "[a-z]{0,8}", comment in any::<bool>()) {
        let vocabulary = TypeVocabulary::builtin().unwrap();
        let validator = Validator::new(&vocabulary, TypeCheck::Permissive);

        let mut raw = String::new();
        if comment {
            raw.push_str("# generated\n");
        }
        raw.push_str(&format!("```{tag}\n```"));
        prop_assert_eq!(extract_commit_message(&raw, &validator), "");
    }
}
