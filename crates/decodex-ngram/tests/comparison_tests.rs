//! Full comparisons against the bigram backend

use decodex_core::{EngineConfig, MetricsEngine, Strategy, StrategyComparator};
use decodex_ngram::{build_handle, load_handle, BigramConfig};
use proptest::prelude::*;
use serde_json::json;
use std::io::Write;

fn seeded() -> BigramConfig {
    BigramConfig {
        seed: Some(7),
        ..BigramConfig::default()
    }
}

#[tokio::test]
async fn test_default_corpus_comparison() {
    let handle = load_handle(&seeded()).unwrap();
    let config = EngineConfig::default();

    let comparison = StrategyComparator::new(&config)
        .compare(&handle, "The fox", 30, None)
        .await;
    assert_eq!(comparison.failures(), 0);

    for strategy in Strategy::ALL {
        let text = comparison.results.get(strategy);
        assert!(text.starts_with("the fox"), "{strategy}: {text:?}");
    }

    let prompt_ids = comparison.prompt_token_ids.as_deref().map(Vec::as_slice);
    let metrics = MetricsEngine::new(&config)
        .score_all(&handle, &comparison.results, prompt_ids)
        .await;
    for strategy in Strategy::ALL {
        let scored = metrics.get(strategy);
        assert!(scored.length >= 2);
        assert!(scored.perplexity >= 1.0, "{strategy}: {scored:?}");
    }
}

#[tokio::test]
async fn test_seeded_comparisons_replay() {
    let handle = load_handle(&seeded()).unwrap();
    let comparator = StrategyComparator::new(&EngineConfig::default());
    let params = json!({ "temperature": { "temperature": 1.5 } });

    let first = comparator.compare(&handle, "the river", 25, Some(&params)).await;
    let second = comparator.compare(&handle, "the river", 25, Some(&params)).await;
    assert_eq!(first.results, second.results);
}

#[tokio::test]
async fn test_unknown_words_still_generate() {
    let handle = load_handle(&seeded()).unwrap();
    let comparison = StrategyComparator::new(&EngineConfig::default())
        .compare(&handle, "Zyzzyva quux", 12, None)
        .await;
    assert_eq!(comparison.failures(), 0);
}

#[tokio::test]
async fn test_whitespace_prompt_fails_every_strategy() {
    let handle = load_handle(&seeded()).unwrap();
    let comparison = StrategyComparator::new(&EngineConfig::default())
        .compare(&handle, "   ", 12, None)
        .await;
    assert_eq!(comparison.failures(), 5);
    for strategy in Strategy::ALL {
        assert_eq!(comparison.results.get(strategy), "");
    }
}

#[test]
fn test_corpus_file_is_used() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "red green blue").unwrap();
    let config = BigramConfig {
        corpus_path: Some(file.path().to_path_buf()),
        ..BigramConfig::default()
    };
    let handle = load_handle(&config).unwrap();
    // <unk>, <|endoftext|> and three words
    assert_eq!(handle.tokenizer().vocab_size(), 5);
}

proptest! {
    #[test]
    fn greedy_output_never_exceeds_max_length(max_length in 1usize..40, words in "[a-z ]{1,30}") {
        let handle = build_handle(decodex_ngram::corpus::DEFAULT_CORPUS, &seeded()).unwrap();
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let comparison = runtime.block_on(async {
            StrategyComparator::new(&EngineConfig { parallel_strategies: false, ..EngineConfig::default() })
                .compare(&handle, &words, max_length, None)
                .await
        });
        if let Some(prompt) = &comparison.prompt_token_ids {
            for (_, outcome) in comparison.outcomes.iter() {
                if let decodex_core::comparator::StrategyOutcome::Generated { tokens } = outcome {
                    prop_assert!(*tokens <= max_length.max(prompt.len()));
                }
            }
        }
    }
}
