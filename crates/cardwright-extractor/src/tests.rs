//! Pipeline scenarios against a scripted model

#[cfg(test)]
mod tests {
    use crate::{
        CardDensity, CardPipeline, ExtractorError, GenerationConfig, PipelineObserver,
        PlainTextSource, FAILED_CHUNKS_FILE, REJECTED_CARDS_FILE,
    };
    use cardwright_domain::{Card, DocumentError};
    use cardwright_gatekeeper::{GatekeeperError, ResourceLimits};
    use cardwright_llm::{ChatModel, CompletionRequest, LlmError, MockModel};
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    /// One line of roughly 250 characters; with the test budget of 300
    /// characters every section becomes its own chunk
    fn section(tag: &str) -> String {
        format!("{} {}\n", tag, "lorem ipsum ".repeat(20))
    }

    fn document() -> String {
        [section("PART-ONE"), section("PART-TWO"), section("PART-THREE")].concat()
    }

    fn card_json(question: &str, answer: &str) -> String {
        format!(
            r#"[{{"question":"{}","answer":"{}","deck":"Biology","quote":"source of {}"}}]"#,
            question, answer, question
        )
    }

    fn scripted_model() -> MockModel {
        MockModel::default()
            .with_reply(
                "PART-ONE",
                card_json("What is the first topic about?", "The first topic covers alpha."),
            )
            .with_reply(
                "PART-TWO",
                card_json("What is the second topic about?", "The second topic covers beta."),
            )
            .with_reply(
                "PART-THREE",
                card_json("What is the third topic about?", "The third topic covers gamma."),
            )
    }

    fn test_config(dir: &TempDir) -> GenerationConfig {
        GenerationConfig {
            card_density: CardDensity::High,
            context_window: 1000,
            log_dir: dir.path().to_path_buf(),
            ..GenerationConfig::deterministic()
        }
    }

    fn decks() -> Vec<String> {
        vec!["Biology".to_string()]
    }

    fn questions(cards: &[Card]) -> Vec<&str> {
        cards.iter().map(|c| c.question.as_str()).collect()
    }

    fn log_lines(dir: &TempDir, file: &str) -> Vec<serde_json::Value> {
        std::fs::read_to_string(dir.path().join(file))
            .unwrap_or_default()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[derive(Default)]
    struct RecordingObserver {
        batches: Mutex<Vec<(usize, usize)>>,
        messages: Mutex<Vec<String>>,
        cancel_after_first: Option<CancellationToken>,
    }

    impl PipelineObserver for RecordingObserver {
        fn log(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }

        fn cards_accepted(&self, chunk_ordinal: usize, cards: &[Card]) {
            self.batches.lock().unwrap().push((chunk_ordinal, cards.len()));
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
        }
    }

    #[tokio::test]
    async fn test_chunks_in_order_with_one_card_each() {
        let dir = TempDir::new().unwrap();
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir)).unwrap();

        let report = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            questions(&report.cards),
            vec![
                "What is the first topic about?",
                "What is the second topic about?",
                "What is the third topic about?",
            ]
        );
        assert_eq!(report.cards[0].deck, "Biology");
        assert_eq!(report.cards[0].quote, "source of What is the first topic about?");
        assert_eq!(report.stats.total_chunks, 3);
        assert_eq!(report.stats.processed_chunks, 3);
        assert_eq!(report.stats.cards_generated, 3);
        assert!(!report.cancelled);
        assert_eq!(pipeline.model().probe_count(), 1);
        assert_eq!(pipeline.model().call_count(), 3);
    }

    #[tokio::test]
    async fn test_deterministic_runs_are_identical() {
        let dir = TempDir::new().unwrap();
        let first = CardPipeline::new(scripted_model(), test_config(&dir))
            .unwrap()
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();
        let second = CardPipeline::new(scripted_model(), test_config(&dir))
            .unwrap()
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_string(&first.cards).unwrap(),
            serde_json::to_string(&second.cards).unwrap()
        );
        assert_ne!(first.run_id, second.run_id);
    }

    #[tokio::test]
    async fn test_deterministic_prompts_are_identical() {
        let dir = TempDir::new().unwrap();
        let many_decks: Vec<String> = ["Anatomy", "Biology", "Cardiology", "Dermatology"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let first = CardPipeline::new(scripted_model(), test_config(&dir)).unwrap();
        first
            .generate(&document(), &many_decks, &CancellationToken::new())
            .await
            .unwrap();
        let second = CardPipeline::new(scripted_model(), test_config(&dir)).unwrap();
        second
            .generate(&document(), &many_decks, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            first.model().requests()[0].system,
            second.model().requests()[0].system
        );
        assert_eq!(first.deck_order(&many_decks), second.deck_order(&many_decks));
    }

    #[tokio::test]
    async fn test_deck_order_unshuffled_without_smart_matching() {
        let dir = TempDir::new().unwrap();
        let config = GenerationConfig {
            smart_deck_match: false,
            ..test_config(&dir)
        };
        let pipeline = CardPipeline::new(MockModel::default(), config).unwrap();
        let names: Vec<String> = ["B", "A", "C"].iter().map(|s| s.to_string()).collect();

        assert_eq!(pipeline.deck_order(&names), names);
    }

    #[tokio::test]
    async fn test_failed_chunk_is_isolated() {
        let dir = TempDir::new().unwrap();
        let model = MockModel::default()
            .with_failure("PART-TWO", LlmError::Network("connection reset".to_string()))
            .with_reply(
                "PART-ONE",
                card_json("What is the first topic about?", "The first topic covers alpha."),
            )
            .with_reply(
                "PART-THREE",
                card_json("What is the third topic about?", "The third topic covers gamma."),
            );
        let pipeline = CardPipeline::new(model, test_config(&dir)).unwrap();

        let report = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            questions(&report.cards),
            vec!["What is the first topic about?", "What is the third topic about?"]
        );
        assert_eq!(report.stats.processed_chunks, 2);
        assert_eq!(report.stats.failed_chunks, 1);

        let failures = log_lines(&dir, FAILED_CHUNKS_FILE);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["chunk_index"], 2);
        assert_eq!(failures[0]["run_id"], report.run_id.to_string());
        assert!(failures[0]["error"].as_str().unwrap().contains("connection reset"));
        assert!(failures[0]["chunk_preview"].as_str().unwrap().starts_with("PART-TWO"));
    }

    /// Panics on one chunk, answers the rest like the scripted model
    struct PanickingModel {
        inner: MockModel,
        trigger: &'static str,
    }

    impl ChatModel for PanickingModel {
        async fn complete(
            &self,
            request: &CompletionRequest,
            cancel: &CancellationToken,
        ) -> Result<String, LlmError> {
            if request.user.contains(self.trigger) {
                panic!("tokenizer exploded");
            }
            self.inner.complete(request, cancel).await
        }

        async fn check_reachable(&self) -> Result<(), LlmError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_panicking_chunk_is_logged() {
        let dir = TempDir::new().unwrap();
        let model = PanickingModel {
            inner: scripted_model(),
            trigger: "PART-TWO",
        };
        let pipeline = CardPipeline::new(model, test_config(&dir)).unwrap();

        let report = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            questions(&report.cards),
            vec!["What is the first topic about?", "What is the third topic about?"]
        );
        assert_eq!(report.stats.processed_chunks, 2);
        assert_eq!(report.stats.failed_chunks, 1);

        let failures = log_lines(&dir, FAILED_CHUNKS_FILE);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0]["chunk_index"], 2);
        assert!(failures[0]["error"].as_str().unwrap().contains("tokenizer exploded"));
        assert!(failures[0]["chunk_preview"].as_str().unwrap().starts_with("PART-TWO"));
    }

    #[tokio::test]
    async fn test_duplicate_questions_across_chunks() {
        let dir = TempDir::new().unwrap();
        let same = card_json("What is the shared topic about?", "It covers the overlap.");
        let model = MockModel::default()
            .with_reply("PART-ONE", same.clone())
            .with_reply("PART-TWO", same)
            .with_reply(
                "PART-THREE",
                card_json("What is the third topic about?", "The third topic covers gamma."),
            );
        let pipeline = CardPipeline::new(model, test_config(&dir)).unwrap();

        let report = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            questions(&report.cards),
            vec!["What is the shared topic about?", "What is the third topic about?"]
        );
        assert_eq!(report.stats.cards_rejected, 1);
        assert_eq!(report.stats.cards_generated, 2);
        // Duplicates are not written to the rejection log
        assert!(log_lines(&dir, REJECTED_CARDS_FILE).is_empty());
    }

    #[tokio::test]
    async fn test_invalid_card_rejected_and_logged() {
        let dir = TempDir::new().unwrap();
        let model = MockModel::new(
            r#"[{"question":"Why?","answer":"Because of the alpha effect.","deck":"Biology"},
                {"question":"What causes the alpha effect?","answer":"Beta waves.","deck":"Biology"}]"#,
        );
        let pipeline = CardPipeline::new(model, test_config(&dir)).unwrap();

        let report = pipeline
            .generate(&section("PART-ONE"), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(questions(&report.cards), vec!["What causes the alpha effect?"]);
        assert_eq!(report.stats.cards_rejected, 1);

        let rejected = log_lines(&dir, REJECTED_CARDS_FILE);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0]["card"]["question"], "Why?");
        assert_eq!(rejected[0]["reason"], "Question too short (<10)");
    }

    #[tokio::test]
    async fn test_yes_no_answers_filtered_silently() {
        let dir = TempDir::new().unwrap();
        let model = MockModel::new(
            r#"[{"question":"Is the alpha effect common?","answer":"Yes.","deck":"Biology"},
                {"question":"How common is the alpha effect?","answer":"It occurs in most cases.","deck":"Biology"}]"#,
        );
        let pipeline = CardPipeline::new(model, test_config(&dir)).unwrap();

        let report = pipeline
            .generate(&section("PART-ONE"), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(questions(&report.cards), vec!["How common is the alpha effect?"]);
        assert_eq!(report.stats.cards_rejected, 0);
    }

    #[tokio::test]
    async fn test_chunk_limit_aborts_before_model() {
        let dir = TempDir::new().unwrap();
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir))
            .unwrap()
            .with_limits(ResourceLimits {
                max_chunks: 2,
                ..ResourceLimits::default()
            });

        let result = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(ExtractorError::ResourceLimit(GatekeeperError::TooManyChunks { count: 3, max: 2 }))
        ));
        assert_eq!(pipeline.model().probe_count(), 0);
        assert_eq!(pipeline.model().call_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_model_aborts() {
        let dir = TempDir::new().unwrap();
        let pipeline = CardPipeline::new(MockModel::unreachable(), test_config(&dir)).unwrap();

        let result = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(ExtractorError::Unreachable(_))));
        assert_eq!(pipeline.model().call_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_response_yields_no_cards() {
        let dir = TempDir::new().unwrap();
        let model = MockModel::new("Sorry, I cannot help with that. {\"question\": ");
        let pipeline = CardPipeline::new(model, test_config(&dir)).unwrap();

        let report = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.cards.is_empty());
        assert_eq!(report.stats.processed_chunks, 3);
        assert_eq!(report.stats.failed_chunks, 0);
        assert!(log_lines(&dir, FAILED_CHUNKS_FILE).is_empty());
    }

    #[tokio::test]
    async fn test_empty_text_skips_model() {
        let dir = TempDir::new().unwrap();
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir)).unwrap();

        let report = pipeline
            .generate("", &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(report.cards.is_empty());
        assert_eq!(report.stats.total_chunks, 0);
        assert_eq!(pipeline.model().probe_count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let dir = TempDir::new().unwrap();
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = pipeline.generate(&document(), &decks(), &cancel).await.unwrap();

        assert!(report.cancelled);
        assert!(report.cards.is_empty());
        assert_eq!(pipeline.model().call_count(), 0);
        assert_eq!(report.stats.failed_chunks, 0);
    }

    #[tokio::test]
    async fn test_cancel_during_run_keeps_earlier_cards() {
        let dir = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        let observer = Arc::new(RecordingObserver {
            cancel_after_first: Some(cancel.clone()),
            ..RecordingObserver::default()
        });
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir))
            .unwrap()
            .with_observer(observer.clone());

        let report = pipeline.generate(&document(), &decks(), &cancel).await.unwrap();

        assert!(report.cancelled);
        assert_eq!(questions(&report.cards), vec!["What is the first topic about?"]);
        assert_eq!(*observer.batches.lock().unwrap(), vec![(1, 1)]);
        assert_eq!(report.stats.failed_chunks, 0);
    }

    #[tokio::test]
    async fn test_observer_receives_each_batch() {
        let dir = TempDir::new().unwrap();
        let observer = Arc::new(RecordingObserver::default());
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir))
            .unwrap()
            .with_observer(observer.clone());

        pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(*observer.batches.lock().unwrap(), vec![(1, 1), (2, 1), (3, 1)]);
        let messages = observer.messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.starts_with("Document split into 3 parts")));
        assert!(messages.iter().any(|m| m == "Part 2 completed. Added 1 cards."));
    }

    #[tokio::test]
    async fn test_refinement_rewrites_and_restores_quotes() {
        let dir = TempDir::new().unwrap();
        let model = MockModel::default()
            .with_reply(
                "Refine these cards",
                r#"[{"question":"What is the first topic of the lecture about?","answer":"The first topic covers alpha.","deck":"Biology"}]"#,
            )
            .with_reply(
                "PART-ONE",
                card_json("What is the first topic about?", "The first topic covers alpha."),
            );
        let config = GenerationConfig {
            ai_refinement: true,
            ..test_config(&dir)
        };
        let pipeline = CardPipeline::new(model, config).unwrap();

        let report = pipeline
            .generate(&section("PART-ONE"), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            questions(&report.cards),
            vec!["What is the first topic of the lecture about?"]
        );
        assert_eq!(report.cards[0].quote, "source of What is the first topic about?");
        assert_eq!(pipeline.model().call_count(), 2);
    }

    #[tokio::test]
    async fn test_refinement_failure_keeps_original_cards() {
        let dir = TempDir::new().unwrap();
        let model = scripted_model()
            .with_failure("Refine these cards", LlmError::Network("timed out".to_string()));
        let config = GenerationConfig {
            ai_refinement: true,
            ..test_config(&dir)
        };
        let pipeline = CardPipeline::new(model, config).unwrap();

        let report = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.cards.len(), 3);
        assert_eq!(report.stats.failed_chunks, 0);
        assert_eq!(pipeline.model().call_count(), 6);
    }

    #[tokio::test]
    async fn test_parallel_run_has_same_membership() {
        let dir = TempDir::new().unwrap();
        let config = GenerationConfig {
            deterministic_mode: false,
            concurrency: 4,
            ..test_config(&dir)
        };
        let pipeline = CardPipeline::new(scripted_model(), config).unwrap();

        let report = pipeline
            .generate(&document(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        let got: HashSet<&str> = questions(&report.cards).into_iter().collect();
        let expected: HashSet<&str> = [
            "What is the first topic about?",
            "What is the second topic about?",
            "What is the third topic about?",
        ]
        .into_iter()
        .collect();
        assert_eq!(got, expected);
        assert_eq!(report.stats.processed_chunks, 3);
    }

    #[tokio::test]
    async fn test_generate_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.txt");
        std::fs::write(&path, document()).unwrap();
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir)).unwrap();

        let report = pipeline
            .generate_from_file(&path, &PlainTextSource::new(), &decks(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.cards.len(), 3);
        assert!(report.stats.extraction_secs >= 0.0);
    }

    #[tokio::test]
    async fn test_generate_from_missing_file() {
        let dir = TempDir::new().unwrap();
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir)).unwrap();

        let result = pipeline
            .generate_from_file(
                &dir.path().join("absent.txt"),
                &PlainTextSource::new(),
                &decks(),
                &CancellationToken::new(),
            )
            .await;

        assert!(matches!(
            result,
            Err(ExtractorError::Document(DocumentError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn test_file_size_limit_checked_first() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("lecture.txt");
        std::fs::write(&path, document()).unwrap();
        let pipeline = CardPipeline::new(scripted_model(), test_config(&dir))
            .unwrap()
            .with_limits(ResourceLimits {
                max_file_size_mb: 0,
                ..ResourceLimits::default()
            });

        let result = pipeline
            .generate_from_file(&path, &PlainTextSource::new(), &decks(), &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(ExtractorError::ResourceLimit(GatekeeperError::FileTooLarge { .. }))
        ));
        assert_eq!(pipeline.model().probe_count(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = GenerationConfig {
            concurrency: 0,
            ..GenerationConfig::default()
        };
        assert!(matches!(
            CardPipeline::new(MockModel::default(), config),
            Err(ExtractorError::Config(_))
        ));
    }
}
