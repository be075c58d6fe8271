//! Prompt construction for card generation and refinement

use crate::config::{CardDensity, GenerationConfig};

/// Builds the system prompt for card generation
pub struct PromptBuilder<'a> {
    config: &'a GenerationConfig,
    decks: &'a [String],
}

impl<'a> PromptBuilder<'a> {
    /// Create a builder; `decks` is the list shown to the model, possibly shuffled
    pub fn new(config: &'a GenerationConfig, decks: &'a [String]) -> Self {
        Self { config, decks }
    }

    /// Build the system prompt shared by every chunk of a run
    pub fn build(&self) -> String {
        let language = &self.config.target_language;
        let density: CardDensity = self.config.card_density;

        let mut prompt = String::new();

        // 1. Role
        prompt.push_str(
            "You write high-quality spaced-repetition flashcards. Extract the knowledge \
             in the provided text and return it as a JSON array of cards.",
        );

        // 2. User tone/focus
        prompt.push_str("\n\nUSER INSTRUCTIONS (tone/focus):\n");
        prompt.push_str(&self.config.prompt_style);

        // 3. Density
        prompt.push_str(&format!("\n\nDENSITY ({}):\n{}", density, density.instruction()));

        // 4. Output contract
        prompt.push_str("\n\nFORMAT:\n");
        prompt.push_str("1. Reply with a raw JSON array of objects only. No Markdown, no code fences.\n");
        prompt.push_str("2. Every object has the keys 'question', 'answer', 'deck' and 'quote'.\n");
        prompt.push_str(&format!("3. Write in {}.\n", language));
        prompt.push_str("4. 'quote' is the exact source snippet the card is based on.\n");
        prompt.push_str(&format!("5. {}\n", self.deck_instruction()));

        // 5. Quality rules
        prompt.push_str("\nQUALITY RULES:\n");
        prompt.push_str(QUALITY_RULES);
        prompt.push_str(&format!(
            "- Use natural, grammatical {} with correct word forms.\n",
            language
        ));
        if self.config.exclude_trivia {
            prompt.push_str(
                "- Skip biographical trivia (birth dates, hobbies, who discovered what) \
                 unless it matters to the subject itself.\n",
            );
        }

        // 6. Examples
        prompt.push_str("\nEXAMPLES:\n");
        prompt.push_str(EXAMPLES);

        prompt
    }

    fn deck_instruction(&self) -> String {
        if self.decks.is_empty() {
            return "Give each card a short, suitable deck name under the key 'deck'.".to_string();
        }
        format!(
            "Assign every card to exactly one of these existing decks: {}. Do not invent \
             new deck names. Read the card content and choose the deck that covers its \
             specific topic.",
            json_list(self.decks)
        )
    }
}

const QUALITY_RULES: &str = "\
- Never ask a question that can be answered with yes or no. Ask for the fact instead.
- Ask direct questions that end with a question mark, not descriptions of a question.
- Use precise terminology; do not swap related terms for one another.
- Make every question self-contained: name the subject instead of writing 'it' or 'this'.
- Write answers as complete, specific sentences; avoid answers that restate the question.
- Skip passages that are ambiguous or incomplete.
- Do not repeat a question or concept.
- When the text lists items, ask for the list.
- Ignore reference, bibliography and citation sections.
";

const EXAMPLES: &str = "\
BAD: Q: Is fever common? A: Yes.
BAD: Q: What is the frequency? A: 85%.
BAD: Q: The question of what the symptoms are. A: Headache.
GOOD: Q: How often does fever occur in influenza? A: Fever occurs in most cases and is usually high-grade.
GOOD: Q: What share of dementia cases does Alzheimer's disease account for? A: Alzheimer's disease accounts for roughly 60-70% of dementia cases.
";

/// User prompt for one chunk
pub fn generation_user_prompt(chunk_text: &str) -> String {
    format!("Generate flashcards from the following text:\n\n{}", chunk_text)
}

/// System prompt for the refinement pass
pub fn refinement_system_prompt(target_language: &str, decks: &[String]) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "You are a strict flashcard editor. Review the JSON list of cards you are given \
         and fix it.\n",
    );
    prompt.push_str(&format!("Language: {}\n", target_language));
    prompt.push_str(&format!("Allowed decks: {}\n\n", json_list(decks)));
    prompt.push_str("RULES:\n");
    prompt.push_str("1. Remove cards whose question is answered with a plain yes or no.\n");
    prompt.push_str("2. Remove biographical trivia unless it matters to the subject.\n");
    prompt.push_str(
        "3. Rewrite questions to be self-contained ('What are the symptoms?' becomes \
         'What are the symptoms of <condition>?').\n",
    );
    prompt.push_str("4. Correct terminology mistakes.\n");
    prompt.push_str("5. Set 'deck' to one of the allowed decks based on the card content.\n");
    prompt.push_str("6. Merge duplicate or near-duplicate cards.\n");
    prompt.push_str("7. Keep each card's 'quote' field exactly as given.\n");
    prompt.push_str("8. Reply with the final cards as a raw JSON array.");
    prompt
}

/// User prompt carrying the cards to refine
pub fn refinement_user_prompt(cards_json: &str) -> String {
    format!("Refine these cards:\n{}", cards_json)
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| format!("{:?}", items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_allowed_decks() {
        let config = GenerationConfig::default();
        let decks = vec!["Cardiology".to_string(), "Neurology, Brain".to_string()];
        let prompt = PromptBuilder::new(&config, &decks).build();

        assert!(prompt.contains(r#"["Cardiology","Neurology, Brain"]"#));
        assert!(prompt.contains("Do not invent"));
    }

    #[test]
    fn test_prompt_without_decks() {
        let config = GenerationConfig::default();
        let prompt = PromptBuilder::new(&config, &[]).build();
        assert!(prompt.contains("short, suitable deck name"));
    }

    #[test]
    fn test_prompt_reflects_settings() {
        let config = GenerationConfig {
            target_language: "Turkish".to_string(),
            card_density: CardDensity::High,
            prompt_style: "Focus on pharmacology.".to_string(),
            exclude_trivia: false,
            ..GenerationConfig::default()
        };
        let prompt = PromptBuilder::new(&config, &[]).build();

        assert!(prompt.contains("Write in Turkish."));
        assert!(prompt.contains("DENSITY (High)"));
        assert!(prompt.contains("EXHAUSTIVE MODE"));
        assert!(prompt.contains("Focus on pharmacology."));
        assert!(!prompt.contains("biographical trivia"));
    }

    #[test]
    fn test_prompt_mentions_output_keys() {
        let config = GenerationConfig::default();
        let prompt = PromptBuilder::new(&config, &[]).build();
        assert!(prompt.contains("'question', 'answer', 'deck' and 'quote'"));
        assert!(prompt.contains("biographical trivia"));
    }

    #[test]
    fn test_user_prompts() {
        assert_eq!(
            generation_user_prompt("chunk"),
            "Generate flashcards from the following text:\n\nchunk"
        );
        assert_eq!(refinement_user_prompt("[]"), "Refine these cards:\n[]");
    }

    #[test]
    fn test_refinement_prompt() {
        let prompt = refinement_system_prompt("English", &["Biology".to_string()]);
        assert!(prompt.contains("Language: English"));
        assert!(prompt.contains(r#"Allowed decks: ["Biology"]"#));
        assert!(prompt.contains("quote"));
    }
}
