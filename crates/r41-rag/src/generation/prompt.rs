//! Prompt templates for every model-backed stage

use crate::pipeline::messages::DONT_KNOW_MESSAGE;
use crate::pipeline::temporal::TemporalContext;
use crate::providers::llm::GenerationRequest;
use crate::types::ConversationHistory;

/// Prompt builder for the rewrite, route, decompose and answer stages
pub struct PromptBuilder;

impl PromptBuilder {
    /// System instruction for the grounded answer
    pub fn answer_system_prompt() -> String {
        format!(
            "You are the official R41 ENSAB assistant.\n\
             Use ONLY the provided context to answer. If context is empty or insufficient, reply exactly:\n\
             \"{}\"\n\
             Combine relevant snippets if multiple are retrieved. Prefer short, clear answers.",
            DONT_KNOW_MESSAGE
        )
    }

    /// User message carrying the question and the retrieved context
    pub fn answer_user_prompt(question: &str, context: &str) -> String {
        format!(
            "Question:\n{question}\n\n\
             Context:\n{context}\n\n\
             Instructions:\n\
             - If the context is insufficient, say you don't have this info yet.\n\
             - Keep the answer brief and clear.\n"
        )
    }

    /// Grounded answer: system + history + question with context
    pub fn answer(question: &str, context: &str, history: &ConversationHistory) -> GenerationRequest {
        GenerationRequest::new(Self::answer_user_prompt(question, context))
            .with_system(Self::answer_system_prompt())
            .with_history(history)
    }

    /// Standalone, temporally grounded rewrite of the question
    pub fn rewrite(
        question: &str,
        history: &ConversationHistory,
        temporal: &TemporalContext,
    ) -> GenerationRequest {
        let system = format!(
            "You rewrite questions sent to the R41 ENSAB club assistant into standalone search queries.\n\
             Today is {today}. The current academic year is {year} and the previous academic year was {previous}. \
             Academic years start in {start}.\n\
             Resolve relative time expressions such as \"this year\", \"last year\" or \"next semester\" \
             into explicit dates or academic years, and resolve pronouns and references using the conversation.\n\
             Keep the language of the original question. If the question is already standalone, return it unchanged.\n\
             Reply with the rewritten question only, without quotes or explanations.",
            today = temporal.today,
            year = temporal.academic_year,
            previous = temporal.previous_academic_year,
            start = temporal.start_month,
        );

        GenerationRequest::new(Self::with_transcript(question, history)).with_system(system)
    }

    /// In-domain / out-of-domain classification
    pub fn route(question: &str, history: &ConversationHistory) -> GenerationRequest {
        let system = "You route questions sent to the assistant of R41, a student club at ENSAB.\n\
             A question is in scope when it is about the club: its members and board, activities, events, \
             projects, trainings, membership, schedule, contact, or its life at the school. \
             Greetings and follow-ups about the club are in scope too.\n\
             Reply with a single JSON object and nothing else:\n\
             {\"route\": \"vector_search\", \"confidence\": <number between 0 and 1>} when the question is in scope,\n\
             {\"route\": \"irrelevant\", \"confidence\": <number between 0 and 1>} otherwise.";

        GenerationRequest::new(Self::with_transcript(question, history)).with_system(system)
    }

    /// Search-query variants, one per line
    pub fn decompose(question: &str, variants: usize) -> GenerationRequest {
        let system = format!(
            "Rewrite the user's question into {variants} distinct, helpful search queries. \
             Split questions that ask several things into one query per thing. \
             Keep language the same as the original. One query per line, without numbering or commentary."
        );

        GenerationRequest::new(question.trim()).with_system(system)
    }

    fn with_transcript(question: &str, history: &ConversationHistory) -> String {
        match history.transcript() {
            Some(transcript) => format!(
                "Conversation so far:\n{}\n\nQuestion: {}",
                transcript,
                question.trim()
            ),
            None => format!("Question: {}", question.trim()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_answer_prompt_contains_fallback_and_context() {
        let request = PromptBuilder::answer("When?", "Meetings are on Wednesday.", &ConversationHistory::new());
        let system = request.system.as_deref().unwrap();
        assert!(system.contains(DONT_KNOW_MESSAGE));
        assert!(request.prompt().starts_with("Question:\nWhen?\n\nContext:\nMeetings are on Wednesday."));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_answer_prompt_includes_history_turns() {
        let mut history = ConversationHistory::new();
        history.record_exchange("Who leads R41?", "The board.");
        let request = PromptBuilder::answer("And the treasurer?", "", &history);
        assert_eq!(request.messages.len(), 3);
    }

    #[test]
    fn test_rewrite_prompt_carries_dates() {
        let temporal = TemporalContext::for_date(NaiveDate::from_ymd_opt(2025, 11, 2).unwrap(), 9);
        let request = PromptBuilder::rewrite("Events this year?", &ConversationHistory::new(), &temporal);
        let system = request.system.unwrap();
        assert!(system.contains("November 2, 2025"));
        assert!(system.contains("2025-2026"));
        assert!(system.contains("2024-2025"));
        assert_eq!(request.messages[0].content, "Question: Events this year?");
    }

    #[test]
    fn test_route_prompt_embeds_transcript() {
        let mut history = ConversationHistory::new();
        history.record_exchange("What is R41?", "A club.");
        let request = PromptBuilder::route("Who founded it?", &history);
        assert!(request.prompt().contains("user: What is R41?"));
        assert!(request.system.unwrap().contains("vector_search"));
    }
}
