//! Grounded answer synthesis.
//!
//! Retrieved chunks become a context block for a single completion request whose system
//! instruction forbids answering outside that context. The raw completion then passes a
//! keyword guardrail: empty answers, the instructed refusal phrase, or the words
//! "no information" are replaced by a friendly canned refusal. The guardrail is a substring
//! match and will also catch legitimate answers that happen to contain those words.

use crate::{
    llm::{ChatClient, ChatClientError, ChatRequest},
    processing::{
        mappers,
        types::{Answer, AnswerOutcome},
    },
    store::ScoredRecord,
};
use std::sync::OnceLock;
use tiktoken_rs::{CoreBPE, cl100k_base};

/// Phrase the model is instructed to emit when the context is insufficient.
pub const REFUSAL_PHRASE: &str = "I don't have that information in the documents I've been given. Please ask me about the uploaded documents.";

const REFUSAL_MARKERS: &[&str] = &["i don't have that information", "no information"];

/// Builds prompts, calls the chat model, and applies the grounding guardrail.
pub struct AnswerSynthesizer {
    chat: Box<dyn ChatClient>,
    assistant_name: String,
    temperature: f32,
}

impl AnswerSynthesizer {
    /// Create a synthesizer speaking as `assistant_name`.
    pub fn new(chat: Box<dyn ChatClient>, assistant_name: &str, temperature: f32) -> Self {
        Self {
            chat,
            assistant_name: assistant_name.to_string(),
            temperature,
        }
    }

    /// Greeting returned when the store holds no documents at all.
    pub fn empty_store_message(&self) -> String {
        format!(
            "Hi! I'm {}, your AI assistant. 😊 I don't have any documents loaded yet. Please upload some documents or URLs first, and then I'll be happy to answer your questions!",
            self.assistant_name
        )
    }

    /// Message returned when retrieval found nothing.
    pub fn no_matches_message(&self) -> String {
        format!(
            "Hi! I'm {}. 😊 I couldn't find any relevant information in the uploaded documents.",
            self.assistant_name
        )
    }

    /// Friendly refusal substituted for ungrounded model output.
    pub fn refusal_message(&self) -> String {
        format!(
            "Hi! I'm {}. 😊 I couldn't find relevant information about that in the documents I have. Could you ask something related to the documents you've uploaded?",
            self.assistant_name
        )
    }

    /// Answer for an empty store; no retrieval and no model call.
    pub fn empty_store_answer(&self) -> Answer {
        Answer {
            text: self.empty_store_message(),
            sources: Vec::new(),
            outcome: AnswerOutcome::EmptyStore,
            prompt_tokens: 0,
        }
    }

    /// Produce an answer for `question` from ranked `hits`.
    ///
    /// An empty `hits` slice returns the fixed no-match message without calling the model.
    pub async fn synthesize(
        &self,
        question: &str,
        hits: &[ScoredRecord],
    ) -> Result<Answer, ChatClientError> {
        if hits.is_empty() {
            return Ok(Answer {
                text: self.no_matches_message(),
                sources: Vec::new(),
                outcome: AnswerOutcome::NoMatches,
                prompt_tokens: 0,
            });
        }

        let request = ChatRequest {
            system: self.system_instruction(),
            user: build_user_message(question, hits),
            temperature: self.temperature,
        };
        let prompt_tokens = count_tokens(&request.system) + count_tokens(&request.user);
        tracing::debug!(hits = hits.len(), prompt_tokens, "Requesting grounded completion");

        let raw = self.chat.complete(request).await?;
        let (text, refused) = self.apply_guardrail(&raw);
        if refused {
            tracing::info!(raw_len = raw.len(), "Guardrail replaced model answer");
        }

        Ok(Answer {
            text,
            sources: hits.iter().map(mappers::map_scored_record).collect(),
            outcome: if refused {
                AnswerOutcome::Refused
            } else {
                AnswerOutcome::Generated
            },
            prompt_tokens,
        })
    }

    /// Replace ungrounded output with the friendly refusal; returns the text and whether it fired.
    pub fn apply_guardrail(&self, raw: &str) -> (String, bool) {
        let trimmed = raw.trim();
        let normalized = trimmed.to_lowercase().replace('\u{2019}', "'");
        let refused = trimmed.is_empty()
            || REFUSAL_MARKERS
                .iter()
                .any(|marker| normalized.contains(marker));
        if refused {
            (self.refusal_message(), true)
        } else {
            (trimmed.to_string(), false)
        }
    }

    fn system_instruction(&self) -> String {
        format!(
            "You are {name}, a helpful AI assistant.\n\n\
             IMPORTANT: You can ONLY answer questions using the information provided in the Context. \
             If the answer is not in the Context, you MUST say: \"{REFUSAL_PHRASE}\"\n\n\
             Do NOT use your general knowledge. Do NOT make up information. ONLY use what's in the Context.",
            name = self.assistant_name
        )
    }
}

/// Context block followed by the question, in the layout the model is instructed on.
pub(crate) fn build_user_message(question: &str, hits: &[ScoredRecord]) -> String {
    let context = hits
        .iter()
        .map(|hit| hit.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("Context:\n{context}\n\nQuestion: {question}\n\nAnswer:")
}

fn count_tokens(text: &str) -> usize {
    static ENCODING: OnceLock<Option<CoreBPE>> = OnceLock::new();
    let encoding = ENCODING.get_or_init(|| match cl100k_base() {
        Ok(encoding) => Some(encoding),
        Err(error) => {
            tracing::warn!(error = %error, "Tokenizer unavailable; counting whitespace tokens");
            None
        }
    });
    match encoding {
        Some(encoding) => encoding.encode_ordinary(text).len(),
        None => text.split_whitespace().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::Metadata;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct ScriptedChat {
        reply: Result<String, String>,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    #[async_trait]
    impl ChatClient for ScriptedChat {
        async fn complete(&self, request: ChatRequest) -> Result<String, ChatClientError> {
            self.requests.lock().unwrap().push(request);
            self.reply
                .clone()
                .map_err(ChatClientError::ProviderUnavailable)
        }
    }

    fn synthesizer(reply: Result<&str, &str>) -> (AnswerSynthesizer, Arc<Mutex<Vec<ChatRequest>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let chat = ScriptedChat {
            reply: reply.map(str::to_string).map_err(str::to_string),
            requests: requests.clone(),
        };
        (AnswerSynthesizer::new(Box::new(chat), "Jenny", 0.7), requests)
    }

    fn hit(seq: u64, text: &str) -> ScoredRecord {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), "guide.txt".into());
        ScoredRecord {
            id: format!("id-{seq}"),
            seq,
            score: 0.5,
            text: text.to_string(),
            metadata,
        }
    }

    #[tokio::test]
    async fn no_hits_returns_fixed_message_without_model_call() {
        let (synth, requests) = synthesizer(Ok("unused"));
        let answer = synth.synthesize("anything?", &[]).await.unwrap();

        assert_eq!(answer.outcome, AnswerOutcome::NoMatches);
        assert_eq!(answer.text, synth.no_matches_message());
        assert!(answer.sources.is_empty());
        assert!(requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_carries_ranked_context_and_question() {
        let (synth, requests) = synthesizer(Ok("  Visiting hours are 9 to 5.  "));
        let hits = [hit(0, "Visiting hours are 9 to 5."), hit(1, "Parking is free.")];

        let answer = synth.synthesize("When can I visit?", &hits).await.unwrap();

        assert_eq!(answer.text, "Visiting hours are 9 to 5.");
        assert_eq!(answer.outcome, AnswerOutcome::Generated);
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources[0].content.ends_with("..."));
        assert!(answer.prompt_tokens > 0);

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].user,
            "Context:\nVisiting hours are 9 to 5.\n\nParking is free.\n\nQuestion: When can I visit?\n\nAnswer:"
        );
        assert!(requests[0].system.contains(REFUSAL_PHRASE));
        assert!(requests[0].system.contains("You are Jenny"));
    }

    #[tokio::test]
    async fn model_refusal_is_replaced_with_friendly_message() {
        let (synth, _) = synthesizer(Ok("Sorry, there is No Information about parking here."));
        let answer = synth
            .synthesize("Where do I park?", &[hit(0, "Cafe hours")])
            .await
            .unwrap();

        assert_eq!(answer.outcome, AnswerOutcome::Refused);
        assert_eq!(answer.text, synth.refusal_message());
        assert_eq!(answer.sources.len(), 1);
    }

    #[test]
    fn guardrail_catches_instructed_phrase_and_empty_output() {
        let (synth, _) = synthesizer(Ok(""));
        assert!(synth.apply_guardrail(REFUSAL_PHRASE).1);
        assert!(synth.apply_guardrail("I don\u{2019}t have that information, sorry.").1);
        assert!(synth.apply_guardrail("   ").1);
        assert!(!synth.apply_guardrail("The cafe opens at 8.").1);
    }

    #[test]
    fn guardrail_is_idempotent() {
        let (synth, _) = synthesizer(Ok(""));
        let (once, _) = synth.apply_guardrail("no information");
        let (twice, _) = synth.apply_guardrail(&once);
        assert_eq!(once, synth.refusal_message());
        assert_eq!(twice, once);
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let (synth, _) = synthesizer(Err("timeout"));
        let error = synth
            .synthesize("q", &[hit(0, "context")])
            .await
            .unwrap_err();
        assert!(matches!(error, ChatClientError::ProviderUnavailable(_)));
    }

    #[test]
    fn canned_messages_use_assistant_name() {
        let synth = AnswerSynthesizer::new(
            Box::new(ScriptedChat {
                reply: Ok(String::new()),
                requests: Arc::default(),
            }),
            "Ada",
            0.0,
        );
        assert!(synth.empty_store_message().starts_with("Hi! I'm Ada, your AI assistant."));
        assert!(synth.no_matches_message().starts_with("Hi! I'm Ada."));
        assert!(synth.refusal_message().contains("Could you ask something related"));
    }
}
