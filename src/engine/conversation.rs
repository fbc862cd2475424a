//! Bounded tool-calling conversation loop.
//!
//! One question runs as: seed retrieval, then up to [`MAX_ITERATIONS`]
//! model turns. Each turn either answers plainly or requests more
//! `search_docs` calls; tool results are fed back as tool messages. On
//! the last permitted turn tool choice is forced to "none" so the loop
//! always terminates with an answer.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::json;

use crate::models::DocumentChunk;
use crate::provider::{
    ChatMessage, ChatProvider, ChatTurn, EmbeddingProvider, ToolCall, ToolChoice, ToolSpec,
};

use super::EngineError;
use super::context;
use super::pricing::{CostBreakdown, CostLedger};
use super::retriever::{self, ScoredChunk};

/// Upper bound on model turns per question.
pub const MAX_ITERATIONS: usize = 5;

/// Substituted when the model never produces usable text.
pub const FALLBACK_ANSWER: &str =
    "Sorry, I could not generate an answer from the documentation. Please try rephrasing your question.";

const TOOL_NAME: &str = "search_docs";
const TOOL_DEFAULT_LIMIT: usize = 5;
const TOOL_MAX_LIMIT: usize = 20;
const MAX_COMPLETION_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.2;

/// Caller-shaped inputs for one question.
pub struct AskParams<'a> {
    pub question: &'a str,
    /// Already validated against the known SDK list.
    pub target_sdk: Option<&'a str>,
    /// Result count for the seed retrieval.
    pub initial_limit: usize,
    pub model: &'a str,
}

/// Final answer with provenance and spend.
#[derive(Debug)]
pub struct AskOutcome {
    pub answer: String,
    pub sources: Vec<SourceRef>,
    /// Completed tool rounds.
    pub iterations: usize,
    pub cost: CostBreakdown,
}

/// One cited documentation page.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub chunk_index: usize,
}

#[derive(Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// The `search_docs` declaration sent with every turn.
fn search_docs_tool() -> ToolSpec {
    ToolSpec::function(
        TOOL_NAME,
        "Search the documentation corpus for pages relevant to a query. \
         Use this when the provided excerpts do not answer the question.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "What to search the documentation for"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of results",
                    "minimum": 1,
                    "maximum": TOOL_MAX_LIMIT
                }
            },
            "required": ["query"]
        }),
    )
}

/// Drive one question to completion.
pub async fn run<'c, E, C>(
    params: &AskParams<'_>,
    corpus: &'c [DocumentChunk],
    embedder: &E,
    chat: &C,
) -> Result<AskOutcome, EngineError>
where
    E: EmbeddingProvider,
    C: ChatProvider,
{
    let mut ledger = CostLedger::default();
    let mut collected: HashMap<&'c str, &'c DocumentChunk> = HashMap::new();

    // Seed retrieval with the raw question.
    let seed = retriever::search(
        params.question,
        corpus,
        params.target_sdk,
        params.initial_limit,
        embedder,
    )
    .await?;
    ledger.record_search(seed.tokens_used, seed.cost);
    remember_chunks(&mut collected, &seed.chunks);

    let seed_context = context::build_context(&seed.chunks);
    let mut messages = vec![
        ChatMessage::system(context::build_system_prompt(params.target_sdk)),
        ChatMessage::user(context::build_user_prompt(params.question, &seed_context)),
    ];

    let tools = [search_docs_tool()];
    let mut iterations = 0;
    let mut answer: Option<String> = None;

    while iterations < MAX_ITERATIONS {
        // Force a terminal answer on the last permitted turn.
        let tool_choice = if iterations + 1 == MAX_ITERATIONS {
            ToolChoice::None
        } else {
            ToolChoice::Auto
        };

        let outcome = chat
            .chat(ChatTurn {
                model: params.model,
                messages: &messages,
                tools: &tools,
                tool_choice,
                max_tokens: MAX_COMPLETION_TOKENS,
                temperature: TEMPERATURE,
            })
            .await
            .map_err(EngineError::Chat)?;

        ledger.record_chat(outcome.usage);
        let assistant = outcome.message;
        messages.push(ChatMessage::from_assistant(&assistant));

        if assistant.tool_calls.is_empty() {
            answer = assistant.text();
            break;
        }

        for call in &assistant.tool_calls {
            let payload = run_tool_call(
                call,
                corpus,
                params.target_sdk,
                embedder,
                &mut ledger,
                &mut collected,
            )
            .await?;
            messages.push(ChatMessage::tool(call.id.clone(), payload));
        }
        iterations += 1;
    }

    let answer = answer
        .or_else(|| last_assistant_text(&messages))
        .unwrap_or_else(|| FALLBACK_ANSWER.to_string());

    let sources = dedupe_sources(&collected);
    let cost = ledger.finalize(params.model);

    tracing::info!(
        iterations,
        sources = sources.len(),
        total_cost = cost.total_cost,
        "conversation complete"
    );

    Ok(AskOutcome {
        answer,
        sources,
        iterations,
        cost,
    })
}

/// Execute one requested tool call, returning the tool message payload.
/// Unknown tools and malformed arguments produce an error payload for
/// the model rather than failing the request.
async fn run_tool_call<'c, E: EmbeddingProvider>(
    call: &ToolCall,
    corpus: &'c [DocumentChunk],
    target_sdk: Option<&str>,
    embedder: &E,
    ledger: &mut CostLedger,
    collected: &mut HashMap<&'c str, &'c DocumentChunk>,
) -> Result<String, EngineError> {
    if call.function.name != TOOL_NAME {
        tracing::warn!(tool = %call.function.name, "model requested unknown tool");
        return Ok(error_payload(&format!(
            "unknown tool: {}",
            call.function.name
        )));
    }

    let args: SearchArgs = match serde_json::from_str(&call.function.arguments) {
        Ok(args) => args,
        Err(err) => {
            tracing::warn!(%err, "malformed search_docs arguments");
            return Ok(error_payload(&format!("invalid arguments: {err}")));
        }
    };

    let limit = tool_limit(args.limit);
    let outcome = retriever::search(&args.query, corpus, target_sdk, limit, embedder).await?;
    ledger.record_search(outcome.tokens_used, outcome.cost);
    remember_chunks(collected, &outcome.chunks);

    tracing::debug!(
        query = %args.query,
        results = outcome.chunks.len(),
        "tool search complete"
    );

    Ok(context::tool_result_payload(&outcome.chunks))
}

fn tool_limit(requested: Option<usize>) -> usize {
    requested.unwrap_or(TOOL_DEFAULT_LIMIT).clamp(1, TOOL_MAX_LIMIT)
}

fn error_payload(message: &str) -> String {
    json!({ "error": message }).to_string()
}

fn remember_chunks<'c>(
    collected: &mut HashMap<&'c str, &'c DocumentChunk>,
    chunks: &[ScoredChunk<'c>],
) {
    for scored in chunks {
        collected.entry(scored.chunk.id.as_str()).or_insert(scored.chunk);
    }
}

fn last_assistant_text(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .rev()
        .filter(|message| message.role == "assistant")
        .find_map(|message| message.content.clone())
}

/// One source per page URL, keeping the lowest chunk index among
/// duplicates, sorted by URL for stable output.
fn dedupe_sources(collected: &HashMap<&str, &DocumentChunk>) -> Vec<SourceRef> {
    let mut by_url: HashMap<&str, &DocumentChunk> = HashMap::new();
    for &chunk in collected.values() {
        by_url
            .entry(chunk.url.as_str())
            .and_modify(|held| {
                if chunk.chunk_index < held.chunk_index {
                    *held = chunk;
                }
            })
            .or_insert(chunk);
    }

    let mut sources: Vec<SourceRef> = by_url
        .into_values()
        .map(|chunk| SourceRef {
            url: chunk.url.clone(),
            title: chunk.title.clone(),
            chunk_index: chunk.chunk_index,
        })
        .collect();
    sources.sort_by(|a, b| a.url.cmp(&b.url));
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::engine::pricing;
    use crate::provider::{
        AssistantMessage, ChatOutcome, FunctionCall, MessageContent, ProviderError, TokenUsage,
    };

    struct FixedEmbedder {
        vector: Vec<f32>,
    }

    impl EmbeddingProvider for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(self.vector.clone())
        }
    }

    /// Plays back a fixed script of assistant turns; once the script is
    /// exhausted it keeps requesting searches, which exercises the
    /// iteration bound. Records the tool choice and the tool-message
    /// ids visible on each call.
    struct ScriptedChat {
        script: Mutex<VecDeque<AssistantMessage>>,
        calls: AtomicUsize,
        tool_choices: Mutex<Vec<ToolChoice>>,
        tool_ids_seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedChat {
        fn new(script: Vec<AssistantMessage>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                tool_choices: Mutex::new(Vec::new()),
                tool_ids_seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn tool_choices(&self) -> Vec<ToolChoice> {
            self.tool_choices.lock().unwrap().clone()
        }

        fn tool_ids_seen(&self) -> Vec<Vec<String>> {
            self.tool_ids_seen.lock().unwrap().clone()
        }
    }

    impl ChatProvider for ScriptedChat {
        async fn chat(&self, turn: ChatTurn<'_>) -> Result<ChatOutcome, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.tool_choices.lock().unwrap().push(turn.tool_choice);
            let tool_ids = turn
                .messages
                .iter()
                .filter(|message| message.role == "tool")
                .filter_map(|message| message.tool_call_id.clone())
                .collect();
            self.tool_ids_seen.lock().unwrap().push(tool_ids);
            let message = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| tool_call_message("setup", Some(2)));
            Ok(ChatOutcome {
                message,
                usage: TokenUsage {
                    prompt_tokens: 100,
                    completion_tokens: 20,
                },
            })
        }
    }

    fn answer_message(text: &str) -> AssistantMessage {
        AssistantMessage {
            content: Some(MessageContent::Plain(text.into())),
            tool_calls: vec![],
        }
    }

    fn tool_call_message(query: &str, limit: Option<usize>) -> AssistantMessage {
        let arguments = match limit {
            Some(limit) => format!(r#"{{"query":"{query}","limit":{limit}}}"#),
            None => format!(r#"{{"query":"{query}"}}"#),
        };
        AssistantMessage {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                call_type: "function".into(),
                function: FunctionCall {
                    name: TOOL_NAME.into(),
                    arguments,
                },
            }],
        }
    }

    /// One assistant turn requesting several searches at once.
    fn multi_tool_call_message(requests: &[(&str, &str)]) -> AssistantMessage {
        AssistantMessage {
            content: None,
            tool_calls: requests
                .iter()
                .map(|(id, query)| ToolCall {
                    id: (*id).into(),
                    call_type: "function".into(),
                    function: FunctionCall {
                        name: TOOL_NAME.into(),
                        arguments: format!(r#"{{"query":"{query}"}}"#),
                    },
                })
                .collect(),
        }
    }

    fn chunk(
        id: &str,
        url: &str,
        chunk_index: usize,
        sdk: Option<&str>,
        base_url: Option<&str>,
        embedding: Vec<f32>,
    ) -> DocumentChunk {
        DocumentChunk {
            id: id.into(),
            content: format!("content of {id}"),
            embedding,
            url: url.into(),
            title: format!("Title {id}"),
            chunk_index,
            file_path: format!("docs/{id}.mdx"),
            sdk: sdk.map(Into::into),
            base_url: base_url.map(Into::into),
        }
    }

    fn params<'a>(question: &'a str, sdk: Option<&'a str>) -> AskParams<'a> {
        AskParams {
            question,
            target_sdk: sdk,
            initial_limit: 8,
            model: "gpt-4o-mini",
        }
    }

    #[tokio::test]
    async fn test_plain_answer_on_first_turn() {
        let corpus = vec![
            chunk("a", "/a", 0, None, None, vec![1.0, 0.0]),
            chunk("b", "/b", 0, None, None, vec![0.0, 1.0]),
        ];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let chat = ScriptedChat::new(vec![answer_message("Call init() first.")]);

        let question = "How do I begin?";
        let outcome = run(&params(question, None), &corpus, &embedder, &chat)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Call init() first.");
        assert_eq!(outcome.iterations, 0);
        assert_eq!(chat.calls(), 1);
        assert_eq!(chat.tool_choices(), vec![ToolChoice::Auto]);
        assert_eq!(outcome.sources.len(), 2);

        assert_eq!(outcome.cost.search_tokens, pricing::estimate_tokens(question));
        assert_eq!(outcome.cost.completion_tokens, 120);
        assert!(
            (outcome.cost.total_cost
                - (outcome.cost.search_cost + outcome.cost.completion_cost))
                .abs()
                < 1e-8
        );
    }

    #[tokio::test]
    async fn test_tool_round_merges_new_sources() {
        let corpus = vec![
            chunk("a", "/a", 0, None, None, vec![1.0, 0.0]),
            chunk("b", "/b", 0, None, None, vec![0.9, 0.1]),
        ];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let chat = ScriptedChat::new(vec![
            tool_call_message("more detail", Some(2)),
            answer_message("Combined answer."),
        ]);

        let question = "How do I begin?";
        let mut ask = params(question, None);
        ask.initial_limit = 1;

        let outcome = run(&ask, &corpus, &embedder, &chat).await.unwrap();

        assert_eq!(outcome.answer, "Combined answer.");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(chat.calls(), 2);

        let urls: Vec<&str> = outcome.sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["/a", "/b"]);

        let expected_search =
            pricing::estimate_tokens(question) + pricing::estimate_tokens("more detail");
        assert_eq!(outcome.cost.search_tokens, expected_search);
        assert_eq!(outcome.cost.completion_tokens, 240);
    }

    #[tokio::test]
    async fn test_multiple_tool_calls_in_one_round() {
        let corpus = vec![
            chunk("a", "/a", 0, None, None, vec![1.0, 0.0]),
            chunk("b", "/b", 0, None, None, vec![0.0, 1.0]),
        ];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let chat = ScriptedChat::new(vec![
            multi_tool_call_message(&[("call-a", "sessions"), ("call-b", "webhooks")]),
            answer_message("Both covered."),
        ]);

        let outcome = run(&params("question", None), &corpus, &embedder, &chat)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "Both covered.");
        assert_eq!(outcome.iterations, 1);
        assert_eq!(chat.calls(), 2);

        // Each call gets its own tool message, in request order.
        let seen = chat.tool_ids_seen();
        assert!(seen[0].is_empty());
        assert_eq!(seen[1], vec!["call-a", "call-b"]);
    }

    #[tokio::test]
    async fn test_iteration_limit_forces_fallback() {
        let corpus = vec![chunk("a", "/a", 0, None, None, vec![1.0, 0.0])];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        // Empty script: the model requests a search on every turn.
        let chat = ScriptedChat::new(vec![]);

        let outcome = run(&params("Unanswerable?", None), &corpus, &embedder, &chat)
            .await
            .unwrap();

        assert_eq!(chat.calls(), MAX_ITERATIONS);
        assert_eq!(outcome.iterations, MAX_ITERATIONS);
        assert_eq!(outcome.answer, FALLBACK_ANSWER);

        let choices = chat.tool_choices();
        assert_eq!(choices.len(), MAX_ITERATIONS);
        assert_eq!(choices[MAX_ITERATIONS - 1], ToolChoice::None);
        assert!(choices[..MAX_ITERATIONS - 1]
            .iter()
            .all(|choice| *choice == ToolChoice::Auto));
    }

    #[tokio::test]
    async fn test_whitespace_only_answer_falls_back() {
        let corpus = vec![chunk("a", "/a", 0, None, None, vec![1.0, 0.0])];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let chat = ScriptedChat::new(vec![answer_message("   ")]);

        let outcome = run(&params("question", None), &corpus, &embedder, &chat)
            .await
            .unwrap();

        assert_eq!(outcome.answer, FALLBACK_ANSWER);
        assert_eq!(outcome.iterations, 0);
        assert_eq!(chat.calls(), 1);
    }

    #[tokio::test]
    async fn test_sources_dedupe_by_url_lowest_chunk_index() {
        let corpus = vec![
            chunk("a1", "/a", 1, None, None, vec![1.0, 0.0]),
            chunk("a0", "/a", 0, None, None, vec![0.9, 0.1]),
            chunk("b", "/b", 3, None, None, vec![0.5, 0.5]),
        ];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let chat = ScriptedChat::new(vec![answer_message("Done.")]);

        let outcome = run(&params("question", None), &corpus, &embedder, &chat)
            .await
            .unwrap();

        assert_eq!(outcome.sources.len(), 2);
        assert_eq!(outcome.sources[0].url, "/a");
        assert_eq!(outcome.sources[0].chunk_index, 0);
        assert_eq!(outcome.sources[1].url, "/b");
        assert_eq!(outcome.sources[1].chunk_index, 3);
    }

    #[tokio::test]
    async fn test_target_sdk_applies_to_seed_and_tool_searches() {
        let corpus = vec![
            chunk("react", "/p/react", 0, Some("react"), Some("/p"), vec![1.0, 0.0]),
            chunk("vue", "/p/vue", 0, Some("vue"), Some("/p"), vec![0.5, 0.5]),
        ];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let chat = ScriptedChat::new(vec![
            tool_call_message("variants", None),
            answer_message("Vue answer."),
        ]);

        let outcome = run(&params("question", Some("vue")), &corpus, &embedder, &chat)
            .await
            .unwrap();

        let urls: Vec<&str> = outcome.sources.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["/p/vue"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_yields_error_payload() {
        let corpus = vec![chunk("a", "/a", 0, None, None, vec![1.0, 0.0])];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let mut ledger = CostLedger::default();
        let mut collected = HashMap::new();
        let call = ToolCall {
            id: "call_9".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: "drop_tables".into(),
                arguments: "{}".into(),
            },
        };

        let payload = run_tool_call(&call, &corpus, None, &embedder, &mut ledger, &mut collected)
            .await
            .unwrap();

        assert!(payload.contains("unknown tool"));
        assert_eq!(ledger.search_tokens, 0);
        assert!(collected.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_arguments_yield_error_payload() {
        let corpus = vec![chunk("a", "/a", 0, None, None, vec![1.0, 0.0])];
        let embedder = FixedEmbedder {
            vector: vec![1.0, 0.0],
        };
        let mut ledger = CostLedger::default();
        let mut collected = HashMap::new();
        let call = ToolCall {
            id: "call_9".into(),
            call_type: "function".into(),
            function: FunctionCall {
                name: TOOL_NAME.into(),
                arguments: "not json".into(),
            },
        };

        let payload = run_tool_call(&call, &corpus, None, &embedder, &mut ledger, &mut collected)
            .await
            .unwrap();

        assert!(payload.contains("invalid arguments"));
        assert_eq!(ledger.search_tokens, 0);
    }

    #[test]
    fn test_tool_limit_clamped() {
        assert_eq!(tool_limit(None), TOOL_DEFAULT_LIMIT);
        assert_eq!(tool_limit(Some(0)), 1);
        assert_eq!(tool_limit(Some(3)), 3);
        assert_eq!(tool_limit(Some(500)), TOOL_MAX_LIMIT);
    }

    #[test]
    fn test_search_docs_tool_shape() {
        let tool = search_docs_tool();
        assert_eq!(tool.function.name, TOOL_NAME);
        assert_eq!(tool.tool_type, "function");

        let required = tool.function.parameters["required"].as_array().unwrap().clone();
        assert_eq!(required, vec![serde_json::json!("query")]);
    }
}
