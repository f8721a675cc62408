use localrag_core::types::Chunk;

const INSTRUCTIONS: &str = "Use the following pieces of context to answer the user's question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Chunk contents joined by blank lines, in ranked order.
pub fn format_context(chunks: &[Chunk]) -> String {
	chunks.iter().map(|c| c.content.as_str()).collect::<Vec<_>>().join("\n\n")
}

pub fn build_prompt(question: &str, chunks: &[Chunk]) -> String {
	format!("{INSTRUCTIONS}\n\nContext: {}\n\nQuestion: {question}\n\nAnswer:", format_context(chunks))
}
