use std::io::{self, BufRead, Write};
use tracing::info;

use crate::config::RagConfig;
use crate::document;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::llm::{Generator, RagChain};
use crate::vector_db::VectorDb;

/// The assembled pipeline, ready to answer questions.
///
/// Construction is initialization: a `ChatInterface` value always holds an
/// opened index, so there is no partially-initialized state to guard
/// against at ask time.
pub struct ChatInterface {
    config: RagConfig,
    db: VectorDb,
    chain: RagChain,
}

impl ChatInterface {
    /// Indexes the documents directory if no index exists yet, otherwise
    /// opens the existing index without re-reading documents.
    pub fn initialize(
        config: RagConfig,
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
    ) -> Result<Self> {
        let chunks = if VectorDb::is_built(&config.index_dir) {
            info!(dir = %config.index_dir.display(), "opening existing index");
            None
        } else {
            info!(dir = %config.documents_dir.display(), "indexing documents");
            let documents = document::load_documents(&config.documents_dir)?;
            info!(documents = documents.len(), "loaded");
            let chunks =
                document::split_documents(&documents, config.chunk_size, config.chunk_overlap);
            info!(chunks = chunks.len(), "split");
            Some(chunks)
        };

        let db = VectorDb::open_or_build(&config.index_dir, embedder, chunks)?;
        let chain = RagChain::new(generator, config.prompt_template.clone())?;
        Ok(ChatInterface { config, db, chain })
    }

    /// Retrieve top-K context for `question` and generate an answer.
    pub fn ask(&self, question: &str) -> Result<String> {
        let results = self.db.retrieve(question, self.config.top_k)?;
        self.chain.answer(question, &results)
    }

    /// Interactive loop: one question at a time until `exit`, `quit` or
    /// end of input. A failing query is reported and the loop keeps
    /// going; only I/O errors on stdin end the session early.
    pub fn run_chat_loop(&self) -> Result<()> {
        println!("\n=== Local RAG Chat ===");
        println!("Indexed chunks: {}", self.db.len());
        println!("Type 'exit' to quit\n");

        let stdin = io::stdin();
        let mut lines = stdin.lock().lines();
        loop {
            print!("Question: ");
            io::stdout().flush()?;

            let Some(line) = lines.next() else {
                break; // EOF
            };
            let question = line?;
            let question = question.trim();
            if question.is_empty() {
                continue;
            }
            if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                break;
            }

            match self.ask(question) {
                Ok(answer) => println!("\nAnswer: {answer}\n"),
                Err(e) => eprintln!("\nError: {e}\n"),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use std::fs;
    use tempfile::tempdir;

    struct CannedGenerator;

    impl Generator for CannedGenerator {
        fn generate(&self, prompt: &str) -> Result<String> {
            Ok(format!("answered from {} chars of prompt", prompt.len()))
        }
    }

    fn test_config(root: &std::path::Path) -> RagConfig {
        let mut config = RagConfig::default();
        config.documents_dir = root.join("docs");
        config.index_dir = root.join("index");
        config.chunk_size = 100;
        config.chunk_overlap = 20;
        config.top_k = 2;
        config
    }

    fn interface(config: RagConfig) -> Result<ChatInterface> {
        ChatInterface::initialize(
            config,
            Box::new(HashEmbedder::default()),
            Box::new(CannedGenerator),
        )
    }

    #[test]
    fn initialize_indexes_then_answers() -> anyhow::Result<()> {
        let root = tempdir()?;
        let config = test_config(root.path());
        fs::create_dir_all(&config.documents_dir)?;
        fs::write(
            config.documents_dir.join("a.txt"),
            "the capital of france is paris",
        )?;

        let chat = interface(config)?;
        let answer = chat.ask("what is the capital of france")?;
        assert!(answer.starts_with("answered from"));
        Ok(())
    }

    #[test]
    fn empty_documents_directory_builds_an_empty_index() -> anyhow::Result<()> {
        let root = tempdir()?;
        let config = test_config(root.path());
        fs::create_dir_all(&config.documents_dir)?;

        let chat = interface(config)?;
        // Empty context must still produce an answer, not an error.
        let answer = chat.ask("anything")?;
        assert!(!answer.is_empty());
        Ok(())
    }

    #[test]
    fn second_initialize_opens_without_rereading_documents() -> anyhow::Result<()> {
        let root = tempdir()?;
        let config = test_config(root.path());
        fs::create_dir_all(&config.documents_dir)?;
        fs::write(config.documents_dir.join("a.txt"), "indexed once")?;

        let chat = interface(config.clone())?;
        drop(chat);

        // Removing the documents must not matter once the index exists.
        fs::remove_dir_all(&config.documents_dir)?;
        let chat = interface(config)?;
        assert!(chat.ask("indexed once").is_ok());
        Ok(())
    }

    #[test]
    fn missing_documents_directory_fails_initialization() {
        let root = tempdir().unwrap();
        let config = test_config(root.path());
        assert!(interface(config).is_err());
    }
}
