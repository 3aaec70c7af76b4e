use pdf_rag_core::{Answer, QueryPipeline};
use std::fmt::Write as _;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

const PROMPT: &str = "> ";
const QUIT_WORDS: [&str; 3] = ["e", "exit", "quit"];

pub async fn ask<P>(pipeline: &P, question: &str) -> anyhow::Result<Answer>
where
    P: QueryPipeline + Sync,
{
    debug!(question, "answering");
    Ok(pipeline.answer(question).await?)
}

/// Answer text followed by a numbered list of the retrieved sources.
pub fn render_answer(answer: &Answer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", answer.text);
    if answer.sources.is_empty() {
        return out;
    }

    out.push_str("\nSources:\n");
    for (position, source) in answer.sources.iter().enumerate() {
        let page = source
            .page
            .map(|page| format!("page {page}"))
            .unwrap_or_else(|| "page ?".to_string());
        let _ = writeln!(out, "  {}. {page} (score {:.4})", position + 1, source.score);
    }
    out
}

pub fn is_quit(line: &str) -> bool {
    QUIT_WORDS
        .iter()
        .any(|word| line.eq_ignore_ascii_case(word))
}

/// Reads questions line by line until a quit word or end of input.
pub async fn interactive<P, R, W>(pipeline: &P, input: R, mut output: W) -> anyhow::Result<()>
where
    P: QueryPipeline + Sync,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            output.write_all(b"\n").await?;
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_quit(line) {
            break;
        }

        let answer = ask(pipeline, line).await?;
        output.write_all(render_answer(&answer).as_bytes()).await?;
        output.write_all(b"\n").await?;
    }
    output.flush().await?;
    Ok(())
}
