//! Interactive library lookups on the terminal.

use std::io::{self, BufRead, Write};

use plexmeta_metadata::apply::TitleResolver;
use plexmeta_metadata::library::LibraryEntry;
use plexmeta_metadata::tmdb::TmdbClient;
use tracing::warn;

/// Asks on stdin, and offers TMDB names as aliases when an API key is set.
pub struct TerminalResolver {
    tmdb: Option<TmdbClient>,
}

impl TerminalResolver {
    pub fn new(tmdb: Option<TmdbClient>) -> Self {
        Self { tmdb }
    }
}

/// Write `prompt` and read one trimmed line; `None` on an empty answer or EOF.
fn read_answer(mut input: impl BufRead, mut output: impl Write, prompt: &str) -> Option<String> {
    write!(output, "{prompt}").ok()?;
    output.flush().ok()?;
    let mut line = String::new();
    input.read_line(&mut line).ok()?;
    let line = line.trim();
    if line.is_empty() { None } else { Some(line.to_string()) }
}

/// Ask on the terminal without blocking the runtime's worker threads.
async fn ask(prompt: String) -> Option<String> {
    tokio::task::spawn_blocking(move || read_answer(io::stdin().lock(), io::stdout(), &prompt))
        .await
        .ok()
        .flatten()
}

/// Parse a typed index, accepting only `0..len`.
pub fn parse_choice(input: &str, len: usize) -> Option<usize> {
    input.trim().parse().ok().filter(|&i| i < len)
}

fn choice_listing(query: &str, candidates: &[LibraryEntry]) -> String {
    let mut listing = format!("Several library items match `{query}`:\n");
    for (index, entry) in candidates.iter().enumerate() {
        listing.push_str(&format!("{index}: {entry}\n"));
    }
    listing
}

#[async_trait::async_trait]
impl TitleResolver for TerminalResolver {
    async fn aliases(&self, name: &str, year: Option<i32>, is_movie: bool) -> Vec<String> {
        let Some(tmdb) = &self.tmdb else {
            return Vec::new();
        };
        match tmdb.title_aliases(name, year, is_movie).await {
            Ok(aliases) => aliases,
            Err(e) => {
                warn!(name, error = %e, "TMDB lookup failed");
                Vec::new()
            }
        }
    }

    async fn prompt_title(&self, name: &str) -> Option<String> {
        ask(format!("`{name}` was not found in the library.\n請輸入正確標題：")).await
    }

    async fn pick(&self, query: &str, candidates: &[LibraryEntry]) -> Option<usize> {
        let answer = ask(format!("{}請選擇要改的編號：", choice_listing(query, candidates))).await?;
        parse_choice(&answer, candidates.len())
    }
}
