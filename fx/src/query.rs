//! Free-text conversion queries.
//!
//! Turns lines such as `"How much is 100jpy in USD?"` into an amount and two
//! currency codes. There is no grammar: words are uppercased, compact forms like
//! `100JPY` are split, the first number becomes the amount and the first two words
//! found in the rate table become the source and target currencies. Everything
//! else is ignored.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::str::FromStr;
use std::sync::OnceLock;

use fxquery_common::{Currency, RateSnapshot};
use regex::Regex;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::conversion::ConversionRequest;
use crate::error::{FxError, FxResult};

/// Message printed when a line does not name two known currencies.
pub const INVALID_INPUT: &str = "Invalid input. Please try again.";

/// Lines that end an interactive session.
pub const QUIT_COMMANDS: &[&str] = &[
    ":q", "exit", "quit", "end", "thank you", "goodbye", "bye", "finished", "done",
];

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedQuery {
    /// Amount to convert; 1 when the line has no number.
    pub amount: Decimal,
    /// First known currency in the line.
    pub from: Option<Currency>,
    /// Second known currency in the line.
    pub to: Option<Currency>,
    /// `YYYY-MM-DD` date found in the line, not yet validated.
    pub date: Option<String>,
}

impl ParsedQuery {
    /// Whether both currencies were found.
    pub fn is_resolved(&self) -> bool {
        self.from.is_some() && self.to.is_some()
    }

    /// Turn a resolved query into a conversion request.
    pub fn to_request(&self) -> FxResult<ConversionRequest> {
        match (&self.from, &self.to) {
            (Some(from), Some(to)) => Ok(ConversionRequest::new(
                self.amount,
                from.clone(),
                to.clone(),
            )),
            _ => Err(FxError::InvalidQuery(
                "expected two known currency codes".to_string(),
            )),
        }
    }
}

/// Stateless free-text query parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryParser;

impl QueryParser {
    pub fn new() -> Self {
        Self
    }

    /// Classify the words of `line` against the currencies of `known`.
    pub fn parse(&self, line: &str, known: &RateSnapshot) -> ParsedQuery {
        let mut amount: Option<Decimal> = None;
        let mut from: Option<Currency> = None;
        let mut to: Option<Currency> = None;

        for token in tokenize(line) {
            if amount.is_none() {
                if let Ok(value) = Decimal::from_str(&token) {
                    if !value.is_zero() {
                        amount = Some(value);
                    }
                }
            }

            let currency = Currency::new(token);
            if known.contains(&currency) {
                if from.is_none() {
                    from = Some(currency);
                } else if to.is_none() {
                    to = Some(currency);
                }
            }
        }

        ParsedQuery {
            amount: amount.unwrap_or(Decimal::ONE),
            from,
            to,
            date: None,
        }
    }

    /// Pull out an embedded date first, then parse the rest of the line.
    pub fn parse_with_date(&self, line: &str, known: &RateSnapshot) -> ParsedQuery {
        let (rest, date) = extract_date(line);
        ParsedQuery {
            date,
            ..self.parse(&rest, known)
        }
    }
}

fn date_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\b[0-9]{4}-[0-9]{2}-[0-9]{2}\b").expect("date pattern is valid")
    })
}

/// Remove the first `YYYY-MM-DD` substring from a line.
///
/// Returns the remaining text (trimmed) and the date, if one was found.
pub fn extract_date(line: &str) -> (String, Option<String>) {
    match date_pattern().find(line) {
        Some(found) => {
            let date = found.as_str().to_string();
            let rest = line.replace(&date, "").trim().to_string();
            (rest, Some(date))
        }
        None => (line.to_string(), None),
    }
}

/// Drop every character that is not a letter, digit, whitespace, hyphen or decimal point.
pub fn sanitize(line: &str) -> String {
    line.chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '.')
        .collect()
}

/// Split a line into uppercase words, separating leading numbers from letters.
pub fn tokenize(line: &str) -> Vec<String> {
    sanitize(line)
        .to_uppercase()
        .split_whitespace()
        .map(|word| word.trim_end_matches('.'))
        .filter(|word| !word.is_empty())
        .flat_map(split_numeric_prefix)
        .collect()
}

/// `"100JPY"` becomes `["100", "JPY"]`, `"50.5EUR"` becomes `["50.5", "EUR"]`.
fn split_numeric_prefix(word: &str) -> Vec<String> {
    let bytes = word.as_bytes();
    let mut end = bytes.iter().take_while(|b| b.is_ascii_digit()).count();

    if end > 0 && bytes.get(end) == Some(&b'.') {
        let fraction = bytes[end + 1..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if fraction > 0 {
            end += 1 + fraction;
        }
    }

    if end == 0 || end == word.len() {
        vec![word.to_string()]
    } else {
        vec![word[..end].to_string(), word[end..].to_string()]
    }
}

/// Whether a line asks to end the session.
pub fn is_quit_command(line: &str) -> bool {
    let normalized = line
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ':')
        .to_lowercase();
    QUIT_COMMANDS.contains(&normalized.as_str())
}

/// Reads queries line by line from an input source.
///
/// The retry loop ends when a line parses, when the input is exhausted, or when a
/// quit command is read. It never recurses, so piped input that never yields a
/// valid query simply runs out.
pub struct QueryReader<R, W> {
    input: R,
    output: W,
    prompt: String,
}

impl<R: BufRead, W: Write> QueryReader<R, W> {
    /// Create a reader that prompts with `"> "`.
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            prompt: "> ".to_string(),
        }
    }

    /// Change the prompt.
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    /// Writer used for prompts and messages.
    pub fn output(&mut self) -> &mut W {
        &mut self.output
    }

    /// Prompt and read one line. `None` at end of input or on a quit command.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        write!(self.output, "{}", self.prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            debug!("End of input");
            return Ok(None);
        }

        if is_quit_command(&line) {
            debug!(line = line.trim(), "Quit command received");
            return Ok(None);
        }

        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }

    /// Keep requesting lines until one names two known currencies.
    ///
    /// For each non-blank line, `rates_for` is called with the date found in the
    /// line (if any) and the line is parsed against the table it returns. A failed
    /// lookup prints `Error: ...` and the loop moves on to the next line. Returns
    /// the parsed query together with the rates it was parsed against.
    pub async fn read_query<F, Fut>(
        &mut self,
        parser: &QueryParser,
        mut rates_for: F,
    ) -> io::Result<Option<(ParsedQuery, RateSnapshot)>>
    where
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = FxResult<RateSnapshot>>,
    {
        while let Some(line) = self.next_line()? {
            let (rest, date) = extract_date(&line);
            if rest.trim().is_empty() {
                writeln!(self.output, "{}", INVALID_INPUT)?;
                continue;
            }

            let rates = match rates_for(date).await {
                Ok(rates) => rates,
                Err(e) => {
                    warn!(error = %e, "Could not resolve rates");
                    writeln!(self.output, "Error: {}", e)?;
                    continue;
                }
            };

            let query = parser.parse_with_date(&line, &rates);
            if query.is_resolved() {
                return Ok(Some((query, rates)));
            }
            debug!(line = %line, "Query not understood");
            writeln!(self.output, "{}", INVALID_INPUT)?;
        }
        Ok(None)
    }
}
