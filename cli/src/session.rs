//! Interactive conversion loop.

use std::io::{self, BufRead, Write};

use fxquery_common::{now, RateSnapshot};
use fxquery_fx::query::ParsedQuery;
use fxquery_fx::{ConversionEngine, QueryParser, QueryReader, RateResolver};
use rust_decimal::Decimal;
use tracing::debug;

const BANNER: &str = "\
====================================
Welcome to the fxquery currency converter
====================================
Enter your conversion query, e.g.:
  '5 USD to EUR'
  'How much is 100 JPY in GBP?'
  '10 USD to EUR on 2022-01-01'

To exit, type 'exit', 'quit', 'end', or 'thank you'
====================================
";

const FORCE_NOTICE: &str = "Forced mode: cached rates are used regardless of their age";

const GOODBYE: &str = "Thank you for using fxquery. Goodbye!";

pub struct Session<R, W> {
    reader: QueryReader<R, W>,
    resolver: RateResolver,
    engine: ConversionEngine,
    parser: QueryParser,
    force: bool,
}

impl<R: BufRead, W: Write> Session<R, W> {
    pub fn new(
        reader: QueryReader<R, W>,
        resolver: RateResolver,
        engine: ConversionEngine,
        force: bool,
    ) -> Self {
        Self {
            reader,
            resolver,
            engine,
            parser: QueryParser::new(),
            force,
        }
    }

    /// Answer queries until end of input or a quit command.
    pub async fn run(&mut self) -> io::Result<()> {
        writeln!(self.reader.output(), "{}", BANNER)?;
        if self.force {
            writeln!(self.reader.output(), "{}", FORCE_NOTICE)?;
        }

        let resolver = &self.resolver;
        let force = self.force;
        while let Some((query, rates)) = self
            .reader
            .read_query(&self.parser, move |date| async move {
                resolver.resolve_for(date.as_deref(), now(), force).await
            })
            .await?
        {
            let answer = self.answer(&query, &rates);
            writeln!(self.reader.output(), "{}", answer)?;
        }

        writeln!(self.reader.output(), "{}", GOODBYE)?;
        Ok(())
    }

    /// Convert a parsed query against the rates it was parsed with.
    pub fn answer(&self, query: &ParsedQuery, rates: &RateSnapshot) -> String {
        let request = match query.to_request() {
            Ok(request) => request,
            Err(e) => return format!("Error: {}", e),
        };

        let result = match self
            .engine
            .convert(request.value, &request.from, &request.to, rates)
        {
            Ok(result) => result,
            Err(e) => {
                debug!(error = %e, "Conversion failed");
                return format!("Error: {}", e);
            }
        };

        let summary = format!(
            "{} {} = {} {}",
            self.fixed(request.value),
            request.from,
            self.fixed(result),
            request.to
        );

        match &query.date {
            Some(date) => format!("On {}: {}", date, summary),
            None => summary,
        }
    }

    fn fixed(&self, value: Decimal) -> String {
        let precision = self.engine.precision() as usize;
        format!("{:.*}", precision, self.engine.round(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxquery_common::{Currency, RateDate, RateKey, RateSnapshot};
    use fxquery_fx::query::INVALID_INPUT;
    use fxquery_fx::{MemoryRateStore, MockRateProvider, ResolverConfig};
    use rust_decimal_macros::dec;
    use std::io::Cursor;
    use std::sync::Arc;

    fn snapshot(eur: Decimal) -> RateSnapshot {
        RateSnapshot::new(
            now(),
            [
                (Currency::usd(), dec!(1)),
                (Currency::eur(), eur),
                (Currency::jpy(), dec!(150)),
            ],
        )
        .unwrap()
    }

    fn resolver(provider: Arc<MockRateProvider>) -> RateResolver {
        RateResolver::new(
            Arc::new(MemoryRateStore::new()),
            provider,
            ResolverConfig::default(),
        )
    }

    fn session<'a>(
        input: &str,
        output: &'a mut Vec<u8>,
        provider: Arc<MockRateProvider>,
    ) -> Session<Cursor<String>, &'a mut Vec<u8>> {
        let reader = QueryReader::new(Cursor::new(input.to_string()), output);
        Session::new(
            reader,
            resolver(provider),
            ConversionEngine::new(Currency::usd(), 2),
            false,
        )
    }

    async fn transcript(input: &str, provider: Arc<MockRateProvider>) -> String {
        let mut output = Vec::new();
        session(input, &mut output, provider).run().await.unwrap();
        String::from_utf8(output).unwrap()
    }

    #[tokio::test]
    async fn test_answers_latest_query() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_snapshot(RateKey::Latest, snapshot(dec!(0.91)));

        let printed = transcript("10 usd to eur\n300jpy in usd\n", provider).await;

        assert!(printed.contains("10.00 USD = 9.10 EUR\n"));
        assert!(printed.contains("300.00 JPY = 2.00 USD\n"));
    }

    #[tokio::test]
    async fn test_answers_historical_query() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        let date = RateDate::parse("2022-01-01").unwrap();
        provider.set_snapshot(RateKey::Historical(date), snapshot(dec!(0.88)));

        let printed = transcript("10 USD to EUR on 2022-01-01\n", provider.clone()).await;

        assert!(printed.contains("On 2022-01-01: 10.00 USD = 8.80 EUR\n"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_reports_errors() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_failing(true);

        let printed = transcript("10 USD to EUR\n10 USD to EUR on 2022-02-30\n", provider).await;

        assert!(printed.contains("Error: No currency exchange data available"));
        assert!(printed.contains("Error: Invalid date format"));
        assert!(printed.trim_end().ends_with(GOODBYE));
    }

    #[tokio::test]
    async fn test_rejects_unparsed_input() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_snapshot(RateKey::Latest, snapshot(dec!(0.91)));

        let printed = transcript("hello\n   \n", provider).await;

        assert_eq!(printed.matches(INVALID_INPUT).count(), 2);
    }

    #[test]
    fn test_answer_reports_conversion_failure() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        let mut output = Vec::new();
        let session = session("", &mut output, provider);
        let rates = snapshot(dec!(0.91));
        let query = ParsedQuery {
            amount: Decimal::MAX,
            from: Some(Currency::eur()),
            to: Some(Currency::jpy()),
            date: None,
        };

        assert!(session.answer(&query, &rates).starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_run_until_quit() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        provider.set_snapshot(RateKey::Latest, snapshot(dec!(0.91)));
        let mut output = Vec::new();

        session("nonsense\n10 USD to EUR\nbye\n10 USD to EUR\n", &mut output, provider.clone())
            .run()
            .await
            .unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.starts_with("===="));
        assert_eq!(printed.matches(INVALID_INPUT).count(), 1);
        assert_eq!(printed.matches("10.00 USD = 9.10 EUR").count(), 1);
        assert!(printed.trim_end().ends_with(GOODBYE));
        // The first fetch is cached for the rest of the session.
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_run_ends_at_end_of_input() {
        let provider = Arc::new(MockRateProvider::new("mock"));
        let mut output = Vec::new();

        session("", &mut output, provider).run().await.unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.trim_end().ends_with(GOODBYE));
    }
}
