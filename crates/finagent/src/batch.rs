//! CSV batch runner
//!
//! Reads `question,expected_answer` rows, answers each question in turn and
//! writes the rows back with an `actual_answer` column. A failed request is
//! recorded in the answer column and the run continues.

use crate::orchestrator::Orchestrator;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Deserialize)]
struct BatchInput {
    question: String,
    #[serde(default)]
    expected_answer: String,
}

#[derive(Debug, Clone, Serialize)]
struct BatchOutput<'a> {
    question: &'a str,
    expected_answer: &'a str,
    actual_answer: &'a str,
}

/// Counts for one batch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Answer every row of `input` and write the results to `output`
///
/// `delay` is slept between consecutive questions, not after the last one.
pub async fn run_batch<R: Read, W: Write>(
    orchestrator: &Orchestrator,
    input: R,
    output: W,
    delay: Duration,
) -> Result<BatchSummary, BatchError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(input);
    let rows = reader
        .deserialize::<BatchInput>()
        .collect::<Result<Vec<_>, _>>()?;
    info!(rows = rows.len(), "Batch loaded");

    let mut writer = csv::Writer::from_writer(output);
    let mut summary = BatchSummary::default();

    for (i, row) in rows.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        info!(row = i + 1, total = rows.len(), "Processing batch question");

        let answer = match orchestrator.process_query(&row.question).await {
            Ok(response) => response.answer,
            Err(e) => {
                warn!(row = i + 1, error = %e, "Batch question failed");
                summary.failed += 1;
                format!("Error: {e}")
            }
        };
        summary.processed += 1;

        writer.serialize(BatchOutput {
            question: &row.question,
            expected_answer: &row.expected_answer,
            actual_answer: &answer,
        })?;
        writer.flush()?;
    }

    info!(processed = summary.processed, failed = summary.failed, "Batch finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FinanceConfig;
    use crate::testing::{MockGateway, clock, scripted, text_response};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_batch_records_answers_and_failures() {
        let (provider, _seen) = scripted(vec![
            text_response(r#"{"is_complex": false, "reasoning": "Câu hỏi chung"}"#),
            text_response("VCB là Ngân hàng TMCP Ngoại thương Việt Nam."),
        ]);
        let config = FinanceConfig::builder().api_key("test").build().unwrap();
        let orchestrator =
            Orchestrator::new(Arc::new(provider), Arc::new(MockGateway::new()), clock(), &config)
                .unwrap();

        let input = "question,expected_answer\nVCB là gì?,Vietcombank\n\"  \",\n";
        let mut output = Vec::new();
        let summary = run_batch(&orchestrator, input.as_bytes(), &mut output, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(summary, BatchSummary { processed: 2, failed: 1 });

        let mut reader = csv::Reader::from_reader(output.as_slice());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["question", "expected_answer", "actual_answer"]
        );
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(&rows[0][2], "VCB là Ngân hàng TMCP Ngoại thương Việt Nam.");
        assert_eq!(&rows[0][1], "Vietcombank");
        assert!(rows[1][2].starts_with("Error: Invalid query"));
    }

    #[tokio::test]
    async fn test_missing_question_column_is_an_error() {
        let (provider, _seen) = scripted(Vec::new());
        let config = FinanceConfig::builder().api_key("test").build().unwrap();
        let orchestrator =
            Orchestrator::new(Arc::new(provider), Arc::new(MockGateway::new()), clock(), &config)
                .unwrap();

        let mut output = Vec::new();
        let err = run_batch(&orchestrator, "prompt\nGiá VCB\n".as_bytes(), &mut output, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, BatchError::Csv(_)));
    }
}
