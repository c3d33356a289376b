use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use common::types::Chain;
use std::cmp::Ordering;
use std::io::Write;
use std::path::Path;
use tracing::warn;

use crate::aggregator::WalletRecord;
use crate::summary::{ChainStatus, ChainSummary};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainCells {
    pub chain: Chain,
    pub status: ChainStatus,
    pub transaction_count: usize,
    pub first_transaction_date: Option<NaiveDateTime>,
    pub last_transaction_date: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub address: String,
    pub registration_date: Option<NaiveDateTime>,
    pub funding_source: Option<String>,
    pub chains: Vec<ChainCells>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub columns: Vec<String>,
    pub rows: Vec<ReportRow>,
}

pub fn columns(chains: &[Chain]) -> Vec<String> {
    let mut cols = vec![
        "address".to_string(),
        "registration_date".to_string(),
        "funding_source".to_string(),
    ];
    for chain in chains {
        cols.push(format!("{chain}_transaction_count"));
        cols.push(format!("{chain}_first_transaction_date"));
        cols.push(format!("{chain}_last_transaction_date"));
    }
    cols
}

/// Ascending by date, rows without a registration date last.
fn cmp_registration(a: Option<NaiveDateTime>, b: Option<NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

pub struct ReportBuilder {
    chains: Vec<Chain>,
}

impl ReportBuilder {
    pub fn new(chains: Vec<Chain>) -> Self {
        Self { chains }
    }

    pub fn build(&self, records: Vec<WalletRecord>) -> BatchReport {
        let mut rows: Vec<ReportRow> = records.into_iter().map(|r| self.row(r)).collect();
        rows.sort_by(|a, b| {
            cmp_registration(a.registration_date, b.registration_date)
                .then_with(|| a.address.cmp(&b.address))
        });

        BatchReport {
            columns: columns(&self.chains),
            rows,
        }
    }

    fn row(&self, record: WalletRecord) -> ReportRow {
        let missing = ChainSummary::unavailable();
        let chains: Vec<ChainCells> = self
            .chains
            .iter()
            .map(|&chain| {
                let s = record.summary(chain).unwrap_or(&missing);
                ChainCells {
                    chain,
                    status: s.status,
                    transaction_count: s.transaction_count(),
                    first_transaction_date: s.first_transaction_timestamp().map(|t| t.naive_utc()),
                    last_transaction_date: s.last_transaction_timestamp().map(|t| t.naive_utc()),
                }
            })
            .collect();

        let registration_date = chains.iter().filter_map(|c| c.first_transaction_date).min();
        let tracked = record.registration_date.map(|t| t.naive_utc());
        if registration_date != tracked {
            warn!(
                address = %record.address,
                derived = ?registration_date,
                tracked = ?tracked,
                "registration date mismatch"
            );
        }

        ReportRow {
            address: record.address,
            registration_date,
            funding_source: record.funding_source,
            chains,
        }
    }
}

fn fmt_date(d: Option<NaiveDateTime>) -> String {
    d.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Writes the report as CSV. With `mark_unavailable`, chains whose history
/// could not be fetched show `unavailable` instead of a zero count.
pub fn write_csv<W: Write>(report: &BatchReport, writer: W, mark_unavailable: bool) -> Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(&report.columns)?;

    for row in &report.rows {
        let mut fields = vec![
            row.address.clone(),
            fmt_date(row.registration_date),
            row.funding_source.clone().unwrap_or_default(),
        ];
        for c in &row.chains {
            let count = if mark_unavailable && c.status == ChainStatus::Unavailable {
                c.status.as_str().to_string()
            } else {
                c.transaction_count.to_string()
            };
            fields.push(count);
            fields.push(fmt_date(c.first_transaction_date));
            fields.push(fmt_date(c.last_transaction_date));
        }
        w.write_record(&fields)?;
    }

    w.flush()?;
    Ok(())
}

pub fn write_csv_file(report: &BatchReport, path: &Path, mark_unavailable: bool) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("failed to create report file: {}", path.display()))?;
    write_csv(report, std::io::BufWriter::new(file), mark_unavailable)
        .with_context(|| format!("failed to write report: {}", path.display()))
}
