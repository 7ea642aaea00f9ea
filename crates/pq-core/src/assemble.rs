//! # Response Assembler
//!
//! Applies `orderBy` and `limit` to builder output. An ordering on request
//! frequency (`spanfreq`) with a limit is answered as "top N by quality"
//! instead, when enabled.

use std::cmp::Ordering;

use crate::request::{Direction, OrderBy};

const FREQUENCY_FIELD: &str = "spanfreq";

pub fn assemble(
    fields: &[String],
    mut rows: Vec<Vec<String>>,
    order_by: &[OrderBy],
    limit: Option<usize>,
    rank_by_quality: bool,
) -> Vec<Vec<String>> {
    let by_frequency = order_by
        .iter()
        .any(|o| o.field.eq_ignore_ascii_case(FREQUENCY_FIELD));

    match limit {
        Some(n) if rank_by_quality && by_frequency && !rows.is_empty() => {
            tracing::debug!("ranking {} rows by quality, keeping {}", rows.len(), n);
            rank_by_quality_score(fields, &mut rows);
        }
        _ => sort_rows(fields, &mut rows, order_by),
    }

    if let Some(n) = limit {
        rows.truncate(n);
    }
    rows
}

/// 0.4·apdex% + 0.4·(1 − error rate)% + 0.2·latency score. Missing columns
/// read as apdex 0, errors 0, successes 1, p50 0.
pub fn quality_score(fields: &[String], row: &[String]) -> f64 {
    let read = |name: &str, default: f64| {
        fields
            .iter()
            .position(|f| f == name)
            .and_then(|idx| row.get(idx))
            .and_then(|cell| cell.parse::<f64>().ok())
            .filter(|v| *v != 0.0)
            .unwrap_or(default)
    };
    let apdex = read("apdex", 0.0);
    let errors = read("error_count", 0.0);
    let successes = read("success_count", 1.0);
    let p50 = read("p50", 0.0);

    let error_rate = if successes > 0.0 {
        errors / (successes + errors)
    } else {
        0.0
    };
    let latency_score = (100.0 - p50 / 10.0).max(0.0);
    apdex * 100.0 * 0.4 + (1.0 - error_rate) * 100.0 * 0.4 + latency_score * 0.2
}

fn rank_by_quality_score(fields: &[String], rows: &mut Vec<Vec<String>>) {
    let mut scored: Vec<(f64, Vec<String>)> = rows
        .drain(..)
        .map(|row| (quality_score(fields, &row), row))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    rows.extend(scored.into_iter().map(|(_, row)| row));
}

fn compare_cells(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

fn sort_rows(fields: &[String], rows: &mut [Vec<String>], order_by: &[OrderBy]) {
    let keys: Vec<(usize, Direction)> = order_by
        .iter()
        .filter_map(|o| match fields.iter().position(|f| *f == o.field) {
            Some(idx) => Some((idx, o.direction)),
            None => {
                tracing::debug!("orderBy `{}` is not a response field; skipped", o.field);
                None
            }
        })
        .collect();
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|(idx, direction)| {
                let ord = compare_cells(&a[*idx], &b[*idx]);
                match direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn order(field: &str, direction: Direction) -> OrderBy {
        OrderBy {
            field: field.into(),
            direction,
        }
    }

    #[test]
    fn test_numeric_then_lexical_ordering() {
        let f = fields(&["name", "count"]);
        let rows = vec![row(&["b", "9"]), row(&["a", "10"]), row(&["c", "10"])];
        let out = assemble(
            &f,
            rows,
            &[order("count", Direction::Desc), order("name", Direction::Asc)],
            None,
            true,
        );
        assert_eq!(out, vec![row(&["a", "10"]), row(&["c", "10"]), row(&["b", "9"])]);
    }

    #[test]
    fn test_unknown_order_field_is_skipped() {
        let f = fields(&["name"]);
        let rows = vec![row(&["b"]), row(&["a"])];
        let out = assemble(&f, rows.clone(), &[order("missing", Direction::Asc)], Some(5), true);
        assert_eq!(out, rows);
    }

    #[test]
    fn test_limit_truncates() {
        let f = fields(&["n"]);
        let rows = (0..10).map(|i| row(&[&i.to_string()])).collect();
        assert_eq!(assemble(&f, rows, &[], Some(3), true).len(), 3);
    }

    #[test]
    fn test_quality_ranking_prefers_healthy_rows() {
        let f = fields(&["name", "apdex", "error_count", "success_count", "p50", "spanfreq"]);
        let rows = vec![
            row(&["slow", "0.70", "40", "100", "900", "5000"]),
            row(&["good", "0.95", "2", "140", "120", "10"]),
            row(&["ok", "0.85", "10", "120", "300", "800"]),
        ];
        let out = assemble(&f, rows.clone(), &[order("spanfreq", Direction::Desc)], Some(2), true);
        assert_eq!(out[0][0], "good");
        assert_eq!(out[1][0], "ok");

        let plain = assemble(&f, rows, &[order("spanfreq", Direction::Desc)], Some(2), false);
        assert_eq!(plain[0][0], "slow");
    }
}
