//! Time-series rows: one per bucket label.

use chrono::Duration;

use super::Rows;
use crate::bucket::{self, BucketSpec};
use crate::dimension::resolve_values;
use crate::generation::Generation;
use crate::synth::SynthContext;

pub fn time_series(g: &mut Generation<'_>) -> Rows {
    let request = g.request;
    let spec = BucketSpec::parse_or_default(
        request
            .time_bucket_field()
            .and_then(|f| f.param.as_ref())
            .and_then(|p| p.bucket.as_deref()),
    );
    let (start, end) = g.window_or(Duration::hours(1));
    let labels = bucket::buckets(start, end, spec, g.max_buckets);
    if labels.is_empty() {
        tracing::warn!("time range {} .. {} produced no buckets", start, end);
    }

    // A grouped series holds one representative value per grouped column.
    let held: Vec<(&str, String)> = request
        .dimension_groups()
        .filter_map(|group| {
            let col = request.column_for_group(group)?;
            let field = col.column().unwrap_or(group);
            let value = resolve_values(field, &request.filters)
                .into_iter()
                .next()
                .unwrap_or_else(|| "default".to_string());
            Some((group.as_str(), value))
        })
        .collect();

    let mut rows = Vec::with_capacity(labels.len());
    for label in &labels {
        let mut row = Vec::with_capacity(request.select.len());
        for field in &request.select {
            let group_value = held
                .iter()
                .find(|(alias, _)| *alias == field.alias)
                .map(|(_, v)| v.as_str());
            let ctx = SynthContext {
                timestamp: Some(label.as_str()),
                group_value,
            };
            row.push(g.value(field, ctx));
        }
        rows.push(row);
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bucket::parse_timestamp;
    use crate::request::QueryRequest;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_grouped_series_holds_group_value() {
        let req = QueryRequest::from_json(
            br#"{"dataType": "TRACES",
                "timeRange": {"start": "2025-07-07T05:00:00Z", "end": "2025-07-07T05:10:00Z"},
                "select": [
                    {"function": "TIME_BUCKET", "param": {"bucket": "5m"}, "alias": "t1"},
                    {"function": "COL", "param": {"field": "SpanAttributes['screen.name']"}, "alias": "screen"},
                    {"function": "NET_2XX", "alias": "ok"}
                ],
                "filters": [{"field": "SpanAttributes['screen.name']", "operator": "IN", "value": ["CartScreen"]}],
                "groupBy": ["t1", "screen"]}"#,
        )
        .unwrap();
        let window = Some((
            parse_timestamp("2025-07-07T05:00:00Z").unwrap(),
            parse_timestamp("2025-07-07T05:10:00Z").unwrap(),
        ));
        let mut g = Generation::new(&req, Utc::now(), StdRng::seed_from_u64(1), window);
        let rows = time_series(&mut g);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0], "2025-07-07T05:00Z");
        assert!(rows.iter().all(|r| r[1] == "CartScreen"));
    }
}
