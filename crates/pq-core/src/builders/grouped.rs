//! Grouped and aggregate rows.

use super::Rows;
use crate::dimension::resolve_values;
use crate::generation::Generation;
use crate::request::SelectFunction;
use crate::synth::SynthContext;

/// One row per resolved value of the first group-by dimension. COL columns
/// for further dimensions cycle through their own value sets.
pub fn grouped(g: &mut Generation<'_>) -> Rows {
    let request = g.request;
    let Some(first) = request.dimension_groups().next() else {
        return aggregate(g);
    };
    let field = request
        .column_for_group(first)
        .and_then(|col| col.column())
        .unwrap_or(first);
    let values = resolve_values(field, &request.filters);
    tracing::debug!("grouping by `{}`: {} values", field, values.len());

    let secondary: Vec<(&str, Vec<String>)> = request
        .dimension_groups()
        .skip(1)
        .filter_map(|group| {
            let col = request.column_for_group(group)?;
            let values = resolve_values(col.column().unwrap_or(group), &request.filters);
            (!values.is_empty()).then_some((group.as_str(), values))
        })
        .collect();

    let mut rows = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        let mut row = Vec::with_capacity(request.select.len());
        for field in &request.select {
            let cycled = (field.function == SelectFunction::Col)
                .then(|| secondary.iter().find(|(alias, _)| *alias == field.alias))
                .flatten()
                .map(|(_, vals)| vals[i % vals.len()].clone());
            match cycled {
                Some(cell) => row.push(cell),
                None => row.push(g.value(field, SynthContext::group(value))),
            }
        }
        rows.push(row);
    }
    rows
}

pub fn aggregate(g: &mut Generation<'_>) -> Rows {
    vec![g.fill_row(SynthContext::default(), |_| None)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::QueryRequest;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn run(body: &str) -> Rows {
        let req = QueryRequest::from_json(body.as_bytes()).unwrap();
        let mut g = Generation::new(&req, Utc::now(), StdRng::seed_from_u64(2), None);
        grouped(&mut g)
    }

    #[test]
    fn test_one_row_per_value() {
        let rows = run(
            r#"{"dataType": "TRACES",
                "select": [
                    {"function": "COL", "param": {"field": "GeoState"}, "alias": "region"},
                    {"function": "CRASH", "alias": "crashes"}
                ],
                "groupBy": ["region"]}"#,
        );
        assert_eq!(rows.len(), 8);
        assert_eq!(rows[0][0], "Maharashtra");
        assert!(rows.iter().all(|r| r[1].parse::<u64>().is_ok()));
    }

    #[test]
    fn test_secondary_dimension_cycles() {
        let rows = run(
            r#"{"dataType": "TRACES",
                "select": [
                    {"function": "COL", "param": {"field": "Platform"}, "alias": "platform"},
                    {"function": "COL", "param": {"field": "AppVersion"}, "alias": "version"}
                ],
                "filters": [{"field": "AppVersion", "operator": "IN", "value": ["2.0.0"]}],
                "groupBy": ["platform", "version"]}"#,
        );
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r[1] == "2.0.0"));
    }

    #[test]
    fn test_restricted_values_yield_no_rows() {
        let rows = run(
            r#"{"dataType": "TRACES",
                "select": [{"function": "COL", "param": {"field": "UserAttributes['subscriptionPlan']"}, "alias": "plan"}],
                "filters": [{"field": "UserAttributes['subscriptionPlan']", "operator": "IN", "value": ["Gold"]}],
                "groupBy": ["plan"]}"#,
        );
        assert!(rows.is_empty());
    }
}
