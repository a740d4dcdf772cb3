use super::state::FormulaLine;
use formulary_schemas::formula::SortDirection;
use std::borrow::Cow;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Number(f64),
    Text(Cow<'a, str>),
}

/// Reads a sortable field from a line. `None` when the line has no value for it.
pub fn field_value<'a>(line: &'a FormulaLine, key: &str) -> Option<FieldValue<'a>> {
    let text = |v: &'a Option<String>| v.as_deref().map(|s| FieldValue::Text(Cow::Borrowed(s)));
    match key {
        "concentration" => Some(FieldValue::Number(line.concentration)),
        "quantity" => Some(FieldValue::Number(line.quantity)),
        "cost" => Some(FieldValue::Number(line.cost)),
        "id" => Some(FieldValue::Text(Cow::Borrowed(&line.id))),
        "name" => Some(FieldValue::Text(Cow::Borrowed(&line.name))),
        "cas_no" => text(&line.cas_no),
        "category" => text(&line.category),
        "subcategory" => text(&line.subcategory),
        "description" => text(&line.description),
        "ifra_category" => text(&line.ifra_category),
        other => match line.attributes.get(other)? {
            serde_json::Value::Null => None,
            serde_json::Value::Number(n) => n.as_f64().map(FieldValue::Number),
            serde_json::Value::String(s) => Some(FieldValue::Text(Cow::Borrowed(s))),
            value => Some(FieldValue::Text(Cow::Owned(value.to_string()))),
        },
    }
}

fn compare_values(a: &FieldValue<'_>, b: &FieldValue<'_>) -> Ordering {
    match (a, b) {
        (FieldValue::Number(x), FieldValue::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (FieldValue::Text(x), FieldValue::Text(y)) => x
            .to_lowercase()
            .cmp(&y.to_lowercase())
            .then_with(|| x.cmp(y)),
        (FieldValue::Number(_), FieldValue::Text(_)) => Ordering::Less,
        (FieldValue::Text(_), FieldValue::Number(_)) => Ordering::Greater,
    }
}

/// A sorted view over `lines`. Missing values go last in either direction,
/// and ties keep their stored order. The stored order itself is untouched.
pub fn sorted_lines<'a>(lines: &'a [FormulaLine], key: &str, direction: SortDirection) -> Vec<&'a FormulaLine> {
    let mut keyed: Vec<(Option<FieldValue<'a>>, &'a FormulaLine)> =
        lines.iter().map(|line| (field_value(line, key), line)).collect();

    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => {
            let ordering = compare_values(a, b);
            match direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    keyed.into_iter().map(|(_, line)| line).collect()
}
