//! Converts a `LabelSelector` into the query string the platform API's `labelSelector` list
//! parameter expects. Used to resolve `namespaceSelector` entries against live namespaces.

use super::Error;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};

/// `true` if the selector has at least one requirement, matching the "non-empty `matchLabels`
/// or `matchExpressions`" condition used to decide whether a `namespaceSelector` entry
/// contributes any namespaces.
pub fn is_non_empty(selector: &LabelSelector) -> bool {
    selector.match_labels.as_ref().is_some_and(|m| !m.is_empty())
        || selector.match_expressions.as_ref().is_some_and(|e| !e.is_empty())
}

/// Renders a `LabelSelector` as a `key=value,key2 in (a,b),...` query string.
pub fn to_query(selector: &LabelSelector) -> Result<String, Error> {
    let mut parts = Vec::new();

    if let Some(match_labels) = &selector.match_labels {
        let mut entries: Vec<(&String, &String)> = match_labels.iter().collect();
        entries.sort_by_key(|(k, _)| (*k).clone());
        parts.extend(entries.into_iter().map(|(k, v)| format!("{k}={v}")));
    }

    if let Some(expressions) = &selector.match_expressions {
        for expr in expressions {
            parts.push(requirement_to_query(expr)?);
        }
    }

    Ok(parts.join(","))
}

fn requirement_to_query(expr: &LabelSelectorRequirement) -> Result<String, Error> {
    match expr.operator.as_str() {
        "In" => Ok(format!("{} in ({})", expr.key, expr.values.clone().unwrap_or_default().join(","))),
        "NotIn" => Ok(format!("{} notin ({})", expr.key, expr.values.clone().unwrap_or_default().join(","))),
        "Exists" => Ok(expr.key.clone()),
        "DoesNotExist" => Ok(format!("!{}", expr.key)),
        other => Err(Error::InvalidSelector(format!("unsupported label selector operator {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn renders_match_labels_sorted() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([
                ("b".to_owned(), "2".to_owned()),
                ("a".to_owned(), "1".to_owned()),
            ])),
            match_expressions: None,
        };
        assert_eq!(to_query(&selector).unwrap(), "a=1,b=2");
    }

    #[test]
    fn rejects_unknown_operator() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: "tier".to_owned(),
                operator: "Bogus".to_owned(),
                values: None,
            }]),
        };
        assert!(to_query(&selector).is_err());
    }
}
