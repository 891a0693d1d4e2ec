//! `<<token>>` substitution for email subjects and bodies.

use crate::compose::{stringify, RenderContext};

const OPEN: &str = "<<";
const CLOSE: &str = ">>";

/// Replace every `<<key>>` whose key is present in `values`.
///
/// Null values become `""`. Tokens with no matching key, and unterminated
/// `<<`, are copied through untouched.
pub fn merge_variables(template: &str, values: &RenderContext) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + OPEN.len()..];

        let replaced = after_open.find(CLOSE).and_then(|end| {
            let key = &after_open[..end];
            values
                .get(key)
                .map(|value| (stringify(value), end + CLOSE.len()))
        });

        match replaced {
            Some((text, consumed)) => {
                out.push_str(&text);
                rest = &after_open[consumed..];
            }
            None => {
                out.push_str(OPEN);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn values(v: Value) -> RenderContext {
        match v {
            Value::Object(map) => RenderContext::from(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn replaces_known_tokens() {
        let ctx = values(json!({ "name": "Asha", "receipt_no": "R-77" }));
        assert_eq!(merge_variables("Hi <<name>>", &ctx), "Hi Asha");
        assert_eq!(
            merge_variables("<<name>>, receipt <<receipt_no>> for <<name>>", &ctx),
            "Asha, receipt R-77 for Asha"
        );
    }

    #[test]
    fn unknown_tokens_are_left_intact() {
        let ctx = values(json!({ "name": "Asha" }));
        assert_eq!(merge_variables("Hi <<unknown>>", &ctx), "Hi <<unknown>>");
        assert_eq!(merge_variables("a << b <<name>>", &ctx), "a << b Asha");
        assert_eq!(merge_variables("open <<name", &ctx), "open <<name");
    }

    #[test]
    fn null_and_numbers_are_stringified() {
        let ctx = values(json!({ "nothing": null, "total": 500, "paid": 120.5 }));
        assert_eq!(merge_variables("[<<nothing>>]", &ctx), "[]");
        assert_eq!(merge_variables("<<total>>/<<paid>>", &ctx), "500/120.5");
    }

    #[test]
    fn nested_open_markers_resolve_innermost() {
        let ctx = values(json!({ "name": "Asha" }));
        assert_eq!(merge_variables("<<<<name>>>>", &ctx), "<<Asha>>");
    }
}
