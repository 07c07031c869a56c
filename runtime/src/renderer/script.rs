//! JavaScript snippets evaluated by the Chromium render context.
//!
//! Each snippet resolves its locator from scratch and replies with
//! `{ status, value }`, where status is `ok`, `stale`, or `absent`.

use crate::error::{CrawlError, CrawlResult};
use crate::selectors::Locator;
use serde_json::{json, Value};

/// Shared resolver prelude. `__resolve(root, loc)` returns an array of nodes.
const PRELUDE: &str = r#"
    const __resolve = (root, loc) => {
        if (!loc) return [root];
        if (loc.kind === 'css') return Array.from(root.querySelectorAll(loc.expr));
        const snap = document.evaluate(loc.expr, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
        const out = [];
        for (let i = 0; i < snap.snapshotLength; i++) out.push(snap.snapshotItem(i));
        return out;
    };
    const __pick = (loc, index, child) => {
        const els = __resolve(document, loc);
        if (index >= els.length) return { status: 'stale', value: 'index ' + index + ' of ' + els.length };
        const el = els[index];
        if (!el.isConnected) return { status: 'stale', value: 'detached' };
        if (!child) return { status: 'ok', el };
        const inner = __resolve(el, child)[0];
        if (!inner) return { status: 'absent', value: child.expr };
        return { status: 'ok', el: inner };
    };
"#;

fn locator_json(locator: Option<&Locator>) -> String {
    match locator {
        Some(Locator::Css(expr)) => json!({ "kind": "css", "expr": expr }).to_string(),
        Some(Locator::XPath(expr)) => json!({ "kind": "xpath", "expr": expr }).to_string(),
        None => "null".to_string(),
    }
}

fn wrap(body: &str) -> String {
    format!("(() => {{ {PRELUDE} {body} }})()")
}

pub fn count(locator: &Locator) -> String {
    wrap(&format!(
        "return {{ status: 'ok', value: __resolve(document, {}).length }};",
        locator_json(Some(locator))
    ))
}

pub fn texts(locator: &Locator) -> String {
    wrap(&format!(
        "return {{ status: 'ok', value: __resolve(document, {}).map(e => e.innerText || '') }};",
        locator_json(Some(locator))
    ))
}

pub fn text_at(locator: &Locator, index: usize, child: Option<&Locator>) -> String {
    wrap(&format!(
        "const r = __pick({}, {index}, {}); if (r.status !== 'ok') return r; \
         return {{ status: 'ok', value: r.el.innerText || '' }};",
        locator_json(Some(locator)),
        locator_json(child)
    ))
}

pub fn attribute_at(locator: &Locator, index: usize, name: &str) -> String {
    wrap(&format!(
        "const r = __pick({}, {index}, null); if (r.status !== 'ok') return r; \
         return {{ status: 'ok', value: r.el.getAttribute({}) }};",
        locator_json(Some(locator)),
        json!(name)
    ))
}

pub fn click_at(locator: &Locator, index: usize, child: Option<&Locator>) -> String {
    wrap(&format!(
        "const r = __pick({}, {index}, {}); if (r.status !== 'ok') return r; \
         r.el.scrollIntoView({{ block: 'center' }}); r.el.click(); \
         return {{ status: 'ok', value: null }};",
        locator_json(Some(locator)),
        locator_json(child)
    ))
}

pub fn scroll_to_bottom(container: Option<&Locator>) -> String {
    match container {
        Some(loc) => wrap(&format!(
            "const el = __resolve(document, {})[0]; \
             if (!el) return {{ status: 'absent', value: 'scroll container' }}; \
             el.scrollTop = el.scrollHeight; return {{ status: 'ok', value: null }};",
            locator_json(Some(loc))
        )),
        None => wrap(
            "window.scrollTo(0, document.body.scrollHeight); return { status: 'ok', value: null };",
        ),
    }
}

pub fn scroll_height(container: Option<&Locator>) -> String {
    match container {
        Some(loc) => wrap(&format!(
            "const el = __resolve(document, {})[0]; \
             if (!el) return {{ status: 'absent', value: 'scroll container' }}; \
             return {{ status: 'ok', value: el.scrollHeight }};",
            locator_json(Some(loc))
        )),
        None => wrap("return { status: 'ok', value: document.body.scrollHeight };"),
    }
}

/// Turn a snippet's `{ status, value }` reply into a result.
pub fn interpret(reply: Value, what: &str) -> CrawlResult<Value> {
    let status = reply.get("status").and_then(|s| s.as_str()).unwrap_or("");
    let value = reply.get("value").cloned().unwrap_or(Value::Null);
    match status {
        "ok" => Ok(value),
        "stale" => Err(CrawlError::stale(format!(
            "{what}: {}",
            value.as_str().unwrap_or("node gone")
        ))),
        "absent" => Err(CrawlError::absent(what.to_string())),
        _ => Err(CrawlError::stale(format!("{what}: unexpected reply {reply}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_is_json_escaped() {
        let loc = Locator::xpath("//a[span[text()='다음페이지']]");
        let js = count(&loc);
        assert!(js.contains(r#""kind":"xpath""#));
        assert!(js.contains("다음페이지"));

        let tricky = Locator::css(r#"a[title="x\"y"]"#);
        assert!(count(&tricky).contains(r#"a[title=\"x\\\"y\"]"#));
    }

    #[test]
    fn test_child_locator_null_when_absent() {
        let js = click_at(&Locator::css("li"), 3, None);
        assert!(js.contains(r#""expr":"li""#));
        assert!(js.contains("}, 3, null)"));
    }

    #[test]
    fn test_interpret_statuses() {
        assert_eq!(
            interpret(json!({"status": "ok", "value": 7}), "count").unwrap(),
            json!(7)
        );

        let stale = interpret(json!({"status": "stale", "value": "detached"}), "entry").unwrap_err();
        assert!(matches!(stale, CrawlError::Stale(ref m) if m == "entry: detached"));

        let absent = interpret(json!({"status": "absent", "value": "span"}), "name").unwrap_err();
        assert!(matches!(absent, CrawlError::Absent(_)));

        assert!(interpret(Value::Null, "x").is_err());
    }
}
