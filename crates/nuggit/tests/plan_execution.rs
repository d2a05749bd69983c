//! End-to-end plan execution over a realistic listing page.

use chrono::Utc;
use serde_json::json;

use nuggit::{
    cast, execute, is_zero, normalize, run_pass, CompiledPlan, Document, Plan, ReportContext,
    ScalarKind, Value,
};

const LISTING: &str = r#"<!DOCTYPE html>
<html>
<head><title>Catalog</title><style>.card { color: red }</style></head>
<body>
  <section id="catalog">
    <article class="card" data-sku="A-1">
      <h2><a href="/p/lamp">Desk lamp</a></h2>
      <span class="price">$19.99</span>
      <ul class="tags"><li>home, light</li></ul>
    </article>
    <article class="card" data-sku="B-2">
      <h2><a href="/p/chair">Chair</a></h2>
      <span class="price">$45.00</span>
      <ul class="tags"><li>home, office, seating</li></ul>
    </article>
    <article class="card sold-out" data-sku="C-3">
      <h2><a href="/p/desk">Desk</a></h2>
      <span class="price">n/a</span>
      <ul class="tags"><li></li></ul>
    </article>
  </section>
</body>
</html>"#;

fn compile(v: serde_json::Value) -> CompiledPlan {
    CompiledPlan::compile(serde_json::from_value::<Plan>(v).unwrap()).unwrap()
}

fn ctx() -> ReportContext {
    ReportContext {
        plan_id: "catalog".into(),
        implicit: true,
        url: "https://shop.example/catalog".into(),
        timestamp: Utc::now(),
    }
}

fn catalog_plan() -> CompiledPlan {
    compile(json!({
        "roots": [0],
        "exchanges": [3, 9, 12],
        "steps": [
            {"action": {"action": "querySelectorAll", "selector": "article.card"}},
            {"action": {"action": "querySelector", "selector": "h2 a"}, "input": 1},
            {"action": {"action": "innerText"}, "input": 2},
            {"action": {"action": "exchange", "name": "name", "digest": "n1", "scalar": "string"}, "input": 3},
            {"action": {"action": "querySelector", "selector": ".price"}, "input": 1},
            {"action": {"action": "textContent"}, "input": 5},
            {"action": {"action": "regexp", "pattern": r"\$([\d.]+)"}, "input": 6},
            {"action": {"action": "attributes", "name": "data-sku"}, "input": 1},
            {"action": {"action": "querySelector", "selector": ".tags li"}, "input": 1},
            {"action": {"action": "exchange", "name": "price", "digest": "p1", "scalar": "float64"}, "input": 7},
            {"action": {"action": "innerText"}, "input": 9},
            {"action": {"action": "split", "pattern": r",\s*"}, "input": 11},
            {"action": {"action": "exchange", "name": "sku", "digest": "s1"}, "input": 8}
        ]
    }))
}

#[test]
fn test_catalog_report() {
    let doc = Document::parse(LISTING);
    let plan = catalog_plan();
    let report = run_pass(&plan, &doc, &Value::Node(doc.root()), &ctx()).unwrap();

    assert_eq!(report.trigger.plan, "catalog");
    let by_pipe: Vec<_> = report
        .results
        .iter()
        .map(|r| (r.pipe.as_str(), r.result.clone()))
        .collect();
    assert_eq!(
        by_pipe,
        vec![
            ("name@n1", json!(["Desk lamp", "Chair", "Desk"])),
            ("price@p1", json!([[19.99], [45.0], []])),
            ("sku@s1", json!(["A-1", "B-2", "C-3"])),
        ]
    );
}

#[test]
fn test_intermediate_results_keep_card_order() {
    let doc = Document::parse(LISTING);
    let plan = catalog_plan();
    let results = execute(&plan, &doc, &Value::Node(doc.root()));

    let tags = results.get(11).unwrap().to_json().unwrap();
    assert_eq!(
        tags,
        json!([["home", "light"], ["home", "office", "seating"], [""]])
    );
    assert!(!results.is_failed(11));
}

#[test]
fn test_mutated_subtree_as_root() {
    let mut doc = Document::parse(LISTING);
    let catalog = doc.select_first("#catalog").unwrap().unwrap();
    let added = doc
        .append_html(
            catalog,
            r#"<article class="card" data-sku="D-4"><h2><a href="/p/rug">Rug</a></h2><span class="price">$5</span></article>"#,
        )
        .unwrap();
    assert_eq!(added.len(), 1);

    let plan = compile(json!({
        "roots": [0],
        "exchanges": [2],
        "steps": [
            {"action": {"action": "querySelectorAll", "selector": "article.card", "self": true}},
            {"action": {"action": "attributes", "name": "data-sku"}, "input": 1},
            {"action": {"action": "exchange", "name": "sku", "digest": "s1"}, "input": 2}
        ]
    }));
    let report = run_pass(&plan, &doc, &Value::from(added), &ctx()).unwrap();
    assert_eq!(report.results[0].result, json!(["D-4"]));
}

#[test]
fn test_bad_chain_does_not_poison_report() {
    let doc = Document::parse(LISTING);
    let plan = compile(json!({
        "roots": [0, 3],
        "exchanges": [2, 5],
        "steps": [
            {"action": {"action": "querySelectorAll", "selector": "article.card"}},
            {"action": {"action": "regexp", "pattern": "(unclosed"}, "input": 1},
            {"action": {"action": "exchange", "name": "broken", "digest": "b"}, "input": 2},
            {"action": {"action": "querySelector", "selector": "title"}},
            {"action": {"action": "textContent"}, "input": 4},
            {"action": {"action": "exchange", "name": "title", "digest": "t"}, "input": 5}
        ]
    }));
    let report = run_pass(&plan, &doc, &Value::Node(doc.root()), &ctx()).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].pipe, "title@t");
    assert_eq!(report.results[0].result, json!("Catalog"));
}

#[test]
fn test_zero_after_cast_matches_empty_values() {
    let doc = Document::parse("<p></p>");
    let empty_for = |name: &str| match name {
        "bool" => vec![json!(null), json!(""), json!(false), json!(0)],
        "string" => vec![json!(null), json!("")],
        _ => vec![json!(null), json!(""), json!(0)],
    };

    for name in ["string", "bool", "int64", "uint64", "float64"] {
        let kind = ScalarKind::from_name(name);
        for v in &empty_for(name) {
            let n = normalize(&doc, &Value::from(v.clone()));
            assert!(is_zero(&cast(&n, &kind), &kind), "{v} as {name} should be zero");
        }
    }

    let textual = [json!("x"), json!(true), json!(3), json!(-1.5)];
    for name in ["string", "bool"] {
        let kind = ScalarKind::from_name(name);
        for v in &textual {
            let n = normalize(&doc, &Value::from(v.clone()));
            assert!(!is_zero(&cast(&n, &kind), &kind), "{v} as {name} should be kept");
        }
    }

    let numeric = [json!(3), json!("7px"), json!(12.5)];
    for name in ["int64", "uint64", "float64"] {
        let kind = ScalarKind::from_name(name);
        for v in &numeric {
            let n = normalize(&doc, &Value::from(v.clone()));
            assert!(!is_zero(&cast(&n, &kind), &kind), "{v} as {name} should be kept");
        }
    }
}
