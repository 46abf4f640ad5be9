use std::{fs, sync::Arc};

use fujion_page::{
    CacheError, ComponentRegistry, Event, InvocationSink, MaterializeError, Page,
    PageDefinitionCache, PageParser, PageSourceError, ParserError, PrecompileReport,
    PropertyValue, ResourceLocator,
};
use fujion_wire::ClientInvocation;
use parking_lot::Mutex;
use serde_json::json;

#[derive(Default)]
struct RecordingSink {
    invocations: Mutex<Vec<ClientInvocation>>,
}

impl InvocationSink for RecordingSink {
    fn invoke(&self, invocation: ClientInvocation) {
        self.invocations.lock().push(invocation);
    }
}

fn parser() -> Arc<PageParser> {
    Arc::new(PageParser::new(Arc::new(
        ComponentRegistry::with_core_components(),
    )))
}

#[test]
fn page_element_configures_the_page_itself() {
    let definition = parser()
        .parse_text(r#"<fsp><page name="page"><label value="The Page Title"/></page></fsp>"#)
        .expect("parse");
    let page = Page::new("pg", "inline");
    let sink = Arc::new(RecordingSink::default());
    page.bind(sink.clone());

    let created = definition.materialize(&page, None).expect("materialize");

    assert_eq!(page.name().as_deref(), Some("page"));
    assert_eq!(created, vec!["pg_1".to_string()]);
    let label = page.component("pg_1").expect("label");
    assert_eq!(label.parent(), Some("pg"));
    assert_eq!(
        label.property("value"),
        Some(&PropertyValue::Text("The Page Title".into()))
    );

    let sent = sink.invocations.lock();
    let functions: Vec<&str> = sent.iter().map(ClientInvocation::function).collect();
    assert_eq!(
        functions,
        ["fujion.widget.updateProperty", "fujion.widget.create"]
    );
    assert_eq!(sent[1].arguments()[0], json!("pg"));
    assert_eq!(sent[1].arguments()[1]["wclazz"], json!("Label"));
    assert_eq!(
        sent[1].arguments()[1]["props"],
        json!({"value": "The Page Title"})
    );
}

#[test]
fn components_are_created_in_tree_order_with_typed_properties() {
    let definition = parser()
        .parse_text(
            r#"<fsp><page>
                 <div class="row" attr:data-test="row">
                   <button label="Save" disabled="true" flavor="PRIMARY" on:click="save"/>
                   <textbox maxlength="12" controller:bind="name"/>
                 </div>
               </page></fsp>"#,
        )
        .expect("parse");
    let page = Page::new("pg", "inline");
    let sink = Arc::new(RecordingSink::default());
    page.bind(sink.clone());

    definition.materialize(&page, None).expect("materialize");

    let row = page.component("pg_1").expect("row");
    assert_eq!(row.dom_attribute("data-test"), Some("row"));
    assert_eq!(page.children("pg_1"), ["pg_2", "pg_3"]);

    let button = page.component("pg_2").expect("button");
    assert_eq!(button.property("disabled"), Some(&PropertyValue::Boolean(true)));
    assert_eq!(
        button.property("flavor"),
        Some(&PropertyValue::Text("primary".into()))
    );
    assert_eq!(button.event_handler("click"), Some("save"));

    let textbox = page.component("pg_3").expect("textbox");
    assert_eq!(textbox.property("maxlength"), Some(&PropertyValue::Integer(12)));
    assert_eq!(textbox.controller("bind"), Some("name"));

    let parents: Vec<serde_json::Value> = sink
        .invocations
        .lock()
        .iter()
        .map(|invocation| invocation.arguments()[0].clone())
        .collect();
    assert_eq!(parents, [json!("pg"), json!("pg_1"), json!("pg_1")]);
}

#[test]
fn invalid_typed_value_fails_materialization() {
    let definition = parser()
        .parse_text(r#"<fsp><textbox maxlength="lots"/></fsp>"#)
        .expect("parse accepts raw strings");
    let page = Page::new("pg", "inline");
    let err = definition.materialize(&page, None).expect_err("coercion");
    assert!(matches!(
        err,
        MaterializeError::InvalidValue { ref attribute, .. } if attribute == "maxlength"
    ));
}

#[test]
fn failed_materialization_discards_partial_components() {
    let good = parser()
        .parse_text(r#"<fsp><label value="kept"/></fsp>"#)
        .expect("parse");
    let bad = parser()
        .parse_text(r#"<fsp><div><label value="x"/><textbox maxlength="lots"/></div></fsp>"#)
        .expect("parse");
    let page = Page::new("pg", "inline");
    let kept = good.materialize(&page, None).expect("good");

    bad.materialize(&page, None).expect_err("coercion");

    assert_eq!(page.children("pg"), kept);
    assert_eq!(page.component_count(), 2);
    assert_eq!(page.discard_component("pg"), 0);
    assert_eq!(page.discard_component(&kept[0]), 1);
    assert!(page.children("pg").is_empty());
}

#[test]
fn a_definition_materializes_repeatedly_and_under_any_parent() {
    let definition = parser()
        .parse_text(r#"<fsp><label value="x"/></fsp>"#)
        .expect("parse");
    let page = Page::new("pg", "inline");
    let first = definition.materialize(&page, None).expect("first");
    let second = definition
        .materialize(&page, Some(first[0].as_str()))
        .expect("second");
    assert_ne!(first, second);
    assert_eq!(page.children(&first[0]), second);
    assert!(matches!(
        definition.materialize(&page, Some("missing")),
        Err(MaterializeError::UnknownParent(_))
    ));
}

#[test]
fn bound_events_reach_page_handlers() {
    let definition = parser()
        .parse_text(r#"<fsp><button label="Go" on:click="go"/></fsp>"#)
        .expect("parse");
    let page = Page::new("pg", "inline");
    definition.materialize(&page, None).expect("materialize");
    page.register_handler("go", |page, event| {
        page.set_property(event.target(), "label", "Gone".into())
    });

    page.queue_event(Event::new("click", "pg_1"));
    assert_eq!(page.process_event_queue().expect("process"), 1);
    assert_eq!(
        page.property("pg_1", "label"),
        Some(PropertyValue::Text("Gone".into()))
    );
}

fn web_root() -> tempfile::TempDir {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(
        root.path().join("home.fsp"),
        r#"<fsp><page name="home"/></fsp>"#,
    )
    .expect("write");
    fs::write(root.path().join("broken.fsp"), "<fsp><blink/></fsp>").expect("write");
    root
}

fn cache(root: &tempfile::TempDir) -> PageDefinitionCache {
    let locator = ResourceLocator::new(root.path()).expect("locator");
    PageDefinitionCache::new(parser(), locator)
}

#[test]
fn cache_returns_the_same_definition_for_equivalent_keys() {
    let root = web_root();
    let cache = cache(&root);
    assert!(!cache.is_cached("home.fsp"));

    let first = cache.get("home.fsp").expect("first");
    let second = cache.get("/home.fsp").expect("second");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(cache.is_cached("home.fsp"));
    assert_eq!(cache.len(), 1);

    assert!(cache.remove("home.fsp").is_some());
    let third = cache.get("home.fsp").expect("third");
    assert!(!Arc::ptr_eq(&first, &third));

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn unnormalizable_keys_are_parsed_but_not_cached() {
    let root = web_root();
    let cache = cache(&root);
    let inline = cache
        .get(r#"<fsp><label value="inline"/></fsp>"#)
        .expect("inline markup");
    assert_eq!(inline.root().children().len(), 1);
    assert!(cache.is_empty());

    let missing = cache.get("nowhere.fsp").expect_err("missing");
    assert!(matches!(
        missing,
        CacheError::Load {
            source: ParserError::Source(PageSourceError::NotFound(_)),
            ..
        }
    ));
    assert!(!cache.is_cached("nowhere.fsp"));
}

#[test]
fn keys_outside_the_web_root_are_refused() {
    let root = web_root();
    let outside = tempfile::tempdir().expect("outside");
    let secret = outside.path().join("secret.fsp");
    fs::write(&secret, r#"<fsp><label value="secret"/></fsp>"#).expect("write");
    let secret_url = url::Url::from_file_path(&secret).expect("file url");
    let cache = cache(&root);

    let err = cache.get(secret_url.as_str()).expect_err("outside root");
    assert!(matches!(
        err,
        CacheError::Load {
            source: ParserError::Source(PageSourceError::OutsideRoot(_)),
            ..
        }
    ));
    assert!(matches!(
        cache.get("../secret.fsp"),
        Err(CacheError::Load {
            source: ParserError::Source(PageSourceError::NotFound(_) | PageSourceError::OutsideRoot(_)),
            ..
        })
    ));
    assert!(matches!(
        cache.get("http://example.com/home.fsp"),
        Err(CacheError::Load {
            source: ParserError::Source(PageSourceError::UnsupportedScheme(_)),
            ..
        })
    ));
    assert!(cache.is_empty());
}

#[test]
fn precompile_runs_exactly_once_and_tolerates_failures() {
    let root = web_root();
    let cache = cache(&root);
    assert!(cache.add_precompile("home"));
    assert!(cache.add_precompile("broken.fsp"));
    assert!(cache.add_precompile("absent"));

    let report = cache.on_application_ready();
    assert_eq!(report.compiled, 1);
    assert_eq!(report.failed, 2);
    assert!(cache.is_cached("home.fsp"));

    assert!(!cache.add_precompile("home"));
    assert_eq!(cache.on_application_ready(), PrecompileReport::default());
}
