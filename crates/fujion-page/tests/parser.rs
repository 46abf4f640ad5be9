use std::{fs, sync::Arc};

use fujion_page::{
    AttributeKind, Cardinality, ComponentDefinition, ComponentRegistry, ContentHandling,
    PageParser, PageSource, PageTree, ParserError, ResourceLocator, CONTENT_ATTRIBUTE,
    MAX_IMPORT_DEPTH, TEXT_TAG,
};

fn parser() -> PageParser {
    PageParser::new(Arc::new(ComponentRegistry::with_core_components()))
}

fn parser_with(definitions: Vec<ComponentDefinition>) -> PageParser {
    let registry = ComponentRegistry::with_core_components();
    for definition in definitions {
        registry.register(definition).expect("register");
    }
    PageParser::new(Arc::new(registry))
}

#[test]
fn parses_page_with_label() {
    let definition = parser()
        .parse_text(r#"<fsp><page name="page"><label value="The Page Title"/></page></fsp>"#)
        .expect("parse");

    let tree = definition.tree();
    let root = definition.root();
    assert!(root.definition().is_none());
    assert_eq!(root.children().len(), 1);

    let page = tree.element(root.children()[0]);
    assert_eq!(page.tag(), "page");
    assert_eq!(page.attribute("name"), Some("page"));
    assert_eq!(page.parent(), Some(PageTree::ROOT));

    let label = tree.element(page.children()[0]);
    assert_eq!(label.tag(), "label");
    assert_eq!(label.attribute("value"), Some("The Page Title"));
}

#[test]
fn unknown_tag_is_reported_by_name() {
    let err = parser()
        .parse_text("<fsp><page><blink/></page></fsp>")
        .expect_err("unknown tag");
    assert!(matches!(&err, ParserError::UnknownTag(tag) if tag == "blink"));
    assert!(err.to_string().contains("blink"));
}

#[test]
fn unknown_plain_attribute_is_rejected() {
    let err = parser()
        .parse_text(r#"<fsp><label colour="red"/></fsp>"#)
        .expect_err("unknown attribute");
    assert!(matches!(
        err,
        ParserError::UnknownAttribute { ref tag, ref attribute } if tag == "label" && attribute == "colour"
    ));
}

#[test]
fn root_must_be_fsp() {
    assert!(matches!(
        parser().parse_text("<page/>"),
        Err(ParserError::InvalidRoot(tag)) if tag == "page"
    ));
}

#[test]
fn cardinality_outside_bounds_fails_and_inside_succeeds() {
    let definitions = || {
        vec![
            ComponentDefinition::builder("tabview", "Tabview")
                .child("tab", Cardinality::new(2, Some(3)))
                .build(),
            ComponentDefinition::builder("tab", "Tab")
                .attribute("label", AttributeKind::Text)
                .parents(["tabview"])
                .build(),
        ]
    };
    let markup = |tabs: usize| {
        format!(
            "<fsp><tabview>{}</tabview></fsp>",
            "<tab/>".repeat(tabs)
        )
    };

    for count in 2..=3 {
        assert!(parser_with(definitions()).parse_text(&markup(count)).is_ok());
    }

    let too_few = parser_with(definitions())
        .parse_text(&markup(1))
        .expect_err("too few");
    match too_few {
        ParserError::Cardinality { tag, violations } => {
            assert_eq!(tag, "tabview");
            assert_eq!(violations.len(), 1);
            assert_eq!(violations[0].tag, "tab");
            assert_eq!(violations[0].count, 1);
        }
        other => panic!("unexpected error {other:?}"),
    }

    assert!(matches!(
        parser_with(definitions()).parse_text(&markup(4)),
        Err(ParserError::TooManyChildren { ref child, max: 3, .. }) if child == "tab"
    ));
    assert!(matches!(
        parser_with(definitions()).parse_text("<fsp><page><tab/></page></fsp>"),
        Err(ParserError::InvalidChild { .. })
    ));
}

#[test]
fn every_violation_is_listed() {
    let parser = parser_with(vec![
        ComponentDefinition::builder("form", "Form")
            .child("header", Cardinality::exactly(1))
            .child("footer", Cardinality::exactly(1))
            .build(),
        ComponentDefinition::builder("header", "Header").build(),
        ComponentDefinition::builder("footer", "Footer").build(),
    ]);
    let err = parser.parse_text("<fsp><form/></fsp>").expect_err("missing both");
    let message = err.to_string();
    assert!(message.contains("`header` occurs 0 time(s), expected [1..1]"));
    assert!(message.contains("`footer` occurs 0 time(s), expected [1..1]"));
    assert_eq!(message.lines().count(), 3);
}

#[test]
fn text_content_follows_content_handling() {
    let definition = parser()
        .parse_text(
            "<fsp>\n  <div>\n    Hello <![CDATA[<world>]]>\n  </div>\n  <label>\n  Title\n  </label>\n  <page>ignored</page>\n</fsp>",
        )
        .expect("parse");
    let tree = definition.tree();
    let children = definition.root().children();

    let div = tree.element(children[0]);
    assert_eq!(div.children().len(), 1);
    let text = tree.element(div.children()[0]);
    assert_eq!(text.tag(), TEXT_TAG);
    assert_eq!(text.attribute(CONTENT_ATTRIBUTE), Some("    Hello <world>"));

    let label = tree.element(children[1]);
    assert_eq!(label.attribute(CONTENT_ATTRIBUTE), Some("  Title"));
    assert!(label.children().is_empty());

    let page = tree.element(children[2]);
    assert!(page.attributes().is_empty());
    assert!(page.children().is_empty());
}

#[test]
fn rejected_text_fails() {
    assert!(matches!(
        parser().parse_text("<fsp><textbox>oops</textbox></fsp>"),
        Err(ParserError::TextNotAllowed(tag)) if tag == "textbox"
    ));
    assert!(matches!(
        parser().parse_text("<fsp>stray</fsp>"),
        Err(ParserError::TextNotAllowed(_))
    ));
}

#[test]
fn namespaced_tags_and_attributes() {
    let definition = parser()
        .parse_text(
            r#"<fsp xmlns:h="http://www.fujion.org/schema/fsp/html" xmlns:svg="urn:svg">
                 <h:section attr:role="main" class="wide">
                   <button on:click="save" controller:bind="model.save" flavor="primary"/>
                 </h:section>
                 <svg:rect/>
                 <button.submit label="Go"/>
               </fsp>"#,
        )
        .expect("parse");
    let tree = definition.tree();
    let children = definition.root().children();
    assert_eq!(children.len(), 2, "unresolvable svg:rect is dropped");

    let section = tree.element(children[0]);
    assert_eq!(section.tag(), "html");
    assert_eq!(section.constructor_args(), &[serde_json::json!("section")]);
    assert_eq!(section.attribute("attr:role"), Some("main"));
    assert_eq!(section.attribute("class"), Some("wide"));

    let button = tree.element(section.children()[0]);
    assert_eq!(button.attribute("on:click"), Some("save"));
    assert_eq!(button.attribute("controller:bind"), Some("model.save"));

    let qualified = tree.element(children[1]);
    assert_eq!(qualified.tag(), "button");
    assert_eq!(qualified.constructor_args(), &[serde_json::json!("submit")]);
}

#[test]
fn unresolvable_attribute_namespace_is_an_error() {
    assert!(matches!(
        parser().parse_text(r#"<fsp><label x:value="1"/></fsp>"#),
        Err(ParserError::UnresolvableAttribute(name)) if name == "x:value"
    ));
}

#[test]
fn unknown_processing_instruction_is_an_error() {
    assert!(matches!(
        parser().parse_text("<fsp><?magic now?></fsp>"),
        Err(ParserError::UnrecognizedPi(target)) if target == "magic"
    ));
}

#[test]
fn taglib_attaches_to_current_parent() {
    let definition = parser()
        .parse_text(r#"<fsp><div><?taglib prefix="c" uri="urn:core"?><span/></div></fsp>"#)
        .expect("parse");
    let tree = definition.tree();
    let div = definition.root().children()[0];
    let span = tree.children(div)[0];
    assert_eq!(tree.tag_library(span, "c").map(|lib| lib.uri()), Some("urn:core"));
    assert!(tree.tag_library(PageTree::ROOT, "c").is_none());
}

#[test]
fn import_grafts_elements_relative_to_the_importing_page() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::create_dir_all(root.path().join("pages/parts")).expect("mkdir");
    fs::write(
        root.path().join("pages/home.fsp"),
        r#"<fsp><page name="home"><div><?import src="parts/toolbar.fsp"?></div></page></fsp>"#,
    )
    .expect("write");
    fs::write(
        root.path().join("pages/parts/toolbar.fsp"),
        r#"<fsp><button label="one"/><button label="two"/></fsp>"#,
    )
    .expect("write");

    let locator = ResourceLocator::new(root.path()).expect("locator");
    let parser = parser().with_locator(locator);
    let definition = parser.parse_resource("pages/home.fsp").expect("parse");

    let tree = definition.tree();
    let page = definition.root().children()[0];
    let div = tree.children(page)[0];
    let labels: Vec<&str> = tree
        .children(div)
        .iter()
        .filter_map(|id| tree.element(*id).attribute("label"))
        .collect();
    assert_eq!(labels, ["one", "two"]);
    assert!(definition.source().url().is_some());
}

#[test]
fn recursive_import_stops_at_depth_limit() {
    let root = tempfile::tempdir().expect("tempdir");
    fs::write(
        root.path().join("loop.fsp"),
        r#"<fsp><div><?import src="loop.fsp"?></div></fsp>"#,
    )
    .expect("write");
    let locator = ResourceLocator::new(root.path()).expect("locator");
    let err = parser()
        .with_locator(locator)
        .parse_resource("loop.fsp")
        .expect_err("cycle");
    assert!(matches!(err, ParserError::ImportDepth(depth) if depth == MAX_IMPORT_DEPTH));
}

#[test]
fn custom_content_handling_definitions_participate() {
    let parser = parser_with(vec![ComponentDefinition::builder("note", "Note")
        .content(ContentHandling::AsAttribute)
        .build()]);
    let definition = parser
        .parse(&PageSource::from_text("<fsp><note>remember</note></fsp>"))
        .expect("parse");
    let note = definition.tree().element(definition.root().children()[0]);
    assert_eq!(note.attribute(CONTENT_ATTRIBUTE), Some("remember"));
}
