use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use crate::{component::PropertyValue, error::ParserError};

/// Tag of the synthesized child that carries text content.
pub const TEXT_TAG: &str = "#text";
/// Tag reported for the definition-less root of a page tree.
pub const ROOT_TAG: &str = "fsp";
/// Attribute under which text content is stored.
pub const CONTENT_ATTRIBUTE: &str = "content";
/// Attributes every component recognizes.
pub const BASE_ATTRIBUTES: &[(&str, AttributeKind)] = &[
    ("name", AttributeKind::Text),
    ("class", AttributeKind::Text),
    ("style", AttributeKind::Text),
    ("hint", AttributeKind::Text),
    ("visible", AttributeKind::Boolean),
    ("flex", AttributeKind::Text),
];

/// Allowed occurrence range of a child tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    min: usize,
    max: Option<usize>,
}

impl Cardinality {
    pub const UNBOUNDED: Cardinality = Cardinality::new(0, None);
    pub const OPTIONAL: Cardinality = Cardinality::new(0, Some(1));

    pub const fn new(min: usize, max: Option<usize>) -> Self {
        Self { min, max }
    }

    pub const fn exactly(count: usize) -> Self {
        Self::new(count, Some(count))
    }

    pub const fn at_least(min: usize) -> Self {
        Self::new(min, None)
    }

    pub const fn at_most(max: usize) -> Self {
        Self::new(0, Some(max))
    }

    pub fn min(&self) -> usize {
        self.min
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    pub fn contains(&self, count: usize) -> bool {
        count >= self.min && self.max.map_or(true, |max| count <= max)
    }

    pub fn is_required(&self) -> bool {
        self.min > 0
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{}]", self.min, max),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardinalityViolation {
    pub tag: String,
    pub cardinality: Cardinality,
    pub count: usize,
}

impl CardinalityViolation {
    pub fn new(tag: impl Into<String>, cardinality: Cardinality, count: usize) -> Self {
        Self {
            tag: tag.into(),
            cardinality,
            count,
        }
    }
}

impl fmt::Display for CardinalityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "`{}` occurs {} time(s), expected {}",
            self.tag, self.count, self.cardinality
        )
    }
}

/// Disposition of text found directly inside an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentHandling {
    Reject,
    Ignore,
    AsAttribute,
    AsChild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Text,
    Boolean,
    Integer,
    Number,
    Choice(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeSpec {
    pub kind: AttributeKind,
}

impl AttributeSpec {
    pub const TEXT: AttributeSpec = AttributeSpec::new(AttributeKind::Text);

    pub const fn new(kind: AttributeKind) -> Self {
        Self { kind }
    }

    /// Converts a markup string into a typed property. The error describes
    /// the expected form.
    pub fn coerce(&self, raw: &str) -> Result<PropertyValue, String> {
        match self.kind {
            AttributeKind::Text => Ok(PropertyValue::Text(raw.to_string())),
            AttributeKind::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(PropertyValue::Boolean(true)),
                "false" => Ok(PropertyValue::Boolean(false)),
                _ => Err("a boolean".to_string()),
            },
            AttributeKind::Integer => raw
                .trim()
                .parse::<i64>()
                .map(PropertyValue::Integer)
                .map_err(|_| "an integer".to_string()),
            AttributeKind::Number => match raw.trim().parse::<f64>() {
                Ok(value) if value.is_finite() => Ok(PropertyValue::Number(value)),
                _ => Err("a number".to_string()),
            },
            AttributeKind::Choice(choices) => choices
                .iter()
                .find(|choice| choice.eq_ignore_ascii_case(raw.trim()))
                .map(|choice| PropertyValue::Text((*choice).to_string()))
                .ok_or_else(|| format!("one of {}", choices.join(", "))),
        }
    }
}

/// Markup-facing description of a component type.
#[derive(Debug, Clone)]
pub struct ComponentDefinition {
    tag: String,
    widget_class: String,
    content_handling: ContentHandling,
    attributes: BTreeMap<String, AttributeSpec>,
    open_attributes: bool,
    children: BTreeMap<String, Cardinality>,
    any_child: Option<Cardinality>,
    parents: Option<BTreeSet<String>>,
}

impl ComponentDefinition {
    pub fn builder(
        tag: impl Into<String>,
        widget_class: impl Into<String>,
    ) -> ComponentDefinitionBuilder {
        ComponentDefinitionBuilder {
            definition: ComponentDefinition {
                tag: tag.into(),
                widget_class: widget_class.into(),
                content_handling: ContentHandling::Reject,
                attributes: BASE_ATTRIBUTES
                    .iter()
                    .map(|(name, kind)| (name.to_string(), AttributeSpec::new(*kind)))
                    .collect(),
                open_attributes: false,
                children: BTreeMap::new(),
                any_child: None,
                parents: None,
            },
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn widget_class(&self) -> &str {
        &self.widget_class
    }

    pub fn content_handling(&self) -> ContentHandling {
        self.content_handling
    }

    /// Specification of a plain attribute, if the component recognizes it.
    pub fn attribute(&self, name: &str) -> Option<AttributeSpec> {
        if let Some(spec) = self.attributes.get(name) {
            return Some(*spec);
        }
        if name == CONTENT_ATTRIBUTE && self.content_handling == ContentHandling::AsAttribute {
            return Some(AttributeSpec::TEXT);
        }
        self.open_attributes.then_some(AttributeSpec::TEXT)
    }

    pub fn recognizes_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn cardinality_for(&self, child_tag: &str) -> Option<Cardinality> {
        self.children.get(child_tag).copied().or(self.any_child)
    }

    pub fn allows_parent(&self, parent_tag: &str) -> bool {
        self.parents
            .as_ref()
            .map_or(true, |parents| parents.contains(parent_tag))
    }

    /// Checks a prospective child against this parent. `running_count`
    /// includes the child being added.
    pub fn validate_child(
        &self,
        child: &ComponentDefinition,
        running_count: usize,
    ) -> Result<(), ParserError> {
        let invalid = || ParserError::InvalidChild {
            parent: self.tag.clone(),
            child: child.tag.clone(),
        };
        let cardinality = self.cardinality_for(&child.tag).ok_or_else(invalid)?;
        if !child.allows_parent(&self.tag) {
            return Err(invalid());
        }
        match cardinality.max() {
            Some(max) if running_count > max => Err(ParserError::TooManyChildren {
                parent: self.tag.clone(),
                child: child.tag.clone(),
                max,
            }),
            _ => Ok(()),
        }
    }

    /// Every cardinality violation for the observed child counts, including
    /// required tags that were never observed.
    pub fn validate_children(&self, counts: &BTreeMap<String, usize>) -> Vec<CardinalityViolation> {
        let mut violations: Vec<CardinalityViolation> = counts
            .iter()
            .filter_map(|(tag, count)| {
                let cardinality = self.cardinality_for(tag)?;
                (!cardinality.contains(*count))
                    .then(|| CardinalityViolation::new(tag.clone(), cardinality, *count))
            })
            .collect();
        violations.extend(
            self.children
                .iter()
                .filter(|(tag, cardinality)| cardinality.is_required() && !counts.contains_key(*tag))
                .map(|(tag, cardinality)| CardinalityViolation::new(tag.clone(), *cardinality, 0)),
        );
        violations
    }
}

#[derive(Debug)]
pub struct ComponentDefinitionBuilder {
    definition: ComponentDefinition,
}

impl ComponentDefinitionBuilder {
    pub fn content(mut self, handling: ContentHandling) -> Self {
        self.definition.content_handling = handling;
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.definition
            .attributes
            .insert(name.into(), AttributeSpec::new(kind));
        self
    }

    /// Accept any plain attribute as text.
    pub fn open_attributes(mut self) -> Self {
        self.definition.open_attributes = true;
        self
    }

    pub fn child(mut self, tag: impl Into<String>, cardinality: Cardinality) -> Self {
        self.definition.children.insert(tag.into(), cardinality);
        self
    }

    /// Cardinality applied to child tags without an explicit entry.
    pub fn any_child(mut self, cardinality: Cardinality) -> Self {
        self.definition.any_child = Some(cardinality);
        self
    }

    pub fn parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition.parents = Some(parents.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> ComponentDefinition {
        self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tabview() -> ComponentDefinition {
        ComponentDefinition::builder("tabview", "Tabview")
            .child("tab", Cardinality::new(1, Some(3)))
            .child("toolbar", Cardinality::OPTIONAL)
            .build()
    }

    fn tab() -> ComponentDefinition {
        ComponentDefinition::builder("tab", "Tab")
            .parents(["tabview"])
            .build()
    }

    fn counts(entries: &[(&str, usize)]) -> BTreeMap<String, usize> {
        entries
            .iter()
            .map(|(tag, count)| (tag.to_string(), *count))
            .collect()
    }

    #[test]
    fn cardinality_renders_bounds() {
        assert_eq!(Cardinality::new(1, Some(3)).to_string(), "[1..3]");
        assert_eq!(Cardinality::at_least(2).to_string(), "[2..*]");
        assert_eq!(Cardinality::UNBOUNDED.to_string(), "[0..*]");
    }

    #[test]
    fn counts_inside_range_have_no_violations() {
        let definition = tabview();
        for count in 1..=3 {
            assert!(definition
                .validate_children(&counts(&[("tab", count)]))
                .is_empty());
        }
    }

    #[test]
    fn counts_outside_range_name_the_tag() {
        let definition = tabview();
        let violations = definition.validate_children(&counts(&[("tab", 4), ("toolbar", 2)]));
        let tags: Vec<&str> = violations.iter().map(|v| v.tag.as_str()).collect();
        assert_eq!(tags, ["tab", "toolbar"]);

        let missing = definition.validate_children(&counts(&[]));
        assert_eq!(missing, vec![CardinalityViolation::new("tab", Cardinality::new(1, Some(3)), 0)]);
    }

    #[test]
    fn child_validation_checks_membership_parents_and_maximum() {
        let parent = tabview();
        let child = tab();
        assert!(parent.validate_child(&child, 3).is_ok());
        assert!(matches!(
            parent.validate_child(&child, 4),
            Err(ParserError::TooManyChildren { max: 3, .. })
        ));

        let stranger = ComponentDefinition::builder("label", "Label").build();
        assert!(matches!(
            parent.validate_child(&stranger, 1),
            Err(ParserError::InvalidChild { .. })
        ));

        let div = ComponentDefinition::builder("div", "Div")
            .any_child(Cardinality::UNBOUNDED)
            .build();
        assert!(matches!(
            div.validate_child(&child, 1),
            Err(ParserError::InvalidChild { .. })
        ));
    }

    #[test]
    fn attributes_include_base_set_and_coerce() {
        let definition = ComponentDefinition::builder("textbox", "Textbox")
            .attribute("maxlength", AttributeKind::Integer)
            .attribute("size", AttributeKind::Choice(&["small", "large"]))
            .build();
        assert!(definition.recognizes_attribute("name"));
        assert!(definition.recognizes_attribute("visible"));
        assert!(!definition.recognizes_attribute("bogus"));

        let maxlength = definition.attribute("maxlength").expect("declared");
        assert_eq!(maxlength.coerce(" 12 "), Ok(PropertyValue::Integer(12)));
        assert!(maxlength.coerce("twelve").is_err());

        let size = definition.attribute("size").expect("declared");
        assert_eq!(size.coerce("LARGE"), Ok(PropertyValue::Text("large".into())));
        assert_eq!(size.coerce("huge"), Err("one of small, large".to_string()));

        let visible = definition.attribute("visible").expect("base attribute");
        assert_eq!(visible.coerce("False"), Ok(PropertyValue::Boolean(false)));
    }

    #[test]
    fn open_definitions_accept_any_attribute() {
        let html = ComponentDefinition::builder("html", "Html")
            .open_attributes()
            .build();
        assert_eq!(html.attribute("data-role"), Some(AttributeSpec::TEXT));
    }
}
