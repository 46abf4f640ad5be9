use std::collections::BTreeMap;

use quick_xml::escape::unescape;

use super::{PageParser, ParseCursor};
use crate::{element::TagLibrary, error::ParserError, source::PageSource};

/// Handles `<?target data?>` instructions found in page markup.
pub trait ProcessingInstructionHandler: Send + Sync {
    fn target(&self) -> &str;

    fn process(
        &self,
        parser: &PageParser,
        cursor: &mut ParseCursor<'_>,
        data: &str,
    ) -> Result<(), ParserError>;
}

/// `<?import src="..."?>`: grafts another page's elements in place.
#[derive(Debug, Default)]
pub struct ImportHandler;

impl ProcessingInstructionHandler for ImportHandler {
    fn target(&self) -> &str {
        "import"
    }

    fn process(
        &self,
        parser: &PageParser,
        cursor: &mut ParseCursor<'_>,
        data: &str,
    ) -> Result<(), ParserError> {
        let attributes = pseudo_attributes(self.target(), data)?;
        let src = required(self.target(), &attributes, "src")?;
        let url = match (parser.locator(), cursor.base_url()) {
            (Some(locator), base) => locator.resolve(base, src)?,
            (None, Some(base)) => base.join(src).map_err(|err| invalid(self.target(), err))?,
            (None, None) => {
                return Err(invalid(
                    self.target(),
                    format!("cannot resolve `{src}` without a base location"),
                ))
            }
        };
        let source = PageSource::from_url(&url)?;
        parser.import(&source, cursor)
    }
}

/// `<?taglib prefix="..." uri="..."?>`: attaches a tag library to the
/// current parent element.
#[derive(Debug, Default)]
pub struct TagLibraryHandler;

impl ProcessingInstructionHandler for TagLibraryHandler {
    fn target(&self) -> &str {
        "taglib"
    }

    fn process(
        &self,
        _parser: &PageParser,
        cursor: &mut ParseCursor<'_>,
        data: &str,
    ) -> Result<(), ParserError> {
        let attributes = pseudo_attributes(self.target(), data)?;
        let prefix = required(self.target(), &attributes, "prefix")?;
        let uri = required(self.target(), &attributes, "uri")?;
        let parent = cursor.parent();
        cursor
            .tree_mut()
            .add_tag_library(parent, TagLibrary::new(prefix, uri));
        Ok(())
    }
}

fn invalid(target: &str, reason: impl ToString) -> ParserError {
    ParserError::InvalidPi {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}

fn required<'a>(
    target: &str,
    attributes: &'a BTreeMap<String, String>,
    name: &str,
) -> Result<&'a str, ParserError> {
    attributes
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| invalid(target, format!("missing `{name}`")))
}

/// Parses `name="value"` pairs; single and double quotes are accepted.
pub(crate) fn pseudo_attributes(
    target: &str,
    data: &str,
) -> Result<BTreeMap<String, String>, ParserError> {
    let mut attributes = BTreeMap::new();
    let mut rest = data.trim_start();
    while !rest.is_empty() {
        let (name, after_name) = rest
            .split_once('=')
            .ok_or_else(|| invalid(target, format!("expected `name=\"value\"` in `{rest}`")))?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(invalid(target, format!("malformed attribute name `{name}`")));
        }
        let after_name = after_name.trim_start();
        let quote = after_name
            .chars()
            .next()
            .filter(|c| *c == '"' || *c == '\'')
            .ok_or_else(|| invalid(target, format!("value of `{name}` must be quoted")))?;
        let body = &after_name[1..];
        let close = body
            .find(quote)
            .ok_or_else(|| invalid(target, format!("unterminated value for `{name}`")))?;
        let value = unescape(&body[..close]).map_err(|err| invalid(target, err))?;
        attributes.insert(name.to_string(), value.into_owned());
        rest = body[close + 1..].trim_start();
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_attributes_accept_both_quote_styles() {
        let parsed = pseudo_attributes("taglib", r#"prefix='x'  uri="urn:a&amp;b""#).expect("parse");
        assert_eq!(parsed.get("prefix").map(String::as_str), Some("x"));
        assert_eq!(parsed.get("uri").map(String::as_str), Some("urn:a&b"));
        assert!(pseudo_attributes("import", "").expect("empty").is_empty());
    }

    #[test]
    fn malformed_pseudo_attributes_are_rejected() {
        for data in ["src", "src=page.fsp", "src=\"page.fsp", "a b=\"c\""] {
            assert!(
                matches!(pseudo_attributes("import", data), Err(ParserError::InvalidPi { .. })),
                "accepted {data:?}"
            );
        }
    }
}
