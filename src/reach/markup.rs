//! Markup walking with `tl`.

use std::borrow::Cow;

/// Attributes that link or embed another resource.
const LINK_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "xlink:href",
    "poster",
    "data",
    "background",
    "altimg",
];

/// Raw pieces of a markup document that may carry references.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MarkupScan {
    /// Values of linking attributes, one per occurrence.
    pub links: Vec<String>,
    /// Contents of `style="..."` attributes.
    pub inline_styles: Vec<String>,
    /// Contents of `<style>` elements.
    pub style_blocks: Vec<String>,
}

/// Decode the predefined XML entities in an attribute value; values with
/// entities we do not know are returned raw.
fn decode_entities(value: &str) -> String {
    match quick_xml::escape::unescape(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// Split a `srcset` value into its candidate URLs.
fn srcset_urls(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .map(str::to_string)
}

pub fn scan_markup(text: &str) -> Result<MarkupScan, String> {
    let dom = tl::parse(text, tl::ParserOptions::default()).map_err(|e| format!("{e:?}"))?;
    let parser = dom.parser();
    let mut scan = MarkupScan::default();

    for node in dom.nodes() {
        let Some(tag) = node.as_tag() else {
            continue;
        };

        for (key, value) in tag.attributes().iter() {
            let Some(value) = value else {
                continue;
            };
            let key: &str = key.as_ref();
            let value = decode_entities(value.as_ref());

            if key.eq_ignore_ascii_case("style") {
                scan.inline_styles.push(value);
            } else if key.eq_ignore_ascii_case("srcset") {
                scan.links.extend(srcset_urls(&value));
            } else if LINK_ATTRIBUTES.iter().any(|a| key.eq_ignore_ascii_case(a)) {
                scan.links.push(value);
            }
        }

        if tag.name().as_utf8_str().eq_ignore_ascii_case("style") {
            let css: Cow<'_, str> = tag.inner_text(parser);
            scan.style_blocks.push(css.into_owned());
        }
    }

    Ok(scan)
}
