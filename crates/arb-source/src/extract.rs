//! Best-effort advisory extraction from the traffic information page.
//!
//! The page structure is not under our control, so matching is deliberately
//! loose: tag and attribute names are case-insensitive, class lists may carry
//! extra classes, and a block missing its title or body is skipped on its own.

use std::sync::OnceLock;

use regex::Regex;

/// One `<tag class="...">` selector, compiled once.
#[derive(Clone, Debug)]
struct ElementMatcher {
    /// `<tag ... class="... class ...">`
    open: Regex,
    /// Any opening or closing `tag`, for depth tracking.
    any: Regex,
}

impl ElementMatcher {
    fn new(tag: &str, class: &str) -> Result<Self, regex::Error> {
        let tag = regex::escape(tag);
        let open = Regex::new(&format!(
            r#"(?is)<{tag}\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?{class}(?:\s[^"']*)?["'][^>]*>"#,
            class = regex::escape(class),
        ))?;
        let any = Regex::new(&format!(r"(?i)<(/?){tag}\b[^>]*>"))?;
        Ok(Self { open, any })
    }

    /// Inner HTML of the element whose opening tag ends at `start`, honouring
    /// nested elements of the same tag. `None` when the element is never closed.
    fn inner<'a>(&self, html: &'a str, start: usize) -> Option<&'a str> {
        let mut depth = 1usize;
        for caps in self.any.captures_iter(&html[start..]) {
            let whole = caps.get(0)?;
            let closing = caps.get(1).is_some_and(|c| !c.as_str().is_empty());
            if closing {
                depth -= 1;
                if depth == 0 {
                    return Some(&html[start..start + whole.start()]);
                }
            } else if !whole.as_str().ends_with("/>") {
                depth += 1;
            }
        }
        None
    }

    fn first_text(&self, html: &str) -> Option<String> {
        let m = self.open.find(html)?;
        self.inner(html, m.end()).map(to_text)
    }
}

/// Where advisories live in the page.
#[derive(Clone, Debug)]
pub struct PageLayout {
    container: ElementMatcher,
    title: ElementMatcher,
    body: ElementMatcher,
}

impl PageLayout {
    /// Each selector is a `(tag, class)` pair.
    pub fn new(
        container: (&str, &str),
        title: (&str, &str),
        body: (&str, &str),
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            container: ElementMatcher::new(container.0, container.1)?,
            title: ElementMatcher::new(title.0, title.1)?,
            body: ElementMatcher::new(body.0, body.1)?,
        })
    }

    /// Layout of the Bane NOR traffic information page.
    pub fn bane_nor() -> Result<Self, regex::Error> {
        Self::new(
            ("div", "traffic-information__item"),
            ("h3", "traffic-information__title"),
            ("div", "traffic-information__text"),
        )
    }

    /// Extract every complete advisory as `"{title}\n\n{body}"`.
    pub fn extract(&self, html: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut skipped = 0usize;

        for m in self.container.open.find_iter(html) {
            let Some(block) = self.container.inner(html, m.end()) else {
                skipped += 1;
                continue;
            };
            match self.advisory_from_block(block) {
                Some(advisory) => out.push(advisory),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            tracing::debug!(skipped, "skipped incomplete advisory blocks");
        }
        out
    }

    fn advisory_from_block(&self, block: &str) -> Option<String> {
        let title = self.title.first_text(block)?;
        let body = self.body.first_text(block)?;
        if title.is_empty() && body.is_empty() {
            return None;
        }
        Some(format!("{title}\n\n{body}"))
    }
}

/// Strip tags, decode entities and collapse whitespace.
pub fn to_text(html: &str) -> String {
    static TAG: OnceLock<Regex> = OnceLock::new();
    static SCRIPT: OnceLock<Regex> = OnceLock::new();

    let script = SCRIPT.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("static regex")
    });
    let tag = TAG.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"));

    let without_scripts = script.replace_all(html, " ");
    let without_tags = tag.replace_all(&without_scripts, " ");
    normalize_ws(&decode_entities(&without_tags))
}

/// Decode named entities common on the page plus numeric references.
pub fn decode_entities(s: &str) -> String {
    static ENTITY: OnceLock<Regex> = OnceLock::new();
    let re = ENTITY.get_or_init(|| {
        Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]{1,7});").expect("static regex")
    });

    re.replace_all(s, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        decode_entity(name).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }

    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" | "ensp" | "emsp" | "thinsp" => ' ',
        "shy" => return Some(String::new()),
        "ndash" => '–',
        "mdash" => '—',
        "minus" => '−',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        "lsaquo" => '‹',
        "rsaquo" => '›',
        "lsquo" => '‘',
        "rsquo" => '’',
        "sbquo" => '‚',
        "ldquo" => '“',
        "rdquo" => '”',
        "bdquo" => '„',
        "bull" => '•',
        "middot" => '·',
        "deg" => '°',
        "times" => '×',
        "divide" => '÷',
        "plusmn" => '±',
        "frac12" => '½',
        "sect" => '§',
        "para" => '¶',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "euro" => '€',
        "pound" => '£',
        "cent" => '¢',
        "iexcl" => '¡',
        "iquest" => '¿',
        "aring" => 'å',
        "Aring" => 'Å',
        "oslash" => 'ø',
        "Oslash" => 'Ø',
        "aelig" => 'æ',
        "AElig" => 'Æ',
        "auml" => 'ä',
        "Auml" => 'Ä',
        "ouml" => 'ö',
        "Ouml" => 'Ö',
        "uuml" => 'ü',
        "Uuml" => 'Ü',
        "szlig" => 'ß',
        "aacute" => 'á',
        "Aacute" => 'Á',
        "agrave" => 'à',
        "eacute" => 'é',
        "Eacute" => 'É',
        "egrave" => 'è',
        "ecirc" => 'ê',
        "oacute" => 'ó',
        "ocirc" => 'ô',
        "iacute" => 'í',
        "uacute" => 'ú',
        "ccedil" => 'ç',
        "ntilde" => 'ñ',
        _ => return None,
    };
    Some(ch.to_string())
}

/// Collapse sequences of whitespace into a single space and trim.
pub fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> PageLayout {
        PageLayout::bane_nor().unwrap()
    }

    const PAGE: &str = r#"
<html><body>
<section class="traffic-information">
  <div class="traffic-information__item traffic-information__item--major">
    <h3 class="traffic-information__title">
      Delay   A
    </h3>
    <div class="traffic-information__text">
      <p>Signal failure at <strong>Lillestr&oslash;m</strong>.</p>
      <div class="note">Expect &amp; plan for delays.</div>
    </div>
  </div>
  <DIV CLASS='traffic-information__item'>
    <H3 class='traffic-information__title'>Delay B</H3>
    <div class="traffic-information__text">Buses replace trains&nbsp;Oslo S&#8211;Ski.</div>
  </DIV>
  <div class="traffic-information__item">
    <h3 class="traffic-information__title">No body here</h3>
  </div>
  <div class="traffic-information__item">
    <div class="traffic-information__text">No title here</div>
  </div>
</section>
</body></html>
"#;

    #[test]
    fn extracts_complete_blocks_and_skips_partial_ones() {
        let advisories = layout().extract(PAGE);
        assert_eq!(
            advisories,
            vec![
                "Delay A\n\nSignal failure at Lillestrøm . Expect & plan for delays.".to_string(),
                "Delay B\n\nBuses replace trains Oslo S–Ski.".to_string(),
            ]
        );
    }

    #[test]
    fn page_without_blocks_yields_nothing() {
        assert!(layout()
            .extract("<html><body><p>Normal traffic</p></body></html>")
            .is_empty());
        assert!(layout().extract("").is_empty());
    }

    #[test]
    fn unclosed_container_is_skipped() {
        let html = r#"<div class="traffic-information__item"><h3 class="traffic-information__title">T</h3>"#;
        assert!(layout().extract(html).is_empty());
    }

    #[test]
    fn class_must_match_whole_token() {
        let html = r#"<div class="traffic-information__items">
<h3 class="traffic-information__title">T</h3>
<div class="traffic-information__text">B</div></div>"#;
        assert!(layout().extract(html).is_empty());
    }

    #[test]
    fn text_conversion_drops_scripts_and_decodes() {
        assert_eq!(
            to_text("<p>a<script>var x = '<b>';</script>  b&lt;c&#x41;</p>"),
            "a b<cA"
        );
        assert_eq!(decode_entities("&bogus; &amp;"), "&bogus; &");
    }

    #[test]
    fn decodes_typographic_and_accented_entities() {
        assert_eq!(
            decode_entities("&laquo;Vent&hellip;&raquo; caf&eacute; &rsquo;s &frac12;"),
            "«Vent…» café ’s ½"
        );
    }

    #[test]
    fn normalizes_whitespace() {
        assert_eq!(normalize_ws("  a \n\t b  "), "a b");
    }
}
