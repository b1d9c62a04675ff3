//! Review extraction from rendered listing pages.

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::models::{FrontierRequest, PageCursor, PageResult, ReviewRecord, ShopReply};
use crate::network::RenderedPage;
use crate::url_utils;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Invalid CSS selector {selector}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No review listing found at {0}")]
    MissingListing(String),
}

/// Turns one rendered page into review drafts plus the next-page locator.
///
/// Implementations must report the next-page link honestly: its absence ends
/// pagination for the entity.
pub trait Extractor: Send + Sync {
    fn extract(
        &self,
        request: &FrontierRequest,
        page: &RenderedPage,
    ) -> Result<PageResult, ExtractionError>;
}

fn selector(css: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(css).map_err(|e| ExtractionError::InvalidSelector {
        selector: css.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Extractor for heureka-style shop review listings.
pub struct HeurekaExtractor {
    listing: Selector,
    review: Selector,
    author: Selector,
    published: Selector,
    recommendation: Selector,
    rating: Selector,
    summary: Selector,
    pros: Selector,
    cons: Selector,
    reply_title: Selector,
    reply_body: Selector,
    active_page: Selector,
    page_link: Selector,
    shop_name: Selector,
}

impl HeurekaExtractor {
    pub fn new() -> Result<Self, ExtractionError> {
        Ok(Self {
            listing: selector("ul.js-pagination__content")?,
            review: selector("li.c-box-list__item.c-post")?,
            author: selector(".c-post__author")?,
            published: selector(".c-post__time-shop > time.c-post__publish-time")?,
            recommendation: selector(".c-post__recommendation")?,
            rating: selector(".c-rating-widget")?,
            summary: selector("p.c-post__summary")?,
            pros: selector("ul.c-attributes-list--pros li.c-attributes-list__item")?,
            cons: selector("ul.c-attributes-list--cons li.c-attributes-list__item")?,
            reply_title: selector(".c-post-response > h3.c-post-response__heading > span")?,
            reply_body: selector(".c-post-response > p")?,
            active_page: selector("li > span.c-pagination__link.is-active")?,
            page_link: selector("a.c-pagination__link")?,
            shop_name: selector("h1")?,
        })
    }

    fn parse_review(&self, entity: &str, review: ElementRef<'_>) -> ReviewRecord {
        let author = clean(
            &review
                .select(&self.author)
                .map(text_outside_svg)
                .collect::<String>(),
        );

        let summary = select_text(review, &self.summary);
        let title = select_text(review, &self.reply_title);
        let body = select_text(review, &self.reply_body);
        let shop_reply = if title.is_empty() && body.is_empty() {
            None
        } else {
            Some(ShopReply { title, body })
        };

        ReviewRecord {
            entity: entity.to_string(),
            author,
            review_at: select_attr(review, &self.published, "datetime"),
            recommendation: select_text(review, &self.recommendation),
            rating: select_attr(review, &self.rating, "data-rating"),
            pros: select_items(review, &self.pros),
            cons: select_items(review, &self.cons),
            summary: (!summary.is_empty()).then_some(summary),
            shop_reply,
        }
    }

    fn next_page(
        &self,
        document: &Html,
        request: &FrontierRequest,
        base_url: &str,
        current: u32,
    ) -> Option<PageCursor> {
        let wanted = current.checked_add(1)?;
        document
            .select(&self.page_link)
            .filter_map(|link| link.value().attr("href"))
            .filter_map(|href| url_utils::convert_to_absolute_url(href.trim(), base_url).ok())
            .find(|url| {
                url_utils::is_pagination_of(url, &request.shop_url)
                    && url_utils::page_number(url) == Some(wanted)
            })
            .map(|url| PageCursor {
                url: url_utils::strip_fragment(&url),
                page: wanted,
            })
    }
}

impl Extractor for HeurekaExtractor {
    fn extract(
        &self,
        request: &FrontierRequest,
        page: &RenderedPage,
    ) -> Result<PageResult, ExtractionError> {
        let document = Html::parse_document(&page.body);

        let listing = document.select(&self.listing).next();
        let has_pagination = document.select(&self.page_link).next().is_some()
            || document.select(&self.active_page).next().is_some();
        if listing.is_none() && !has_pagination {
            return Err(ExtractionError::MissingListing(page.url.clone()));
        }

        let drafts: Vec<ReviewRecord> = listing
            .map(|listing| {
                listing
                    .select(&self.review)
                    .map(|review| self.parse_review(&request.entity, review))
                    .collect()
            })
            .unwrap_or_default();

        let current = document
            .select(&self.active_page)
            .next()
            .and_then(|el| clean(&el.text().collect::<String>()).parse::<u32>().ok())
            .unwrap_or(request.page);

        let base_url = if page.final_url.is_empty() {
            &page.url
        } else {
            &page.final_url
        };
        let next_page = self.next_page(&document, request, base_url, current);

        let shop_name = document
            .select(&self.shop_name)
            .next()
            .map(|el| clean(&el.text().collect::<String>()))
            .filter(|name| !name.is_empty());

        Ok(PageResult {
            entity: request.entity.clone(),
            shop_name,
            page: current,
            drafts,
            next_page,
        })
    }
}

fn clean(text: &str) -> String {
    text.replace('\u{a0}', " ").trim().to_string()
}

fn select_text(root: ElementRef<'_>, sel: &Selector) -> String {
    clean(&root.select(sel).flat_map(|el| el.text()).collect::<String>())
}

fn select_attr(root: ElementRef<'_>, sel: &Selector, attr: &str) -> Option<String> {
    root.select(sel)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

fn select_items(root: ElementRef<'_>, sel: &Selector) -> Vec<String> {
    root.select(sel)
        .map(|el| clean(&el.text().collect::<String>()))
        .collect()
}

// Author blocks carry an avatar icon whose <svg> text must not leak into the name.
fn text_outside_svg(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            let in_svg = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .map_or(false, |e| e.name().eq_ignore_ascii_case("svg"))
            });
            if !in_svg {
                out.push_str(text);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOP: &str = "https://shop.test/acme/recenze/";

    fn request(page: u32) -> FrontierRequest {
        FrontierRequest {
            entity: "shop.test/acme/recenze".to_string(),
            shop_url: SHOP.to_string(),
            url: SHOP.to_string(),
            page,
        }
    }

    fn rendered(body: &str) -> RenderedPage {
        RenderedPage {
            url: SHOP.to_string(),
            final_url: SHOP.to_string(),
            status_code: 200,
            body: body.to_string(),
        }
    }

    const PAGE_ONE: &str = r#"
<html><body>
<h1> Acme&nbsp;Shop </h1>
<ul class="c-box-list o-wrapper__overflowing@lteLine js-pagination__content">
  <li class="c-box-list__item c-post">
    <div class="c-post__author"><svg><title>avatar</title></svg>Jana&nbsp;Nováková</div>
    <div class="c-post__time-shop"><time class="c-post__publish-time" datetime="2024-03-01T10:00:00+01:00">1. 3.</time></div>
    <div class="c-post__recommendation"> Doporučuje obchod </div>
    <div class="c-rating-widget" data-rating="4.5"></div>
    <ul class="c-attributes-list c-attributes-list--pros c-attributes-list--circle o-block-list o-block-list--snug">
      <li class="c-attributes-list__item"> rychlé dodání </li>
      <li class="c-attributes-list__item">dobrá cena</li>
    </ul>
    <ul class="c-attributes-list c-attributes-list--cons c-attributes-list--circle o-block-list o-block-list--snug">
      <li class="c-attributes-list__item">obal</li>
    </ul>
    <p class="c-post__summary"> Spokojenost </p>
    <div class="c-post-response">
      <h3 class="c-post-response__heading e-heading"><span>Reakce obchodu</span></h3>
      <p>Děkujeme za hodnocení</p>
    </div>
  </li>
  <li class="c-box-list__item c-post">
    <div class="c-post__author">Anonym</div>
    <div class="c-post__recommendation">Nedoporučuje obchod</div>
  </li>
</ul>
<ul class="c-pagination">
  <li><span class="c-pagination__link is-active">1</span></li>
  <li><a class="c-pagination__link" href="?f=2#filtr">2</a></li>
  <li><a class="c-pagination__link" href="?f=3#filtr">3</a></li>
  <li><a class="c-pagination__link" href="/other/recenze/?f=2">jinde</a></li>
</ul>
</body></html>"#;

    #[test]
    fn test_extracts_reviews_in_document_order() {
        let extractor = HeurekaExtractor::new().unwrap();
        let result = extractor.extract(&request(1), &rendered(PAGE_ONE)).unwrap();

        assert_eq!(result.entity, "shop.test/acme/recenze");
        assert_eq!(result.shop_name.as_deref(), Some("Acme Shop"));
        assert_eq!(result.drafts.len(), 2);

        let first = &result.drafts[0];
        assert_eq!(first.author, "Jana Nováková");
        assert_eq!(first.review_at.as_deref(), Some("2024-03-01T10:00:00+01:00"));
        assert_eq!(first.recommendation, "Doporučuje obchod");
        assert_eq!(first.rating.as_deref(), Some("4.5"));
        assert_eq!(first.pros, vec!["rychlé dodání", "dobrá cena"]);
        assert_eq!(first.cons, vec!["obal"]);
        assert_eq!(first.summary.as_deref(), Some("Spokojenost"));
        assert_eq!(
            first.shop_reply,
            Some(ShopReply {
                title: "Reakce obchodu".to_string(),
                body: "Děkujeme za hodnocení".to_string(),
            })
        );

        let second = &result.drafts[1];
        assert_eq!(second.author, "Anonym");
        assert!(second.review_at.is_none());
        assert!(second.rating.is_none());
        assert!(second.summary.is_none());
        assert!(second.shop_reply.is_none());
        assert!(second.pros.is_empty());
    }

    #[test]
    fn test_next_page_is_current_plus_one() {
        let extractor = HeurekaExtractor::new().unwrap();
        let result = extractor.extract(&request(1), &rendered(PAGE_ONE)).unwrap();

        assert_eq!(result.page, 1);
        assert_eq!(
            result.next_page,
            Some(PageCursor {
                url: "https://shop.test/acme/recenze/?f=2".to_string(),
                page: 2,
            })
        );
    }

    #[test]
    fn test_last_page_has_no_next_link() {
        let body = r#"<html><body>
<ul class="js-pagination__content">
  <li class="c-box-list__item c-post"><div class="c-post__author">Petr</div></li>
</ul>
<ul><li><a class="c-pagination__link" href="?f=2">2</a></li>
<li><span class="c-pagination__link is-active">3</span></li></ul>
</body></html>"#;
        let extractor = HeurekaExtractor::new().unwrap();
        let result = extractor.extract(&request(3), &rendered(body)).unwrap();
        assert_eq!(result.page, 3);
        assert_eq!(result.drafts.len(), 1);
        assert!(!result.has_next_page_link());
    }

    #[test]
    fn test_empty_listing_with_next_link() {
        let body = r#"<html><body>
<ul class="js-pagination__content"></ul>
<ul><li><span class="c-pagination__link is-active">4</span></li>
<li><a class="c-pagination__link" href="https://shop.test/acme/recenze/?f=5#filtr">5</a></li></ul>
</body></html>"#;
        let extractor = HeurekaExtractor::new().unwrap();
        let result = extractor.extract(&request(4), &rendered(body)).unwrap();
        assert!(result.drafts.is_empty());
        assert_eq!(result.next_page.unwrap().page, 5);
    }

    #[test]
    fn test_page_without_listing_is_extraction_error() {
        let extractor = HeurekaExtractor::new().unwrap();
        let err = extractor
            .extract(&request(1), &rendered("<html><body><p>Captcha</p></body></html>"))
            .unwrap_err();
        assert!(matches!(err, ExtractionError::MissingListing(_)));
    }

    #[test]
    fn test_invalid_selector_reports_error() {
        assert!(matches!(
            selector("ul[["),
            Err(ExtractionError::InvalidSelector { .. })
        ));
    }
}
