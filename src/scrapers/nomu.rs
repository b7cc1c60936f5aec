//! 노무사신문 (labor attorneys' newspaper) scraper profile.
//!
//! The homepage is laid out as numbered `sectionN` blocks, and the section
//! label comes from which block a link was found in. Article pages show
//! their registration time in the head info list as `등록 YYYY-MM-DD HH:mm:ss`.

use super::{PublishedAtSource, SectionRule, SiteProfile};
use crate::models::Site;
use once_cell::sync::Lazy;
use regex::Regex;

static REGISTERED_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2})").unwrap());

pub static PROFILE: SiteProfile = SiteProfile {
    site: Site::Nomu,
    base_url: "https://nomu4.net/",
    link_groups: &[
        ".section1-slider li a",
        ".section2-slider li a",
        ".section2-left-list li a",
        ".section2-right-list li a",
        ".section4-slider li a",
        ".section5-left-item a",
        ".section5-right-list li a",
        ".section6-slider-inner li a",
        ".section7-item a",
    ],
    title_selectors: &[
        "h4",
        "h5",
        "h6",
        ".section2-slider-tit",
        ".section4-slider-title",
        ".section5-left-item-sub-tit",
        ".section5-right-tit",
        ".section7-item-main-tit",
    ],
    url_marker: "view.php",
    sections: &[
        SectionRule::Group("section1", "실시간뉴스"),
        SectionRule::Group("section2-slider", "헤드라인뉴스"),
        SectionRule::Group("section2-left", "중요뉴스"),
        SectionRule::Group("section2-right", "최신뉴스"),
        SectionRule::Group("section4", "영상뉴스"),
        SectionRule::Group("section5-left", "노무사뉴스"),
        SectionRule::Group("section5-right", "오피니언"),
        SectionRule::Group("section6", "사무실알리기"),
        SectionRule::Group("section7", "노동법콘텐츠"),
    ],
    max_items: None,
    published_at: PublishedAtSource::InfoText {
        selector: ".article-head-info .info-text li",
        marker: "등록",
        pattern: &REGISTERED_AT,
    },
    body_selectors: &[
        ".fr-view",
        ".view_content",
        ".board_view .cont",
        "#bo_v_con",
        ".article-content",
        ".content",
        ".article-body",
        "article",
        ".view_con",
    ],
};
