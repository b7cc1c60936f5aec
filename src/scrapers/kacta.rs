//! 세무사신문 (tax accountants' webzine) scraper profile.
//!
//! The homepage is a grid of numbered `#skin-N` widgets. Article links point
//! at `articleView.html` and carry their section in the query string, e.g.
//! `/news/articleView.html?idxno=123&sc_section_code=S1N2`.

use super::{PublishedAtSource, SectionRule, SiteProfile};
use crate::models::Site;

pub static PROFILE: SiteProfile = SiteProfile {
    site: Site::Kacta,
    base_url: "https://webzine.kacta.or.kr/",
    link_groups: &[
        "#skin-3 .item a",  // 메인 기사
        "#skin-11 .item a", // 일반 기사
        "#skin-12 .item a",
        "#skin-13 .item a",
        "#skin-14 .item a",
        "#skin-15 .item a",
        "#skin-16 .item a",
        "#skin-17 .item a", // 많이 본 뉴스
        "#skin-19 .item a", // 오피니언
        "#skin-20 .item a", // 회무
        "#skin-21 .item a", // 조세뉴스
        "#skin-23 .item a", // People
        "#skin-24 .item a", // 사회경제
    ],
    title_selectors: &["h2", ".auto-titles"],
    url_marker: "articleView.html",
    sections: &[
        SectionRule::Href("sc_section_code=S1N1", "회무"),
        SectionRule::Href("sc_section_code=S1N2", "세정"),
        SectionRule::Href("sc_section_code=S1N5", "기획"),
        SectionRule::Href("sc_section_code=S1N6", "People"),
        SectionRule::Href("sc_section_code=S1N7", "오피니언"),
        SectionRule::Href("sc_sub_section_code=S2N1", "조세뉴스"),
        SectionRule::Href("sc_sub_section_code=S2N2", "사회경제"),
    ],
    max_items: Some(30),
    published_at: PublishedAtSource::Attribute {
        selector: r#"meta[property="article:published_time"]"#,
        attr: "content",
    },
    body_selectors: &[
        "#article-view-content-div",
        ".article-veiw-body",
        ".view_con",
        ".board_view .content",
        "#contentDetail",
        ".article-content",
        ".content",
        ".article-body",
        "article",
        ".view_content",
    ],
};
